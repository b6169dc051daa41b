//! # Availability Index
//!
//! Per-date reserved/available counts for a room type over a date range.
//!
//! ## Counting Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  total_rooms(type)   = active, non-deleted rooms of the type        │
//! │                                                                     │
//! │  reserved(type, d)   = room lines of the type on reservations in   │
//! │                        an inventory-consuming status whose stay    │
//! │                        covers d (check_in <= d < check_out)        │
//! │                                                                     │
//! │  available(type, d)  = total − reserved                            │
//! │                                                                     │
//! │  available < 0  →  INVENTORY INVARIANT VIOLATION (never clamped):  │
//! │  committed state already oversold - surface it, don't hide it.     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only committed reservations are visible: a read never observes an
//! in-flight allocation's partial effects (the allocator's whole
//! transaction commits or disappears). Inside the allocator the same
//! counting runs on the transaction's own connection, so it reads its
//! own writes.
//!
//! Overlapping stays are fetched once and counted per date in Rust -
//! SQLite has no series generator, and a stay row covers many dates.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use lodge_core::{CoreError, DayAvailability, StayRange};

/// Read-side availability oracle.
#[derive(Debug, Clone)]
pub struct AvailabilityIndex {
    pool: SqlitePool,
}

impl AvailabilityIndex {
    pub fn new(pool: SqlitePool) -> Self {
        AvailabilityIndex { pool }
    }

    /// Per-date counts for a room type across a range.
    pub async fn availability(
        &self,
        property_id: &str,
        room_type_id: &str,
        range: &StayRange,
    ) -> DbResult<Vec<DayAvailability>> {
        let mut conn = self.pool.acquire().await?;
        availability_on(&mut conn, property_id, room_type_id, range).await
    }
}

/// Stay intervals of committed room lines, as loaded for counting.
#[derive(Debug, sqlx::FromRow)]
struct OccupiedStay {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

/// Connection-level availability computation.
///
/// Runs identically against the pool (public reads) and inside the
/// allocator's write transaction (the oracle the commit depends on).
pub(crate) async fn availability_on(
    conn: &mut SqliteConnection,
    property_id: &str,
    room_type_id: &str,
    range: &StayRange,
) -> DbResult<Vec<DayAvailability>> {
    let total_rooms: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM rooms
         WHERE room_type_id = ?1 AND is_active = 1 AND deleted_at IS NULL",
    )
    .bind(room_type_id)
    .fetch_one(&mut *conn)
    .await?;

    // one row per committed room line whose stay overlaps the range
    let stays = sqlx::query_as::<_, OccupiedStay>(
        "SELECT r.check_in, r.check_out
         FROM reservation_rooms rr
         JOIN reservations r ON r.id = rr.reservation_id
         WHERE rr.room_type_id = ?1
           AND rr.deleted_at IS NULL
           AND r.property_id = ?2
           AND r.status IN ('confirmed', 'checked_in', 'checked_out')
           AND r.check_in < ?3
           AND r.check_out > ?4",
    )
    .bind(room_type_id)
    .bind(property_id)
    .bind(range.check_out())
    .bind(range.check_in())
    .fetch_all(&mut *conn)
    .await?;

    let mut days = Vec::with_capacity(range.nights() as usize);
    for date in range.iter_nights() {
        let reserved = stays
            .iter()
            .filter(|s| s.check_in <= date && date < s.check_out)
            .count() as i64;
        let available = total_rooms - reserved;

        if available < 0 {
            return Err(DbError::Domain(CoreError::InventoryInvariantViolation {
                detail: format!(
                    "room type {room_type_id} on {date}: reserved {reserved} \
                     exceeds total {total_rooms}"
                ),
            }));
        }

        days.push(DayAvailability {
            date,
            total_rooms,
            reserved,
            available,
        });
    }

    Ok(days)
}

/// Room ids of the type already occupied on any night of the range.
pub(crate) async fn busy_room_ids_on(
    conn: &mut SqliteConnection,
    room_type_id: &str,
    range: &StayRange,
) -> DbResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT rr.assigned_room_id
         FROM reservation_rooms rr
         JOIN reservations r ON r.id = rr.reservation_id
         WHERE rr.room_type_id = ?1
           AND rr.assigned_room_id IS NOT NULL
           AND rr.deleted_at IS NULL
           AND r.status IN ('confirmed', 'checked_in', 'checked_out')
           AND r.check_in < ?2
           AND r.check_out > ?3",
    )
    .bind(room_type_id)
    .bind(range.check_out())
    .bind(range.check_in())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}
