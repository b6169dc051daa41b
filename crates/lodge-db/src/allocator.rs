//! # Room Allocator
//!
//! Atomically binds every room line of a reservation to a specific
//! physical room for every night of the stay.
//!
//! ## Serialization Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  The shared resource is "rooms of a type on a night".               │
//! │                                                                     │
//! │  allocator A                      allocator B                       │
//! │  BEGIN IMMEDIATE ← write lock     BEGIN IMMEDIATE ← queues on the   │
//! │  read availability                 lock (busy_timeout bound)        │
//! │  assign rooms, price, post        ...                               │
//! │  COMMIT ← lock released           lock acquired                     │
//! │                                   read availability ← SEES A'S      │
//! │                                   COMMIT, fails InsufficientAvail-  │
//! │                                   ability or fits in what's left    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Taking the write lock *before* the availability read makes the check
//! and the room-binding commit one isolation boundary: first committer
//! wins, and two allocations can never both observe the same last free
//! room. An in-memory lock would not survive multiple process
//! instances; the database lock does.
//!
//! Failure anywhere rolls the whole transaction back - no partially
//! assigned rooms are ever visible to a subsequent availability read.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::availability::{availability_on, busy_room_ids_on};
use crate::error::{DbError, DbResult};
use crate::repository::reference::{
    active_rooms_of_type_on, rate_plan_on, rate_plan_prices_on, room_type_on,
};
use crate::repository::reservation::{assign_room_on, insert_night_rate_on};
use lodge_core::pricing::{self, NightlyRate};
use lodge_core::{
    CoreError, Property, Reservation, ReservationNightRate, ReservationRoom, Room, StayRange,
    ValidationError,
};

// =============================================================================
// Transaction helpers
// =============================================================================

/// Opens an immediate (write-locked) transaction on the connection.
///
/// IMMEDIATE acquires SQLite's write lock up front instead of on first
/// write, so every read after this call is part of the serialized
/// critical section. Lock contention past the busy timeout surfaces as
/// the retryable `DbError::Unavailable`.
pub(crate) async fn begin_immediate(conn: &mut SqliteConnection) -> DbResult<()> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(())
}

/// Commits on success, rolls back on failure, passing the result through.
///
/// The commit itself is never retried here: an ambiguous commit outcome
/// re-driven blindly could double-book.
pub(crate) async fn finish<T>(conn: &mut SqliteConnection, result: DbResult<T>) -> DbResult<T> {
    match result {
        Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(value),
            Err(err) => {
                // don't hand a connection with an open transaction back
                // to the pool
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(err.into())
            }
        },
        Err(err) => {
            // rollback failure would only mask the original error
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(err)
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// One room line after allocation: bound to a room, priced per night.
#[derive(Debug, Clone)]
pub(crate) struct AllocatedLine {
    pub line_id: String,
    pub room_type_code: String,
    pub assigned_room_id: String,
    pub nights: Vec<NightlyRate>,
}

/// Allocates rooms for every line of `reservation` inside the caller's
/// immediate transaction.
///
/// ## Steps (all-or-nothing)
/// 1. Guest counts vs room type capacity → `CapacityExceeded`
/// 2. Per-date availability for each requested type across the whole
///    stay → `InsufficientAvailability` naming the type and the first
///    conflicting date
/// 3. Explicitly requested rooms verified active / type-matching / free
///    every night; otherwise the lowest free room number is chosen
/// 4. Rooms bound to lines
/// 5. Nightly rates resolved and stored per line (uniform currency)
pub(crate) async fn allocate_on(
    conn: &mut SqliteConnection,
    property: &Property,
    reservation: &Reservation,
    lines: &[ReservationRoom],
    now: DateTime<Utc>,
) -> DbResult<Vec<AllocatedLine>> {
    let stay = reservation.stay()?;

    // ---- step 1: capacity -------------------------------------------------
    let mut room_types = HashMap::new();
    for line in lines {
        if !room_types.contains_key(&line.room_type_id) {
            let rt = room_type_on(&mut *conn, &line.room_type_id).await?;
            room_types.insert(line.room_type_id.clone(), rt);
        }
        let rt = &room_types[&line.room_type_id];
        if !rt.fits(line.adults, line.children) {
            return Err(CoreError::CapacityExceeded {
                room_type_code: rt.code.clone(),
                adults: line.adults,
                children: line.children,
                max_adults: rt.max_adults,
                max_children: rt.max_children,
                max_occupancy: rt.max_occupancy,
            }
            .into());
        }
    }

    // ---- step 2: per-date availability per requested type -----------------
    let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
    for line in lines {
        *requested.entry(line.room_type_id.as_str()).or_insert(0) += 1;
    }

    for (&type_id, &quantity) in &requested {
        let days = availability_on(&mut *conn, &property.id, type_id, &stay).await?;
        if let Some(day) = days.iter().find(|d| d.available < quantity) {
            return Err(CoreError::InsufficientAvailability {
                room_type_code: room_types[type_id].code.clone(),
                date: day.date,
                requested: quantity,
                available: day.available,
            }
            .into());
        }
    }

    // ---- steps 3-5: bind and price each line ------------------------------
    let mut chosen: HashSet<String> = HashSet::new();
    let mut allocated = Vec::with_capacity(lines.len());

    for line in lines {
        let rt = &room_types[&line.room_type_id];
        let room_id = match &line.requested_room_id {
            Some(requested_id) => {
                verify_requested_room(&mut *conn, requested_id, line, rt, &stay, &chosen).await?
            }
            None => {
                pick_lowest_free_room(&mut *conn, rt, &stay, &chosen)
                    .await?
                    .ok_or_else(|| {
                        // per-date counts passed, but no single room is
                        // free across every night (fragmented inventory)
                        DbError::from(CoreError::InsufficientAvailability {
                            room_type_code: rt.code.clone(),
                            date: stay.check_in(),
                            requested: 1,
                            available: 0,
                        })
                    })?
            }
        };

        assign_room_on(&mut *conn, &line.id, &room_id, now).await?;
        chosen.insert(room_id.clone());

        let plan = rate_plan_on(&mut *conn, &line.rate_plan_id).await?;
        let prices = rate_plan_prices_on(&mut *conn, &plan.id, &line.room_type_id).await?;
        let nights = pricing::price_stay(&plan, &property.currency, &prices, &stay)
            .map_err(DbError::from)?;

        for night in &nights {
            let rate = ReservationNightRate {
                id: Uuid::new_v4().to_string(),
                reservation_room_id: line.id.clone(),
                date: night.date,
                price_cents: night.price.cents(),
                currency: night.currency.clone(),
            };
            insert_night_rate_on(&mut *conn, &rate).await?;
        }

        debug!(
            line = %line.id,
            room = %room_id,
            room_type = %rt.code,
            "Room allocated"
        );

        allocated.push(AllocatedLine {
            line_id: line.id.clone(),
            room_type_code: rt.code.clone(),
            assigned_room_id: room_id,
            nights,
        });
    }

    Ok(allocated)
}

/// Verifies an explicitly requested room: exists, active, of the
/// matching type, and free for every night (including against rooms
/// already chosen for earlier lines of this same allocation).
async fn verify_requested_room(
    conn: &mut SqliteConnection,
    room_id: &str,
    line: &ReservationRoom,
    room_type: &lodge_core::RoomType,
    stay: &StayRange,
    chosen: &HashSet<String>,
) -> DbResult<String> {
    let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?1 AND deleted_at IS NULL")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Room", room_id))?;

    if !room.is_active {
        return Err(CoreError::Validation(ValidationError::InvalidFormat {
            field: "requested_room_id".to_string(),
            reason: format!("room {} is not active", room.room_number),
        })
        .into());
    }
    if room.room_type_id != line.room_type_id {
        return Err(CoreError::Validation(ValidationError::InvalidFormat {
            field: "requested_room_id".to_string(),
            reason: format!(
                "room {} is not of room type {}",
                room.room_number, room_type.code
            ),
        })
        .into());
    }

    if chosen.contains(room_id) {
        return Err(occupied_error(room_type, stay.check_in()));
    }

    if let Some(conflict) = first_conflict_for_room(&mut *conn, room_id, stay).await? {
        return Err(occupied_error(room_type, conflict));
    }

    Ok(room.id)
}

/// The lowest-numbered active room of the type free for every night and
/// not already taken by an earlier line of this allocation.
async fn pick_lowest_free_room(
    conn: &mut SqliteConnection,
    room_type: &lodge_core::RoomType,
    stay: &StayRange,
    chosen: &HashSet<String>,
) -> DbResult<Option<String>> {
    let rooms = active_rooms_of_type_on(&mut *conn, &room_type.id).await?;
    let busy: HashSet<String> = busy_room_ids_on(&mut *conn, &room_type.id, stay)
        .await?
        .into_iter()
        .collect();

    Ok(rooms
        .into_iter()
        .find(|r| !busy.contains(&r.id) && !chosen.contains(&r.id))
        .map(|r| r.id))
}

/// First night of the stay on which the room is already occupied.
async fn first_conflict_for_room(
    conn: &mut SqliteConnection,
    room_id: &str,
    stay: &StayRange,
) -> DbResult<Option<NaiveDate>> {
    #[derive(sqlx::FromRow)]
    struct Occupied {
        check_in: NaiveDate,
        check_out: NaiveDate,
    }

    let stays = sqlx::query_as::<_, Occupied>(
        "SELECT r.check_in, r.check_out
         FROM reservation_rooms rr
         JOIN reservations r ON r.id = rr.reservation_id
         WHERE rr.assigned_room_id = ?1
           AND rr.deleted_at IS NULL
           AND r.status IN ('confirmed', 'checked_in', 'checked_out')
           AND r.check_in < ?2
           AND r.check_out > ?3",
    )
    .bind(room_id)
    .bind(stay.check_out())
    .bind(stay.check_in())
    .fetch_all(&mut *conn)
    .await?;

    Ok(stay
        .iter_nights()
        .find(|date| stays.iter().any(|s| s.check_in <= *date && *date < s.check_out)))
}

fn occupied_error(room_type: &lodge_core::RoomType, date: NaiveDate) -> DbError {
    CoreError::InsufficientAvailability {
        room_type_code: room_type.code.clone(),
        date,
        requested: 1,
        available: 0,
    }
    .into()
}
