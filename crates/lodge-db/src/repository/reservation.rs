//! # Reservation Repository
//!
//! Reservation aggregates: the reservation header, its room lines and
//! their committed night rates, fetched fully materialized.
//!
//! Status changes go through guarded UPDATEs (`WHERE status = ?from`) so
//! a concurrent transition loses cleanly instead of clobbering - the
//! state machine in lodge-core decides legality, the guard enforces it
//! against races.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use lodge_core::{
    Reservation, ReservationNightRate, ReservationRoom, ReservationStatus,
};

/// A reservation with every room line and its night rates materialized.
#[derive(Debug, Clone)]
pub struct ReservationAggregate {
    pub reservation: Reservation,
    pub rooms: Vec<ReservationRoomLine>,
}

/// One room line with its committed nightly rates (empty until the
/// reservation is confirmed).
#[derive(Debug, Clone)]
pub struct ReservationRoomLine {
    pub room: ReservationRoom,
    pub night_rates: Vec<ReservationNightRate>,
}

/// Repository for reservation database operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Gets a reservation by ID.
    ///
    /// Soft-deleted (cancelled) reservations are still returned: they
    /// remain addressable for folio reads and history.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Reservation> {
        let mut conn = self.pool.acquire().await?;
        get_by_id_on(&mut conn, id).await
    }

    /// Room lines of a reservation, oldest first.
    pub async fn rooms(&self, reservation_id: &str) -> DbResult<Vec<ReservationRoom>> {
        let mut conn = self.pool.acquire().await?;
        rooms_on(&mut conn, reservation_id).await
    }

    /// Fully-materialized aggregate: header + lines + night rates.
    pub async fn aggregate(&self, id: &str) -> DbResult<ReservationAggregate> {
        let mut conn = self.pool.acquire().await?;

        let reservation = get_by_id_on(&mut conn, id).await?;
        let room_rows = rooms_on(&mut conn, id).await?;

        let mut rooms = Vec::with_capacity(room_rows.len());
        for room in room_rows {
            let night_rates = night_rates_on(&mut conn, &room.id).await?;
            rooms.push(ReservationRoomLine { room, night_rates });
        }

        Ok(ReservationAggregate { reservation, rooms })
    }

    /// Persists a new HOLD reservation with its unassigned room lines.
    ///
    /// Header and lines commit together; a hold consumes no inventory,
    /// so no write-lock ceremony is needed beyond the transaction.
    pub async fn insert_hold(
        &self,
        reservation: &Reservation,
        rooms: &[ReservationRoom],
    ) -> DbResult<()> {
        debug!(id = %reservation.id, lines = rooms.len(), "Inserting hold reservation");

        let mut tx = self.pool.begin().await?;

        insert_reservation_on(&mut *tx, reservation).await?;
        for room in rooms {
            insert_room_line_on(&mut *tx, room).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub(crate) async fn get_by_id_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Reservation> {
    sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Reservation", id))
}

pub(crate) async fn rooms_on(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> DbResult<Vec<ReservationRoom>> {
    let rooms = sqlx::query_as::<_, ReservationRoom>(
        "SELECT * FROM reservation_rooms
         WHERE reservation_id = ?1 AND deleted_at IS NULL
         ORDER BY created_at, id",
    )
    .bind(reservation_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rooms)
}

pub(crate) async fn night_rates_on(
    conn: &mut SqliteConnection,
    reservation_room_id: &str,
) -> DbResult<Vec<ReservationNightRate>> {
    let rates = sqlx::query_as::<_, ReservationNightRate>(
        "SELECT * FROM reservation_night_rates
         WHERE reservation_room_id = ?1
         ORDER BY date",
    )
    .bind(reservation_room_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rates)
}

pub(crate) async fn insert_reservation_on(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO reservations (
            id, property_id, guest_id, check_in, check_out, status,
            confirmed_at, cancelled_at, created_at, updated_at, deleted_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&reservation.id)
    .bind(&reservation.property_id)
    .bind(&reservation.guest_id)
    .bind(reservation.check_in)
    .bind(reservation.check_out)
    .bind(reservation.status)
    .bind(reservation.confirmed_at)
    .bind(reservation.cancelled_at)
    .bind(reservation.stamp.created_at)
    .bind(reservation.stamp.updated_at)
    .bind(reservation.stamp.deleted_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_room_line_on(
    conn: &mut SqliteConnection,
    room: &ReservationRoom,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO reservation_rooms (
            id, reservation_id, room_type_id, rate_plan_id,
            requested_room_id, assigned_room_id,
            adults, children, created_at, updated_at, deleted_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&room.id)
    .bind(&room.reservation_id)
    .bind(&room.room_type_id)
    .bind(&room.rate_plan_id)
    .bind(&room.requested_room_id)
    .bind(&room.assigned_room_id)
    .bind(room.adults)
    .bind(room.children)
    .bind(room.stamp.created_at)
    .bind(room.stamp.updated_at)
    .bind(room.stamp.deleted_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Binds a room line to a specific physical room.
pub(crate) async fn assign_room_on(
    conn: &mut SqliteConnection,
    line_id: &str,
    room_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE reservation_rooms SET assigned_room_id = ?2, updated_at = ?3
         WHERE id = ?1 AND assigned_room_id IS NULL",
    )
    .bind(line_id)
    .bind(room_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::TransactionFailed(format!(
            "room line {line_id} already assigned"
        )));
    }
    Ok(())
}

pub(crate) async fn insert_night_rate_on(
    conn: &mut SqliteConnection,
    rate: &ReservationNightRate,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO reservation_night_rates (id, reservation_room_id, date, price_cents, currency)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&rate.id)
    .bind(&rate.reservation_room_id)
    .bind(rate.date)
    .bind(rate.price_cents)
    .bind(&rate.currency)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Guarded status transition: succeeds only if the row is still in
/// `from`. A concurrent transition makes `rows_affected` zero and the
/// caller's transaction aborts instead of double-applying.
pub(crate) async fn update_status_on(
    conn: &mut SqliteConnection,
    id: &str,
    from: ReservationStatus,
    to: ReservationStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let confirmed_at = (to == ReservationStatus::Confirmed).then_some(now);
    let cancelled_at = (to == ReservationStatus::Cancelled).then_some(now);

    let result = sqlx::query(
        "UPDATE reservations SET
            status = ?3,
            confirmed_at = COALESCE(?4, confirmed_at),
            cancelled_at = COALESCE(?5, cancelled_at),
            updated_at = ?6
         WHERE id = ?1 AND status = ?2",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(confirmed_at)
    .bind(cancelled_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::TransactionFailed(format!(
            "reservation {id} left state {from:?} concurrently"
        )));
    }
    Ok(())
}

/// Tombstones a cancelled reservation (paired with its folio).
pub(crate) async fn soft_delete_on(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE reservations SET deleted_at = COALESCE(deleted_at, ?2), updated_at = ?2
         WHERE id = ?1",
    )
    .bind(id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
