//! # Notification Outbox Repository
//!
//! Fire-and-forget notification emission via the outbox pattern.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  CONFIRM / CANCEL (booking service)                                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                   SINGLE TRANSACTION                          │ │
//! │  │  1. reservation status change + folio postings                │ │
//! │  │  2. INSERT INTO notification_outbox (kind, payload)           │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  COMMIT ← state change and its notification succeed or fail        │
//! │           together; a confirmed booking can never silently lack    │
//! │           its notification entry                                   │
//! │                                                                     │
//! │  A dispatcher owned by the surrounding system drains pending       │
//! │  entries; the engine never awaits delivery.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use lodge_core::NotificationOutboxEntry;

/// Outbox entry kind for a confirmed booking.
pub const KIND_BOOKING_CONFIRMED: &str = "BOOKING_CONFIRMED";
/// Outbox entry kind for a cancelled booking.
pub const KIND_BOOKING_CANCELLED: &str = "BOOKING_CANCELLED";

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Pending entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as::<_, NotificationOutboxEntry>(
            "SELECT * FROM notification_outbox
             WHERE sent_at IS NULL
             ORDER BY created_at ASC
             LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Marks an entry as successfully delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE notification_outbox SET sent_at = ?2, attempted_at = ?2
             WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Counts pending entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Queues a notification inside the caller's transaction.
pub(crate) async fn queue_on(
    conn: &mut SqliteConnection,
    kind: &str,
    reservation_id: &str,
    payload: &serde_json::Value,
) -> DbResult<NotificationOutboxEntry> {
    let entry = NotificationOutboxEntry {
        id: Uuid::new_v4().to_string(),
        kind: kind.to_string(),
        reservation_id: reservation_id.to_string(),
        payload: payload.to_string(),
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        attempted_at: None,
        sent_at: None,
    };

    debug!(kind = %kind, reservation_id = %reservation_id, "Queuing notification");

    sqlx::query(
        "INSERT INTO notification_outbox (
            id, kind, reservation_id, payload,
            attempts, last_error, created_at, attempted_at, sent_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&entry.id)
    .bind(&entry.kind)
    .bind(&entry.reservation_id)
    .bind(&entry.payload)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .bind(entry.created_at)
    .bind(entry.attempted_at)
    .bind(entry.sent_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}
