//! # Folio Repository
//!
//! The folio ledger: append-only postings, voids, balances and refunds.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  post    → appends with the next per-folio position; prior items    │
//! │            are never mutated or reordered                           │
//! │  void    → sets voided_at, row retained for reconstruction          │
//! │  balance → SUM over non-voided signed amounts, recomputed from the  │
//! │            item history on every call (no cached running total)     │
//! │  refund  → bounded by payment amount minus prior non-voided         │
//! │            refunds against the same payment                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use lodge_core::{
    ledger, ActorContext, AuditStamp, Folio, FolioItem, FolioItemKind, FolioStatus, Money, Refund,
};

/// A folio with its visible items and derived balance.
#[derive(Debug, Clone)]
pub struct FolioView {
    pub folio: Folio,
    /// Non-voided items in posting order.
    pub items: Vec<FolioItem>,
    /// Recomputed from the items on every read.
    pub balance: Money,
}

/// Repository for folio ledger operations.
#[derive(Debug, Clone)]
pub struct FolioRepository {
    pool: SqlitePool,
}

impl FolioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FolioRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Folio> {
        sqlx::query_as::<_, Folio>("SELECT * FROM folios WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Folio", id))
    }

    pub async fn get_by_reservation(&self, reservation_id: &str) -> DbResult<Folio> {
        let mut conn = self.pool.acquire().await?;
        get_by_reservation_on(&mut conn, reservation_id).await
    }

    /// Folio + non-voided items + balance, fully materialized.
    pub async fn view(&self, folio_id: &str) -> DbResult<FolioView> {
        let folio = self.get_by_id(folio_id).await?;
        let items = self.items(folio_id).await?;
        let balance = ledger::balance(&items);

        Ok(FolioView {
            folio,
            items,
            balance,
        })
    }

    /// Non-voided items in posting order.
    pub async fn items(&self, folio_id: &str) -> DbResult<Vec<FolioItem>> {
        let items = sqlx::query_as::<_, FolioItem>(
            "SELECT * FROM folio_items
             WHERE folio_id = ?1 AND voided_at IS NULL
             ORDER BY position",
        )
        .bind(folio_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Audit read: every posting ever made, voided included.
    pub async fn items_including_voided(&self, folio_id: &str) -> DbResult<Vec<FolioItem>> {
        let items = sqlx::query_as::<_, FolioItem>(
            "SELECT * FROM folio_items WHERE folio_id = ?1 ORDER BY position",
        )
        .bind(folio_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Balance = SUM of non-voided signed amounts, derived in SQL.
    pub async fn balance(&self, folio_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        balance_on(&mut conn, folio_id).await
    }

    /// Appends an item to the folio.
    ///
    /// `magnitude` is unsigned for charges/payments/refunds (the kind
    /// decides the sign); adjustments pass their signed amount through.
    /// Runs under an immediate transaction so two concurrent posts
    /// cannot race the per-folio position sequence.
    pub async fn post(
        &self,
        folio_id: &str,
        kind: FolioItemKind,
        description: &str,
        magnitude: Money,
        actor: &ActorContext,
    ) -> DbResult<FolioItem> {
        let mut conn = self.pool.acquire().await?;
        crate::allocator::begin_immediate(&mut conn).await?;
        let result = post_on(
            &mut conn,
            folio_id,
            kind,
            description,
            magnitude,
            actor,
            Utc::now(),
        )
        .await;
        crate::allocator::finish(&mut conn, result).await
    }

    /// Voids an item: excluded from balance, retained for audit.
    pub async fn void(&self, item_id: &str, actor: &ActorContext) -> DbResult<()> {
        let now = Utc::now();
        debug!(item_id = %item_id, actor = %actor.actor_id, "Voiding folio item");

        let result = sqlx::query(
            "UPDATE folio_items SET voided_at = ?2
             WHERE id = ?1 AND voided_at IS NULL",
        )
        .bind(item_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FolioItem (unvoided)", item_id));
        }
        Ok(())
    }

    /// Refunds part of a payment.
    ///
    /// Runs under an immediate transaction so the remaining-refundable
    /// check and the REFUND posting are one isolation boundary - two
    /// concurrent refunds cannot both fit into the same headroom.
    pub async fn refund(
        &self,
        payment_item_id: &str,
        amount: Money,
        reason: Option<&str>,
        actor: &ActorContext,
    ) -> DbResult<Refund> {
        if !amount.is_positive() {
            return Err(lodge_core::CoreError::Validation(
                lodge_core::ValidationError::MustBePositive {
                    field: "refund amount".to_string(),
                },
            )
            .into());
        }

        let mut conn = self.pool.acquire().await?;
        crate::allocator::begin_immediate(&mut conn).await?;

        let result = refund_in_tx(&mut conn, payment_item_id, amount, reason, actor).await;

        crate::allocator::finish(&mut conn, result).await
    }
}

async fn refund_in_tx(
    conn: &mut SqliteConnection,
    payment_item_id: &str,
    amount: Money,
    reason: Option<&str>,
    actor: &ActorContext,
) -> DbResult<Refund> {
    let now = Utc::now();

    let payment = sqlx::query_as::<_, FolioItem>(
        "SELECT * FROM folio_items WHERE id = ?1 AND voided_at IS NULL",
    )
    .bind(payment_item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Payment folio item", payment_item_id))?;

    if payment.kind != FolioItemKind::Payment {
        return Err(DbError::not_found("Payment folio item", payment_item_id));
    }

    // prior non-voided refunds against this payment (stored as positive
    // magnitudes on the refunds table)
    let already: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(r.amount_cents), 0)
         FROM refunds r
         JOIN folio_items fi ON fi.id = r.folio_item_id
         WHERE r.payment_item_id = ?1 AND fi.voided_at IS NULL",
    )
    .bind(payment_item_id)
    .fetch_one(&mut *conn)
    .await?;

    let remaining = payment.amount().abs() - Money::from_cents(already);
    ledger::check_refund_bound(&payment, remaining, amount).map_err(DbError::from)?;

    let item = post_on(
        &mut *conn,
        &payment.folio_id,
        FolioItemKind::Refund,
        &format!("Refund of payment {}", payment.description),
        amount,
        actor,
        now,
    )
    .await?;

    let refund = Refund {
        id: Uuid::new_v4().to_string(),
        payment_item_id: payment.id.clone(),
        folio_item_id: item.id.clone(),
        amount_cents: amount.cents(),
        reason: reason.map(str::to_string),
        approved_by: actor.actor_id.clone(),
        created_at: now,
    };
    insert_refund_on(&mut *conn, &refund).await?;

    debug!(
        payment = %payment.id,
        amount = %amount,
        "Refund posted"
    );

    Ok(refund)
}

// =============================================================================
// Connection-level operations (composable inside the booking transaction)
// =============================================================================

pub(crate) async fn get_by_reservation_on(
    conn: &mut SqliteConnection,
    reservation_id: &str,
) -> DbResult<Folio> {
    sqlx::query_as::<_, Folio>("SELECT * FROM folios WHERE reservation_id = ?1")
        .bind(reservation_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Folio for reservation", reservation_id))
}

pub(crate) async fn create_on(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    currency: &str,
    now: DateTime<Utc>,
) -> DbResult<Folio> {
    let folio = Folio {
        id: Uuid::new_v4().to_string(),
        reservation_id: reservation_id.to_string(),
        status: FolioStatus::Open,
        currency: currency.to_string(),
        stamp: AuditStamp::new(now),
    };

    sqlx::query(
        "INSERT INTO folios (id, reservation_id, status, currency, created_at, updated_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&folio.id)
    .bind(&folio.reservation_id)
    .bind(folio.status)
    .bind(&folio.currency)
    .bind(folio.stamp.created_at)
    .bind(folio.stamp.updated_at)
    .bind(folio.stamp.deleted_at)
    .execute(&mut *conn)
    .await?;

    Ok(folio)
}

/// Appends an item with the next per-folio position.
///
/// The position read and the insert share the caller's transaction, so
/// the sequence has no gaps or duplicates.
pub(crate) async fn post_on(
    conn: &mut SqliteConnection,
    folio_id: &str,
    kind: FolioItemKind,
    description: &str,
    magnitude: Money,
    actor: &ActorContext,
    now: DateTime<Utc>,
) -> DbResult<FolioItem> {
    let folio = sqlx::query_as::<_, Folio>("SELECT * FROM folios WHERE id = ?1")
        .bind(folio_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Folio", folio_id))?;

    let next_position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM folio_items WHERE folio_id = ?1",
    )
    .bind(folio_id)
    .fetch_one(&mut *conn)
    .await?;

    let item = FolioItem {
        id: Uuid::new_v4().to_string(),
        folio_id: folio_id.to_string(),
        kind,
        description: description.to_string(),
        amount_cents: ledger::signed_amount(kind, magnitude).cents(),
        currency: folio.currency.clone(),
        position: next_position,
        posted_at: now,
        posted_by: actor.actor_id.clone(),
        voided_at: None,
    };

    sqlx::query(
        "INSERT INTO folio_items (
            id, folio_id, kind, description, amount_cents, currency,
            position, posted_at, posted_by, voided_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&item.id)
    .bind(&item.folio_id)
    .bind(item.kind)
    .bind(&item.description)
    .bind(item.amount_cents)
    .bind(&item.currency)
    .bind(item.position)
    .bind(item.posted_at)
    .bind(&item.posted_by)
    .bind(item.voided_at)
    .execute(&mut *conn)
    .await?;

    Ok(item)
}

pub(crate) async fn balance_on(conn: &mut SqliteConnection, folio_id: &str) -> DbResult<Money> {
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM folio_items
         WHERE folio_id = ?1 AND voided_at IS NULL",
    )
    .bind(folio_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::from_cents(cents))
}

/// Non-voided payment items, oldest first (cancellation refunds walk
/// them in this order).
pub(crate) async fn payment_items_on(
    conn: &mut SqliteConnection,
    folio_id: &str,
) -> DbResult<Vec<FolioItem>> {
    let items = sqlx::query_as::<_, FolioItem>(
        "SELECT * FROM folio_items
         WHERE folio_id = ?1 AND kind = 'payment' AND voided_at IS NULL
         ORDER BY position",
    )
    .bind(folio_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

/// Positive magnitude already refunded against a payment (non-voided).
pub(crate) async fn refunded_against_on(
    conn: &mut SqliteConnection,
    payment_item_id: &str,
) -> DbResult<Money> {
    let cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(r.amount_cents), 0)
         FROM refunds r
         JOIN folio_items fi ON fi.id = r.folio_item_id
         WHERE r.payment_item_id = ?1 AND fi.voided_at IS NULL",
    )
    .bind(payment_item_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::from_cents(cents))
}

pub(crate) async fn insert_refund_on(
    conn: &mut SqliteConnection,
    refund: &Refund,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO refunds (
            id, payment_item_id, folio_item_id, amount_cents, reason,
            approved_by, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&refund.id)
    .bind(&refund.payment_item_id)
    .bind(&refund.folio_item_id)
    .bind(refund.amount_cents)
    .bind(&refund.reason)
    .bind(&refund.approved_by)
    .bind(refund.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Moves the folio to a terminal status and optionally tombstones it.
pub(crate) async fn set_status_on(
    conn: &mut SqliteConnection,
    folio_id: &str,
    status: FolioStatus,
    soft_delete: bool,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let deleted_at = soft_delete.then_some(now);
    sqlx::query(
        "UPDATE folios SET
            status = ?2,
            deleted_at = COALESCE(deleted_at, ?3),
            updated_at = ?4
         WHERE id = ?1",
    )
    .bind(folio_id)
    .bind(status)
    .bind(deleted_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
