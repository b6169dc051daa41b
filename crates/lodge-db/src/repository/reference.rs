//! # Reference Data Repository
//!
//! Read side for the property-owned reference data the engine consumes:
//! properties, room types, rooms, rate plans and their prices, tax/fee
//! definitions, cancellation policies.
//!
//! CRUD for these entities lives in the surrounding system; the inserts
//! here exist for seeding and tests. Reads filter soft-deleted rows -
//! a tombstoned room or price row is invisible to pricing and
//! availability but stays addressable for historical reservations.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use lodge_core::{
    CancellationPolicy, Property, RatePlan, RatePlanPrice, RefundTier, Room, RoomType, TaxFee,
};

/// Repository for reference data lookups.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub async fn property(&self, id: &str) -> DbResult<Property> {
        let mut conn = self.pool.acquire().await?;
        property_on(&mut conn, id).await
    }

    pub async fn insert_property(&self, property: &Property) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO properties (id, name, timezone, currency, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&property.id)
        .bind(&property.name)
        .bind(&property.timezone)
        .bind(&property.currency)
        .bind(property.stamp.created_at)
        .bind(property.stamp.updated_at)
        .bind(property.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Room types & rooms
    // =========================================================================

    pub async fn room_type(&self, id: &str) -> DbResult<RoomType> {
        let mut conn = self.pool.acquire().await?;
        room_type_on(&mut conn, id).await
    }

    pub async fn room_types(&self, property_id: &str) -> DbResult<Vec<RoomType>> {
        let types = sqlx::query_as::<_, RoomType>(
            "SELECT * FROM room_types
             WHERE property_id = ?1 AND deleted_at IS NULL
             ORDER BY code",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    pub async fn insert_room_type(&self, room_type: &RoomType) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO room_types (
                id, property_id, code, name,
                max_adults, max_children, max_occupancy, description,
                created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&room_type.id)
        .bind(&room_type.property_id)
        .bind(&room_type.code)
        .bind(&room_type.name)
        .bind(room_type.max_adults)
        .bind(room_type.max_children)
        .bind(room_type.max_occupancy)
        .bind(&room_type.description)
        .bind(room_type.stamp.created_at)
        .bind(room_type.stamp.updated_at)
        .bind(room_type.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active, non-deleted rooms of a type, lowest room number first -
    /// the allocator's deterministic pick order.
    pub async fn active_rooms_of_type(&self, room_type_id: &str) -> DbResult<Vec<Room>> {
        let mut conn = self.pool.acquire().await?;
        active_rooms_of_type_on(&mut conn, room_type_id).await
    }

    pub async fn insert_room(&self, room: &Room) -> DbResult<()> {
        debug!(room_number = %room.room_number, "Inserting room");
        sqlx::query(
            "INSERT INTO rooms (
                id, property_id, room_type_id, room_number, is_active,
                created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&room.id)
        .bind(&room.property_id)
        .bind(&room.room_type_id)
        .bind(&room.room_number)
        .bind(room.is_active)
        .bind(room.stamp.created_at)
        .bind(room.stamp.updated_at)
        .bind(room.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Tombstones a room. Historical reservations keep referencing it;
    /// it simply stops counting toward inventory.
    pub async fn soft_delete_room(&self, room_id: &str) -> DbResult<()> {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "UPDATE rooms SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(room_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Room", room_id));
        }
        Ok(())
    }

    /// Takes a room in or out of service.
    pub async fn set_room_active(&self, room_id: &str, active: bool) -> DbResult<()> {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            "UPDATE rooms SET is_active = ?2, updated_at = ?3
             WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(room_id)
        .bind(active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Room", room_id));
        }
        Ok(())
    }

    // =========================================================================
    // Rate plans & prices
    // =========================================================================

    pub async fn rate_plan(&self, id: &str) -> DbResult<RatePlan> {
        let mut conn = self.pool.acquire().await?;
        rate_plan_on(&mut conn, id).await
    }

    pub async fn insert_rate_plan(&self, plan: &RatePlan) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO rate_plans (
                id, property_id, code, name, refundable, includes_breakfast,
                cancellation_policy_id, created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&plan.id)
        .bind(&plan.property_id)
        .bind(&plan.code)
        .bind(&plan.name)
        .bind(plan.refundable)
        .bind(plan.includes_breakfast)
        .bind(&plan.cancellation_policy_id)
        .bind(plan.stamp.created_at)
        .bind(plan.stamp.updated_at)
        .bind(plan.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All non-deleted price rows for a (plan, room type) pair: dated
    /// overrides plus at most one undated base row. The pricer resolves
    /// the per-night fallback order.
    pub async fn rate_plan_prices(
        &self,
        rate_plan_id: &str,
        room_type_id: &str,
    ) -> DbResult<Vec<RatePlanPrice>> {
        let mut conn = self.pool.acquire().await?;
        rate_plan_prices_on(&mut conn, rate_plan_id, room_type_id).await
    }

    pub async fn insert_rate_plan_price(&self, price: &RatePlanPrice) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO rate_plan_prices (
                id, rate_plan_id, room_type_id, date, price_cents, currency,
                created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&price.id)
        .bind(&price.rate_plan_id)
        .bind(&price.room_type_id)
        .bind(price.date)
        .bind(price.price_cents)
        .bind(&price.currency)
        .bind(price.stamp.created_at)
        .bind(price.stamp.updated_at)
        .bind(price.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Taxes & fees
    // =========================================================================

    /// Active, non-deleted tax/fee definitions for a property.
    pub async fn active_tax_fees(&self, property_id: &str) -> DbResult<Vec<TaxFee>> {
        let mut conn = self.pool.acquire().await?;
        active_tax_fees_on(&mut conn, property_id).await
    }

    pub async fn insert_tax_fee(&self, fee: &TaxFee) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO tax_fees (
                id, property_id, name, kind, value, currency,
                applies_to, per_night, active,
                created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&fee.id)
        .bind(&fee.property_id)
        .bind(&fee.name)
        .bind(fee.kind)
        .bind(fee.value)
        .bind(&fee.currency)
        .bind(fee.applies_to)
        .bind(fee.per_night)
        .bind(fee.active)
        .bind(fee.stamp.created_at)
        .bind(fee.stamp.updated_at)
        .bind(fee.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Cancellation policies
    // =========================================================================

    pub async fn cancellation_policy(&self, id: &str) -> DbResult<CancellationPolicy> {
        sqlx::query_as::<_, CancellationPolicy>(
            "SELECT * FROM cancellation_policies WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("CancellationPolicy", id))
    }

    pub async fn refund_tiers(&self, cancellation_policy_id: &str) -> DbResult<Vec<RefundTier>> {
        let mut conn = self.pool.acquire().await?;
        refund_tiers_on(&mut conn, cancellation_policy_id).await
    }

    pub async fn insert_cancellation_policy(&self, policy: &CancellationPolicy) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO cancellation_policies (id, property_id, name, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&policy.id)
        .bind(&policy.property_id)
        .bind(&policy.name)
        .bind(policy.stamp.created_at)
        .bind(policy.stamp.updated_at)
        .bind(policy.stamp.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_refund_tier(&self, tier: &RefundTier) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO refund_tiers (id, cancellation_policy_id, min_days_before, refund_bps)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&tier.id)
        .bind(&tier.cancellation_policy_id)
        .bind(tier.min_days_before)
        .bind(tier.refund_bps)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Connection-level reads (composable inside the allocation transaction)
// =============================================================================

pub(crate) async fn property_on(conn: &mut SqliteConnection, id: &str) -> DbResult<Property> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = ?1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Property", id))
}

pub(crate) async fn room_type_on(conn: &mut SqliteConnection, id: &str) -> DbResult<RoomType> {
    sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ?1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("RoomType", id))
}

pub(crate) async fn rate_plan_on(conn: &mut SqliteConnection, id: &str) -> DbResult<RatePlan> {
    sqlx::query_as::<_, RatePlan>("SELECT * FROM rate_plans WHERE id = ?1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("RatePlan", id))
}

pub(crate) async fn active_rooms_of_type_on(
    conn: &mut SqliteConnection,
    room_type_id: &str,
) -> DbResult<Vec<Room>> {
    let rooms = sqlx::query_as::<_, Room>(
        "SELECT * FROM rooms
         WHERE room_type_id = ?1 AND is_active = 1 AND deleted_at IS NULL
         ORDER BY room_number",
    )
    .bind(room_type_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rooms)
}

pub(crate) async fn rate_plan_prices_on(
    conn: &mut SqliteConnection,
    rate_plan_id: &str,
    room_type_id: &str,
) -> DbResult<Vec<RatePlanPrice>> {
    let prices = sqlx::query_as::<_, RatePlanPrice>(
        "SELECT * FROM rate_plan_prices
         WHERE rate_plan_id = ?1 AND room_type_id = ?2 AND deleted_at IS NULL
         ORDER BY date",
    )
    .bind(rate_plan_id)
    .bind(room_type_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(prices)
}

pub(crate) async fn active_tax_fees_on(
    conn: &mut SqliteConnection,
    property_id: &str,
) -> DbResult<Vec<TaxFee>> {
    let fees = sqlx::query_as::<_, TaxFee>(
        "SELECT * FROM tax_fees
         WHERE property_id = ?1 AND active = 1 AND deleted_at IS NULL
         ORDER BY name",
    )
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(fees)
}

pub(crate) async fn refund_tiers_on(
    conn: &mut SqliteConnection,
    cancellation_policy_id: &str,
) -> DbResult<Vec<RefundTier>> {
    let tiers = sqlx::query_as::<_, RefundTier>(
        "SELECT * FROM refund_tiers
         WHERE cancellation_policy_id = ?1
         ORDER BY min_days_before DESC",
    )
    .bind(cancellation_policy_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(tiers)
}
