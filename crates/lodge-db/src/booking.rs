//! # Booking Service
//!
//! The public operations of the reservation availability & ledger
//! engine, and the orchestration behind the reservation lifecycle.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  create_reservation(draft) ──► Reservation { HOLD }                 │
//! │                                                                     │
//! │  transition(id, CONFIRMED)                                          │
//! │    └── ONE IMMEDIATE TRANSACTION:                                   │
//! │        RoomAllocator (availability check + room binding + rates)    │
//! │        + Folio creation                                             │
//! │        + ROOM_CHARGE / TAX / FEE postings                           │
//! │        + status HOLD → CONFIRMED                                    │
//! │        + confirmation notification queued                           │
//! │        └── any failure rolls ALL of it back; the reservation        │
//! │            stays in HOLD with no folio and no assigned rooms        │
//! │                                                                     │
//! │  transition(id, CHECKED_IN)   status-only                           │
//! │  transition(id, CHECKED_OUT)  requires zero balance (or override)   │
//! │  transition(id, CANCELLED)    policy-evaluated refunds, inventory   │
//! │                               released, folio + reservation         │
//! │                               soft-deleted together                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::allocator::{allocate_on, begin_immediate, finish};
use crate::availability::availability_on;
use crate::error::{DbError, DbResult};
use crate::repository::folio::{self, FolioRepository, FolioView};
use crate::repository::outbox::{self, KIND_BOOKING_CANCELLED, KIND_BOOKING_CONFIRMED};
use crate::repository::reference::{
    property_on, rate_plan_on, refund_tiers_on, room_type_on,
};
use crate::repository::reservation::{
    self, ReservationRepository, get_by_id_on, rooms_on, soft_delete_on, update_status_on,
};
use lodge_core::pricing::stay_total;
use lodge_core::{
    lifecycle, policy, taxes, ActorContext, AuditStamp, ChargeScope, CoreError, DayAvailability,
    FolioItemKind, Money, Refund, Reservation, ReservationDraft, ReservationRoom,
    ReservationStatus, StayRange, TaxFeeKind, ValidationError, validation, MAX_STAY_NIGHTS,
};

/// Caller-supplied context for a lifecycle transition.
#[derive(Debug, Clone)]
pub struct TransitionCtx {
    pub actor: ActorContext,
    /// Explicit business override: allow checkout with a non-zero folio
    /// balance.
    pub allow_outstanding_balance: bool,
}

impl TransitionCtx {
    pub fn new(actor: ActorContext) -> Self {
        TransitionCtx {
            actor,
            allow_outstanding_balance: false,
        }
    }

    pub fn allow_outstanding_balance(mut self) -> Self {
        self.allow_outstanding_balance = true;
        self
    }
}

/// The booking service exposing the engine's public operations.
#[derive(Debug, Clone)]
pub struct BookingService {
    pool: SqlitePool,
}

impl BookingService {
    pub fn new(pool: SqlitePool) -> Self {
        BookingService { pool }
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Per-date availability counts for a room type.
    pub async fn check_availability(
        &self,
        property_id: &str,
        room_type_id: &str,
        range: &StayRange,
    ) -> DbResult<Vec<DayAvailability>> {
        let mut conn = self.pool.acquire().await?;
        availability_on(&mut conn, property_id, room_type_id, range).await
    }

    /// Creates a reservation in HOLD.
    ///
    /// Validates the draft and that its reference data exists and
    /// belongs to the property. A hold consumes no inventory; rooms are
    /// bound and charges posted only at confirmation.
    pub async fn create_reservation(&self, draft: &ReservationDraft) -> DbResult<Reservation> {
        validation::validate_draft(draft).map_err(CoreError::from)?;
        let stay = StayRange::new(draft.check_in, draft.check_out)?;
        if stay.nights() > MAX_STAY_NIGHTS {
            return Err(CoreError::Validation(ValidationError::OutOfRange {
                field: "stay nights".to_string(),
                min: 1,
                max: MAX_STAY_NIGHTS,
            })
            .into());
        }

        let mut conn = self.pool.acquire().await?;
        let property = property_on(&mut conn, &draft.property_id).await?;
        for request in &draft.rooms {
            let room_type = room_type_on(&mut conn, &request.room_type_id).await?;
            if room_type.property_id != property.id {
                return Err(DbError::not_found("RoomType", &request.room_type_id));
            }
            let plan = rate_plan_on(&mut conn, &request.rate_plan_id).await?;
            if plan.property_id != property.id {
                return Err(DbError::not_found("RatePlan", &request.rate_plan_id));
            }
        }
        drop(conn);

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            property_id: draft.property_id.clone(),
            guest_id: draft.guest_id.clone(),
            check_in: draft.check_in,
            check_out: draft.check_out,
            status: ReservationStatus::Hold,
            confirmed_at: None,
            cancelled_at: None,
            stamp: AuditStamp::new(now),
        };
        let rooms: Vec<ReservationRoom> = draft
            .rooms
            .iter()
            .map(|request| ReservationRoom {
                id: Uuid::new_v4().to_string(),
                reservation_id: reservation.id.clone(),
                room_type_id: request.room_type_id.clone(),
                rate_plan_id: request.rate_plan_id.clone(),
                requested_room_id: request.requested_room_id.clone(),
                assigned_room_id: None,
                adults: request.adults,
                children: request.children,
                stamp: AuditStamp::new(now),
            })
            .collect();

        ReservationRepository::new(self.pool.clone())
            .insert_hold(&reservation, &rooms)
            .await?;

        info!(
            reservation = %reservation.id,
            property = %reservation.property_id,
            nights = stay.nights(),
            lines = rooms.len(),
            "Reservation held"
        );

        Ok(reservation)
    }

    /// Drives a reservation to `target`, running the side effects the
    /// state machine attaches to the edge.
    pub async fn transition(
        &self,
        reservation_id: &str,
        target: ReservationStatus,
        ctx: &TransitionCtx,
    ) -> DbResult<Reservation> {
        match target {
            ReservationStatus::Confirmed => self.confirm(reservation_id, ctx).await?,
            ReservationStatus::CheckedIn => self.check_in(reservation_id).await?,
            ReservationStatus::CheckedOut => self.check_out(reservation_id, ctx).await?,
            ReservationStatus::Cancelled => self.cancel(reservation_id, ctx).await?,
            ReservationStatus::Hold => {
                // nothing transitions back into HOLD
                let current = self.reservations().get_by_id(reservation_id).await?;
                lifecycle::transition(current.status, ReservationStatus::Hold)
                    .map_err(DbError::from)?;
            }
        }
        self.reservations().get_by_id(reservation_id).await
    }

    /// The folio with its items and derived balance.
    pub async fn get_folio(&self, reservation_id: &str) -> DbResult<FolioView> {
        let folio_repo = FolioRepository::new(self.pool.clone());
        let folio = folio_repo.get_by_reservation(reservation_id).await?;
        folio_repo.view(&folio.id).await
    }

    /// Refunds part of a payment, bounded by the refund invariant.
    pub async fn refund(
        &self,
        payment_item_id: &str,
        amount: Money,
        reason: Option<&str>,
        actor: &ActorContext,
    ) -> DbResult<Refund> {
        FolioRepository::new(self.pool.clone())
            .refund(payment_item_id, amount, reason, actor)
            .await
    }

    fn reservations(&self) -> ReservationRepository {
        ReservationRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Transition side effects
    // =========================================================================

    /// HOLD → CONFIRMED: allocation, folio, charges, notification -
    /// one immediate transaction, all-or-nothing.
    async fn confirm(&self, reservation_id: &str, ctx: &TransitionCtx) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = confirm_in_tx(&mut conn, reservation_id, ctx).await;
        finish(&mut conn, result).await?;

        info!(reservation = %reservation_id, "Reservation confirmed");
        Ok(())
    }

    /// CONFIRMED → CHECKED_IN: status-only.
    async fn check_in(&self, reservation_id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let current = get_by_id_on(&mut conn, reservation_id).await?;
        lifecycle::transition(current.status, ReservationStatus::CheckedIn)
            .map_err(DbError::from)?;

        update_status_on(
            &mut conn,
            reservation_id,
            current.status,
            ReservationStatus::CheckedIn,
            Utc::now(),
        )
        .await?;

        info!(reservation = %reservation_id, "Guest checked in");
        Ok(())
    }

    /// CHECKED_IN → CHECKED_OUT: requires a settled folio unless the
    /// explicit override flag is passed; closes the folio.
    async fn check_out(&self, reservation_id: &str, ctx: &TransitionCtx) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = check_out_in_tx(&mut conn, reservation_id, ctx).await;
        finish(&mut conn, result).await?;

        info!(reservation = %reservation_id, "Guest checked out");
        Ok(())
    }

    /// HOLD/CONFIRMED → CANCELLED: policy-evaluated refunds, inventory
    /// release, paired soft delete, cancellation notification.
    async fn cancel(&self, reservation_id: &str, ctx: &TransitionCtx) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = cancel_in_tx(&mut conn, reservation_id, ctx).await;
        let refunded = finish(&mut conn, result).await?;

        info!(
            reservation = %reservation_id,
            refunded = %refunded,
            "Reservation cancelled"
        );
        Ok(())
    }
}

// =============================================================================
// Transaction bodies
// =============================================================================

async fn confirm_in_tx(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    ctx: &TransitionCtx,
) -> DbResult<()> {
    let now = Utc::now();

    let current = get_by_id_on(&mut *conn, reservation_id).await?;
    lifecycle::transition(current.status, ReservationStatus::Confirmed).map_err(DbError::from)?;

    let property = property_on(&mut *conn, &current.property_id).await?;
    let lines = rooms_on(&mut *conn, reservation_id).await?;
    if lines.is_empty() {
        return Err(CoreError::Validation(ValidationError::EmptyReservation).into());
    }
    let stay = current.stay()?;

    // availability check + room binding + nightly pricing
    let allocated = allocate_on(&mut *conn, &property, &current, &lines, now).await?;

    // folio + initial postings share the allocation's transaction: a
    // crash cannot leave rooms held with no folio
    let folio = folio::create_on(&mut *conn, reservation_id, &property.currency, now).await?;

    let mut room_subtotal = Money::zero();
    for line in &allocated {
        let line_total = stay_total(&line.nights);
        room_subtotal += line_total;
        folio::post_on(
            &mut *conn,
            &folio.id,
            FolioItemKind::RoomCharge,
            &format!(
                "Room charge {} ({} nights)",
                line.room_type_code,
                line.nights.len()
            ),
            line_total,
            &ctx.actor,
            now,
        )
        .await?;
    }

    let fees = crate::repository::reference::active_tax_fees_on(&mut *conn, &property.id).await?;
    for tax_line in taxes::apply(&fees, ChargeScope::RoomCharges, room_subtotal, stay.nights()) {
        let kind = match tax_line.kind {
            TaxFeeKind::Percentage => FolioItemKind::Tax,
            TaxFeeKind::Flat => FolioItemKind::Fee,
        };
        folio::post_on(
            &mut *conn,
            &folio.id,
            kind,
            &tax_line.name,
            tax_line.amount,
            &ctx.actor,
            now,
        )
        .await?;
    }

    update_status_on(
        &mut *conn,
        reservation_id,
        current.status,
        ReservationStatus::Confirmed,
        now,
    )
    .await?;

    outbox::queue_on(
        &mut *conn,
        KIND_BOOKING_CONFIRMED,
        reservation_id,
        &json!({
            "reservation_id": reservation_id,
            "property_id": property.id,
            "guest_id": current.guest_id,
            "check_in": current.check_in,
            "check_out": current.check_out,
            "rooms": allocated
                .iter()
                .map(|l| json!({
                    "room_type": l.room_type_code,
                    "room_id": l.assigned_room_id,
                }))
                .collect::<Vec<_>>(),
        }),
    )
    .await?;

    Ok(())
}

async fn check_out_in_tx(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    ctx: &TransitionCtx,
) -> DbResult<()> {
    let now = Utc::now();

    let current = get_by_id_on(&mut *conn, reservation_id).await?;
    lifecycle::transition(current.status, ReservationStatus::CheckedOut).map_err(DbError::from)?;

    let open_folio = folio::get_by_reservation_on(&mut *conn, reservation_id).await?;
    let balance = folio::balance_on(&mut *conn, &open_folio.id).await?;
    if !balance.is_zero() && !ctx.allow_outstanding_balance {
        return Err(CoreError::OutstandingBalance {
            folio_id: open_folio.id,
            balance_cents: balance.cents(),
        }
        .into());
    }

    folio::set_status_on(
        &mut *conn,
        &open_folio.id,
        lodge_core::FolioStatus::Closed,
        false,
        now,
    )
    .await?;
    update_status_on(
        &mut *conn,
        reservation_id,
        current.status,
        ReservationStatus::CheckedOut,
        now,
    )
    .await?;

    Ok(())
}

/// Returns the total amount refunded.
async fn cancel_in_tx(
    conn: &mut SqliteConnection,
    reservation_id: &str,
    ctx: &TransitionCtx,
) -> DbResult<Money> {
    let now = Utc::now();

    let current = get_by_id_on(&mut *conn, reservation_id).await?;
    lifecycle::transition(current.status, ReservationStatus::Cancelled).map_err(DbError::from)?;

    let mut refunded_total = Money::zero();

    // a folio exists only once the reservation was confirmed
    if current.status == ReservationStatus::Confirmed {
        let open_folio = folio::get_by_reservation_on(&mut *conn, reservation_id).await?;

        let decision = refund_decision_in_tx(&mut *conn, &current, now).await?;
        let payments = folio::payment_items_on(&mut *conn, &open_folio.id).await?;
        let total_paid: Money = payments.iter().map(|p| p.amount().abs()).sum();
        let mut remaining = decision.refundable(total_paid);

        // oldest payment first, each capped by its own refund headroom
        for payment in &payments {
            if remaining.is_zero() {
                break;
            }
            let already = folio::refunded_against_on(&mut *conn, &payment.id).await?;
            let headroom = payment.amount().abs() - already;
            let amount = headroom.min(remaining);
            if !amount.is_positive() {
                continue;
            }

            let item = folio::post_on(
                &mut *conn,
                &open_folio.id,
                FolioItemKind::Refund,
                "Cancellation refund",
                amount,
                &ctx.actor,
                now,
            )
            .await?;
            folio::insert_refund_on(
                &mut *conn,
                &Refund {
                    id: Uuid::new_v4().to_string(),
                    payment_item_id: payment.id.clone(),
                    folio_item_id: item.id.clone(),
                    amount_cents: amount.cents(),
                    reason: Some("cancellation".to_string()),
                    approved_by: ctx.actor.actor_id.clone(),
                    created_at: now,
                },
            )
            .await?;

            remaining -= amount;
            refunded_total += amount;
        }

        // reservation and folio are soft-deleted together, only here
        folio::set_status_on(
            &mut *conn,
            &open_folio.id,
            lodge_core::FolioStatus::Cancelled,
            true,
            now,
        )
        .await?;
    }

    update_status_on(
        &mut *conn,
        reservation_id,
        current.status,
        ReservationStatus::Cancelled,
        now,
    )
    .await?;
    soft_delete_on(&mut *conn, reservation_id, now).await?;

    outbox::queue_on(
        &mut *conn,
        KIND_BOOKING_CANCELLED,
        reservation_id,
        &json!({
            "reservation_id": reservation_id,
            "property_id": current.property_id,
            "guest_id": current.guest_id,
            "refunded_cents": refunded_total.cents(),
        }),
    )
    .await?;

    Ok(refunded_total)
}

/// The reservation's refund fraction: evaluated per room line's rate
/// plan, taking the least generous outcome across lines. A refundable
/// plan with no policy attached refunds in full; a non-refundable plan
/// refunds nothing regardless of notice.
async fn refund_decision_in_tx(
    conn: &mut SqliteConnection,
    current: &Reservation,
    now: chrono::DateTime<Utc>,
) -> DbResult<policy::RefundDecision> {
    let lines = reservation::rooms_on(&mut *conn, &current.id).await?;

    let mut decision: Option<policy::RefundDecision> = None;
    for line in &lines {
        let plan = rate_plan_on(&mut *conn, &line.rate_plan_id).await?;
        let tiers = match &plan.cancellation_policy_id {
            Some(policy_id) => refund_tiers_on(&mut *conn, policy_id).await?,
            // refundable plan with no policy: unrestricted refund
            None => vec![lodge_core::RefundTier {
                id: String::new(),
                cancellation_policy_id: String::new(),
                min_days_before: i64::MIN,
                refund_bps: 10000,
            }],
        };
        let line_decision = policy::evaluate_for_plan(&plan, &tiers, now, current.check_in);
        decision = Some(match decision {
            Some(existing) if existing.refund_bps <= line_decision.refund_bps => existing,
            _ => line_decision,
        });
    }

    Ok(decision.unwrap_or(policy::RefundDecision {
        refund_bps: 0,
        notice_days: 0,
    }))
}

// =============================================================================
// Integration Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, NaiveDate};
    use lodge_core::{
        ledger, CancellationPolicy, Property, RatePlan, RatePlanPrice, RefundTier, Room,
        RoomRequest, RoomType, TaxFee,
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("lodge_db=debug")
            .try_init();
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn actor() -> ActorContext {
        ActorContext::new("mgr-1")
    }

    fn ctx() -> TransitionCtx {
        TransitionCtx::new(actor())
    }

    struct Fixture {
        db: Database,
        property_id: String,
        double_type: String,
        room_101: String,
        room_102: String,
        bar_plan: String,
        nonref_plan: String,
    }

    /// Property "P1" with room type DOUBLE (rooms 101, 102), a
    /// refundable BAR plan (policy: 7 days → 100%, 3 days → 50%,
    /// base 120.00, override 150.00 on 2024-06-01) and a NONREF plan
    /// (base 100.00), plus a 10% City Tax on room charges.
    async fn seed(db: &Database) -> Fixture {
        let now = Utc::now();
        let stamp = AuditStamp::new(now);
        let reference = db.reference();

        let property = Property {
            id: Uuid::new_v4().to_string(),
            name: "P1".into(),
            timezone: "UTC".into(),
            currency: "USD".into(),
            stamp,
        };
        reference.insert_property(&property).await.unwrap();

        let double_type = RoomType {
            id: Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            code: "DOUBLE".into(),
            name: "Double Room".into(),
            max_adults: 2,
            max_children: 1,
            max_occupancy: 3,
            description: None,
            stamp,
        };
        reference.insert_room_type(&double_type).await.unwrap();

        let mut room_ids = Vec::new();
        for number in ["101", "102"] {
            let room = Room {
                id: Uuid::new_v4().to_string(),
                property_id: property.id.clone(),
                room_type_id: double_type.id.clone(),
                room_number: number.into(),
                is_active: true,
                stamp,
            };
            reference.insert_room(&room).await.unwrap();
            room_ids.push(room.id);
        }

        let flexible = CancellationPolicy {
            id: Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            name: "Flexible".into(),
            stamp,
        };
        reference
            .insert_cancellation_policy(&flexible)
            .await
            .unwrap();
        for (min_days, bps) in [(7, 10000), (3, 5000)] {
            reference
                .insert_refund_tier(&RefundTier {
                    id: Uuid::new_v4().to_string(),
                    cancellation_policy_id: flexible.id.clone(),
                    min_days_before: min_days,
                    refund_bps: bps,
                })
                .await
                .unwrap();
        }

        let bar = RatePlan {
            id: Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            code: "BAR".into(),
            name: "Best Available Rate".into(),
            refundable: true,
            includes_breakfast: true,
            cancellation_policy_id: Some(flexible.id.clone()),
            stamp,
        };
        reference.insert_rate_plan(&bar).await.unwrap();

        let nonref = RatePlan {
            id: Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            code: "NONREF".into(),
            name: "Non-refundable".into(),
            refundable: false,
            includes_breakfast: false,
            cancellation_policy_id: Some(flexible.id.clone()),
            stamp,
        };
        reference.insert_rate_plan(&nonref).await.unwrap();

        for (plan_id, date, cents) in [
            (&bar.id, None, 12000),
            (&bar.id, Some("2024-06-01"), 15000),
            (&nonref.id, None, 10000),
        ] {
            reference
                .insert_rate_plan_price(&RatePlanPrice {
                    id: Uuid::new_v4().to_string(),
                    rate_plan_id: plan_id.to_string(),
                    room_type_id: double_type.id.clone(),
                    date: date.map(d),
                    price_cents: cents,
                    currency: "USD".into(),
                    stamp,
                })
                .await
                .unwrap();
        }

        reference
            .insert_tax_fee(&TaxFee {
                id: Uuid::new_v4().to_string(),
                property_id: property.id.clone(),
                name: "City Tax".into(),
                kind: TaxFeeKind::Percentage,
                value: 1000,
                currency: "USD".into(),
                applies_to: ChargeScope::RoomCharges,
                per_night: false,
                active: true,
                stamp,
            })
            .await
            .unwrap();

        Fixture {
            db: db.clone(),
            property_id: property.id,
            double_type: double_type.id,
            room_101: room_ids.remove(0),
            room_102: room_ids.remove(0),
            bar_plan: bar.id,
            nonref_plan: nonref.id,
        }
    }

    async fn fixture() -> Fixture {
        init_tracing();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(&db).await
    }

    fn draft_for(
        fx: &Fixture,
        plan_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        lines: usize,
    ) -> ReservationDraft {
        ReservationDraft {
            property_id: fx.property_id.clone(),
            guest_id: "guest-1".into(),
            check_in,
            check_out,
            rooms: (0..lines)
                .map(|_| RoomRequest {
                    room_type_id: fx.double_type.clone(),
                    rate_plan_id: plan_id.to_string(),
                    requested_room_id: None,
                    adults: 2,
                    children: 0,
                })
                .collect(),
        }
    }

    async fn confirmed_booking(
        fx: &Fixture,
        plan_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Reservation {
        let booking = fx.db.booking();
        let held = booking
            .create_reservation(&draft_for(fx, plan_id, check_in, check_out, 1))
            .await
            .unwrap();
        booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap()
    }

    fn future(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    #[tokio::test]
    async fn test_draft_validation() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let mut empty = draft_for(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03"), 0);
        empty.rooms.clear();
        let err = booking.create_reservation(&empty).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // inverted range
        let inverted = draft_for(&fx, &fx.bar_plan, d("2024-06-03"), d("2024-06-01"), 1);
        let err = booking.create_reservation(&inverted).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_confirm_books_room_and_opens_folio() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());

        // deterministic allocation: lowest room number first
        let aggregate = fx.db.reservations().aggregate(&confirmed.id).await.unwrap();
        assert_eq!(aggregate.rooms.len(), 1);
        assert_eq!(
            aggregate.rooms[0].room.assigned_room_id.as_deref(),
            Some(fx.room_101.as_str())
        );

        // override 150.00 on the first night, base 120.00 on the second
        let rates = &aggregate.rooms[0].night_rates;
        assert_eq!(rates.len(), 2);
        assert_eq!((rates[0].date, rates[0].price_cents), (d("2024-06-01"), 15000));
        assert_eq!((rates[1].date, rates[1].price_cents), (d("2024-06-02"), 12000));

        // folio: 270.00 room charge + 27.00 city tax
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].kind, FolioItemKind::RoomCharge);
        assert_eq!(view.items[0].amount_cents, 27000);
        assert_eq!(view.items[1].kind, FolioItemKind::Tax);
        assert_eq!(view.items[1].amount_cents, 2700);
        assert_eq!(view.balance.cents(), 29700);

        // one of two rooms consumed on both nights
        let range = StayRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        let days = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert_eq!(days.len(), 2);
        for day in &days {
            assert_eq!(day.total_rooms, 2);
            assert_eq!(day.reserved, 1);
            assert_eq!(day.available, 1);
        }

        // confirmation notification queued in the same transaction
        let pending = fx.db.outbox().get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, KIND_BOOKING_CONFIRMED);
        assert_eq!(pending[0].reservation_id, confirmed.id);
    }

    #[tokio::test]
    async fn test_second_booking_takes_next_room() {
        let fx = fixture().await;

        let first = confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        let second = confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;

        let first_room = fx.db.reservations().aggregate(&first.id).await.unwrap().rooms[0]
            .room
            .assigned_room_id
            .clone();
        let second_room = fx.db.reservations().aggregate(&second.id).await.unwrap().rooms[0]
            .room
            .assigned_room_id
            .clone();
        assert_eq!(first_room.as_deref(), Some(fx.room_101.as_str()));
        assert_eq!(second_room.as_deref(), Some(fx.room_102.as_str()));

        let range = StayRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        let days = fx
            .db
            .booking()
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.available == 0));
    }

    #[tokio::test]
    async fn test_overbooking_rolls_back_the_whole_booking() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        // A takes one of the two doubles
        let kept = confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;

        // B wants two doubles on the same nights: only one is free, so
        // the entire booking must fail with nothing committed
        let held = booking
            .create_reservation(&draft_for(
                &fx,
                &fx.bar_plan,
                d("2024-06-01"),
                d("2024-06-03"),
                2,
            ))
            .await
            .unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientAvailability {
                room_type_code,
                date,
                requested,
                available,
            }) => {
                assert_eq!(room_type_code, "DOUBLE");
                assert_eq!(date, d("2024-06-01"));
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientAvailability, got {other:?}"),
        }

        // B: still HOLD, no rooms bound, no folio
        let aggregate = fx.db.reservations().aggregate(&held.id).await.unwrap();
        assert_eq!(aggregate.reservation.status, ReservationStatus::Hold);
        assert!(aggregate
            .rooms
            .iter()
            .all(|line| line.room.assigned_room_id.is_none()));
        assert!(matches!(
            booking.get_folio(&held.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));

        // A untouched
        let range = StayRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        let days = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.reserved == 1));
        let kept_now = fx.db.reservations().get_by_id(&kept.id).await.unwrap();
        assert_eq!(kept_now.status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_back_to_back_stays_share_a_room() {
        let fx = fixture().await;

        // both rooms for [01, 03), then both rooms for [03, 05):
        // check-out day is free for the next arrival
        for (check_in, check_out) in [("2024-06-01", "2024-06-03"), ("2024-06-03", "2024-06-05")] {
            let booking = fx.db.booking();
            let held = booking
                .create_reservation(&draft_for(&fx, &fx.bar_plan, d(check_in), d(check_out), 2))
                .await
                .unwrap();
            booking
                .transition(&held.id, ReservationStatus::Confirmed, &ctx())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let mut draft = draft_for(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03"), 1);
        draft.rooms[0].adults = 3; // DOUBLE takes 2 adults

        let held = booking.create_reservation(&draft).await.unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CapacityExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_requested_room_is_honoured_and_verified() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let mut draft = draft_for(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03"), 1);
        draft.rooms[0].requested_room_id = Some(fx.room_102.clone());
        let held = booking.create_reservation(&draft).await.unwrap();
        let confirmed = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap();

        let aggregate = fx.db.reservations().aggregate(&confirmed.id).await.unwrap();
        assert_eq!(
            aggregate.rooms[0].room.assigned_room_id.as_deref(),
            Some(fx.room_102.as_str())
        );

        // the same specific room on overlapping nights must be refused
        let mut rival = draft_for(&fx, &fx.bar_plan, d("2024-06-02"), d("2024-06-04"), 1);
        rival.rooms[0].requested_room_id = Some(fx.room_102.clone());
        let held = booking.create_reservation(&rival).await.unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::InsufficientAvailability { date, .. }) => {
                assert_eq!(date, d("2024-06-02"));
            }
            other => panic!("expected InsufficientAvailability, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inactive_requested_room_is_rejected() {
        let fx = fixture().await;
        let booking = fx.db.booking();
        fx.db
            .reference()
            .set_room_active(&fx.room_102, false)
            .await
            .unwrap();

        let mut draft = draft_for(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03"), 1);
        draft.rooms[0].requested_room_id = Some(fx.room_102.clone());
        let held = booking.create_reservation(&draft).await.unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_pricing_unavailable_aborts_confirmation() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        // a plan with no price rows at all
        let bare = RatePlan {
            id: Uuid::new_v4().to_string(),
            property_id: fx.property_id.clone(),
            code: "BARE".into(),
            name: "Unpriced".into(),
            refundable: true,
            includes_breakfast: false,
            cancellation_policy_id: None,
            stamp: AuditStamp::new(Utc::now()),
        };
        fx.db.reference().insert_rate_plan(&bare).await.unwrap();

        let held = booking
            .create_reservation(&draft_for(&fx, &bare.id, d("2024-06-01"), d("2024-06-03"), 1))
            .await
            .unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::PricingUnavailable { date, .. }) => {
                assert_eq!(date, d("2024-06-01"));
            }
            other => panic!("expected PricingUnavailable, got {other:?}"),
        }

        // nothing committed: rooms stay free
        let range = StayRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        let days = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.reserved == 0));
    }

    #[tokio::test]
    async fn test_cancellation_refunds_and_releases_inventory() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        // 30 days of notice → the 7-day tier → full refund
        let check_in = future(30);
        let check_out = future(32);
        let confirmed = confirmed_booking(&fx, &fx.bar_plan, check_in, check_out).await;

        // settle the folio: 2 × 120.00 + 10% tax = 264.00
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        assert_eq!(view.balance.cents(), 26400);
        fx.db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Payment,
                "Card payment",
                Money::from_cents(26400),
                &actor(),
            )
            .await
            .unwrap();

        booking
            .transition(&confirmed.id, ReservationStatus::Cancelled, &ctx())
            .await
            .unwrap();

        // reservation and folio tombstoned together
        let cancelled = fx.db.reservations().get_by_id(&confirmed.id).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.stamp.is_deleted());
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        assert_eq!(view.folio.status, lodge_core::FolioStatus::Cancelled);
        assert!(view.folio.stamp.is_deleted());

        // full refund posted against the payment
        let refund_items: Vec<_> = view
            .items
            .iter()
            .filter(|i| i.kind == FolioItemKind::Refund)
            .collect();
        assert_eq!(refund_items.len(), 1);
        assert_eq!(refund_items[0].amount_cents, -26400);

        // inventory immediately available again
        let range = StayRange::new(check_in, check_out).unwrap();
        let days = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.reserved == 0 && day.available == 2));

        // cancellation notification joined the confirmation one
        let pending = fx.db.outbox().get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].kind, KIND_BOOKING_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancellation_inside_half_refund_window() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        // 5 days of notice → the 3-day tier → 50%
        let confirmed = confirmed_booking(&fx, &fx.bar_plan, future(5), future(7)).await;
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        fx.db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Payment,
                "Card payment",
                view.balance,
                &actor(),
            )
            .await
            .unwrap();

        booking
            .transition(&confirmed.id, ReservationStatus::Cancelled, &ctx())
            .await
            .unwrap();

        let view = booking.get_folio(&confirmed.id).await.unwrap();
        let refunded: i64 = view
            .items
            .iter()
            .filter(|i| i.kind == FolioItemKind::Refund)
            .map(|i| -i.amount_cents)
            .sum();
        assert_eq!(refunded, 13200); // half of 264.00
    }

    #[tokio::test]
    async fn test_non_refundable_plan_refunds_nothing() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed = confirmed_booking(&fx, &fx.nonref_plan, future(30), future(32)).await;
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        fx.db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Payment,
                "Card payment",
                view.balance,
                &actor(),
            )
            .await
            .unwrap();

        booking
            .transition(&confirmed.id, ReservationStatus::Cancelled, &ctx())
            .await
            .unwrap();

        let view = booking.get_folio(&confirmed.id).await.unwrap();
        assert!(view
            .items
            .iter()
            .all(|i| i.kind != FolioItemKind::Refund));
    }

    #[tokio::test]
    async fn test_cancelling_a_hold_needs_no_folio() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let held = booking
            .create_reservation(&draft_for(
                &fx,
                &fx.bar_plan,
                d("2024-06-01"),
                d("2024-06-03"),
                1,
            ))
            .await
            .unwrap();
        let cancelled = booking
            .transition(&held.id, ReservationStatus::Cancelled, &ctx())
            .await
            .unwrap();

        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(matches!(
            booking.get_folio(&held.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_refund_bound_is_enforced() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        let payment = fx
            .db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Payment,
                "Card payment",
                Money::from_cents(10000),
                &actor(),
            )
            .await
            .unwrap();

        booking
            .refund(&payment.id, Money::from_cents(6000), Some("goodwill"), &actor())
            .await
            .unwrap();

        // only 40.00 of headroom left - the excess must fail whole
        let err = booking
            .refund(&payment.id, Money::from_cents(5000), None, &actor())
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::RefundExceedsPayment {
                remaining_cents, ..
            }) => assert_eq!(remaining_cents, 4000),
            other => panic!("expected RefundExceedsPayment, got {other:?}"),
        }

        booking
            .refund(&payment.id, Money::from_cents(4000), None, &actor())
            .await
            .unwrap();
        let err = booking
            .refund(&payment.id, Money::from_cents(1), None, &actor())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::RefundExceedsPayment { .. })
        ));
    }

    #[tokio::test]
    async fn test_void_excludes_from_balance_but_keeps_audit_trail() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        let before = view.balance;

        let minibar = fx
            .db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Adjustment,
                "Minibar",
                Money::from_cents(1500),
                &actor(),
            )
            .await
            .unwrap();
        assert_eq!(
            fx.db.folios().balance(&view.folio.id).await.unwrap(),
            before + Money::from_cents(1500)
        );

        fx.db.folios().void(&minibar.id, &actor()).await.unwrap();
        assert_eq!(fx.db.folios().balance(&view.folio.id).await.unwrap(), before);

        // voided items stay visible to the audit read
        let audit = fx
            .db
            .folios()
            .items_including_voided(&view.folio.id)
            .await
            .unwrap();
        assert!(audit.iter().any(|i| i.id == minibar.id && i.is_voided()));
        let visible = fx.db.folios().items(&view.folio.id).await.unwrap();
        assert!(visible.iter().all(|i| i.id != minibar.id));

        // voiding twice is an error, not a silent no-op
        assert!(fx.db.folios().void(&minibar.id, &actor()).await.is_err());
    }

    #[tokio::test]
    async fn test_balance_is_recomputed_not_cached() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        let view = booking.get_folio(&confirmed.id).await.unwrap();

        for (kind, cents) in [
            (FolioItemKind::Payment, 20000),
            (FolioItemKind::Adjustment, 1500),
            (FolioItemKind::Payment, 11200),
        ] {
            fx.db
                .folios()
                .post(
                    &view.folio.id,
                    kind,
                    "posting",
                    Money::from_cents(cents),
                    &actor(),
                )
                .await
                .unwrap();
        }

        // SQL SUM and the in-memory fold over the full history agree
        let items = fx.db.folios().items(&view.folio.id).await.unwrap();
        let sql = fx.db.folios().balance(&view.folio.id).await.unwrap();
        assert_eq!(sql, ledger::balance(&items));
        assert_eq!(sql.cents(), 29700 - 20000 + 1500 - 11200);

        // positions strictly increase in posting order
        for pair in items.windows(2) {
            assert!(pair[0].position < pair[1].position);
        }
    }

    #[tokio::test]
    async fn test_checkout_requires_settled_folio() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        booking
            .transition(&confirmed.id, ReservationStatus::CheckedIn, &ctx())
            .await
            .unwrap();

        let err = booking
            .transition(&confirmed.id, ReservationStatus::CheckedOut, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OutstandingBalance { .. })
        ));

        let view = booking.get_folio(&confirmed.id).await.unwrap();
        fx.db
            .folios()
            .post(
                &view.folio.id,
                FolioItemKind::Payment,
                "Card payment",
                view.balance,
                &actor(),
            )
            .await
            .unwrap();

        let checked_out = booking
            .transition(&confirmed.id, ReservationStatus::CheckedOut, &ctx())
            .await
            .unwrap();
        assert_eq!(checked_out.status, ReservationStatus::CheckedOut);
        let view = booking.get_folio(&confirmed.id).await.unwrap();
        assert_eq!(view.folio.status, lodge_core::FolioStatus::Closed);
    }

    #[tokio::test]
    async fn test_checkout_override_flag_permits_open_balance() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        booking
            .transition(&confirmed.id, ReservationStatus::CheckedIn, &ctx())
            .await
            .unwrap();

        let checked_out = booking
            .transition(
                &confirmed.id,
                ReservationStatus::CheckedOut,
                &ctx().allow_outstanding_balance(),
            )
            .await
            .unwrap();
        assert_eq!(checked_out.status, ReservationStatus::CheckedOut);
    }

    #[tokio::test]
    async fn test_illegal_transitions_fail_loudly() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let held = booking
            .create_reservation(&draft_for(
                &fx,
                &fx.bar_plan,
                d("2024-06-01"),
                d("2024-06-03"),
                1,
            ))
            .await
            .unwrap();

        // HOLD cannot check in or out
        for target in [ReservationStatus::CheckedIn, ReservationStatus::CheckedOut] {
            let err = booking
                .transition(&held.id, target, &ctx())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DbError::Domain(CoreError::InvalidStateTransition { .. })
            ));
        }

        // double confirmation
        booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Confirmed, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidStateTransition { .. })
        ));

        // cancellation after checkout is rejected
        booking
            .transition(&held.id, ReservationStatus::CheckedIn, &ctx())
            .await
            .unwrap();
        booking
            .transition(
                &held.id,
                ReservationStatus::CheckedOut,
                &ctx().allow_outstanding_balance(),
            )
            .await
            .unwrap();
        let err = booking
            .transition(&held.id, ReservationStatus::Cancelled, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_soft_deleted_room_leaves_inventory_but_keeps_history() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        let confirmed =
            confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;

        // tombstone the unbooked room: inventory shrinks to 1
        fx.db.reference().soft_delete_room(&fx.room_102).await.unwrap();

        let range = StayRange::new(d("2024-06-10"), d("2024-06-12")).unwrap();
        let days = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.total_rooms == 1));

        // the historical reservation still references its room
        let aggregate = fx.db.reservations().aggregate(&confirmed.id).await.unwrap();
        assert!(aggregate.rooms[0].room.assigned_room_id.is_some());

        // deleting twice is an error
        assert!(fx.db.reference().soft_delete_room(&fx.room_102).await.is_err());
    }

    #[tokio::test]
    async fn test_negative_availability_surfaces_invariant_violation() {
        let fx = fixture().await;
        let booking = fx.db.booking();

        confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;
        confirmed_booking(&fx, &fx.bar_plan, d("2024-06-01"), d("2024-06-03")).await;

        // pulling a booked room out of service makes committed state
        // inconsistent: reserved 2 > total 1 - surfaced, never clamped
        fx.db
            .reference()
            .set_room_active(&fx.room_102, false)
            .await
            .unwrap();

        let range = StayRange::new(d("2024-06-01"), d("2024-06-03")).unwrap();
        let err = booking
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InventoryInvariantViolation { .. })
        ));
    }

    /// N concurrent requests for 1 room each against K free rooms
    /// (N > K) must yield exactly K confirmations and N−K
    /// insufficient-availability failures, with zero overbooking.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocation_never_oversells() {
        init_tracing();
        let config = DbConfig::temp_file();
        let path = config.database_path.clone();
        let db = Database::new(config).await.unwrap();
        let fx = seed(&db).await;

        let check_in = future(60);
        let check_out = future(62);

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let fx_db = fx.db.clone();
            let draft = draft_for(&fx, &fx.bar_plan, check_in, check_out, 1);
            tasks.push(tokio::spawn(async move {
                let booking = fx_db.booking();
                let held = booking.create_reservation(&draft).await?;
                booking
                    .transition(&held.id, ReservationStatus::Confirmed, &ctx())
                    .await
            }));
        }

        let mut confirmed = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(reservation) => {
                    assert_eq!(reservation.status, ReservationStatus::Confirmed);
                    confirmed += 1;
                }
                Err(DbError::Domain(CoreError::InsufficientAvailability { .. })) => {
                    rejected += 1;
                }
                Err(other) => panic!("unexpected failure: {other:?}"),
            }
        }
        assert_eq!(confirmed, 2);
        assert_eq!(rejected, 2);

        // both rooms consumed, none oversold
        let range = StayRange::new(check_in, check_out).unwrap();
        let days = fx
            .db
            .booking()
            .check_availability(&fx.property_id, &fx.double_type, &range)
            .await
            .unwrap();
        assert!(days.iter().all(|day| day.reserved == 2 && day.available == 0));

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
