//! # Domain Types
//!
//! Core domain types for the reservation availability & ledger engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  Property ──owns──► RoomType ──has──► Room                          │
//! │      │                                                              │
//! │      ├──owns──► RatePlan ──prices──► RatePlanPrice (dated/base)     │
//! │      ├──owns──► TaxFee (percentage/flat, applies-to scope)          │
//! │      └──owns──► CancellationPolicy ──► RefundTier                   │
//! │                                                                     │
//! │  Reservation ──► ReservationRoom ──► ReservationNightRate           │
//! │      │                                                              │
//! │      └──1:1──► Folio ──► FolioItem ◄──references── Refund           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business key: (code, room_number, name) - human-readable, unique
//!   per property
//!
//! ## Soft Delete
//! Every persisted entity embeds an [`AuditStamp`]; deletion sets
//! `deleted_at` and nothing is ever physically removed while historical
//! reservations reference it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::money::Money;
use crate::stay::StayRange;

// =============================================================================
// Audit Stamp
// =============================================================================

/// Created/updated/deleted timestamps embedded in every persisted entity.
///
/// A composable value, not a base-class hierarchy: entities embed it as a
/// field and the database layer flattens it into the row's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone. `Some` means soft-deleted; the row stays addressable
    /// for ledger reconstruction and historical reservations.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AuditStamp {
    /// Fresh stamp for a newly created entity.
    pub fn new(now: DateTime<Utc>) -> Self {
        AuditStamp {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Marks the entity as modified.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Tombstones the entity. Idempotent.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.deleted_at.get_or_insert(now);
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// Reference Data
// =============================================================================

/// A property (hotel). Scopes every other entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Property {
    pub id: String,
    pub name: String,
    /// IANA timezone name, e.g. "Europe/Lisbon". Interpreted by the
    /// surrounding system; the engine measures cancellation notice in
    /// UTC calendar days.
    pub timezone: String,
    /// ISO 4217 currency code all rates and folios of this property use.
    pub currency: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// A bookable category of rooms within a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RoomType {
    pub id: String,
    pub property_id: String,
    /// Business code, unique per property (e.g. "DOUBLE").
    pub code: String,
    pub name: String,
    pub max_adults: i64,
    pub max_children: i64,
    /// Total guests allowed regardless of the adult/child split.
    pub max_occupancy: i64,
    pub description: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

impl RoomType {
    /// Whether the requested guest counts fit this room type.
    pub fn fits(&self, adults: i64, children: i64) -> bool {
        adults <= self.max_adults
            && children <= self.max_children
            && adults + children <= self.max_occupancy
    }
}

/// A physical room. The atomic unit of inventory is this room on one
/// calendar night.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Room {
    pub id: String,
    pub property_id: String,
    pub room_type_id: String,
    /// Unique per property. Allocation picks the lowest free number so
    /// assignment is reproducible.
    pub room_number: String,
    /// Inactive rooms (renovation, damage) never count toward inventory.
    pub is_active: bool,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// A pricing/policy bundle selectable per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RatePlan {
    pub id: String,
    pub property_id: String,
    /// Business code, unique per property (e.g. "BAR", "NONREF").
    pub code: String,
    pub name: String,
    /// Non-refundable plans never produce cancellation refunds.
    pub refundable: bool,
    pub includes_breakfast: bool,
    pub cancellation_policy_id: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// A nightly price for (rate plan, room type, date).
///
/// `date = None` is the plan's undated base price for the room type -
/// the fallback when no dated override exists. At most one non-deleted
/// row per key triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RatePlanPrice {
    pub id: String,
    pub rate_plan_id: String,
    pub room_type_id: String,
    pub date: Option<NaiveDate>,
    pub price_cents: i64,
    pub currency: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

impl RatePlanPrice {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// How a tax/fee value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaxFeeKind {
    /// `value` is basis points applied to the subtotal (1000 = 10%).
    Percentage,
    /// `value` is an absolute amount in minor units.
    Flat,
}

/// Which charges a tax/fee is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ChargeScope {
    /// Room charges only.
    RoomCharges,
    /// Wildcard: applies to every charged scope.
    All,
}

impl ChargeScope {
    /// Whether a fee with this applies-to scope participates when
    /// charging `charged`.
    #[inline]
    pub fn matches(&self, charged: ChargeScope) -> bool {
        matches!(self, ChargeScope::All) || *self == charged
    }
}

/// A property-level tax or fee definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TaxFee {
    pub id: String,
    pub property_id: String,
    /// Unique per property; also the stable presentation sort key.
    pub name: String,
    pub kind: TaxFeeKind,
    /// Basis points for [`TaxFeeKind::Percentage`], minor units for
    /// [`TaxFeeKind::Flat`].
    pub value: i64,
    pub currency: String,
    pub applies_to: ChargeScope,
    /// FLAT only: charge once per night instead of once per stay.
    pub per_night: bool,
    /// Only active rows participate in pricing.
    pub active: bool,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// A named cancellation policy. Refund rules live in ordered
/// [`RefundTier`] rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CancellationPolicy {
    pub id: String,
    pub property_id: String,
    pub name: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// One refund eligibility window of a cancellation policy.
///
/// Cancelling at least `min_days_before` calendar days before check-in
/// refunds `refund_bps`/10000 of payments taken. The most generous
/// matching tier wins; no matching tier means no refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RefundTier {
    pub id: String,
    pub cancellation_policy_id: String,
    pub min_days_before: i64,
    pub refund_bps: i64,
}

// =============================================================================
// Reservation
// =============================================================================

/// Reservation lifecycle status.
///
/// ```text
/// HOLD ──► CONFIRMED ──► CHECKED_IN ──► CHECKED_OUT
///   │          │
///   └──────────┴──────► CANCELLED
/// ```
///
/// Confirmation is the point of inventory consumption: HOLD never counts
/// toward reserved room-nights, CANCELLED releases them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Hold,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    /// Whether reservations in this status consume inventory.
    ///
    /// CHECKED_OUT still counts: the stay's date window governs which
    /// nights it covers, and past nights never collide with new stays.
    #[inline]
    pub fn consumes_inventory(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed
                | ReservationStatus::CheckedIn
                | ReservationStatus::CheckedOut
        )
    }
}

/// A guest's booking for one property over one stay range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub property_id: String,
    /// Opaque guest identity; resolution is external.
    pub guest_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: ReservationStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

impl Reservation {
    /// The stay interval. Stored rows always satisfy the range invariant,
    /// so this only fails on corrupted data.
    pub fn stay(&self) -> CoreResult<StayRange> {
        StayRange::new(self.check_in, self.check_out)
    }
}

/// One room line of a reservation.
///
/// `assigned_room_id` is `None` while only a room-type hold exists and
/// becomes `Some` once the allocator commits a specific room for every
/// night of the stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReservationRoom {
    pub id: String,
    pub reservation_id: String,
    pub room_type_id: String,
    pub rate_plan_id: String,
    /// A specific room the guest asked for at booking time, remembered
    /// until the allocator honours (or rejects) it at confirmation.
    pub requested_room_id: Option<String>,
    pub assigned_room_id: Option<String>,
    pub adults: i64,
    pub children: i64,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// The priced rate for one room line on one night, written at
/// confirmation. Snapshot pattern: later rate-plan edits never change a
/// committed reservation's price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReservationNightRate {
    pub id: String,
    pub reservation_room_id: String,
    pub date: NaiveDate,
    pub price_cents: i64,
    pub currency: String,
}

impl ReservationNightRate {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Folio
// =============================================================================

/// Folio lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FolioStatus {
    /// Accepting postings.
    Open,
    /// Settled at checkout.
    Closed,
    /// Reservation was cancelled; folio soft-deleted with it.
    Cancelled,
}

/// Kind of a folio ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FolioItemKind {
    RoomCharge,
    Tax,
    Fee,
    Payment,
    Refund,
    Adjustment,
}

impl FolioItemKind {
    /// Whether amounts of this kind decrease the balance.
    ///
    /// Charges post positive; payments and refunds post negative.
    /// Adjustments carry whichever sign the adjuster intends.
    #[inline]
    pub fn is_credit(&self) -> bool {
        matches!(self, FolioItemKind::Payment | FolioItemKind::Refund)
    }
}

/// The guest's running bill for a reservation. One-to-one with the
/// reservation, created at confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Folio {
    pub id: String,
    pub reservation_id: String,
    pub status: FolioStatus,
    pub currency: String,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stamp: AuditStamp,
}

/// One posting on a folio.
///
/// Append-only: items are never reordered or mutated. Voiding sets
/// `voided_at` and keeps the row so the ledger stays reconstructable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FolioItem {
    pub id: String,
    pub folio_id: String,
    pub kind: FolioItemKind,
    pub description: String,
    /// Signed: charges positive, payments/refunds negative.
    pub amount_cents: i64,
    pub currency: String,
    /// Per-folio monotonically increasing sequence; the presentation
    /// order, immune to posted_at timestamp ties.
    pub position: i64,
    pub posted_at: DateTime<Utc>,
    /// Acting user, passed in explicitly by the caller.
    pub posted_by: String,
    pub voided_at: Option<DateTime<Utc>>,
}

impl FolioItem {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }
}

/// A refund issued against a PAYMENT folio item.
///
/// Invariant: `amount_cents` never exceeds the payment amount minus the
/// sum of prior non-voided refunds against the same payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Refund {
    pub id: String,
    /// The PAYMENT item being refunded.
    pub payment_item_id: String,
    /// The REFUND item this refund posted.
    pub folio_item_id: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub approved_by: String,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// An entry in the notification outbox queue.
///
/// Outbox pattern: the entry is inserted in the same transaction as the
/// state change it announces, and a background dispatcher owned by the
/// surrounding system delivers it. The engine never awaits delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NotificationOutboxEntry {
    pub id: String,
    /// "BOOKING_CONFIRMED" or "BOOKING_CANCELLED".
    pub kind: String,
    pub reservation_id: String,
    /// Full notification payload as JSON.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Booking Inputs
// =============================================================================

/// Explicit actor identity for mutating operations.
///
/// Passed into every core operation that needs to know who acted
/// (posting, voiding, approving refunds) - there is no ambient
/// current-user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
}

impl ActorContext {
    pub fn new(actor_id: impl Into<String>) -> Self {
        ActorContext {
            actor_id: actor_id.into(),
        }
    }
}

/// An incoming booking request, before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub property_id: String,
    pub guest_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: Vec<RoomRequest>,
}

/// One requested room line of a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRequest {
    pub room_type_id: String,
    pub rate_plan_id: String,
    /// A specific room the guest asked for, if any. Verified active,
    /// type-matching and free for every night; otherwise allocation
    /// picks the lowest free room number.
    pub requested_room_id: Option<String>,
    pub adults: i64,
    pub children: i64,
}

/// Per-date availability counts for one room type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub total_rooms: i64,
    pub reserved: i64,
    pub available: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
