//! # Error Types
//!
//! Domain-specific error types for lodge-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  lodge-core errors (this file)                                      │
//! │  ├── CoreError        - Booking/pricing/ledger rule violations      │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  lodge-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures, wraps CoreError           │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → caller               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (room type, date, amounts)
//! 3. Errors are enum variants, never String
//! 4. Nothing is swallowed: every variant propagates to the caller typed

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::ReservationStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations in the availability and ledger engine.
///
/// Each variant corresponds to one failure class of the booking flow and
/// carries enough context for the caller to act on it without parsing
/// message strings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Requested guest counts exceed the room type's capacity limits.
    #[error(
        "Capacity exceeded for room type {room_type_code}: \
         {adults} adults / {children} children against limits \
         {max_adults}/{max_children} (occupancy {max_occupancy})"
    )]
    CapacityExceeded {
        room_type_code: String,
        adults: i64,
        children: i64,
        max_adults: i64,
        max_children: i64,
        max_occupancy: i64,
    },

    /// Not enough free rooms of the type on a night of the stay.
    ///
    /// Names the first conflicting date; the whole booking has been
    /// rolled back when this surfaces - no partial reservation exists.
    #[error(
        "Insufficient availability for room type {room_type_code} on {date}: \
         requested {requested}, available {available}"
    )]
    InsufficientAvailability {
        room_type_code: String,
        date: NaiveDate,
        requested: i64,
        available: i64,
    },

    /// A rate, fee or folio amount is denominated in the wrong currency.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// No dated override and no base price exists for a night.
    #[error("No price available for rate plan {rate_plan_code} on {date}")]
    PricingUnavailable {
        rate_plan_code: String,
        date: NaiveDate,
    },

    /// The requested reservation status change is not in the state machine.
    ///
    /// Fatal to the calling operation, never silently ignored.
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// Refund would exceed what remains refundable on the payment.
    #[error(
        "Refund of {requested_cents} exceeds payment {payment_item_id}: \
         {remaining_cents} refundable"
    )]
    RefundExceedsPayment {
        payment_item_id: String,
        requested_cents: i64,
        remaining_cents: i64,
    },

    /// Checkout requires a zero folio balance unless the caller passes
    /// the explicit override flag.
    #[error("Folio {folio_id} has outstanding balance {balance_cents}")]
    OutstandingBalance {
        folio_id: String,
        balance_cents: i64,
    },

    /// Internal consistency failure: committed state violates an
    /// inventory invariant (e.g. reserved count above total rooms).
    ///
    /// Fatal - the triggering transaction must roll back; this is never
    /// clamped or recovered silently.
    #[error("Inventory invariant violation: {detail}")]
    InventoryInvariantViolation { detail: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Check-out must be strictly after check-in.
    #[error("check_out {check_out} must be after check_in {check_in}")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    /// A reservation draft must request at least one room.
    #[error("reservation must contain at least one room line")]
    EmptyReservation,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
