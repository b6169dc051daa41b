//! # Reservation Lifecycle
//!
//! The state machine governing a reservation from hold through checkout
//! or cancellation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  HOLD ────confirm────► CONFIRMED ──check_in──► CHECKED_IN           │
//! │    │                       │                        │               │
//! │    │                       │                    check_out           │
//! │    │                       │                        ▼               │
//! │    └───────cancel──────────┴──cancel──►        CHECKED_OUT          │
//! │                         CANCELLED                                   │
//! │                                                                     │
//! │  CHECKED_IN, CHECKED_OUT and CANCELLED are terminal with respect    │
//! │  to cancellation; CHECKED_OUT and CANCELLED are terminal outright.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is pure; the side effects of each transition (allocation,
//! folio creation, refunds, inventory release) are orchestrated by the
//! booking service in lodge-db. Illegal transitions are fatal to the
//! calling operation, never silently ignored.

use crate::error::{CoreError, CoreResult};
use crate::types::ReservationStatus;

/// Whether `from -> to` is a legal reservation transition.
pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    matches!(
        (from, to),
        (Hold, Confirmed)
            | (Confirmed, CheckedIn)
            | (CheckedIn, CheckedOut)
            | (Hold, Cancelled)
            | (Confirmed, Cancelled)
    )
}

/// Validates a transition, returning the target status or
/// [`CoreError::InvalidStateTransition`].
pub fn transition(
    from: ReservationStatus,
    to: ReservationStatus,
) -> CoreResult<ReservationStatus> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(CoreError::InvalidStateTransition { from, to })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
