//! # lodge-core: Pure Business Logic for Lodge PMS
//!
//! This crate is the **heart** of the reservation availability & ledger
//! engine. It contains all business logic as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Lodge PMS Architecture                         │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │             Surrounding System (HTTP, CRUD, auth)             │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │               ★ lodge-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │  ┌────────┐ ┌───────┐ ┌─────────┐ ┌───────┐ ┌──────────────┐ │ │
//! │  │  │ money  │ │ stay  │ │ pricing │ │ taxes │ │ policy       │ │ │
//! │  │  └────────┘ └───────┘ └─────────┘ └───────┘ └──────────────┘ │ │
//! │  │  ┌────────┐ ┌───────────┐ ┌────────┐ ┌────────────────────┐ │ │
//! │  │  │ types  │ │ lifecycle │ │ ledger │ │ validation, error  │ │ │
//! │  │  └────────┘ └───────────┘ └────────┘ └────────────────────┘ │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │                  lodge-db (Database Layer)                    │ │
//! │  │     SQLite queries, availability index, room allocator        │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Property, Reservation, Folio, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`stay`] - Calendar stay ranges, the check-out-exclusive night model
//! - [`pricing`] - Rate plan pricer (dated overrides over a base rate)
//! - [`taxes`] - Tax/fee calculator (percentage and flat, scoped)
//! - [`policy`] - Cancellation policy refund-tier evaluation
//! - [`lifecycle`] - Reservation status state machine
//! - [`ledger`] - Folio balance and refund-bound arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; callers pass `now` in
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are in minor units (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod policy;
pub mod pricing;
pub mod stay;
pub mod taxes;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use stay::StayRange;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum room lines in a single booking request.
///
/// Group bookings above this go through a block-booking flow in the
/// surrounding system, keeping one allocation transaction bounded.
pub const MAX_ROOMS_PER_BOOKING: usize = 20;

/// Maximum stay length in nights a single reservation may span.
pub const MAX_STAY_NIGHTS: i64 = 365;
