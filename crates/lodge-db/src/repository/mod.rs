//! # Repository Module
//!
//! Database repository implementations for Lodge PMS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  BookingService                                                     │
//! │       │  db.reference().room_type(id)                               │
//! │       ▼                                                             │
//! │  Repository (holds SqlitePool, owns the SQL)                        │
//! │       ▼                                                             │
//! │  SQLite Database                                                    │
//! │                                                                     │
//! │  Aggregates come back fully materialized (a reservation with its   │
//! │  room lines and night rates, a folio with its items) so invariants │
//! │  are checkable without hidden lazy fetches.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods with an `_on` suffix take `&mut SqliteConnection` so the
//! booking service can compose them inside its one atomic confirmation
//! transaction; the plain variants acquire from the pool.
//!
//! ## Available Repositories
//!
//! - [`reference::ReferenceRepository`] - Read side for property-owned
//!   reference data, plus seed inserts
//! - [`reservation::ReservationRepository`] - Reservation aggregates
//! - [`folio::FolioRepository`] - The folio ledger
//! - [`outbox::NotificationOutboxRepository`] - Notification queue

pub mod folio;
pub mod outbox;
pub mod reference;
pub mod reservation;
