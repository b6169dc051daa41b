//! # Stay Range Module
//!
//! Calendar date ranges for reservations.
//!
//! ## The Room-Night
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  check_in: 2024-06-01   check_out: 2024-06-03                       │
//! │                                                                     │
//! │  nights:   [2024-06-01, 2024-06-02]      ← check-out EXCLUSIVE      │
//! │                                                                     │
//! │  A guest arriving on the 1st and leaving on the 3rd occupies the   │
//! │  room for exactly 2 room-nights. The night of the 3rd is free for  │
//! │  the next arrival.                                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every availability count, price lookup and occupancy check in the
//! engine iterates nights through this type, so the exclusive-check-out
//! convention lives in exactly one place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreResult, ValidationError};

/// A half-open stay interval: `[check_in, check_out)`.
///
/// Invariant: `check_out > check_in` (at least one night). Construction
/// through [`StayRange::new`] is the only way to obtain one, so holders
/// never need to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    /// Creates a stay range, enforcing `check_out > check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> CoreResult<Self> {
        if check_out <= check_in {
            return Err(ValidationError::InvalidDateRange {
                check_in,
                check_out,
            }
            .into());
        }
        Ok(StayRange {
            check_in,
            check_out,
        })
    }

    #[inline]
    pub const fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    #[inline]
    pub const fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights (check-out exclusive). Always >= 1.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Iterates the occupied nights in calendar order.
    ///
    /// Yields `check_in, check_in+1, ..., check_out-1` - exactly
    /// [`nights`](Self::nights) dates, strictly increasing.
    pub fn iter_nights(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.check_in;
        let count = self.nights();
        (0..count).map(move |offset| start + chrono::Duration::days(offset))
    }

    /// Whether the stay occupies the room on `date`.
    ///
    /// `check_in <= date < check_out` - a guest checking out on `date`
    /// does not occupy that night.
    #[inline]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Whether two stays compete for the same room on any night.
    ///
    /// Half-open intervals: back-to-back stays (A checks out the day B
    /// checks in) do NOT overlap.
    #[inline]
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
