//! # Cancellation Policy Evaluation
//!
//! Decides the refundable fraction of payments when a reservation is
//! cancelled.
//!
//! ## Refund Tiers
//! ```text
//! Policy "Flexible 7/3":
//!   tier A: min_days_before = 7, refund_bps = 10000   (full refund)
//!   tier B: min_days_before = 3, refund_bps =  5000   (half refund)
//!
//! Cancel 9 days out  → tier A → 100%
//! Cancel 4 days out  → tier B →  50%
//! Cancel 1 day out   → no tier →   0%
//! ```
//!
//! Notice is measured in whole calendar days (UTC) between the
//! cancellation instant's date and check-in. The most generous matching
//! tier (largest `min_days_before` not exceeding the notice) wins.
//! Non-refundable rate plans bypass tiers entirely and refund nothing.

use chrono::{DateTime, NaiveDate, Utc};

use crate::money::Money;
use crate::types::{RatePlan, RefundTier};

/// The refundable fraction decided for a cancellation, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundDecision {
    pub refund_bps: i64,
    /// Days of notice the guest gave.
    pub notice_days: i64,
}

impl RefundDecision {
    /// Applies the decided fraction to an amount (half-up rounding).
    pub fn refundable(&self, paid: Money) -> Money {
        paid.apply_bps_half_up(self.refund_bps as u32)
    }
}

/// Evaluates a policy's tiers for a cancellation happening at
/// `cancelled_at` against a stay starting on `check_in`.
///
/// `tiers` may arrive in any order; no matching tier (or a cancellation
/// after check-in) refunds nothing. Rate-plan refundability is enforced
/// in [`evaluate_for_plan`].
pub fn evaluate(
    tiers: &[RefundTier],
    cancelled_at: DateTime<Utc>,
    check_in: NaiveDate,
) -> RefundDecision {
    let notice_days = (check_in - cancelled_at.date_naive()).num_days();

    let refund_bps = tiers
        .iter()
        .filter(|t| t.min_days_before <= notice_days)
        .max_by_key(|t| t.min_days_before)
        .map(|t| t.refund_bps.clamp(0, 10000))
        .unwrap_or(0);

    RefundDecision {
        refund_bps,
        notice_days,
    }
}

/// Like [`evaluate`], but a non-refundable rate plan short-circuits to
/// a zero refund regardless of notice.
pub fn evaluate_for_plan(
    plan: &RatePlan,
    tiers: &[RefundTier],
    cancelled_at: DateTime<Utc>,
    check_in: NaiveDate,
) -> RefundDecision {
    if !plan.refundable {
        let notice_days = (check_in - cancelled_at.date_naive()).num_days();
        return RefundDecision {
            refund_bps: 0,
            notice_days,
        };
    }
    evaluate(tiers, cancelled_at, check_in)
}

// =============================================================================
// Unit Tests
// =============================================================================
