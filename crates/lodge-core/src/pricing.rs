//! # Rate Plan Pricer
//!
//! Resolves the nightly price for (rate plan, room type, date).
//!
//! ## Resolution Order
//! ```text
//! for each night of the stay (check-out exclusive):
//!     1. dated override row for (plan, room type, night)   ← wins
//!     2. undated base price row for (plan, room type)      ← fallback
//!     3. neither exists → PricingUnavailable naming the night
//! ```
//!
//! Every resolved price must be denominated in the property's currency;
//! a mismatched override fails the whole stay with `CurrencyMismatch`.
//! The output is one rate per night, in calendar order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::stay::StayRange;
use crate::types::{RatePlan, RatePlanPrice};

/// The resolved price of one night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlyRate {
    pub date: NaiveDate,
    pub price: Money,
    pub currency: String,
}

/// Prices a stay for one room line.
///
/// `prices` holds the non-deleted RatePlanPrice rows for the
/// (plan, room type) pair - dated overrides plus at most one undated
/// base row, as loaded by the reference repository.
///
/// Returns exactly `stay.nights()` rates, strictly increasing by date.
pub fn price_stay(
    plan: &RatePlan,
    property_currency: &str,
    prices: &[RatePlanPrice],
    stay: &StayRange,
) -> CoreResult<Vec<NightlyRate>> {
    let mut base: Option<&RatePlanPrice> = None;
    let mut overrides: HashMap<NaiveDate, &RatePlanPrice> = HashMap::new();

    for row in prices.iter().filter(|p| !p.stamp.is_deleted()) {
        match row.date {
            Some(date) => {
                overrides.insert(date, row);
            }
            None => base = Some(row),
        }
    }

    let mut nights = Vec::with_capacity(stay.nights() as usize);
    for date in stay.iter_nights() {
        let row = overrides
            .get(&date)
            .copied()
            .or(base)
            .ok_or_else(|| CoreError::PricingUnavailable {
                rate_plan_code: plan.code.clone(),
                date,
            })?;

        if row.currency != property_currency {
            return Err(CoreError::CurrencyMismatch {
                expected: property_currency.to_string(),
                found: row.currency.clone(),
            });
        }

        nights.push(NightlyRate {
            date,
            price: row.price(),
            currency: row.currency.clone(),
        });
    }

    Ok(nights)
}

/// Sum of a priced stay (the room-charge subtotal for one line).
pub fn stay_total(nights: &[NightlyRate]) -> Money {
    nights.iter().map(|n| n.price).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
