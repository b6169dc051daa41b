//! # Tax & Fee Calculator
//!
//! Applies a property's active tax/fee definitions to a priced subtotal.
//!
//! ## Calculation
//! ```text
//! PERCENTAGE:  amount = round_half_up(subtotal × value_bps / 10000)
//! FLAT:        amount = value            (once per applicable charge)
//!              amount = value × nights   (when per_night is set)
//! ```
//!
//! Only active, non-deleted fees whose applies-to scope matches the
//! charged category (or is the ALL wildcard) participate. Output is
//! ordered stably by fee name so folio presentation is deterministic
//! across calls.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ChargeScope, TaxFee, TaxFeeKind};

/// One computed tax or fee line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxFeeLine {
    pub name: String,
    pub kind: TaxFeeKind,
    pub amount: Money,
}

/// Computes the tax/fee lines for a subtotal charged under `scope`.
///
/// `nights` drives per-night flat fees; percentage fees ignore it.
pub fn apply(fees: &[TaxFee], scope: ChargeScope, subtotal: Money, nights: i64) -> Vec<TaxFeeLine> {
    let mut applicable: Vec<&TaxFee> = fees
        .iter()
        .filter(|f| f.active && !f.stamp.is_deleted() && f.applies_to.matches(scope))
        .collect();
    applicable.sort_by(|a, b| a.name.cmp(&b.name));

    applicable
        .into_iter()
        .map(|fee| {
            let amount = match fee.kind {
                TaxFeeKind::Percentage => subtotal.apply_bps_half_up(fee.value as u32),
                TaxFeeKind::Flat => {
                    let flat = Money::from_cents(fee.value);
                    if fee.per_night {
                        flat.multiply_quantity(nights)
                    } else {
                        flat
                    }
                }
            };
            TaxFeeLine {
                name: fee.name.clone(),
                kind: fee.kind,
                amount,
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
