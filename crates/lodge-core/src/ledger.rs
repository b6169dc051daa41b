//! # Folio Ledger Arithmetic
//!
//! Pure balance and refund-bound math over folio item histories.
//!
//! The persistence layer recomputes balances with SQL SUM; these
//! functions are the reference semantics it must agree with, and what
//! the booking service uses when it already holds the materialized
//! aggregate. A balance is always derived from the full item history -
//! never a cached running total that can drift.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{FolioItem, FolioItemKind, Refund};

/// The signed posting amount for an item kind.
///
/// Charges post positive, payments and refunds negative. `magnitude`
/// must be non-negative; adjustments pass their intended signed amount
/// through unchanged.
pub fn signed_amount(kind: FolioItemKind, magnitude: Money) -> Money {
    match kind {
        FolioItemKind::Adjustment => magnitude,
        k if k.is_credit() => -magnitude.abs(),
        _ => magnitude.abs(),
    }
}

/// Balance = sum of non-voided item amounts.
///
/// Idempotent derivation: replaying any causally-ordered posting history
/// produces the same result.
pub fn balance(items: &[FolioItem]) -> Money {
    items
        .iter()
        .filter(|i| !i.is_voided())
        .map(|i| i.amount())
        .sum()
}

/// Sum of non-voided payments (as a positive magnitude).
pub fn total_paid(items: &[FolioItem]) -> Money {
    items
        .iter()
        .filter(|i| !i.is_voided() && i.kind == FolioItemKind::Payment)
        .map(|i| i.amount().abs())
        .sum()
}

/// What remains refundable on a payment item.
///
/// `refunds` are the Refund records against this payment; a refund
/// counts unless its posted REFUND item is voided (`voided_item_ids`).
pub fn refundable_remainder(
    payment: &FolioItem,
    refunds: &[Refund],
    voided_item_ids: &[String],
) -> Money {
    let already: Money = refunds
        .iter()
        .filter(|r| r.payment_item_id == payment.id)
        .filter(|r| !voided_item_ids.contains(&r.folio_item_id))
        .map(|r| r.amount().abs())
        .sum();
    payment.amount().abs() - already
}

/// Enforces the refund-bound invariant before posting.
pub fn check_refund_bound(
    payment: &FolioItem,
    remaining: Money,
    requested: Money,
) -> CoreResult<()> {
    if requested > remaining {
        return Err(CoreError::RefundExceedsPayment {
            payment_item_id: payment.id.clone(),
            requested_cents: requested.cents(),
            remaining_cents: remaining.cents(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, kind: FolioItemKind, amount_cents: i64, voided: bool) -> FolioItem {
        FolioItem {
            id: id.into(),
            folio_id: "f1".into(),
            kind,
            description: format!("{kind:?}"),
            amount_cents,
            currency: "USD".into(),
            position: 0,
            posted_at: Utc::now(),
            posted_by: "tester".into(),
            voided_at: voided.then(Utc::now),
        }
    }

    fn refund(payment_id: &str, item_id: &str, cents: i64) -> Refund {
        Refund {
            id: uuid::Uuid::new_v4().to_string(),
            payment_item_id: payment_id.into(),
            folio_item_id: item_id.into(),
            amount_cents: cents,
            reason: None,
            approved_by: "tester".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_amounts() {
        let m = Money::from_cents(1000);
        assert_eq!(signed_amount(FolioItemKind::RoomCharge, m).cents(), 1000);
        assert_eq!(signed_amount(FolioItemKind::Tax, m).cents(), 1000);
        assert_eq!(signed_amount(FolioItemKind::Payment, m).cents(), -1000);
        assert_eq!(signed_amount(FolioItemKind::Refund, m).cents(), -1000);
        // adjustments keep the caller's sign
        assert_eq!(
            signed_amount(FolioItemKind::Adjustment, Money::from_cents(-250)).cents(),
            -250
        );
    }

    #[test]
    fn test_balance_excludes_voided() {
        let items = vec![
            item("a", FolioItemKind::RoomCharge, 24000, false),
            item("b", FolioItemKind::Tax, 2400, false),
            item("c", FolioItemKind::Payment, -20000, false),
            item("d", FolioItemKind::Fee, 9999, true), // voided
        ];
        assert_eq!(balance(&items).cents(), 6400);
        assert_eq!(total_paid(&items).cents(), 20000);
    }

    #[test]
    fn test_balance_order_independent() {
        let mut items = vec![
            item("a", FolioItemKind::RoomCharge, 24000, false),
            item("b", FolioItemKind::Payment, -24000, false),
            item("c", FolioItemKind::Tax, 2400, false),
        ];
        let forward = balance(&items);
        items.reverse();
        assert_eq!(balance(&items), forward);
    }

    #[test]
    fn test_refundable_remainder_and_bound() {
        let payment = item("pay1", FolioItemKind::Payment, -20000, false);
        let refunds = vec![
            refund("pay1", "ref1", -5000),
            refund("pay1", "ref2", -3000),
            refund("other", "ref3", -9000), // different payment
        ];

        let remaining = refundable_remainder(&payment, &refunds, &[]);
        assert_eq!(remaining.cents(), 12000);

        assert!(check_refund_bound(&payment, remaining, Money::from_cents(12000)).is_ok());
        let err =
            check_refund_bound(&payment, remaining, Money::from_cents(12001)).unwrap_err();
        assert!(matches!(err, CoreError::RefundExceedsPayment { .. }));
    }

    #[test]
    fn test_voided_refund_restores_headroom() {
        let payment = item("pay1", FolioItemKind::Payment, -20000, false);
        let refunds = vec![refund("pay1", "ref1", -20000)];

        // refund fully consumed...
        assert_eq!(refundable_remainder(&payment, &refunds, &[]).cents(), 0);
        // ...until its REFUND item is voided
        let voided = vec!["ref1".to_string()];
        assert_eq!(
            refundable_remainder(&payment, &refunds, &voided).cents(),
            20000
        );
    }
}
