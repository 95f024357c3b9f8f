//! Checkout price computation.

use crate::types::Money;

/// Price of an order as shown at checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceBreakdown {
    /// Price per ticket
    pub unit_price: Money,
    /// Tickets
    pub quantity: u32,
    /// `unit_price * quantity`
    pub subtotal: Money,
    /// Processing fee on the subtotal
    pub processing_fee: Money,
    /// Amount charged
    pub total: Money,
}

impl PriceBreakdown {
    /// Nothing to pay; the order skips the gateway
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.total.is_zero()
    }
}

/// Price `quantity` tickets at `unit_price` with a fee of `fee_bps` basis points
///
/// Returns `None` only on overflow.
#[must_use]
pub fn quote(unit_price: Money, quantity: u32, fee_bps: u32) -> Option<PriceBreakdown> {
    let subtotal = unit_price.checked_mul(quantity)?;
    let processing_fee = subtotal.basis_points(fee_bps)?;
    Some(PriceBreakdown {
        unit_price,
        quantity,
        subtotal,
        processing_fee,
        total: subtotal.checked_add(processing_fee)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn three_tickets_at_one_hundred() {
        let price = quote(Money::from_major(100), 3, 250).unwrap();
        assert_eq!(price.subtotal, Money::from_major(300));
        assert_eq!(price.processing_fee, Money::from_cents(750));
        assert_eq!(price.total, Money::from_cents(30_750));
        assert_eq!(price.total.to_string(), "307.50");
    }

    #[test]
    fn free_tickets_carry_no_fee() {
        let price = quote(Money::ZERO, 4, 250).unwrap();
        assert!(price.is_free());
        assert_eq!(price.processing_fee, Money::ZERO);
    }

    #[test]
    fn overflow_is_reported() {
        assert!(quote(Money::from_cents(i64::MAX), 2, 250).is_none());
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_fee(cents in 0i64..10_000_000, quantity in 1u32..50, bps in 0u32..=10_000) {
            let price = quote(Money::from_cents(cents), quantity, bps).unwrap();
            prop_assert_eq!(price.subtotal.cents(), cents * i64::from(quantity));
            prop_assert_eq!(price.total.cents(), price.subtotal.cents() + price.processing_fee.cents());
            prop_assert!(price.processing_fee <= price.subtotal);
        }
    }
}
