use common::Money;
use serde::{Deserialize, Serialize};

/// Charges applied on top of the item subtotal.
///
/// Tax, shipping and discounts are not computed by this core; callers pass
/// zero until a pricing collaborator supplies real values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustments {
    pub tax: Money,
    pub shipping: Money,
    pub discounts: Money,
}

/// Monetary totals of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal_price: Money,
    pub total_tax: Money,
    pub total_shipping: Money,
    pub total_discounts: Money,
    pub total_price: Money,
}

impl OrderTotals {
    /// Computes totals from (unit price, quantity) pairs.
    pub fn compute(
        lines: impl IntoIterator<Item = (Money, u32)>,
        adjustments: PriceAdjustments,
    ) -> Self {
        let subtotal_price: Money = lines
            .into_iter()
            .map(|(price, quantity)| price.multiply(quantity))
            .sum();
        Self {
            subtotal_price,
            total_tax: adjustments.tax,
            total_shipping: adjustments.shipping,
            total_discounts: adjustments.discounts,
            total_price: subtotal_price + adjustments.tax + adjustments.shipping
                - adjustments.discounts,
        }
    }

    /// `total = subtotal + tax + shipping - discounts`.
    pub fn is_consistent(&self) -> bool {
        self.total_price
            == self.subtotal_price + self.total_tax + self.total_shipping - self.total_discounts
    }
}
