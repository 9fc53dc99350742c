//! Read-only catalog records consumed by cart and checkout.
//!
//! The catalog subsystem owns these rows. This core only reads them, apart
//! from the denormalized `inventory_quantity` counter it keeps in sync with
//! the inventory ledger.

use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};

/// Whether a variant may be sold past zero stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryPolicy {
    /// Block overselling.
    #[default]
    Deny,
    /// Permit backorders.
    Allow,
}

impl InventoryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryPolicy::Deny => "DENY",
            InventoryPolicy::Allow => "ALLOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DENY" => Some(InventoryPolicy::Deny),
            "ALLOW" => Some(InventoryPolicy::Allow),
            _ => None,
        }
    }
}

impl std::fmt::Display for InventoryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub is_active: bool,
    pub brand: Option<String>,
    pub thumbnail: Option<String>,
}

/// A purchasable SKU-level configuration of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub title: String,
    pub sku: Option<String>,
    pub is_active: bool,
    pub price: Money,
    pub inventory_policy: InventoryPolicy,
    pub inventory_quantity: i64,
}

/// A variant joined with its product, as returned by catalog lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVariant {
    pub variant: ProductVariant,
    pub product: Product,
}

impl CatalogVariant {
    /// Returns true when both the variant and its product can be sold.
    pub fn is_purchasable(&self) -> bool {
        self.variant.is_active && self.product.is_active
    }

    /// Returns true when the variant's policy blocks overselling.
    pub fn enforces_stock(&self) -> bool {
        self.variant.inventory_policy == InventoryPolicy::Deny
    }

    /// Returns true when `requested` units can be sold at the variant's
    /// current availability.
    pub fn can_fulfill(&self, requested: i64) -> bool {
        !self.enforces_stock() || self.variant.inventory_quantity >= requested
    }

    /// Clamps a requested quantity to what can be sold right now.
    pub fn clamp_to_stock(&self, requested: u32) -> u32 {
        if !self.enforces_stock() {
            return requested;
        }
        let available = u32::try_from(self.variant.inventory_quantity.max(0)).unwrap_or(u32::MAX);
        requested.min(available)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn catalog_variant(price_cents: i64, stock: i64, policy: InventoryPolicy) -> CatalogVariant {
        let product_id = ProductId::new();
        CatalogVariant {
            variant: ProductVariant {
                id: VariantId::new(),
                product_id,
                title: "Default".to_string(),
                sku: Some("SKU-1".to_string()),
                is_active: true,
                price: Money::from_cents(price_cents),
                inventory_policy: policy,
                inventory_quantity: stock,
            },
            product: Product {
                id: product_id,
                name: "Widget".to_string(),
                is_active: true,
                brand: Some("Acme".to_string()),
                thumbnail: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::catalog_variant;
    use super::*;

    #[test]
    fn deny_policy_enforces_stock() {
        let cv = catalog_variant(1000, 3, InventoryPolicy::Deny);
        assert!(cv.can_fulfill(3));
        assert!(!cv.can_fulfill(4));
        assert_eq!(cv.clamp_to_stock(5), 3);
    }

    #[test]
    fn allow_policy_permits_backorder() {
        let cv = catalog_variant(1000, 0, InventoryPolicy::Allow);
        assert!(cv.can_fulfill(10));
        assert_eq!(cv.clamp_to_stock(10), 10);
    }

    #[test]
    fn negative_stock_clamps_to_zero() {
        let cv = catalog_variant(1000, -2, InventoryPolicy::Deny);
        assert_eq!(cv.clamp_to_stock(1), 0);
    }

    #[test]
    fn inactive_product_is_not_purchasable() {
        let mut cv = catalog_variant(1000, 3, InventoryPolicy::Deny);
        assert!(cv.is_purchasable());
        cv.product.is_active = false;
        assert!(!cv.is_purchasable());
    }

    #[test]
    fn policy_round_trips_through_str() {
        for policy in [InventoryPolicy::Deny, InventoryPolicy::Allow] {
            assert_eq!(InventoryPolicy::parse(policy.as_str()), Some(policy));
        }
        assert_eq!(InventoryPolicy::parse("MAYBE"), None);
    }
}
