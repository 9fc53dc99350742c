use chrono::{DateTime, Duration, Utc};
use common::{CartId, CartLineId, Money, ProductId, Properties, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::CartError;
use crate::catalog::CatalogVariant;

/// Smallest quantity a line may hold.
pub const MIN_LINE_QUANTITY: u32 = 1;

/// Largest quantity a line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Lifetime of a freshly created cart.
pub const DEFAULT_CART_TTL_DAYS: i64 = 7;

/// Checks that a line quantity is within `MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY`.
pub fn validate_quantity(quantity: u32) -> Result<u32, CartError> {
    if (MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(CartError::InvalidQuantity { quantity })
    }
}

/// Cart header row. Lines are stored and loaded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    /// Owning user; `None` for anonymous carts keyed by session.
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Creates an empty cart owned by a user.
    pub fn for_user(
        user_id: UserId,
        currency: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: CartId::new(),
            user_id: Some(user_id),
            session_id: None,
            currency: currency.into(),
            created_at: now,
            updated_at: now,
            expires_at: Some(now + ttl),
        }
    }

    /// Creates an empty anonymous cart keyed by a session id.
    pub fn for_session(
        session_id: impl Into<String>,
        currency: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: CartId::new(),
            user_id: None,
            session_id: Some(session_id.into()),
            currency: currency.into(),
            created_at: now,
            updated_at: now,
            expires_at: Some(now + ttl),
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Records a mutation and slides the expiry forward.
    pub fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.updated_at = now;
        self.expires_at = Some(now + ttl);
    }
}

/// One (variant, quantity, properties) line. Prices are never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a new line, validating the quantity.
    pub fn new(
        cart_id: CartId,
        variant_id: VariantId,
        quantity: u32,
        properties: Properties,
        now: DateTime<Utc>,
    ) -> Result<Self, CartError> {
        Ok(Self {
            id: CartLineId::new(),
            cart_id,
            variant_id,
            quantity: validate_quantity(quantity)?,
            properties,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets a new quantity, validating the range.
    pub fn set_quantity(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), CartError> {
        self.quantity = validate_quantity(quantity)?;
        self.updated_at = now;
        Ok(())
    }
}

/// A cart line priced against the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub line_id: CartLineId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    pub properties: Properties,
    pub thumbnail: Option<String>,
    pub is_available: bool,
}

impl CartItemView {
    pub fn new(line: &CartLine, catalog: &CatalogVariant) -> Self {
        Self {
            line_id: line.id,
            variant_id: line.variant_id,
            product_id: catalog.product.id,
            product_name: catalog.product.name.clone(),
            variant_title: catalog.variant.title.clone(),
            sku: catalog.variant.sku.clone(),
            quantity: line.quantity,
            unit_price: catalog.variant.price,
            line_total: catalog.variant.price.multiply(line.quantity),
            properties: line.properties.clone(),
            thumbnail: catalog.product.thumbnail.clone(),
            is_available: catalog.is_purchasable() && catalog.can_fulfill(i64::from(line.quantity)),
        }
    }
}

/// Derived view of a cart: priced items, item count and subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub cart_id: CartId,
    pub items: Vec<CartItemView>,
    pub total_items: u32,
    pub subtotal: Money,
    pub currency: String,
}

impl CartSummary {
    /// Builds a summary from lines joined with their catalog records.
    ///
    /// Lines whose variant no longer exists in the catalog cannot be priced
    /// and are left out.
    pub fn build<'a>(
        cart: &Cart,
        lines: impl IntoIterator<Item = (&'a CartLine, Option<&'a CatalogVariant>)>,
    ) -> Self {
        let items: Vec<CartItemView> = lines
            .into_iter()
            .filter_map(|(line, catalog)| catalog.map(|c| CartItemView::new(line, c)))
            .collect();
        let total_items = items.iter().map(|item| item.quantity).sum();
        let subtotal = items.iter().map(|item| item.line_total).sum();

        Self {
            cart_id: cart.id,
            items,
            total_items,
            subtotal,
            currency: cart.currency.clone(),
        }
    }
}
