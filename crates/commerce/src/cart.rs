//! Cart service: direct line mutations, client sync and expiry.

use chrono::{DateTime, Utc};
use common::{CartLineId, Properties, UserId, VariantId};
use domain::cart::validate_quantity;
use domain::{Cart, CartLine, CartSummary, LocalLine, MergeAction, MergePlan, merge_lines};
use serde::{Deserialize, Serialize};
use store::{Store, StoreError, StoreTx};

use crate::catalog::{ensure_purchasable, ensure_stock, require_variant, resolve_variant};
use crate::config::CommerceConfig;
use crate::error::{CommerceError, Result};

/// Body of an add-to-cart request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLine {
    /// Variant id, or a product id whose first active variant is meant.
    pub variant_id: VariantId,
    pub quantity: u32,
    #[serde(default)]
    pub properties: Option<Properties>,
}

/// Body of a line update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLine {
    pub quantity: u32,
    #[serde(default)]
    pub properties: Option<Properties>,
}

/// One line of a client-held cart snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    #[serde(default)]
    pub properties: Option<Properties>,
}

/// Application service for carts.
///
/// Every operation runs in one unit of work and returns the cart as priced
/// against the live catalog.
pub struct CartService<S: Store> {
    store: S,
    config: CommerceConfig,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S, config: CommerceConfig) -> Self {
        Self { store, config }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartSummary> {
        let (mut tx, cart) = self.begin_with_cart(user_id, Utc::now()).await?;
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Adds units of a variant, merging with an existing line for it.
    #[tracing::instrument(skip(self, request), fields(variant_id = %request.variant_id, quantity = request.quantity))]
    pub async fn add_line(&self, user_id: UserId, request: AddLine) -> Result<CartSummary> {
        validate_quantity(request.quantity)?;
        let now = Utc::now();
        let (mut tx, mut cart) = self.begin_with_cart(user_id, now).await?;

        let catalog = require_variant(&mut tx, request.variant_id).await?;
        ensure_purchasable(&catalog)?;

        let lines = tx.list_cart_lines(cart.id).await?;
        let line = match lines.into_iter().find(|l| l.variant_id == catalog.variant.id) {
            Some(mut existing) => {
                let requested = existing.quantity.saturating_add(request.quantity);
                validate_quantity(requested)?;
                ensure_stock(&catalog, i64::from(requested))?;
                existing.set_quantity(requested, now)?;
                if let Some(properties) = request.properties {
                    existing.properties = properties;
                }
                existing
            }
            None => {
                ensure_stock(&catalog, i64::from(request.quantity))?;
                CartLine::new(
                    cart.id,
                    catalog.variant.id,
                    request.quantity,
                    request.properties.unwrap_or_default(),
                    now,
                )?
            }
        };
        tx.upsert_cart_line(&line).await?;

        cart.touch(now, self.config.cart_ttl);
        tx.update_cart(&cart).await?;
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Sets a line's quantity. Stock is re-checked only when it grows.
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn update_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        request: UpdateLine,
    ) -> Result<CartSummary> {
        validate_quantity(request.quantity)?;
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (mut cart, mut line) = owned_line(&mut tx, user_id, line_id).await?;

        if request.quantity > line.quantity {
            let catalog = require_variant(&mut tx, line.variant_id).await?;
            ensure_purchasable(&catalog)?;
            ensure_stock(&catalog, i64::from(request.quantity))?;
        }
        line.set_quantity(request.quantity, now)?;
        if let Some(properties) = request.properties {
            line.properties = properties;
        }
        tx.upsert_cart_line(&line).await?;

        cart.touch(now, self.config.cart_ttl);
        tx.update_cart(&cart).await?;
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(summary)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_line(&self, user_id: UserId, line_id: CartLineId) -> Result<CartSummary> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (mut cart, line) = owned_line(&mut tx, user_id, line_id).await?;

        tx.delete_cart_line(line.id).await?;
        cart.touch(now, self.config.cart_ttl);
        tx.update_cart(&cart).await?;
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Deletes every line; the cart itself is kept.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartSummary> {
        let now = Utc::now();
        let (mut tx, mut cart) = self.begin_with_cart(user_id, now).await?;

        let removed = tx.clear_cart_lines(cart.id).await?;
        cart.touch(now, self.config.cart_ttl);
        tx.update_cart(&cart).await?;
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::debug!(cart_id = %cart.id, removed, "cart cleared");
        Ok(summary)
    }

    /// Merges a client-held snapshot into the server cart.
    ///
    /// Unknown and inactive variants are skipped; quantities beyond the
    /// available stock are clamped rather than rejected. Replaying the same
    /// snapshot changes nothing.
    #[tracing::instrument(skip(self, local), fields(lines = local.len()))]
    pub async fn sync(&self, user_id: UserId, local: Vec<SyncLine>) -> Result<CartSummary> {
        metrics::counter!("cart_syncs_total").increment(1);
        let now = Utc::now();
        let (mut tx, mut cart) = self.begin_with_cart(user_id, now).await?;

        let mut resolved = Vec::with_capacity(local.len());
        for line in local {
            match resolve_variant(&mut tx, line.variant_id).await? {
                Some(catalog) => resolved.push(LocalLine {
                    catalog,
                    quantity: line.quantity,
                    properties: line.properties,
                }),
                None => tracing::debug!(variant_id = %line.variant_id, "skipping unknown variant"),
            }
        }

        let server = tx.list_cart_lines(cart.id).await?;
        let plan = merge_lines(&server, &resolved);
        if !plan.is_noop() {
            apply_plan(&mut tx, &cart, &server, &plan, now).await?;
            cart.touch(now, self.config.cart_ttl);
            tx.update_cart(&cart).await?;
        }
        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;

        tracing::info!(
            cart_id = %cart.id,
            writes = plan.actions.len(),
            clamped = plan.clamped.len(),
            skipped = plan.skipped.len(),
            "cart synced"
        );
        Ok(summary)
    }

    /// Folds an anonymous session cart into the user's cart.
    ///
    /// The session lines are merged with the same rules as [`sync`], then
    /// the session cart is emptied and expired so the next sweep drops it.
    ///
    /// [`sync`]: CartService::sync
    #[tracing::instrument(skip(self, session_id))]
    pub async fn claim_session_cart(&self, user_id: UserId, session_id: &str) -> Result<CartSummary> {
        let now = Utc::now();
        let (mut tx, mut cart) = self.begin_with_cart(user_id, now).await?;

        if let Some(mut session_cart) = tx.find_cart_by_session(session_id).await? {
            let session_lines = tx.list_cart_lines(session_cart.id).await?;
            let mut resolved = Vec::with_capacity(session_lines.len());
            for line in session_lines {
                if let Some(catalog) = tx.get_variant(line.variant_id).await? {
                    resolved.push(LocalLine {
                        catalog,
                        quantity: line.quantity,
                        properties: Some(line.properties),
                    });
                }
            }

            let server = tx.list_cart_lines(cart.id).await?;
            let plan = merge_lines(&server, &resolved);
            apply_plan(&mut tx, &cart, &server, &plan, now).await?;

            tx.clear_cart_lines(session_cart.id).await?;
            session_cart.updated_at = now;
            session_cart.expires_at = Some(now);
            tx.update_cart(&session_cart).await?;

            cart.touch(now, self.config.cart_ttl);
            tx.update_cart(&cart).await?;
            tracing::info!(cart_id = %cart.id, session_cart_id = %session_cart.id, "session cart claimed");
        }

        let summary = summarize(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Deletes carts whose expiry is at or before `now`.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.store.begin().await?;
        let removed = tx.delete_expired_carts(now).await?;
        tx.commit().await?;

        metrics::counter!("carts_expired_total").increment(removed);
        if removed > 0 {
            tracing::info!(removed, "expired carts swept");
        }
        Ok(removed)
    }

    /// Opens a unit of work holding the user's cart locked, creating the
    /// cart if needed.
    async fn begin_with_cart(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(S::Tx, Cart)> {
        let mut tx = self.store.begin().await?;
        if let Some(cart) = tx.lock_user_cart(user_id).await? {
            return Ok((tx, cart));
        }

        let cart = Cart::for_user(user_id, &self.config.currency, now, self.config.cart_ttl);
        match tx.insert_cart(&cart).await {
            Ok(()) => Ok((tx, cart)),
            Err(StoreError::UniqueViolation { .. }) => {
                // A concurrent request created it first.
                drop(tx);
                let mut tx = self.store.begin().await?;
                let cart = tx
                    .lock_user_cart(user_id)
                    .await?
                    .ok_or_else(|| CommerceError::not_found("Cart", user_id))?;
                Ok((tx, cart))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<S: Store> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

/// Locks a line's cart and loads both, checking that the cart belongs to
/// `user_id`. The line is re-read under the lock.
async fn owned_line<T: StoreTx>(
    tx: &mut T,
    user_id: UserId,
    line_id: CartLineId,
) -> Result<(Cart, CartLine)> {
    let cart_id = tx
        .get_cart_line(line_id)
        .await?
        .ok_or_else(|| CommerceError::not_found("CartItem", line_id))?
        .cart_id;
    let cart = tx
        .lock_cart(cart_id)
        .await?
        .ok_or_else(|| CommerceError::not_found("Cart", cart_id))?;
    if !cart.is_owned_by(user_id) {
        return Err(CommerceError::Forbidden(
            "cart item belongs to another user".to_string(),
        ));
    }
    let line = tx
        .get_cart_line(line_id)
        .await?
        .ok_or_else(|| CommerceError::not_found("CartItem", line_id))?;
    Ok((cart, line))
}

async fn apply_plan<T: StoreTx>(
    tx: &mut T,
    cart: &Cart,
    server: &[CartLine],
    plan: &MergePlan,
    now: DateTime<Utc>,
) -> Result<()> {
    for action in &plan.actions {
        match action {
            MergeAction::Upsert {
                variant_id,
                quantity,
                properties,
            } => {
                let line = match server.iter().find(|l| l.variant_id == *variant_id) {
                    Some(existing) => {
                        let mut line = existing.clone();
                        line.set_quantity(*quantity, now)?;
                        line.properties = properties.clone();
                        line
                    }
                    None => CartLine::new(cart.id, *variant_id, *quantity, properties.clone(), now)?,
                };
                tx.upsert_cart_line(&line).await?;
            }
            MergeAction::Remove { line_id } => {
                tx.delete_cart_line(*line_id).await?;
            }
        }
    }
    Ok(())
}

/// Prices the cart's lines against the live catalog.
pub(crate) async fn summarize<T: StoreTx>(tx: &mut T, cart: &Cart) -> Result<CartSummary> {
    let lines = tx.list_cart_lines(cart.id).await?;
    let mut catalog = Vec::with_capacity(lines.len());
    for line in &lines {
        catalog.push(tx.get_variant(line.variant_id).await?);
    }
    Ok(CartSummary::build(
        cart,
        lines.iter().zip(catalog.iter().map(Option::as_ref)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, seed_variant};
    use domain::InventoryPolicy;

    fn add(variant_id: VariantId, quantity: u32) -> AddLine {
        AddLine {
            variant_id,
            quantity,
            properties: None,
        }
    }

    #[tokio::test]
    async fn get_cart_creates_an_empty_cart_once() {
        let fx = Fixture::new().await;
        let user = UserId::new();

        let first = fx.carts.get_cart(user).await.unwrap();
        let second = fx.carts.get_cart(user).await.unwrap();
        assert_eq!(first.cart_id, second.cart_id);
        assert!(first.items.is_empty());
        assert_eq!(first.currency, "USD");
    }

    #[tokio::test]
    async fn add_line_merges_same_variant() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 10, InventoryPolicy::Deny).await;

        fx.carts.add_line(user, add(v.variant.id, 2)).await.unwrap();
        let summary = fx.carts.add_line(user, add(v.variant.id, 3)).await.unwrap();

        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.total_items, 5);
        assert_eq!(summary.subtotal.cents(), 5000);
    }

    #[tokio::test]
    async fn add_line_accepts_a_product_id() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 10, InventoryPolicy::Deny).await;

        let by_product = VariantId::from_uuid(v.product.id.as_uuid());
        let summary = fx.carts.add_line(user, add(by_product, 1)).await.unwrap();
        assert_eq!(summary.items[0].variant_id, v.variant.id);
    }

    #[tokio::test]
    async fn add_line_rejects_more_than_stock() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 3, InventoryPolicy::Deny).await;

        fx.carts.add_line(user, add(v.variant.id, 2)).await.unwrap();
        let err = fx.carts.add_line(user, add(v.variant.id, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InsufficientStock { available: 3, .. }
        ));

        let summary = fx.carts.get_cart(user).await.unwrap();
        assert_eq!(summary.total_items, 2);
    }

    #[tokio::test]
    async fn add_line_allows_backorder_under_allow_policy() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Preorder", 1000, 0, InventoryPolicy::Allow).await;

        let summary = fx.carts.add_line(user, add(v.variant.id, 4)).await.unwrap();
        assert_eq!(summary.total_items, 4);
    }

    #[tokio::test]
    async fn add_line_rejects_inactive_products() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let mut v = seed_variant(&fx.store, "Retired", 1000, 10, InventoryPolicy::Deny).await;
        v.product.is_active = false;
        let mut tx = fx.store.begin().await.unwrap();
        tx.upsert_product(&v.product).await.unwrap();
        tx.commit().await.unwrap();

        let err = fx.carts.add_line(user, add(v.variant.id, 1)).await.unwrap_err();
        assert_eq!(err.code(), "PRODUCT_UNAVAILABLE");
    }

    #[tokio::test]
    async fn add_line_caps_line_quantity() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 100, 1_000, InventoryPolicy::Deny).await;

        fx.carts.add_line(user, add(v.variant.id, 90)).await.unwrap();
        let err = fx.carts.add_line(user, add(v.variant.id, 10)).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn update_line_rechecks_stock_only_when_growing() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 3, InventoryPolicy::Deny).await;
        let summary = fx.carts.add_line(user, add(v.variant.id, 3)).await.unwrap();
        let line_id = summary.items[0].line_id;

        let grow = UpdateLine {
            quantity: 4,
            properties: None,
        };
        assert!(fx.carts.update_line(user, line_id, grow).await.is_err());

        let shrink = UpdateLine {
            quantity: 1,
            properties: None,
        };
        let summary = fx.carts.update_line(user, line_id, shrink).await.unwrap();
        assert_eq!(summary.total_items, 1);
    }

    #[tokio::test]
    async fn foreign_lines_are_forbidden() {
        let fx = Fixture::new().await;
        let owner = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 3, InventoryPolicy::Deny).await;
        let summary = fx.carts.add_line(owner, add(v.variant.id, 1)).await.unwrap();
        let line_id = summary.items[0].line_id;

        let err = fx.carts.remove_line(UserId::new(), line_id).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let summary = fx.carts.remove_line(owner, line_id).await.unwrap();
        assert!(summary.items.is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_the_cart() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 3, InventoryPolicy::Deny).await;
        let before = fx.carts.add_line(user, add(v.variant.id, 1)).await.unwrap();

        let after = fx.carts.clear(user).await.unwrap();
        assert_eq!(after.cart_id, before.cart_id);
        assert!(after.items.is_empty());
    }

    #[tokio::test]
    async fn sync_skips_unknown_variants() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 5, InventoryPolicy::Deny).await;

        let summary = fx
            .carts
            .sync(
                user,
                vec![
                    SyncLine {
                        variant_id: v.variant.id,
                        quantity: 2,
                        properties: None,
                    },
                    SyncLine {
                        variant_id: VariantId::new(),
                        quantity: 1,
                        properties: None,
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.total_items, 2);
    }

    #[tokio::test]
    async fn claim_session_cart_merges_and_expires_it() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        let v = seed_variant(&fx.store, "Widget", 1000, 10, InventoryPolicy::Deny).await;
        let now = Utc::now();

        let session = Cart::for_session("sess-42", "USD", now, fx.config.cart_ttl);
        let mut tx = fx.store.begin().await.unwrap();
        tx.insert_cart(&session).await.unwrap();
        let line = CartLine::new(session.id, v.variant.id, 3, Properties::new(), now).unwrap();
        tx.upsert_cart_line(&line).await.unwrap();
        tx.commit().await.unwrap();

        fx.carts.add_line(user, add(v.variant.id, 1)).await.unwrap();
        let summary = fx.carts.claim_session_cart(user, "sess-42").await.unwrap();
        assert_eq!(summary.total_items, 3);

        let removed = fx.carts.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        let mut tx = fx.store.begin().await.unwrap();
        assert!(tx.find_cart_by_session("sess-42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_leaves_live_carts() {
        let fx = Fixture::new().await;
        let user = UserId::new();
        fx.carts.get_cart(user).await.unwrap();

        assert_eq!(fx.carts.sweep_expired(Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + fx.config.cart_ttl;
        assert_eq!(fx.carts.sweep_expired(later).await.unwrap(), 1);
    }
}
