use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CartLineId, LocationId, OrderId, ProductId, TransactionId, UserId, VariantId,
};
use domain::{
    Cart, CartLine, CatalogVariant, InventoryLevel, InventoryLocation, InventoryMovement,
    InventorySummary, Order, Product, ProductVariant, Transaction,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    LevelQuery, MovementQuery, OrderQuery, Result, StoreError,
    query::paginate,
    store::{Store, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    variants: Vec<ProductVariant>,
    carts: HashMap<CartId, Cart>,
    cart_lines: Vec<CartLine>,
    locations: Vec<InventoryLocation>,
    levels: HashMap<(VariantId, LocationId), InventoryLevel>,
    movements: Vec<InventoryMovement>,
    orders: Vec<Order>,
    transactions: Vec<Transaction>,
}

impl State {
    fn catalog_variant(&self, variant: &ProductVariant) -> Option<CatalogVariant> {
        self.products
            .get(&variant.product_id)
            .map(|product| CatalogVariant {
                variant: variant.clone(),
                product: product.clone(),
            })
    }

    fn variant_mut(&mut self, id: VariantId) -> Result<&mut ProductVariant> {
        self.variants
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| StoreError::not_found("variant", id))
    }

    fn matching_orders(&self, query: &OrderQuery) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| {
                if let Some(user) = query.user_id
                    && o.user_id != user
                {
                    return false;
                }
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                query.include_inactive || o.is_active
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

/// In-memory store implementation for tests and local runs.
///
/// A unit of work holds the write lock for its whole lifetime and works on a
/// staged copy of the state, so units are serialized and a dropped unit
/// leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored movements.
    pub async fn movement_count(&self) -> usize {
        self.state.read().await.movements.len()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Makes subsequent commits fail, discarding the unit's writes.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let guard = self.state.clone().write_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx {
            guard,
            staged,
            fail_on_commit: self.fail_on_commit.clone(),
        })
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct InMemoryTx {
    guard: OwnedRwLockWriteGuard<State>,
    staged: State,
    fail_on_commit: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>> {
        let state = &self.staged;
        Ok(state
            .variants
            .iter()
            .find(|v| v.id == id)
            .and_then(|v| state.catalog_variant(v)))
    }

    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>> {
        self.get_variant(id).await
    }

    async fn first_active_variant_of_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<CatalogVariant>> {
        let state = &self.staged;
        Ok(state
            .variants
            .iter()
            .find(|v| v.product_id == product_id && v.is_active)
            .and_then(|v| state.catalog_variant(v)))
    }

    async fn try_debit_variant(&mut self, id: VariantId, quantity: i64) -> Result<bool> {
        let variant = self.staged.variant_mut(id)?;
        if variant.inventory_quantity < quantity {
            return Ok(false);
        }
        variant.inventory_quantity -= quantity;
        Ok(true)
    }

    async fn set_variant_inventory(&mut self, id: VariantId, quantity: i64) -> Result<()> {
        self.staged.variant_mut(id)?.inventory_quantity = quantity;
        Ok(())
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn upsert_variant(&mut self, variant: &ProductVariant) -> Result<()> {
        match self.staged.variants.iter_mut().find(|v| v.id == variant.id) {
            Some(existing) => *existing = variant.clone(),
            None => self.staged.variants.push(variant.clone()),
        }
        Ok(())
    }

    async fn get_cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.staged.carts.get(&id).cloned())
    }

    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .staged
            .carts
            .values()
            .find(|c| c.user_id == Some(user_id))
            .cloned())
    }

    async fn lock_cart(&mut self, id: CartId) -> Result<Option<Cart>> {
        self.get_cart(id).await
    }

    async fn lock_user_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.find_cart_by_user(user_id).await
    }

    async fn find_cart_by_session(&mut self, session_id: &str) -> Result<Option<Cart>> {
        Ok(self
            .staged
            .carts
            .values()
            .find(|c| c.session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        let taken = self.staged.carts.values().any(|c| {
            (cart.user_id.is_some() && c.user_id == cart.user_id)
                || (cart.session_id.is_some() && c.session_id == cart.session_id)
        });
        if taken {
            return Err(StoreError::UniqueViolation {
                entity: "cart",
                key: cart
                    .user_id
                    .map(|u| u.to_string())
                    .or_else(|| cart.session_id.clone())
                    .unwrap_or_default(),
            });
        }
        self.staged.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        let existing = self
            .staged
            .carts
            .get_mut(&cart.id)
            .ok_or_else(|| StoreError::not_found("cart", cart.id))?;
        *existing = cart.clone();
        Ok(())
    }

    async fn delete_expired_carts(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let expired: Vec<CartId> = self
            .staged
            .carts
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id)
            .collect();
        for id in &expired {
            self.staged.carts.remove(id);
        }
        self.staged
            .cart_lines
            .retain(|line| !expired.contains(&line.cart_id));
        Ok(expired.len() as u64)
    }

    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>> {
        Ok(self
            .staged
            .cart_lines
            .iter()
            .filter(|line| line.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn get_cart_line(&mut self, id: CartLineId) -> Result<Option<CartLine>> {
        Ok(self
            .staged
            .cart_lines
            .iter()
            .find(|line| line.id == id)
            .cloned())
    }

    async fn upsert_cart_line(&mut self, line: &CartLine) -> Result<CartLine> {
        let existing = self
            .staged
            .cart_lines
            .iter_mut()
            .find(|l| l.cart_id == line.cart_id && l.variant_id == line.variant_id);
        match existing {
            Some(existing) => {
                existing.quantity = line.quantity;
                existing.properties = line.properties.clone();
                existing.updated_at = line.updated_at;
                Ok(existing.clone())
            }
            None => {
                self.staged.cart_lines.push(line.clone());
                Ok(line.clone())
            }
        }
    }

    async fn delete_cart_line(&mut self, id: CartLineId) -> Result<bool> {
        let before = self.staged.cart_lines.len();
        self.staged.cart_lines.retain(|line| line.id != id);
        Ok(self.staged.cart_lines.len() != before)
    }

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<u64> {
        let before = self.staged.cart_lines.len();
        self.staged.cart_lines.retain(|line| line.cart_id != cart_id);
        Ok((before - self.staged.cart_lines.len()) as u64)
    }

    async fn get_location(&mut self, id: LocationId) -> Result<Option<InventoryLocation>> {
        Ok(self.staged.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<InventoryLocation>> {
        Ok(self
            .staged
            .locations
            .iter()
            .find(|l| l.name == name)
            .cloned())
    }

    async fn insert_location(&mut self, location: &InventoryLocation) -> Result<()> {
        if self.staged.locations.iter().any(|l| l.name == location.name) {
            return Err(StoreError::UniqueViolation {
                entity: "location",
                key: location.name.clone(),
            });
        }
        self.staged.locations.push(location.clone());
        Ok(())
    }

    async fn update_location(&mut self, location: &InventoryLocation) -> Result<()> {
        if self
            .staged
            .locations
            .iter()
            .any(|l| l.name == location.name && l.id != location.id)
        {
            return Err(StoreError::UniqueViolation {
                entity: "location",
                key: location.name.clone(),
            });
        }
        let existing = self
            .staged
            .locations
            .iter_mut()
            .find(|l| l.id == location.id)
            .ok_or_else(|| StoreError::not_found("location", location.id))?;
        *existing = location.clone();
        Ok(())
    }

    async fn list_locations(&mut self, include_inactive: bool) -> Result<Vec<InventoryLocation>> {
        let mut locations: Vec<_> = self
            .staged
            .locations
            .iter()
            .filter(|l| include_inactive || l.is_active)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn lock_level(
        &mut self,
        variant_id: VariantId,
        location_id: LocationId,
    ) -> Result<Option<InventoryLevel>> {
        Ok(self.staged.levels.get(&(variant_id, location_id)).cloned())
    }

    async fn upsert_level(&mut self, level: &InventoryLevel) -> Result<()> {
        self.staged
            .levels
            .insert((level.variant_id, level.location_id), level.clone());
        Ok(())
    }

    async fn list_levels(&mut self, query: &LevelQuery) -> Result<Vec<InventoryLevel>> {
        let mut levels: Vec<_> = self
            .staged
            .levels
            .values()
            .filter(|l| {
                if let Some(variant) = query.variant_id
                    && l.variant_id != variant
                {
                    return false;
                }
                if let Some(location) = query.location_id
                    && l.location_id != location
                {
                    return false;
                }
                if let Some(max) = query.max_available
                    && l.available > max
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        levels.sort_by(|a, b| {
            a.available
                .cmp(&b.available)
                .then(a.variant_id.cmp(&b.variant_id))
                .then(a.location_id.cmp(&b.location_id))
        });
        Ok(paginate(levels, query.offset, query.limit))
    }

    async fn sum_available(&mut self, variant_id: VariantId) -> Result<i64> {
        Ok(self
            .staged
            .levels
            .values()
            .filter(|l| l.variant_id == variant_id)
            .map(|l| l.available)
            .sum())
    }

    async fn insert_movement(&mut self, movement: &InventoryMovement) -> Result<()> {
        self.staged.movements.push(movement.clone());
        Ok(())
    }

    async fn list_movements(&mut self, query: &MovementQuery) -> Result<Vec<InventoryMovement>> {
        let movements: Vec<_> = self
            .staged
            .movements
            .iter()
            .rev()
            .filter(|m| {
                if let Some(variant) = query.variant_id
                    && m.variant_id != variant
                {
                    return false;
                }
                if let Some(location) = query.location_id
                    && m.location_id != location
                {
                    return false;
                }
                if let Some(kind) = query.movement_type
                    && m.movement_type != kind
                {
                    return false;
                }
                if let Some(ref reference) = query.reference_id
                    && m.reference_id.as_ref() != Some(reference)
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        Ok(paginate(movements, query.offset, query.limit))
    }

    async fn inventory_summary(&mut self, low_stock_threshold: i64) -> Result<InventorySummary> {
        let state = &self.staged;
        let active: Vec<&ProductVariant> = state.variants.iter().filter(|v| v.is_active).collect();
        Ok(InventorySummary {
            active_variants: active.len() as u64,
            active_locations: state.locations.iter().filter(|l| l.is_active).count() as u64,
            low_stock_variants: active
                .iter()
                .filter(|v| v.inventory_quantity <= low_stock_threshold)
                .count() as u64,
            out_of_stock_variants: active
                .iter()
                .filter(|v| v.inventory_quantity <= 0)
                .count() as u64,
            total_stock_units: state.levels.values().map(|l| l.available).sum(),
        })
    }

    async fn last_order_number(&mut self, prefix: &str) -> Result<Option<String>> {
        Ok(self
            .staged
            .orders
            .iter()
            .map(|o| o.order_number.as_str())
            .filter(|n| n.starts_with(prefix))
            .max()
            .map(str::to_string))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self
            .staged
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::UniqueViolation {
                entity: "order",
                key: order.order_number.clone(),
            });
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let existing = self
            .staged
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| StoreError::not_found("order", order.id))?;
        let items = std::mem::take(&mut existing.items);
        *existing = Order {
            items,
            ..order.clone()
        };
        Ok(())
    }

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>> {
        let orders = self.staged.matching_orders(query);
        Ok(paginate(orders, query.offset, query.limit))
    }

    async fn count_orders(&mut self, query: &OrderQuery) -> Result<u64> {
        Ok(self.staged.matching_orders(query).len() as u64)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        self.staged.transactions.push(transaction.clone());
        Ok(())
    }

    async fn update_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let existing = self
            .staged
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction.id)
            .ok_or_else(|| StoreError::not_found("transaction", transaction.id))?;
        *existing = transaction.clone();
        Ok(())
    }

    async fn get_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn list_transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTx {
            mut guard,
            staged,
            fail_on_commit,
        } = self;
        if fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }
        *guard = staged;
        Ok(())
    }
}
