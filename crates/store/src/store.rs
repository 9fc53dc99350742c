use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartId, CartLineId, LocationId, OrderId, ProductId, TransactionId, UserId, VariantId,
};
use domain::{
    Cart, CartLine, CatalogVariant, InventoryLevel, InventoryLocation, InventoryMovement,
    InventorySummary, Order, Product, ProductVariant, Transaction,
};

use crate::{LevelQuery, MovementQuery, OrderQuery, Result};

/// Entry point to persistence.
///
/// Every read and write goes through a [`StoreTx`] obtained from
/// [`Store::begin`]. Implementations must be cheap to clone and thread-safe.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work.
///
/// Writes become visible to other units of work only after [`commit`]
/// succeeds. Dropping the value without committing discards every write.
///
/// Methods named `lock_*` take a row lock that is held until the unit of
/// work ends, so concurrent units touching the same row serialize.
///
/// [`commit`]: StoreTx::commit
#[async_trait]
pub trait StoreTx: Send {
    // ---- catalog -------------------------------------------------------

    /// Loads a variant joined with its product.
    async fn get_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>>;

    /// Loads a variant joined with its product and locks the variant row.
    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<CatalogVariant>>;

    /// Returns the oldest active variant of a product.
    async fn first_active_variant_of_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<CatalogVariant>>;

    /// Decrements `inventory_quantity` by `quantity` only if at least that
    /// many units are available. Returns false when the guard rejected it.
    async fn try_debit_variant(&mut self, id: VariantId, quantity: i64) -> Result<bool>;

    /// Overwrites the denormalized `inventory_quantity` counter.
    async fn set_variant_inventory(&mut self, id: VariantId, quantity: i64) -> Result<()>;

    async fn upsert_product(&mut self, product: &Product) -> Result<()>;

    async fn upsert_variant(&mut self, variant: &ProductVariant) -> Result<()>;

    // ---- carts ---------------------------------------------------------

    async fn get_cart(&mut self, id: CartId) -> Result<Option<Cart>>;

    async fn find_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Loads and locks a cart. Line mutations and checkout take this lock
    /// before reading the cart's lines.
    async fn lock_cart(&mut self, id: CartId) -> Result<Option<Cart>>;

    /// Loads and locks the cart owned by `user_id`.
    async fn lock_user_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    async fn find_cart_by_session(&mut self, session_id: &str) -> Result<Option<Cart>>;

    /// Fails with `UniqueViolation` if the user or session already has a cart.
    async fn insert_cart(&mut self, cart: &Cart) -> Result<()>;

    async fn update_cart(&mut self, cart: &Cart) -> Result<()>;

    /// Deletes carts (and their lines) that expired at or before `now`.
    async fn delete_expired_carts(&mut self, now: DateTime<Utc>) -> Result<u64>;

    /// Lines of a cart in insertion order.
    async fn list_cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>>;

    async fn get_cart_line(&mut self, id: CartLineId) -> Result<Option<CartLine>>;

    /// Inserts the line or, when the cart already holds the variant,
    /// overwrites that line's quantity and properties. Returns the stored line.
    async fn upsert_cart_line(&mut self, line: &CartLine) -> Result<CartLine>;

    async fn delete_cart_line(&mut self, id: CartLineId) -> Result<bool>;

    async fn clear_cart_lines(&mut self, cart_id: CartId) -> Result<u64>;

    // ---- inventory -----------------------------------------------------

    async fn get_location(&mut self, id: LocationId) -> Result<Option<InventoryLocation>>;

    async fn find_location_by_name(&mut self, name: &str) -> Result<Option<InventoryLocation>>;

    /// Fails with `UniqueViolation` on a duplicate name.
    async fn insert_location(&mut self, location: &InventoryLocation) -> Result<()>;

    async fn update_location(&mut self, location: &InventoryLocation) -> Result<()>;

    async fn list_locations(&mut self, include_inactive: bool) -> Result<Vec<InventoryLocation>>;

    /// Loads and locks the level of a (variant, location) pair.
    async fn lock_level(
        &mut self,
        variant_id: VariantId,
        location_id: LocationId,
    ) -> Result<Option<InventoryLevel>>;

    async fn upsert_level(&mut self, level: &InventoryLevel) -> Result<()>;

    async fn list_levels(&mut self, query: &LevelQuery) -> Result<Vec<InventoryLevel>>;

    /// Sum of `available` across every location holding the variant.
    async fn sum_available(&mut self, variant_id: VariantId) -> Result<i64>;

    async fn insert_movement(&mut self, movement: &InventoryMovement) -> Result<()>;

    async fn list_movements(&mut self, query: &MovementQuery) -> Result<Vec<InventoryMovement>>;

    async fn inventory_summary(&mut self, low_stock_threshold: i64) -> Result<InventorySummary>;

    // ---- orders --------------------------------------------------------

    /// Returns the greatest order number starting with `prefix`.
    ///
    /// Serializes order-number allocation for that prefix until the unit of
    /// work ends.
    async fn last_order_number(&mut self, prefix: &str) -> Result<Option<String>>;

    /// Inserts the order header and all of its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Writes the mutable header fields. Items are never rewritten.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    async fn list_orders(&mut self, query: &OrderQuery) -> Result<Vec<Order>>;

    /// Number of orders matching the query, ignoring limit and offset.
    async fn count_orders(&mut self, query: &OrderQuery) -> Result<u64>;

    // ---- transactions --------------------------------------------------

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()>;

    async fn update_transaction(&mut self, transaction: &Transaction) -> Result<()>;

    async fn get_transaction(&mut self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Transactions of an order, oldest first.
    async fn list_transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>>;

    /// Makes every write durable.
    async fn commit(self) -> Result<()>;
}
