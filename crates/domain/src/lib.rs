//! Domain layer for the checkout and inventory core.
//!
//! This crate holds the pure rules of the system:
//! - Catalog records read by cart and checkout
//! - Cart lines, summaries and the client/server cart merge
//! - The inventory ledger types and level arithmetic
//! - Order status machines, totals and order numbering
//! - Payment transactions
//!
//! Nothing here performs I/O; persistence lives in the `store` crate and
//! orchestration in `commerce`.

pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod order;
pub mod transaction;

pub use cart::{
    Cart, CartError, CartItemView, CartLine, CartSummary, LocalLine, MergeAction, MergePlan,
    merge_lines,
};
pub use catalog::{CatalogVariant, InventoryPolicy, Product, ProductVariant};
pub use inventory::{
    InventoryError, InventoryLevel, InventoryLocation, InventoryMovement, InventorySummary,
    LevelUpdate, MovementRequest, MovementType,
};
pub use order::{
    Address, FinancialStatus, FulfillmentStatus, Order, OrderDraft, OrderError, OrderItem,
    OrderStatus, OrderTotals, PriceAdjustments, next_order_number,
};
pub use transaction::{Transaction, TransactionError, TransactionKind, TransactionStatus};
