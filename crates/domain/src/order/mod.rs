//! Orders: state machines, totals, numbering and the item snapshot.

mod model;
mod number;
mod state;
mod totals;

pub use model::{Address, Order, OrderDraft, OrderItem};
pub use number::{is_valid_order_number, next_order_number, order_number_prefix};
pub use state::{FinancialStatus, FulfillmentStatus, OrderStatus};
pub use totals::{OrderTotals, PriceAdjustments};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status change is not allowed.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The order can no longer be cancelled.
    #[error("Order cannot be cancelled in {status} status")]
    CannotCancel { status: OrderStatus },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A stored order number does not have the expected shape.
    #[error("Invalid order number: {0}")]
    InvalidOrderNumber(String),

    /// All 9999 numbers of a day have been used.
    #[error("Order number sequence exhausted for {prefix}")]
    SequenceExhausted { prefix: String },
}
