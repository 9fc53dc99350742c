//! Cart aggregate, line validation, summaries and the client/server merge.

mod merge;
mod model;

pub use merge::{LocalLine, MergeAction, MergePlan, merge_lines};
pub use model::{
    Cart, CartItemView, CartLine, CartSummary, DEFAULT_CART_TTL_DAYS, MAX_LINE_QUANTITY,
    MIN_LINE_QUANTITY, validate_quantity,
};

use thiserror::Error;

/// Errors raised by cart rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Line quantity outside the allowed range.
    #[error(
        "Invalid quantity: {quantity} (must be between {MIN_LINE_QUANTITY} and {MAX_LINE_QUANTITY})"
    )]
    InvalidQuantity { quantity: u32 },
}
