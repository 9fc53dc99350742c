//! Shared types for the checkout and inventory core.
//!
//! Everything here is plain data: strongly typed identifiers, an integer
//! money amount, and the bounded property map attached to cart and order
//! lines.

pub mod money;
pub mod properties;
pub mod types;

pub use money::Money;
pub use properties::{Properties, PropertiesError, PropertyValue};
pub use types::{
    CartId, CartLineId, LocationId, MovementId, OrderId, OrderItemId, ProductId, TransactionId,
    UserId, VariantId,
};
