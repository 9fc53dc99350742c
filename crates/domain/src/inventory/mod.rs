//! Inventory ledger types: locations, movements and the derived levels.

mod level;
mod location;
mod movement;
mod summary;

pub use level::{InventoryLevel, LevelUpdate};
pub use location::{DEFAULT_LOCATION_NAME, InventoryLocation};
pub use movement::{
    InventoryMovement, MAX_MOVEMENT_QUANTITY, MovementRequest, MovementType, REFERENCE_TYPE_ORDER,
};
pub use summary::{DEFAULT_LOW_STOCK_THRESHOLD, InventorySummary};

use thiserror::Error;

/// Errors raised by inventory arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Magnitude-based movement types require a non-negative quantity.
    #[error("Invalid quantity {quantity} for {movement_type} movement (must be >= 0)")]
    NegativeQuantity {
        movement_type: MovementType,
        quantity: i64,
    },

    /// A debit would take a stock-enforcing level below zero.
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },

    /// Administrative level overwrite with a negative counter.
    #[error("Invalid level value for {field}: {value} (must be >= 0)")]
    NegativeLevel { field: &'static str, value: i64 },

    /// A single movement larger than [`MAX_MOVEMENT_QUANTITY`].
    #[error("Invalid quantity {quantity}: a movement moves at most {max} units", max = MAX_MOVEMENT_QUANTITY)]
    QuantityOutOfRange { quantity: i64 },

    /// Applying a delta would overflow a level counter.
    #[error("Level counter overflow applying delta {delta}")]
    LevelOverflow { delta: i64 },
}
