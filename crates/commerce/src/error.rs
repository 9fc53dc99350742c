//! Service error taxonomy.

use common::{OrderId, PropertiesError};
use domain::{CartError, InventoryError, OrderError, TransactionError};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the commerce services.
///
/// Every variant except [`CommerceError::Store`] and
/// [`CommerceError::Internal`] is a client error that must not be retried.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Checkout of a cart without lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A stock-enforcing variant cannot cover the requested quantity.
    #[error("Insufficient stock for {product_name}: only {available} available")]
    InsufficientStock {
        product_name: String,
        available: i64,
    },

    /// The variant or its product is inactive.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The principal does not own the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The order state machine rejected the operation.
    #[error("Invalid order status: {0}")]
    InvalidOrderStatus(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Malformed input that passed transport-level parsing.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The gateway refused the charge. The order stays PENDING.
    #[error("Payment declined for order {order_number}: {reason}")]
    PaymentDeclined {
        order_id: OrderId,
        order_number: String,
        reason: String,
    },

    /// An invariant the services rely on did not hold.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl CommerceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CommerceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a ledger arithmetic error, naming the product for stock errors.
    pub fn from_inventory(err: InventoryError, product_name: &str) -> Self {
        match err {
            InventoryError::InsufficientStock { available, .. } => {
                CommerceError::InsufficientStock {
                    product_name: product_name.to_string(),
                    available,
                }
            }
            other => CommerceError::Validation(other.to_string()),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CommerceError::EmptyCart => "EMPTY_CART",
            CommerceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CommerceError::ProductUnavailable(_) => "PRODUCT_UNAVAILABLE",
            CommerceError::NotFound { .. } => "NOT_FOUND",
            CommerceError::Forbidden(_) => "FORBIDDEN",
            CommerceError::InvalidOrderStatus(_) => "INVALID_ORDER_STATUS",
            CommerceError::AlreadyExists(_) => "RESOURCE_ALREADY_EXISTS",
            CommerceError::Validation(_) => "VALIDATION_ERROR",
            CommerceError::PaymentDeclined { .. } => "PAYMENT_DECLINED",
            CommerceError::Internal(_) | CommerceError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for errors caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CommerceError::Internal(_) | CommerceError::Store(_))
    }
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CommerceError::NotFound { entity, id },
            StoreError::UniqueViolation { entity, key } => {
                CommerceError::AlreadyExists(format!("{entity} {key}"))
            }
            other => CommerceError::Store(other),
        }
    }
}

impl From<CartError> for CommerceError {
    fn from(err: CartError) -> Self {
        CommerceError::Validation(err.to_string())
    }
}

impl From<PropertiesError> for CommerceError {
    fn from(err: PropertiesError) -> Self {
        CommerceError::Validation(err.to_string())
    }
}

impl From<OrderError> for CommerceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatusTransition { .. } | OrderError::CannotCancel { .. } => {
                CommerceError::InvalidOrderStatus(err.to_string())
            }
            OrderError::NoItems => CommerceError::EmptyCart,
            OrderError::InvalidOrderNumber(_) | OrderError::SequenceExhausted { .. } => {
                CommerceError::Internal(err.to_string())
            }
        }
    }
}

impl From<TransactionError> for CommerceError {
    fn from(err: TransactionError) -> Self {
        CommerceError::Internal(err.to_string())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, CommerceError>;
