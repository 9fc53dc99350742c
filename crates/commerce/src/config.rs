use chrono::Duration;
use common::LocationId;
use domain::cart::DEFAULT_CART_TTL_DAYS;
use domain::inventory::DEFAULT_LOW_STOCK_THRESHOLD;

/// Default ISO currency for carts and orders.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Settings shared by the commerce services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommerceConfig {
    /// Location debited by checkout.
    pub default_location_id: LocationId,
    pub currency: String,
    /// Lifetime of a cart after its last mutation.
    pub cart_ttl: Duration,
    /// Variants at or below this availability count as low stock.
    pub low_stock_threshold: i64,
}

impl CommerceConfig {
    pub fn new(default_location_id: LocationId) -> Self {
        Self {
            default_location_id,
            currency: DEFAULT_CURRENCY.to_string(),
            cart_ttl: Duration::days(DEFAULT_CART_TTL_DAYS),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_cart_ttl(mut self, ttl: Duration) -> Self {
        self.cart_ttl = ttl;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}
