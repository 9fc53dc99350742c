//! Checkout progress tracking.

use serde::{Deserialize, Serialize};

/// How far a single checkout request got.
///
/// Stage transitions:
/// ```text
/// Empty ──► Validated ──► Priced ──► OrderCreated ──► PaymentAttempted ──┬──► Settled
///                                                                         └──► Failed
/// ```
///
/// A request that errors before `PaymentAttempted` leaves nothing behind;
/// its unit of work is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStage {
    /// Cart loaded, nothing checked yet.
    #[default]
    Empty,

    /// Every line passed the availability and stock checks.
    Validated,

    /// Totals computed from live prices.
    Priced,

    /// PENDING order and its items written.
    OrderCreated,

    /// The gateway has been called.
    PaymentAttempted,

    /// Stock debited, cart cleared, order confirmed (terminal).
    Settled,

    /// Payment refused; order left PENDING (terminal).
    Failed,
}

impl CheckoutStage {
    /// Returns the stage that follows a successful step, if any.
    pub fn next(&self) -> Option<CheckoutStage> {
        match self {
            CheckoutStage::Empty => Some(CheckoutStage::Validated),
            CheckoutStage::Validated => Some(CheckoutStage::Priced),
            CheckoutStage::Priced => Some(CheckoutStage::OrderCreated),
            CheckoutStage::OrderCreated => Some(CheckoutStage::PaymentAttempted),
            CheckoutStage::PaymentAttempted => Some(CheckoutStage::Settled),
            CheckoutStage::Settled | CheckoutStage::Failed => None,
        }
    }

    /// Returns true if a payment outcome can be recorded.
    pub fn can_settle(&self) -> bool {
        matches!(self, CheckoutStage::PaymentAttempted)
    }

    /// Returns true if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutStage::Settled | CheckoutStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::Empty => "EMPTY",
            CheckoutStage::Validated => "VALIDATED",
            CheckoutStage::Priced => "PRICED",
            CheckoutStage::OrderCreated => "ORDER_CREATED",
            CheckoutStage::PaymentAttempted => "PAYMENT_ATTEMPTED",
            CheckoutStage::Settled => "SETTLED",
            CheckoutStage::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stage_is_empty() {
        assert_eq!(CheckoutStage::default(), CheckoutStage::Empty);
    }

    #[test]
    fn happy_path_reaches_settled() {
        let mut stage = CheckoutStage::default();
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            visited.push(stage);
        }
        assert_eq!(
            visited,
            vec![
                CheckoutStage::Empty,
                CheckoutStage::Validated,
                CheckoutStage::Priced,
                CheckoutStage::OrderCreated,
                CheckoutStage::PaymentAttempted,
                CheckoutStage::Settled,
            ]
        );
    }

    #[test]
    fn only_payment_attempted_can_settle() {
        assert!(CheckoutStage::PaymentAttempted.can_settle());
        assert!(!CheckoutStage::OrderCreated.can_settle());
        assert!(!CheckoutStage::Settled.can_settle());
    }

    #[test]
    fn terminal_stages() {
        assert!(CheckoutStage::Settled.is_terminal());
        assert!(CheckoutStage::Failed.is_terminal());
        assert!(!CheckoutStage::PaymentAttempted.is_terminal());
        assert_eq!(CheckoutStage::Failed.next(), None);
    }

    #[test]
    fn display() {
        assert_eq!(CheckoutStage::OrderCreated.to_string(), "ORDER_CREATED");
    }
}
