//! Payment gateway port and the simulated gateway used by default.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Money, OrderId};
use thiserror::Error;

/// Name recorded on transactions handled by [`SimulatedGateway`].
pub const SIMULATED_GATEWAY: &str = "simulated";

/// Result of an accepted charge or refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    /// Identifier assigned by the gateway.
    pub reference: String,
}

/// Reasons a gateway call did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The gateway answered and refused.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or answered with garbage.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Charges and refunds money for orders.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Name stored on the transaction rows this gateway produces.
    fn name(&self) -> &str;

    /// Captures `amount` for an order in a single step.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<GatewayReceipt, PaymentError>;

    /// Returns money captured by an earlier charge.
    async fn refund(&self, reference: &str, amount: Money) -> Result<GatewayReceipt, PaymentError>;
}

#[derive(Debug, Default)]
struct SimulatedState {
    charges: HashMap<String, (OrderId, Money)>,
    refunds: Vec<(String, Money)>,
    next_id: u32,
    fail_on_charge: bool,
}

/// Gateway that accepts every charge unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent charges fail with a decline.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_charge = fail;
    }

    /// Number of accepted charges.
    pub fn charge_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .charges
            .len()
    }

    /// Number of accepted refunds.
    pub fn refund_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refunds
            .len()
    }

    fn next_reference(state: &mut SimulatedState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{:06}", state.next_id)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &str {
        SIMULATED_GATEWAY
    }

    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        _currency: &str,
    ) -> Result<GatewayReceipt, PaymentError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_charge {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        let reference = Self::next_reference(&mut state, "SIM");
        state
            .charges
            .insert(reference.clone(), (order_id, amount));

        Ok(GatewayReceipt { reference })
    }

    async fn refund(&self, reference: &str, amount: Money) -> Result<GatewayReceipt, PaymentError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let Some((_, charged)) = state.charges.get(reference) else {
            return Err(PaymentError::Declined(format!(
                "unknown charge reference {reference}"
            )));
        };
        if amount > *charged {
            return Err(PaymentError::Declined(format!(
                "refund of {amount} exceeds captured {charged}"
            )));
        }

        let refund_reference = Self::next_reference(&mut state, "SIMR");
        state.refunds.push((reference.to_string(), amount));
        Ok(GatewayReceipt {
            reference: refund_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_then_refund() {
        let gateway = SimulatedGateway::new();
        let receipt = gateway
            .charge(OrderId::new(), Money::from_cents(5000), "USD")
            .await
            .unwrap();
        assert!(receipt.reference.starts_with("SIM-"));
        assert_eq!(gateway.charge_count(), 1);

        let refund = gateway
            .refund(&receipt.reference, Money::from_cents(5000))
            .await
            .unwrap();
        assert!(refund.reference.starts_with("SIMR-"));
        assert_eq!(gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn fail_on_charge() {
        let gateway = SimulatedGateway::new();
        gateway.set_fail_on_charge(true);

        let result = gateway
            .charge(OrderId::new(), Money::from_cents(5000), "USD")
            .await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn sequential_references() {
        let gateway = SimulatedGateway::new();
        let first = gateway
            .charge(OrderId::new(), Money::from_cents(100), "USD")
            .await
            .unwrap();
        let second = gateway
            .charge(OrderId::new(), Money::from_cents(100), "USD")
            .await
            .unwrap();
        assert_eq!(first.reference, "SIM-000001");
        assert_eq!(second.reference, "SIM-000002");
    }

    #[tokio::test]
    async fn refund_rejects_unknown_or_excessive_amounts() {
        let gateway = SimulatedGateway::new();
        assert!(gateway.refund("SIM-999999", Money::from_cents(1)).await.is_err());

        let receipt = gateway
            .charge(OrderId::new(), Money::from_cents(100), "USD")
            .await
            .unwrap();
        assert!(
            gateway
                .refund(&receipt.reference, Money::from_cents(101))
                .await
                .is_err()
        );
    }
}
