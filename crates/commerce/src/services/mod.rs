//! External service ports used by checkout.

pub mod payment;

pub use payment::{GatewayReceipt, PaymentError, PaymentGateway, SIMULATED_GATEWAY, SimulatedGateway};
