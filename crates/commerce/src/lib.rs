//! Commerce services: carts, checkout, the inventory ledger and orders.
//!
//! Services are generic over a [`store::Store`] and run every operation in a
//! single unit of work, so a failed operation leaves nothing behind.
//!
//! Checkout follows these stages:
//! 1. Lock and validate every cart variant
//! 2. Price the lines and create a PENDING order
//! 3. Charge the payment gateway
//! 4. Debit stock, clear the cart and confirm the order
//!
//! A declined payment keeps the PENDING order and its failed transaction;
//! stock and cart are untouched.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inventory;
pub mod orders;
pub mod services;
pub mod state;

pub use cart::{AddLine, CartService, SyncLine, UpdateLine};
pub use checkout::{CheckoutOrchestrator, CheckoutRequest, OrderSummary, OrderSummaryItem};
pub use config::CommerceConfig;
pub use error::{CommerceError, Result};
pub use inventory::{InventoryLedger, LocationUpdate, NewLocation};
pub use orders::{OrderPage, OrderService, Page};
pub use services::{GatewayReceipt, PaymentError, PaymentGateway, SimulatedGateway};
pub use state::CheckoutStage;

#[cfg(test)]
pub(crate) mod testing {
    use common::{Money, ProductId, VariantId};
    use domain::{CatalogVariant, InventoryLocation, InventoryPolicy, Product, ProductVariant};
    use store::{InMemoryStore, Store, StoreTx};

    use super::*;

    /// Every service wired to one in-memory store.
    pub struct Fixture {
        pub store: InMemoryStore,
        pub gateway: SimulatedGateway,
        pub config: CommerceConfig,
        pub location: InventoryLocation,
        pub carts: CartService<InMemoryStore>,
        pub ledger: InventoryLedger<InMemoryStore>,
        pub checkout: CheckoutOrchestrator<InMemoryStore, SimulatedGateway>,
        pub orders: OrderService<InMemoryStore, SimulatedGateway>,
    }

    impl Fixture {
        pub async fn new() -> Self {
            let store = InMemoryStore::new();
            let gateway = SimulatedGateway::new();
            let ledger = InventoryLedger::new(store.clone(), 10);
            let location = ledger
                .ensure_location(domain::inventory::DEFAULT_LOCATION_NAME)
                .await
                .unwrap();
            let config = CommerceConfig::new(location.id);

            Self {
                carts: CartService::new(store.clone(), config.clone()),
                checkout: CheckoutOrchestrator::new(store.clone(), gateway.clone(), config.clone()),
                orders: OrderService::new(store.clone(), gateway.clone()),
                ledger,
                location,
                config,
                gateway,
                store,
            }
        }
    }

    pub async fn seed_variant(
        store: &InMemoryStore,
        name: &str,
        price_cents: i64,
        stock: i64,
        policy: InventoryPolicy,
    ) -> CatalogVariant {
        let product = Product {
            id: ProductId::new(),
            name: name.to_string(),
            is_active: true,
            brand: None,
            thumbnail: Some(format!("https://cdn.example.com/{name}.jpg")),
        };
        let variant = ProductVariant {
            id: VariantId::new(),
            product_id: product.id,
            title: "Default".to_string(),
            sku: None,
            is_active: true,
            price: Money::from_cents(price_cents),
            inventory_policy: policy,
            inventory_quantity: stock,
        };
        let mut tx = store.begin().await.unwrap();
        tx.upsert_product(&product).await.unwrap();
        tx.upsert_variant(&variant).await.unwrap();
        tx.commit().await.unwrap();
        CatalogVariant { variant, product }
    }
}
