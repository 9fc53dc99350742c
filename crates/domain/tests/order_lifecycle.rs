//! Integration tests for the order lifecycle built from a cart.
//!
//! These tests drive the public domain API the way checkout and the admin
//! endpoints do: snapshot cart lines into an order, settle payment, then
//! walk the status machine.

use chrono::{Duration, NaiveDate, Utc};
use common::{Money, OrderId, ProductId, Properties, UserId, VariantId};
use domain::{
    Cart, CartLine, CatalogVariant, FinancialStatus, FulfillmentStatus, InventoryPolicy, Order,
    OrderDraft, OrderError, OrderItem, OrderStatus, PriceAdjustments, Product, ProductVariant,
    Transaction, TransactionKind, TransactionStatus, next_order_number,
};

fn catalog(name: &str, price_cents: i64, stock: i64) -> CatalogVariant {
    let product_id = ProductId::new();
    CatalogVariant {
        variant: ProductVariant {
            id: VariantId::new(),
            product_id,
            title: "Default".to_string(),
            sku: Some(format!("SKU-{name}")),
            is_active: true,
            price: Money::from_cents(price_cents),
            inventory_policy: InventoryPolicy::Deny,
            inventory_quantity: stock,
        },
        product: Product {
            id: product_id,
            name: name.to_string(),
            is_active: true,
            brand: Some("Acme".to_string()),
            thumbnail: Some(format!("https://cdn.example.com/{name}.png")),
        },
    }
}

fn place_from_cart(lines: &[(CatalogVariant, u32)]) -> Order {
    let now = Utc::now();
    let user = UserId::new();
    let cart = Cart::for_user(user, "USD", now, Duration::days(7));
    let order_id = OrderId::new();
    let items = lines
        .iter()
        .map(|(cv, qty)| {
            let line = CartLine::new(cart.id, cv.variant.id, *qty, Properties::new(), now).unwrap();
            OrderItem::snapshot(order_id, &line, cv)
        })
        .collect();
    let day = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();

    Order::place(
        OrderDraft {
            id: order_id,
            order_number: next_order_number(day, None).unwrap(),
            user_id: user,
            email: Some("buyer@example.com".to_string()),
            currency: cart.currency.clone(),
            shipping_address: None,
            billing_address: None,
            notes: Some("leave at the door".to_string()),
            items,
            adjustments: PriceAdjustments::default(),
        },
        now,
    )
    .unwrap()
}

mod checkout_shape {
    use super::*;

    #[test]
    fn two_line_order_totals_and_snapshot() {
        let a = catalog("a", 5000, 10);
        let b = catalog("b", 2500, 5);
        let order = place_from_cart(&[(a.clone(), 2), (b, 1)]);

        assert_eq!(order.order_number, "202412250001");
        assert_eq!(order.totals.subtotal_price.to_string(), "125.00");
        assert_eq!(order.totals.total_price.to_string(), "125.00");
        assert!(order.totals.is_consistent());

        let item_sum: Money = order.items.iter().map(OrderItem::line_total).sum();
        assert_eq!(item_sum, order.totals.subtotal_price);

        let first = &order.items[0];
        assert_eq!(first.title, "a");
        assert_eq!(first.vendor.as_deref(), Some("Acme"));
        assert_eq!(first.sku.as_deref(), Some("SKU-a"));
        assert_eq!(first.thumbnail.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn snapshot_survives_catalog_price_change() {
        let mut a = catalog("a", 5000, 10);
        let order = place_from_cart(&[(a.clone(), 1)]);
        a.variant.price = Money::from_cents(9900);
        assert_eq!(order.items[0].price.cents(), 5000);
    }
}

mod status_machine {
    use super::*;

    #[test]
    fn full_happy_path() {
        let mut order = place_from_cart(&[(catalog("a", 1000, 3), 1)]);
        let mut sale = Transaction::pending(
            order.id,
            TransactionKind::Sale,
            order.totals.total_price,
            "USD",
            "simulated",
            Utc::now(),
        );

        sale.complete(TransactionStatus::Success, Some("sim_1".into()), None, Utc::now())
            .unwrap();
        order.confirm_payment(Utc::now()).unwrap();
        assert_eq!(order.financial_status, FinancialStatus::Paid);

        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            assert!(order.transition_to(next, Utc::now()).unwrap());
        }
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Fulfilled);
        assert!(order.cancel(Utc::now()).is_err());
    }

    #[test]
    fn terminal_states_reject_everything_else() {
        let mut order = place_from_cart(&[(catalog("a", 1000, 3), 1)]);
        order.cancel(Utc::now()).unwrap();

        for next in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Refunded,
        ] {
            assert!(matches!(
                order.transition_to(next, Utc::now()),
                Err(OrderError::InvalidStatusTransition { .. })
            ));
        }
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn logical_removal_keeps_the_order() {
        let mut order = place_from_cart(&[(catalog("a", 1000, 3), 1)]);
        order.deactivate(Utc::now());
        assert!(!order.is_active);
        assert_eq!(order.items.len(), 1);
    }
}
