//! Checkout orchestration.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use common::{Money, OrderId, ProductId, UserId, VariantId};
use domain::order::order_number_prefix;
use domain::{
    Address, CatalogVariant, FinancialStatus, Order, OrderDraft, OrderItem, OrderStatus,
    PriceAdjustments, Transaction, TransactionKind, TransactionStatus, next_order_number,
};
use serde::{Deserialize, Serialize};
use store::{Store, StoreTx};

use crate::catalog::{ensure_purchasable, ensure_stock};
use crate::config::CommerceConfig;
use crate::error::{CommerceError, Result};
use crate::inventory::record_sale_in;
use crate::services::payment::{PaymentError, PaymentGateway};
use crate::state::CheckoutStage;

/// Body of a checkout request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutRequest {
    pub email: Option<String>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
}

/// One line of [`OrderSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryItem {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub title: String,
    pub variant_title: String,
    pub quantity: u32,
    pub price: Money,
    pub thumbnail: Option<String>,
}

/// What checkout hands back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: FinancialStatus,
    pub total: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderSummaryItem>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            payment_status: order.financial_status,
            total: order.totals.total_price,
            currency: order.currency.clone(),
            created_at: order.created_at,
            items: order
                .items
                .iter()
                .map(|item| OrderSummaryItem {
                    variant_id: item.variant_id,
                    product_id: item.product_id,
                    title: item.title.clone(),
                    variant_title: item.variant_title.clone(),
                    quantity: item.quantity,
                    price: item.price,
                    thumbnail: item.thumbnail.clone(),
                })
                .collect(),
        }
    }
}

/// Turns a user's cart into a paid order.
///
/// Validation, order creation, stock debit and cart clearing share one unit
/// of work. Variant rows are locked in id order, so concurrent checkouts of
/// overlapping carts serialize instead of overselling or deadlocking.
pub struct CheckoutOrchestrator<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    config: CommerceConfig,
}

impl<S, G> CheckoutOrchestrator<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    pub fn new(store: S, gateway: G, config: CommerceConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Checks out the user's cart now.
    pub async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<OrderSummary> {
        self.checkout_at(user_id, request, Utc::now()).await
    }

    /// Checks out the user's cart as of `now`, which also fixes the order
    /// number's date prefix.
    #[tracing::instrument(skip(self, request), fields(order_number = tracing::field::Empty))]
    pub async fn checkout_at(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderSummary> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(user_id, request, now).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(summary) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    order_id = %summary.id,
                    order_number = %summary.order_number,
                    total = %summary.total,
                    "checkout settled"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failed_total", "reason" => err.code()).increment(1);
                if err.is_client_error() {
                    tracing::warn!(code = err.code(), error = %err, "checkout rejected");
                } else {
                    tracing::error!(error = %err, "checkout failed");
                }
            }
        }
        result
    }

    async fn run(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderSummary> {
        let mut stage = CheckoutStage::Empty;
        let mut tx = self.store.begin().await?;

        // Lines are read under the cart lock so a concurrent checkout of the
        // same cart sees them already cleared.
        let mut cart = tx
            .lock_user_cart(user_id)
            .await?
            .ok_or(CommerceError::EmptyCart)?;
        let lines = tx.list_cart_lines(cart.id).await?;
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        // Lock in a global order so overlapping checkouts cannot deadlock.
        let mut lock_order: Vec<VariantId> = lines.iter().map(|l| l.variant_id).collect();
        lock_order.sort();
        lock_order.dedup();
        let mut catalog: HashMap<VariantId, CatalogVariant> = HashMap::with_capacity(lock_order.len());
        for variant_id in lock_order {
            let found = tx.lock_variant(variant_id).await?.ok_or_else(|| {
                CommerceError::ProductUnavailable(format!("variant {variant_id} no longer exists"))
            })?;
            catalog.insert(variant_id, found);
        }
        for line in &lines {
            let found = &catalog[&line.variant_id];
            ensure_purchasable(found)?;
            ensure_stock(found, i64::from(line.quantity))?;
        }
        if tx.get_location(self.config.default_location_id).await?.is_none() {
            return Err(CommerceError::Internal(format!(
                "default inventory location {} does not exist",
                self.config.default_location_id
            )));
        }
        advance(&mut stage);

        let order_id = OrderId::new();
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem::snapshot(order_id, line, &catalog[&line.variant_id]))
            .collect();
        advance(&mut stage);

        let date = now.with_timezone(&Local).date_naive();
        let last = tx.last_order_number(&order_number_prefix(date)).await?;
        let order_number = next_order_number(date, last.as_deref())?;
        tracing::Span::current().record("order_number", order_number.as_str());

        let mut order = Order::place(
            OrderDraft {
                id: order_id,
                order_number,
                user_id,
                email: request.email,
                currency: self.config.currency.clone(),
                shipping_address: request.shipping_address,
                billing_address: request.billing_address,
                notes: request.notes,
                items,
                adjustments: PriceAdjustments::default(),
            },
            now,
        )?;
        tx.insert_order(&order).await?;

        let total = order.totals.total_price;
        let mut payment = Transaction::pending(
            order.id,
            TransactionKind::Sale,
            total,
            order.currency.clone(),
            self.gateway.name(),
            now,
        );
        tx.insert_transaction(&payment).await?;
        advance(&mut stage);

        let charge = self.gateway.charge(order.id, total, &order.currency).await;
        advance(&mut stage);

        let receipt = match charge {
            Ok(receipt) => receipt,
            Err(err) => {
                let status = match err {
                    PaymentError::Declined(_) => TransactionStatus::Failure,
                    PaymentError::Unavailable(_) => TransactionStatus::Error,
                };
                payment.complete(status, None, Some(err.to_string()), now)?;
                tx.update_transaction(&payment).await?;
                tx.commit().await?;
                stage = CheckoutStage::Failed;
                tracing::warn!(%stage, order_id = %order.id, error = %err, "payment not captured");
                return Err(CommerceError::PaymentDeclined {
                    order_id: order.id,
                    order_number: order.order_number,
                    reason: err.to_string(),
                });
            }
        };

        debug_assert!(stage.can_settle());
        let reference = order.id.to_string();
        let settled = async {
            for line in &lines {
                let found = &catalog[&line.variant_id];
                let quantity = i64::from(line.quantity);
                if found.enforces_stock() {
                    if !tx.try_debit_variant(found.variant.id, quantity).await? {
                        // The row lock makes this unreachable on a conforming store.
                        return Err(CommerceError::InsufficientStock {
                            product_name: found.product.name.clone(),
                            available: found.variant.inventory_quantity.max(0),
                        });
                    }
                } else {
                    tx.set_variant_inventory(
                        found.variant.id,
                        found.variant.inventory_quantity - quantity,
                    )
                    .await?;
                }
                record_sale_in(
                    &mut tx,
                    found,
                    self.config.default_location_id,
                    line.quantity,
                    &reference,
                    now,
                )
                .await?;
            }

            tx.clear_cart_lines(cart.id).await?;
            cart.touch(now, self.config.cart_ttl);
            tx.update_cart(&cart).await?;

            order.confirm_payment(now)?;
            tx.update_order(&order).await?;
            payment.complete(
                TransactionStatus::Success,
                Some(receipt.reference.clone()),
                None,
                now,
            )?;
            tx.update_transaction(&payment).await?;
            tx.commit().await?;
            Ok::<_, CommerceError>(())
        }
        .await;

        if let Err(err) = settled {
            // Nothing of the order survives the rollback, so the capture is
            // returned.
            self.refund_quietly(&receipt.reference, total).await;
            return Err(err);
        }
        advance(&mut stage);

        Ok(OrderSummary::from(&order))
    }

    async fn refund_quietly(&self, reference: &str, amount: Money) {
        metrics::counter!("checkout_refunds_total").increment(1);
        match self.gateway.refund(reference, amount).await {
            Ok(_) => tracing::warn!(reference, %amount, "aborted checkout refunded"),
            Err(err) => {
                tracing::error!(reference, error = %err, "refund of aborted checkout failed")
            }
        }
    }
}

fn advance(stage: &mut CheckoutStage) {
    if let Some(next) = stage.next() {
        *stage = next;
        tracing::debug!(stage = %next, "checkout stage reached");
    }
}
