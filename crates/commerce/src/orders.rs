//! Order reads and administrative state changes.

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{
    Order, OrderError, OrderStatus, Transaction, TransactionKind, TransactionStatus,
};
use serde::{Deserialize, Serialize};
use store::{OrderQuery, Store, StoreTx};

use crate::error::{CommerceError, Result};
use crate::services::payment::PaymentGateway;

/// Largest page size served by listings.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A page of orders plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

/// Pagination parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Page {
    fn resolve(self) -> (usize, usize) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or(0))
    }
}

/// Reads orders for their owners and applies administrative changes.
pub struct OrderService<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
}

impl<S, G> OrderService<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// The user's active orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_my_orders(&self, user_id: UserId, page: Page) -> Result<OrderPage> {
        self.list(OrderQuery::for_user(user_id), page).await
    }

    /// One of the user's orders. Orders of other users are forbidden and
    /// removed orders are not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_my_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let order = require_order(&mut tx, order_id).await?;
        tx.commit().await?;
        ensure_visible_to(&order, user_id)?;
        Ok(order)
    }

    /// Cancels one of the user's own orders.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_my_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        ensure_visible_to(&order, user_id)?;

        order.cancel(Utc::now())?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(order_number = %order.order_number, "order cancelled by customer");
        Ok(order)
    }

    /// Every order matching the filter, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery, page: Page) -> Result<OrderPage> {
        self.list(query, page).await
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let order = require_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Moves an order through its state machine.
    ///
    /// Moving to REFUNDED first refunds the captured SALE through the
    /// gateway and records a REFUND transaction. Requesting the current
    /// status is a no-op.
    #[tracing::instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        notes: Option<&str>,
    ) -> Result<Order> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;

        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: status,
            }
            .into());
        }
        if status == OrderStatus::Refunded && order.status != OrderStatus::Refunded {
            let refund = self.refund(&mut tx, &order).await?;
            if refund.status != TransactionStatus::Success {
                tx.commit().await?;
                return Err(CommerceError::PaymentDeclined {
                    order_id: order.id,
                    order_number: order.order_number,
                    reason: refund
                        .error_message
                        .unwrap_or_else(|| "refund failed".to_string()),
                });
            }
        }

        let from = order.status;
        let changed = order.transition_to(status, now)?;
        let noted = notes.is_some_and(|note| order.append_note(note, now));
        if changed || noted {
            tx.update_order(&order).await?;
        }
        if changed {
            tracing::info!(order_number = %order.order_number, %from, to = %status, "order status changed");
        }
        tx.commit().await?;
        Ok(order)
    }

    /// Hides an order from listings. The row and its items are kept.
    #[tracing::instrument(skip(self))]
    pub async fn remove_order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        if order.is_active {
            order.deactivate(Utc::now());
            tx.update_order(&order).await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    /// Payment attempts of an order, oldest first.
    pub async fn list_transactions(&self, order_id: OrderId) -> Result<Vec<Transaction>> {
        let mut tx = self.store.begin().await?;
        require_order(&mut tx, order_id).await?;
        let transactions = tx.list_transactions(order_id).await?;
        tx.commit().await?;
        Ok(transactions)
    }

    async fn list(&self, query: OrderQuery, page: Page) -> Result<OrderPage> {
        let (limit, offset) = page.resolve();
        let mut tx = self.store.begin().await?;
        let total = tx.count_orders(&query).await?;
        let orders = tx
            .list_orders(&query.limit(limit).offset(offset))
            .await?;
        tx.commit().await?;
        Ok(OrderPage {
            orders,
            total,
            limit,
            offset,
        })
    }

    /// Refunds the order's captured SALE and records the outcome.
    async fn refund(&self, tx: &mut S::Tx, order: &Order) -> Result<Transaction> {
        let sale = tx
            .list_transactions(order.id)
            .await?
            .into_iter()
            .find(|t| t.kind == TransactionKind::Sale && t.status == TransactionStatus::Success)
            .ok_or_else(|| {
                CommerceError::InvalidOrderStatus(format!(
                    "order {} has no captured payment to refund",
                    order.order_number
                ))
            })?;
        let sale_reference = sale.gateway_reference.clone().unwrap_or_default();

        let now = Utc::now();
        let mut refund = Transaction::pending(
            order.id,
            TransactionKind::Refund,
            sale.amount,
            sale.currency.clone(),
            self.gateway.name(),
            now,
        )
        .with_parent(sale.id);
        tx.insert_transaction(&refund).await?;

        match self.gateway.refund(&sale_reference, sale.amount).await {
            Ok(receipt) => {
                refund.complete(TransactionStatus::Success, Some(receipt.reference), None, now)?;
            }
            Err(err) => {
                tracing::warn!(order_number = %order.order_number, error = %err, "refund rejected");
                refund.complete(TransactionStatus::Failure, None, Some(err.to_string()), now)?;
            }
        }
        tx.update_transaction(&refund).await?;
        Ok(refund)
    }
}

async fn require_order<T: StoreTx>(tx: &mut T, id: OrderId) -> Result<Order> {
    tx.get_order(id)
        .await?
        .ok_or_else(|| CommerceError::not_found("Order", id))
}

async fn lock_order<T: StoreTx>(tx: &mut T, id: OrderId) -> Result<Order> {
    tx.lock_order(id)
        .await?
        .ok_or_else(|| CommerceError::not_found("Order", id))
}

fn ensure_visible_to(order: &Order, user_id: UserId) -> Result<()> {
    if !order.is_active {
        return Err(CommerceError::not_found("Order", order.id));
    }
    if !order.is_owned_by(user_id) {
        return Err(CommerceError::Forbidden(
            "order belongs to another user".to_string(),
        ));
    }
    Ok(())
}
