//! Order header and its immutable item snapshot.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, Properties, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::{
    FinancialStatus, FulfillmentStatus, OrderError, OrderStatus, OrderTotals, PriceAdjustments,
};
use crate::cart::CartLine;
use crate::catalog::CatalogVariant;

/// Postal address captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub province: Option<String>,
    pub country: String,
    pub zip: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Snapshot of a purchased line. Never changes after the order is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at checkout time.
    pub price: Money,
    pub title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub vendor: Option<String>,
    pub thumbnail: Option<String>,
    pub properties: Properties,
}

impl OrderItem {
    /// Copies the catalog fields a line needs to outlive catalog edits.
    pub fn snapshot(order_id: OrderId, line: &CartLine, catalog: &CatalogVariant) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            variant_id: line.variant_id,
            product_id: catalog.product.id,
            quantity: line.quantity,
            price: catalog.variant.price,
            title: catalog.product.name.clone(),
            variant_title: catalog.variant.title.clone(),
            sku: catalog.variant.sku.clone(),
            vendor: catalog.product.brand.clone(),
            thumbnail: catalog.product.thumbnail.clone(),
            properties: line.properties.clone(),
        }
    }

    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// Everything checkout knows about an order before it is written.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub email: Option<String>,
    pub currency: String,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub adjustments: PriceAdjustments,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub email: Option<String>,
    pub status: OrderStatus,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub currency: String,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub notes: Option<String>,
    /// Logical removal flag; removed orders stay in storage.
    pub is_active: bool,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a PENDING order from a draft, computing its totals.
    pub fn place(draft: OrderDraft, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if draft.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        let totals = OrderTotals::compute(
            draft.items.iter().map(|item| (item.price, item.quantity)),
            draft.adjustments,
        );

        Ok(Self {
            id: draft.id,
            order_number: draft.order_number,
            user_id: draft.user_id,
            email: draft.email,
            status: OrderStatus::Pending,
            financial_status: FinancialStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            totals,
            currency: draft.currency,
            shipping_address: draft.shipping_address,
            billing_address: draft.billing_address,
            notes: draft.notes,
            is_active: true,
            items: draft.items,
            created_at: now,
            updated_at: now,
            processed_at: None,
            cancelled_at: None,
        })
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Total number of units across all items.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Marks a PENDING order as paid and confirmed.
    pub fn confirm_payment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: OrderStatus::Confirmed,
            });
        }
        self.status = OrderStatus::Confirmed;
        self.financial_status = FinancialStatus::Paid;
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Moves the order to `to`, stamping timestamps and syncing the
    /// financial and fulfillment statuses.
    ///
    /// Returns `Ok(false)` when `to` equals the current status; nothing is
    /// changed in that case.
    pub fn transition_to(&mut self, to: OrderStatus, now: DateTime<Utc>) -> Result<bool, OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        if self.status == to {
            return Ok(false);
        }

        self.status = to;
        match to {
            OrderStatus::Processing => self.processed_at = Some(now),
            OrderStatus::Shipped | OrderStatus::Delivered => {
                self.fulfillment_status = FulfillmentStatus::Fulfilled;
            }
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
                if matches!(
                    self.financial_status,
                    FinancialStatus::Pending | FinancialStatus::Authorized
                ) {
                    self.financial_status = FinancialStatus::Voided;
                }
            }
            OrderStatus::Refunded => self.financial_status = FinancialStatus::Refunded,
            OrderStatus::Pending | OrderStatus::Confirmed => {}
        }
        self.updated_at = now;
        Ok(true)
    }

    /// Cancels the order if its status permits it.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::CannotCancel {
                status: self.status,
            });
        }
        self.transition_to(OrderStatus::Cancelled, now)?;
        Ok(())
    }

    /// Appends an operator note on its own line. Blank notes are ignored
    /// and return false.
    pub fn append_note(&mut self, note: &str, now: DateTime<Utc>) -> bool {
        let note = note.trim();
        if note.is_empty() {
            return false;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{note}"),
            _ => note.to_string(),
        });
        self.updated_at = now;
        true
    }

    /// Hides the order from listings without deleting it.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}
