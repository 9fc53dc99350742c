//! Payment attempts recorded against an order.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a transaction does with the customer's money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Authorization,
    Capture,
    Sale,
    Void,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Authorization => "AUTHORIZATION",
            TransactionKind::Capture => "CAPTURE",
            TransactionKind::Sale => "SALE",
            TransactionKind::Void => "VOID",
            TransactionKind::Refund => "REFUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AUTHORIZATION" => Some(TransactionKind::Authorization),
            "CAPTURE" => Some(TransactionKind::Capture),
            "SALE" => Some(TransactionKind::Sale),
            "VOID" => Some(TransactionKind::Void),
            "REFUND" => Some(TransactionKind::Refund),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a transaction. PENDING moves to exactly one terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Success,
    Failure,
    Error,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failure => "FAILURE",
            TransactionStatus::Error => "ERROR",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TransactionStatus::Pending),
            "SUCCESS" => Some(TransactionStatus::Success),
            "FAILURE" => Some(TransactionStatus::Failure),
            "ERROR" => Some(TransactionStatus::Error),
            "CANCELLED" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Transaction {id} is already {status}")]
    AlreadyFinalized {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("Transaction cannot be finalized as PENDING")]
    NotTerminal,
}

/// A payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    /// The transaction this one settles or reverses, e.g. the SALE a REFUND undoes.
    pub parent_id: Option<TransactionId>,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Money,
    pub currency: String,
    pub gateway: String,
    pub gateway_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Opens a PENDING transaction.
    pub fn pending(
        order_id: OrderId,
        kind: TransactionKind,
        amount: Money,
        currency: impl Into<String>,
        gateway: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            order_id,
            parent_id: None,
            kind,
            status: TransactionStatus::Pending,
            amount,
            currency: currency.into(),
            gateway: gateway.into(),
            gateway_reference: None,
            error_message: None,
            created_at: now,
            processed_at: None,
        }
    }

    /// Links this transaction to the one it settles or reverses.
    pub fn with_parent(mut self, parent_id: TransactionId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Records the terminal outcome. SUCCESS stamps `processed_at`.
    pub fn complete(
        &mut self,
        status: TransactionStatus,
        gateway_reference: Option<String>,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransactionError> {
        if self.status.is_terminal() {
            return Err(TransactionError::AlreadyFinalized {
                id: self.id,
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(TransactionError::NotTerminal);
        }

        self.status = status;
        self.gateway_reference = gateway_reference;
        self.error_message = error_message;
        if status == TransactionStatus::Success {
            self.processed_at = Some(now);
        }
        Ok(())
    }
}
