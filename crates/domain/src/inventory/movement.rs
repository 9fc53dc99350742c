use chrono::{DateTime, Utc};
use common::{LocationId, MovementId, VariantId};
use serde::{Deserialize, Serialize};

use super::InventoryError;

/// Reference type stamped on movements written by checkout.
pub const REFERENCE_TYPE_ORDER: &str = "ORDER";

/// Largest magnitude a single movement may carry.
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000_000;

/// Kind of stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Restock,
    Sale,
    Order,
    Adjustment,
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Restock => "RESTOCK",
            MovementType::Sale => "SALE",
            MovementType::Order => "ORDER",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Return => "RETURN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RESTOCK" => Some(MovementType::Restock),
            "SALE" => Some(MovementType::Sale),
            "ORDER" => Some(MovementType::Order),
            "ADJUSTMENT" => Some(MovementType::Adjustment),
            "RETURN" => Some(MovementType::Return),
            _ => None,
        }
    }

    /// Returns true when the caller's quantity is already a signed delta.
    pub fn is_signed(&self) -> bool {
        matches!(self, MovementType::Adjustment)
    }

    /// Converts a caller quantity into the signed delta applied to levels.
    ///
    /// RESTOCK and RETURN add the magnitude, SALE and ORDER subtract it, and
    /// ADJUSTMENT passes its signed value through unchanged.
    pub fn signed_delta(&self, quantity: i64) -> Result<i64, InventoryError> {
        if !self.is_signed() && quantity < 0 {
            return Err(InventoryError::NegativeQuantity {
                movement_type: *self,
                quantity,
            });
        }
        if quantity.checked_abs().is_none_or(|q| q > MAX_MOVEMENT_QUANTITY) {
            return Err(InventoryError::QuantityOutOfRange { quantity });
        }
        Ok(match self {
            MovementType::Restock | MovementType::Return => quantity,
            MovementType::Sale | MovementType::Order => -quantity,
            MovementType::Adjustment => quantity,
        })
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller request to record a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub variant_id: VariantId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    /// Magnitude for every type except ADJUSTMENT, where it is a signed delta.
    pub quantity: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
}

impl MovementRequest {
    pub fn new(
        variant_id: VariantId,
        location_id: LocationId,
        movement_type: MovementType,
        quantity: i64,
    ) -> Self {
        Self {
            variant_id,
            location_id,
            movement_type,
            quantity,
            reference_type: None,
            reference_id: None,
            notes: None,
        }
    }

    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Immutable ledger entry.
///
/// `quantity` is always the magnitude; `delta` is the signed change that was
/// applied to the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: MovementId,
    pub variant_id: VariantId,
    pub location_id: LocationId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub delta: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Builds the ledger entry for a request.
    pub fn from_request(request: MovementRequest, now: DateTime<Utc>) -> Result<Self, InventoryError> {
        let delta = request.movement_type.signed_delta(request.quantity)?;
        Ok(Self {
            id: MovementId::new(),
            variant_id: request.variant_id,
            location_id: request.location_id,
            movement_type: request.movement_type,
            quantity: delta.abs(),
            delta,
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            notes: request.notes,
            created_at: now,
        })
    }
}
