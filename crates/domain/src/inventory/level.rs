use chrono::{DateTime, Utc};
use common::{LocationId, VariantId};
use serde::{Deserialize, Serialize};

use super::InventoryError;
use crate::catalog::InventoryPolicy;

/// Cached counters for one (variant, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLevel {
    pub variant_id: VariantId,
    pub location_id: LocationId,
    pub available: i64,
    pub committed: i64,
    pub on_hand: i64,
    pub reserved: i64,
    pub updated_at: DateTime<Utc>,
}

/// Administrative overwrite; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUpdate {
    pub available: Option<i64>,
    pub committed: Option<i64>,
    pub on_hand: Option<i64>,
    pub reserved: Option<i64>,
}

impl LevelUpdate {
    fn validate(&self) -> Result<(), InventoryError> {
        let fields = [
            ("available", self.available),
            ("committed", self.committed),
            ("on_hand", self.on_hand),
            ("reserved", self.reserved),
        ];
        for (field, value) in fields {
            if let Some(value) = value
                && value < 0
            {
                return Err(InventoryError::NegativeLevel { field, value });
            }
        }
        Ok(())
    }
}

impl InventoryLevel {
    /// A zeroed level, used the first time a pair is touched.
    pub fn empty(variant_id: VariantId, location_id: LocationId, now: DateTime<Utc>) -> Self {
        Self {
            variant_id,
            location_id,
            available: 0,
            committed: 0,
            on_hand: 0,
            reserved: 0,
            updated_at: now,
        }
    }

    /// Rejects a debit that would take a DENY-policy level below zero.
    pub fn check_delta(&self, delta: i64, policy: InventoryPolicy) -> Result<(), InventoryError> {
        if policy == InventoryPolicy::Deny && delta < 0 && self.available.saturating_add(delta) < 0 {
            return Err(InventoryError::InsufficientStock {
                available: self.available,
                requested: -delta,
            });
        }
        Ok(())
    }

    /// Applies a signed delta to `available` and `on_hand`, clamping at zero.
    ///
    /// The level is left untouched when either counter would overflow.
    pub fn apply_delta(&mut self, delta: i64, now: DateTime<Utc>) -> Result<(), InventoryError> {
        let overflow = || InventoryError::LevelOverflow { delta };
        let available = self.available.checked_add(delta).ok_or_else(overflow)?;
        let on_hand = self.on_hand.checked_add(delta).ok_or_else(overflow)?;
        self.available = available.max(0);
        self.on_hand = on_hand.max(0);
        self.updated_at = now;
        Ok(())
    }

    /// Overwrites the provided counters.
    pub fn apply_update(&mut self, update: &LevelUpdate, now: DateTime<Utc>) -> Result<(), InventoryError> {
        update.validate()?;
        if let Some(available) = update.available {
            self.available = available;
        }
        if let Some(committed) = update.committed {
            self.committed = committed;
        }
        if let Some(on_hand) = update.on_hand {
            self.on_hand = on_hand;
        }
        if let Some(reserved) = update.reserved {
            self.reserved = reserved;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(available: i64, on_hand: i64) -> InventoryLevel {
        let mut level = InventoryLevel::empty(VariantId::new(), LocationId::new(), Utc::now());
        level.available = available;
        level.on_hand = on_hand;
        level
    }

    #[test]
    fn restock_then_sale() {
        let mut l = level(0, 0);
        l.apply_delta(10, Utc::now()).unwrap();
        assert_eq!((l.available, l.on_hand), (10, 10));
        l.apply_delta(-2, Utc::now()).unwrap();
        assert_eq!((l.available, l.on_hand), (8, 8));
    }

    #[test]
    fn clamps_at_zero() {
        let mut l = level(1, 3);
        l.apply_delta(-2, Utc::now()).unwrap();
        assert_eq!(l.available, 0);
        assert_eq!(l.on_hand, 1);
    }

    #[test]
    fn overflow_leaves_level_unchanged() {
        let mut l = level(5, 5);
        assert_eq!(
            l.apply_delta(i64::MAX, Utc::now()),
            Err(InventoryError::LevelOverflow { delta: i64::MAX })
        );
        assert_eq!((l.available, l.on_hand), (5, 5));
        assert!(l.check_delta(i64::MIN, InventoryPolicy::Deny).is_err());
    }

    #[test]
    fn deny_policy_rejects_overdraw() {
        let l = level(2, 2);
        assert!(l.check_delta(-2, InventoryPolicy::Deny).is_ok());
        assert_eq!(
            l.check_delta(-3, InventoryPolicy::Deny),
            Err(InventoryError::InsufficientStock {
                available: 2,
                requested: 3
            })
        );
        assert!(l.check_delta(-3, InventoryPolicy::Allow).is_ok());
        assert!(l.check_delta(5, InventoryPolicy::Deny).is_ok());
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let mut l = level(5, 7);
        l.reserved = 1;
        let update = LevelUpdate {
            available: Some(9),
            committed: Some(2),
            ..LevelUpdate::default()
        };
        l.apply_update(&update, Utc::now()).unwrap();
        assert_eq!((l.available, l.committed, l.on_hand, l.reserved), (9, 2, 7, 1));
    }

    #[test]
    fn update_rejects_negative_values() {
        let mut l = level(5, 5);
        let update = LevelUpdate {
            on_hand: Some(-1),
            ..LevelUpdate::default()
        };
        assert!(matches!(
            l.apply_update(&update, Utc::now()),
            Err(InventoryError::NegativeLevel { field: "on_hand", .. })
        ));
        assert_eq!(l.on_hand, 5);
    }
}
