use chrono::{DateTime, Utc};
use common::LocationId;
use serde::{Deserialize, Serialize};

/// Name of the location bootstrapped when no default location is configured.
pub const DEFAULT_LOCATION_NAME: &str = "Almacén Principal";

/// A logical stock point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLocation {
    pub id: LocationId,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLocation {
    pub fn new(name: impl Into<String>, address: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: LocationId::new(),
            name: name.into(),
            address,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
