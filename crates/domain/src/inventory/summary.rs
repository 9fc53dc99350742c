use serde::{Deserialize, Serialize};

/// Variants at or below this availability count as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Dashboard counters over the whole inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub active_variants: u64,
    pub active_locations: u64,
    pub low_stock_variants: u64,
    pub out_of_stock_variants: u64,
    pub total_stock_units: i64,
}
