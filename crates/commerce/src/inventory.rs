//! Inventory ledger service.
//!
//! Movements are the source of truth. Every movement is appended and its
//! signed delta applied to the (variant, location) level in the same unit of
//! work, and the variant's `inventory_quantity` is re-derived as the sum of
//! `available` across locations.

use chrono::{DateTime, Utc};
use common::{LocationId, VariantId};
use domain::{
    CatalogVariant, InventoryLevel, InventoryLocation, InventoryMovement, InventorySummary,
    LevelUpdate, MovementRequest, MovementType,
};
use serde::{Deserialize, Serialize};
use store::{LevelQuery, MovementQuery, Store, StoreTx};

use crate::error::{CommerceError, Result};

/// Body of a location create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial location update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Records stock movements and serves inventory reads.
pub struct InventoryLedger<S: Store> {
    store: S,
    low_stock_threshold: i64,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: S, low_stock_threshold: i64) -> Self {
        Self {
            store,
            low_stock_threshold,
        }
    }

    /// Appends a movement and applies it to levels and the variant counter.
    #[tracing::instrument(skip(self, request), fields(
        variant_id = %request.variant_id,
        location_id = %request.location_id,
        movement_type = %request.movement_type,
        quantity = request.quantity,
    ))]
    pub async fn record_movement(&self, request: MovementRequest) -> Result<InventoryMovement> {
        let mut tx = self.store.begin().await?;
        let movement = record_movement_in(&mut tx, request, Utc::now()).await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Overwrites level counters without writing a movement.
    #[tracing::instrument(skip(self))]
    pub async fn update_level(
        &self,
        variant_id: VariantId,
        location_id: LocationId,
        update: LevelUpdate,
    ) -> Result<InventoryLevel> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let catalog = tx
            .lock_variant(variant_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("ProductVariant", variant_id))?;
        require_location(&mut tx, location_id).await?;

        let mut level = tx
            .lock_level(variant_id, location_id)
            .await?
            .unwrap_or_else(|| InventoryLevel::empty(variant_id, location_id, now));
        level
            .apply_update(&update, now)
            .map_err(|e| CommerceError::from_inventory(e, &catalog.product.name))?;
        tx.upsert_level(&level).await?;
        sync_variant_quantity(&mut tx, variant_id).await?;
        tx.commit().await?;

        tracing::info!(available = level.available, on_hand = level.on_hand, "inventory level overwritten");
        Ok(level)
    }

    pub async fn list_levels(&self, query: LevelQuery) -> Result<Vec<InventoryLevel>> {
        let mut tx = self.store.begin().await?;
        let levels = tx.list_levels(&query).await?;
        tx.commit().await?;
        Ok(levels)
    }

    /// Variants at or below the low-stock threshold, lowest first.
    pub async fn low_stock_levels(&self) -> Result<Vec<InventoryLevel>> {
        self.list_levels(LevelQuery::new().low_stock(self.low_stock_threshold))
            .await
    }

    /// Movement history, newest first.
    pub async fn list_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        let mut tx = self.store.begin().await?;
        let movements = tx.list_movements(&query).await?;
        tx.commit().await?;
        Ok(movements)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_summary(&self) -> Result<InventorySummary> {
        let mut tx = self.store.begin().await?;
        let summary = tx.inventory_summary(self.low_stock_threshold).await?;
        tx.commit().await?;
        Ok(summary)
    }

    // ---- locations -----------------------------------------------------

    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_location(&self, request: NewLocation) -> Result<InventoryLocation> {
        let name = validate_location_name(&request.name)?;
        let location = InventoryLocation::new(name, request.address, Utc::now());
        let mut tx = self.store.begin().await?;
        tx.insert_location(&location).await?;
        tx.commit().await?;
        tracing::info!(location_id = %location.id, "inventory location created");
        Ok(location)
    }

    pub async fn get_location(&self, id: LocationId) -> Result<InventoryLocation> {
        let mut tx = self.store.begin().await?;
        let location = require_location(&mut tx, id).await?;
        tx.commit().await?;
        Ok(location)
    }

    pub async fn list_locations(&self, include_inactive: bool) -> Result<Vec<InventoryLocation>> {
        let mut tx = self.store.begin().await?;
        let locations = tx.list_locations(include_inactive).await?;
        tx.commit().await?;
        Ok(locations)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_location(
        &self,
        id: LocationId,
        update: LocationUpdate,
    ) -> Result<InventoryLocation> {
        let mut tx = self.store.begin().await?;
        let mut location = require_location(&mut tx, id).await?;
        if let Some(name) = &update.name {
            location.name = validate_location_name(name)?;
        }
        if let Some(address) = update.address {
            location.address = Some(address);
        }
        if let Some(is_active) = update.is_active {
            location.is_active = is_active;
        }
        location.updated_at = Utc::now();
        tx.update_location(&location).await?;
        tx.commit().await?;
        Ok(location)
    }

    /// Marks a location inactive. Its levels and movements are kept.
    pub async fn deactivate_location(&self, id: LocationId) -> Result<InventoryLocation> {
        self.update_location(
            id,
            LocationUpdate {
                is_active: Some(false),
                ..LocationUpdate::default()
            },
        )
        .await
    }

    /// Returns the location with `name`, creating it if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_location(&self, name: &str) -> Result<InventoryLocation> {
        let name = validate_location_name(name)?;
        let mut tx = self.store.begin().await?;
        if let Some(existing) = tx.find_location_by_name(&name).await? {
            return Ok(existing);
        }
        let location = InventoryLocation::new(name, None, Utc::now());
        tx.insert_location(&location).await?;
        tx.commit().await?;
        tracing::info!(location_id = %location.id, name = %location.name, "inventory location bootstrapped");
        Ok(location)
    }
}

impl<S: Store> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

/// Records a movement inside an existing unit of work.
///
/// Debits that would take a DENY-policy level below zero are rejected.
pub async fn record_movement_in<T: StoreTx>(
    tx: &mut T,
    request: MovementRequest,
    now: DateTime<Utc>,
) -> Result<InventoryMovement> {
    let catalog = tx
        .lock_variant(request.variant_id)
        .await?
        .ok_or_else(|| CommerceError::not_found("ProductVariant", request.variant_id))?;
    require_location(tx, request.location_id).await?;

    let movement = InventoryMovement::from_request(request, now)
        .map_err(|e| CommerceError::from_inventory(e, &catalog.product.name))?;
    let mut level = tx
        .lock_level(movement.variant_id, movement.location_id)
        .await?
        .unwrap_or_else(|| InventoryLevel::empty(movement.variant_id, movement.location_id, now));
    level
        .check_delta(movement.delta, catalog.variant.inventory_policy)
        .map_err(|e| CommerceError::from_inventory(e, &catalog.product.name))?;

    append(tx, &movement, level, &catalog.product.name, now).await?;
    sync_variant_quantity(tx, movement.variant_id).await?;
    Ok(movement)
}

/// Writes the SALE movements of a checkout line.
///
/// The debit is drawn from the default location first and then from the
/// other locations holding stock, most stocked first, so every movement's
/// delta is exactly what its level lost. Units no level holds (backorders,
/// or a counter seeded without levels) are booked against the default
/// location, whose level clamps at zero. The variant counter has already
/// been debited by checkout's guarded decrement and is not re-derived here.
///
/// Callers hold the variant row lock, which serializes every level write of
/// the variant.
pub(crate) async fn record_sale_in<T: StoreTx>(
    tx: &mut T,
    catalog: &CatalogVariant,
    default_location_id: LocationId,
    quantity: u32,
    order_reference: &str,
    now: DateTime<Utc>,
) -> Result<Vec<InventoryMovement>> {
    let variant_id = catalog.variant.id;
    let mut others: Vec<InventoryLevel> = tx
        .list_levels(&LevelQuery::new().variant(variant_id))
        .await?
        .into_iter()
        .filter(|l| l.location_id != default_location_id && l.available > 0)
        .collect();
    others.sort_by(|a, b| {
        b.available
            .cmp(&a.available)
            .then(a.location_id.cmp(&b.location_id))
    });

    let default_level = tx
        .lock_level(variant_id, default_location_id)
        .await?
        .unwrap_or_else(|| InventoryLevel::empty(variant_id, default_location_id, now));
    let mut remaining = i64::from(quantity);
    let take = default_level.available.clamp(0, remaining);
    remaining -= take;
    let mut allocations = vec![(default_level, take)];

    for level in others {
        if remaining == 0 {
            break;
        }
        let level = tx
            .lock_level(variant_id, level.location_id)
            .await?
            .unwrap_or(level);
        let take = level.available.clamp(0, remaining);
        remaining -= take;
        allocations.push((level, take));
    }
    allocations[0].1 += remaining;

    let mut movements = Vec::with_capacity(allocations.len());
    for (level, take) in allocations.into_iter().filter(|(_, take)| *take > 0) {
        let request = MovementRequest::new(variant_id, level.location_id, MovementType::Sale, take)
            .with_reference(domain::inventory::REFERENCE_TYPE_ORDER, order_reference);
        let movement = InventoryMovement::from_request(request, now)
            .map_err(|e| CommerceError::from_inventory(e, &catalog.product.name))?;
        append(tx, &movement, level, &catalog.product.name, now).await?;
        movements.push(movement);
    }
    Ok(movements)
}

async fn append<T: StoreTx>(
    tx: &mut T,
    movement: &InventoryMovement,
    mut level: InventoryLevel,
    product_name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    level
        .apply_delta(movement.delta, now)
        .map_err(|e| CommerceError::from_inventory(e, product_name))?;
    tx.upsert_level(&level).await?;
    tx.insert_movement(movement).await?;

    metrics::counter!("inventory_movements_total", "type" => movement.movement_type.as_str())
        .increment(1);
    tracing::info!(
        movement_id = %movement.id,
        variant_id = %movement.variant_id,
        location_id = %movement.location_id,
        movement_type = %movement.movement_type,
        delta = movement.delta,
        available = level.available,
        "inventory movement recorded"
    );
    Ok(())
}

async fn sync_variant_quantity<T: StoreTx>(tx: &mut T, variant_id: VariantId) -> Result<()> {
    let total = tx.sum_available(variant_id).await?;
    tx.set_variant_inventory(variant_id, total).await?;
    Ok(())
}

async fn require_location<T: StoreTx>(tx: &mut T, id: LocationId) -> Result<InventoryLocation> {
    tx.get_location(id)
        .await?
        .ok_or_else(|| CommerceError::not_found("InventoryLocation", id))
}

fn validate_location_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CommerceError::Validation(
            "location name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, seed_variant};
    use domain::InventoryPolicy;

    fn movement(variant_id: VariantId, location_id: LocationId, kind: MovementType, quantity: i64) -> MovementRequest {
        MovementRequest::new(variant_id, location_id, kind, quantity)
    }

    async fn variant_quantity<S: Store>(store: &S, id: VariantId) -> i64 {
        let mut tx = store.begin().await.unwrap();
        tx.get_variant(id).await.unwrap().unwrap().variant.inventory_quantity
    }

    #[tokio::test]
    async fn restock_sale_adjustment_and_return() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;
        let id = v.variant.id;
        let loc = fx.location.id;

        fx.ledger.record_movement(movement(id, loc, MovementType::Restock, 10)).await.unwrap();
        fx.ledger.record_movement(movement(id, loc, MovementType::Sale, 3)).await.unwrap();
        let adj = fx
            .ledger
            .record_movement(movement(id, loc, MovementType::Adjustment, -2))
            .await
            .unwrap();
        fx.ledger.record_movement(movement(id, loc, MovementType::Return, 1)).await.unwrap();

        assert_eq!(adj.quantity, 2);
        assert_eq!(adj.delta, -2);

        let levels = fx.ledger.list_levels(LevelQuery::new().variant(id)).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].available, 6);
        assert_eq!(levels[0].on_hand, 6);
        assert_eq!(variant_quantity(&fx.store, id).await, 6);

        let history = fx
            .ledger
            .list_movements(MovementQuery::new().variant(id))
            .await
            .unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].movement_type, MovementType::Return);
    }

    #[tokio::test]
    async fn deny_variant_cannot_be_overdrawn() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;
        let id = v.variant.id;
        let loc = fx.location.id;

        fx.ledger.record_movement(movement(id, loc, MovementType::Restock, 2)).await.unwrap();
        let err = fx
            .ledger
            .record_movement(movement(id, loc, MovementType::Sale, 3))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let history = fx
            .ledger
            .list_movements(MovementQuery::new().variant(id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1, "rejected movement must not be persisted");
    }

    #[tokio::test]
    async fn allow_variant_clamps_at_zero() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Preorder", 1000, 0, InventoryPolicy::Allow).await;
        let id = v.variant.id;
        let loc = fx.location.id;

        fx.ledger.record_movement(movement(id, loc, MovementType::Restock, 1)).await.unwrap();
        fx.ledger.record_movement(movement(id, loc, MovementType::Sale, 4)).await.unwrap();

        let levels = fx.ledger.list_levels(LevelQuery::new().variant(id)).await.unwrap();
        assert_eq!(levels[0].available, 0);
    }

    #[tokio::test]
    async fn quantity_is_summed_across_locations() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;
        let id = v.variant.id;
        let second = fx
            .ledger
            .create_location(NewLocation {
                name: "Overflow".to_string(),
                address: None,
            })
            .await
            .unwrap();

        fx.ledger.record_movement(movement(id, fx.location.id, MovementType::Restock, 4)).await.unwrap();
        fx.ledger.record_movement(movement(id, second.id, MovementType::Restock, 5)).await.unwrap();
        assert_eq!(variant_quantity(&fx.store, id).await, 9);
    }

    #[tokio::test]
    async fn unknown_variant_or_location_is_not_found() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;

        let err = fx
            .ledger
            .record_movement(movement(VariantId::new(), fx.location.id, MovementType::Restock, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = fx
            .ledger
            .record_movement(movement(v.variant.id, LocationId::new(), MovementType::Restock, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn negative_magnitude_is_a_validation_error() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;
        let err = fx
            .ledger
            .record_movement(movement(v.variant.id, fx.location.id, MovementType::Restock, -1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_movements_are_rejected_without_side_effects() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;
        let id = v.variant.id;
        let loc = fx.location.id;
        fx.ledger.record_movement(movement(id, loc, MovementType::Restock, 5)).await.unwrap();

        for (kind, quantity) in [
            (MovementType::Restock, i64::MAX),
            (MovementType::Adjustment, i64::MIN),
            (MovementType::Adjustment, domain::inventory::MAX_MOVEMENT_QUANTITY + 1),
        ] {
            let err = fx
                .ledger
                .record_movement(movement(id, loc, kind, quantity))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }

        let levels = fx.ledger.list_levels(LevelQuery::new().variant(id)).await.unwrap();
        assert_eq!(levels[0].available, 5);
        assert_eq!(variant_quantity(&fx.store, id).await, 5);
    }

    #[tokio::test]
    async fn update_level_overwrites_and_resyncs() {
        let fx = Fixture::new().await;
        let v = seed_variant(&fx.store, "Widget", 1000, 0, InventoryPolicy::Deny).await;

        let level = fx
            .ledger
            .update_level(
                v.variant.id,
                fx.location.id,
                LevelUpdate {
                    available: Some(7),
                    on_hand: Some(8),
                    committed: Some(1),
                    ..LevelUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((level.available, level.on_hand, level.committed), (7, 8, 1));
        assert_eq!(variant_quantity(&fx.store, v.variant.id).await, 7);

        let history = fx
            .ledger
            .list_movements(MovementQuery::new().variant(v.variant.id))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn summary_counts_low_and_out_of_stock() {
        let fx = Fixture::new().await;
        let plenty = seed_variant(&fx.store, "Plenty", 1000, 0, InventoryPolicy::Deny).await;
        let low = seed_variant(&fx.store, "Low", 1000, 0, InventoryPolicy::Deny).await;
        seed_variant(&fx.store, "None", 1000, 0, InventoryPolicy::Deny).await;

        let loc = fx.location.id;
        fx.ledger
            .record_movement(movement(plenty.variant.id, loc, MovementType::Restock, 50))
            .await
            .unwrap();
        fx.ledger
            .record_movement(movement(low.variant.id, loc, MovementType::Restock, 4))
            .await
            .unwrap();

        let summary = fx.ledger.get_summary().await.unwrap();
        assert_eq!(summary.active_variants, 3);
        assert_eq!(summary.active_locations, 1);
        assert_eq!(summary.low_stock_variants, 2);
        assert_eq!(summary.out_of_stock_variants, 1);
        assert_eq!(summary.total_stock_units, 54);
    }

    #[tokio::test]
    async fn location_lifecycle() {
        let fx = Fixture::new().await;

        let again = fx.ledger.ensure_location(&fx.location.name).await.unwrap();
        assert_eq!(again.id, fx.location.id);

        let dup = fx
            .ledger
            .create_location(NewLocation {
                name: fx.location.name.clone(),
                address: None,
            })
            .await
            .unwrap_err();
        assert_eq!(dup.code(), "RESOURCE_ALREADY_EXISTS");

        let blank = fx
            .ledger
            .create_location(NewLocation {
                name: "   ".to_string(),
                address: None,
            })
            .await
            .unwrap_err();
        assert_eq!(blank.code(), "VALIDATION_ERROR");

        let renamed = fx
            .ledger
            .update_location(
                fx.location.id,
                LocationUpdate {
                    name: Some("Main Warehouse".to_string()),
                    address: Some("1 Dock Rd".to_string()),
                    ..LocationUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Main Warehouse");

        fx.ledger.deactivate_location(fx.location.id).await.unwrap();
        assert!(fx.ledger.list_locations(false).await.unwrap().is_empty());
        assert_eq!(fx.ledger.list_locations(true).await.unwrap().len(), 1);
    }
}
