//! Admin inventory endpoints: locations, levels and the movement ledger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use commerce::{LocationUpdate, NewLocation};
use common::{LocationId, VariantId};
use domain::{
    InventoryLevel, InventoryLocation, InventoryMovement, InventorySummary, LevelUpdate,
    MovementRequest, MovementType,
};
use serde::Deserialize;
use store::{LevelQuery, MovementQuery, Store};

use super::parse_id;
use crate::AppState;
use crate::auth::Admin;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationParams {
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelParams {
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    /// Only levels at or below the configured low-stock threshold.
    pub low_stock: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovementParams {
    pub variant_id: Option<String>,
    pub location_id: Option<String>,
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
    pub reference_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Locations --

/// GET /inventory/locations
#[tracing::instrument(skip(state, _admin))]
pub async fn list_locations<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(params): Query<LocationParams>,
) -> Result<Json<Vec<InventoryLocation>>, ApiError> {
    Ok(Json(state.ledger.list_locations(params.include_inactive).await?))
}

/// POST /inventory/locations
#[tracing::instrument(skip(state, _admin, req))]
pub async fn create_location<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Json(req): Json<NewLocation>,
) -> Result<(StatusCode, Json<InventoryLocation>), ApiError> {
    let location = state.ledger.create_location(req).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// GET /inventory/locations/:id
#[tracing::instrument(skip(state, _admin))]
pub async fn get_location<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<InventoryLocation>, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    Ok(Json(state.ledger.get_location(location_id).await?))
}

/// PATCH /inventory/locations/:id
#[tracing::instrument(skip(state, _admin, req))]
pub async fn update_location<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
    Json(req): Json<LocationUpdate>,
) -> Result<Json<InventoryLocation>, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    if req.is_active == Some(false) {
        ensure_not_default(&state, location_id)?;
    }
    Ok(Json(state.ledger.update_location(location_id, req).await?))
}

/// DELETE /inventory/locations/:id: deactivates; history is kept.
#[tracing::instrument(skip(state, _admin))]
pub async fn deactivate_location<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<InventoryLocation>, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    ensure_not_default(&state, location_id)?;
    Ok(Json(state.ledger.deactivate_location(location_id).await?))
}

fn ensure_not_default<S: Store>(state: &AppState<S>, location_id: LocationId) -> Result<(), ApiError> {
    if location_id == state.config.default_location_id {
        return Err(ApiError::BadRequest(
            "The default checkout location cannot be deactivated".to_string(),
        ));
    }
    Ok(())
}

// -- Levels --

/// GET /inventory/levels
#[tracing::instrument(skip(state, _admin))]
pub async fn list_levels<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(params): Query<LevelParams>,
) -> Result<Json<Vec<InventoryLevel>>, ApiError> {
    let mut query = LevelQuery::new();
    if let Some(id) = params.variant_id.as_deref() {
        query = query.variant(parse_id::<VariantId>(id)?);
    }
    if let Some(id) = params.location_id.as_deref() {
        query = query.location(parse_id::<LocationId>(id)?);
    }
    if params.low_stock {
        query = query.low_stock(state.config.low_stock_threshold);
    }
    query.limit = params.limit;
    query.offset = params.offset;

    Ok(Json(state.ledger.list_levels(query).await?))
}

/// PUT /inventory/levels/:variant_id/:location_id: administrative overwrite.
#[tracing::instrument(skip(state, _admin, req))]
pub async fn update_level<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path((variant_id, location_id)): Path<(String, String)>,
    Json(req): Json<LevelUpdate>,
) -> Result<Json<InventoryLevel>, ApiError> {
    let variant_id: VariantId = parse_id(&variant_id)?;
    let location_id: LocationId = parse_id(&location_id)?;
    Ok(Json(
        state
            .ledger
            .update_level(variant_id, location_id, req)
            .await?,
    ))
}

// -- Movements --

/// GET /inventory/movements: ledger history, newest first.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_movements<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(params): Query<MovementParams>,
) -> Result<Json<Vec<InventoryMovement>>, ApiError> {
    let mut query = MovementQuery::new();
    if let Some(id) = params.variant_id.as_deref() {
        query = query.variant(parse_id::<VariantId>(id)?);
    }
    if let Some(id) = params.location_id.as_deref() {
        query = query.location(parse_id::<LocationId>(id)?);
    }
    if let Some(raw) = params.movement_type.as_deref() {
        let movement_type = MovementType::parse(raw.trim())
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown movement type: {raw}")))?;
        query = query.movement_type(movement_type);
    }
    if let Some(reference) = params.reference_id {
        query = query.reference(reference);
    }
    query.limit = params.limit;
    query.offset = params.offset;

    Ok(Json(state.ledger.list_movements(query).await?))
}

/// POST /inventory/movements: append a movement and apply it to the level.
#[tracing::instrument(skip(state, _admin, req), fields(movement_type = %req.movement_type, quantity = req.quantity))]
pub async fn record_movement<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Json(req): Json<MovementRequest>,
) -> Result<(StatusCode, Json<InventoryMovement>), ApiError> {
    let movement = state.ledger.record_movement(req).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /inventory/summary
#[tracing::instrument(skip(state, _admin))]
pub async fn summary<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
) -> Result<Json<InventorySummary>, ApiError> {
    Ok(Json(state.ledger.get_summary().await?))
}
