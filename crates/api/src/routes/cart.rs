//! Cart endpoints for the authenticated user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::{AddLine, SyncLine, UpdateLine};
use common::CartLineId;
use domain::CartSummary;
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::auth::Principal;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SyncRequest {
    pub items: Vec<SyncLine>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub session_id: String,
}

/// GET /cart: the user's cart, created on first access.
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.get_cart(principal.id).await?))
}

/// POST /cart/items: add units of a variant.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.id))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<AddLine>,
) -> Result<(StatusCode, Json<CartSummary>), ApiError> {
    let cart = state.carts.add_line(principal.id, req).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// PATCH /cart/items/:item_id: change quantity or properties of a line.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.id))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateLine>,
) -> Result<Json<CartSummary>, ApiError> {
    let line_id: CartLineId = parse_id(&item_id)?;
    Ok(Json(state.carts.update_line(principal.id, line_id, req).await?))
}

/// DELETE /cart/items/:item_id
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(item_id): Path<String>,
) -> Result<Json<CartSummary>, ApiError> {
    let line_id: CartLineId = parse_id(&item_id)?;
    Ok(Json(state.carts.remove_line(principal.id, line_id).await?))
}

/// DELETE /cart/clear: remove every line, keeping the cart.
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.clear(principal.id).await?))
}

/// POST /cart/sync: merge a client-side cart into the server cart.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.id, lines = req.items.len()))]
pub async fn sync<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<SyncRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.sync(principal.id, req.items).await?))
}

/// POST /cart/claim: adopt the anonymous cart of a session.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.id))]
pub async fn claim<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    if req.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("sessionId must not be empty".to_string()));
    }
    Ok(Json(
        state
            .carts
            .claim_session_cart(principal.id, req.session_id.trim())
            .await?,
    ))
}
