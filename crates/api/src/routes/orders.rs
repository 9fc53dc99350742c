//! Checkout, customer order reads and admin order management.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use commerce::{CheckoutRequest, OrderPage, OrderSummary, Page};
use common::{OrderId, UserId};
use domain::{Order, OrderStatus, Transaction};
use serde::Deserialize;
use store::{OrderQuery, Store};

use super::parse_id;
use crate::AppState;
use crate::auth::{Admin, Principal};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub include_inactive: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
    /// Appended to the order's notes.
    #[serde(default)]
    pub notes: Option<String>,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::parse(raw.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {raw}")))
}

// -- Customer handlers --

/// POST /orders/checkout: turn the user's cart into a paid order.
#[tracing::instrument(skip(state, principal, req), fields(user_id = %principal.id))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    req: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<OrderSummary>), ApiError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let summary = state.checkout.checkout(principal.id, req).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /orders/my-orders: the user's orders, newest first.
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn list_mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Query(page): Query<Page>,
) -> Result<Json<OrderPage>, ApiError> {
    Ok(Json(state.orders.list_my_orders(principal.id, page).await?))
}

/// GET /orders/my-orders/:id
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn get_mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.orders.get_my_order(principal.id, order_id).await?))
}

/// POST /orders/my-orders/:id/cancel
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn cancel_mine<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.orders.cancel_my_order(principal.id, order_id).await?))
}

// -- Admin handlers --

/// GET /orders: every order, filtered and paginated.
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderPage>, ApiError> {
    let mut query = OrderQuery::new();
    if let Some(status) = params.status.as_deref() {
        query = query.status(parse_status(status)?);
    }
    if let Some(user_id) = params.user_id.as_deref() {
        query.user_id = Some(parse_id::<UserId>(user_id)?);
    }
    if params.include_inactive {
        query = query.include_inactive();
    }

    let page = Page {
        limit: params.limit,
        offset: params.offset,
    };
    Ok(Json(state.orders.list_orders(query, page).await?))
}

/// GET /orders/:id
#[tracing::instrument(skip(state, _admin))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.orders.get_order(order_id).await?))
}

/// PATCH /orders/:id/status: move an order along its lifecycle.
#[tracing::instrument(skip(state, admin, req), fields(admin_id = %admin.0.id, status = %req.status))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: Admin,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let status = parse_status(&req.status)?;
    Ok(Json(
        state
            .orders
            .update_status(order_id, status, req.notes.as_deref())
            .await?,
    ))
}

/// DELETE /orders/:id: logical removal.
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.orders.remove_order(order_id).await?))
}

/// GET /orders/:id/transactions: payment history of an order.
#[tracing::instrument(skip(state, _admin))]
pub async fn transactions<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(state.orders.list_transactions(order_id).await?))
}
