use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::audit::PermissionAuditEntry;
use crate::auth::{bearer_token, AuthUser, TokenSigner};
use crate::error::ApiError;
use crate::service::{
    BatchTrace, CreateOrder, CreateRestaurant, OrderService, OrderUpdate, OrderView, RestaurantView,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub tokens: Arc<TokenSigner>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionLogQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/refresh", post(refresh_token))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/batch/:batch_number", get(trace_batch))
        .route(
            "/api/orders/:id",
            get(get_order).patch(update_order).delete(cancel_order),
        )
        .route(
            "/api/orders/:id/rating",
            get(get_rating).post(submit_rating).delete(delete_rating),
        )
        .route("/api/restaurants", post(create_restaurant))
        .route("/api/restaurants/:id", get(get_restaurant))
        .route("/api/admin/permission-log", get(permission_log))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let token = state
        .tokens
        .refresh_at(token, Utc::now())
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
    Ok(Json(TokenResponse { token }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query?;
    let orders = state
        .service
        .list_orders(&user, query.status, query.limit)
        .await?;
    Ok(Json(orders))
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(request) = payload?;
    let view = state.service.create_order(&user, request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_order(&user, id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<OrderUpdate>, JsonRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let Path(id) = id?;
    let Json(update) = payload?;
    Ok(Json(state.service.update_order(&user, id, update).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.cancel_order(&user, id).await?))
}

pub async fn trace_batch(
    State(state): State<AppState>,
    batch_number: Result<Path<String>, PathRejection>,
) -> Result<Json<BatchTrace>, ApiError> {
    let Path(batch_number) = batch_number?;
    Ok(Json(state.service.trace_batch(&batch_number).await?))
}

pub async fn get_rating(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Review>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_rating(&user, id).await?))
}

pub async fn submit_rating(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RatingSubmission>, JsonRejection>,
) -> Result<Json<Review>, ApiError> {
    let Path(id) = id?;
    let Json(submission) = payload?;
    Ok(Json(state.service.submit_rating(&user, id, submission).await?))
}

pub async fn delete_rating(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.service.delete_rating(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_restaurant(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateRestaurant>, JsonRejection>,
) -> Result<(StatusCode, Json<Restaurant>), ApiError> {
    let Json(request) = payload?;
    let restaurant = state.service.create_restaurant(&user, request).await?;
    Ok((StatusCode::CREATED, Json(restaurant)))
}

pub async fn get_restaurant(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RestaurantView>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_restaurant(&user, id).await?))
}

pub async fn permission_log(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<PermissionLogQuery>, QueryRejection>,
) -> Result<Json<Vec<PermissionAuditEntry>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.service.permission_log(&user, query.limit)?))
}
