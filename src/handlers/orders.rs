use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::orders::{
        CreateOrderRequest, OrderListResponse, OrderResponse, UpdateOrderStatusRequest,
    },
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order placed"),
        (status = 400, description = "Invalid items, insufficient stock or points")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state
        .services
        .orders
        .create_order(&auth.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Order placed", order)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Orders visible to the caller"))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<OrderListResponse> {
    let orders = state
        .services
        .orders
        .list_orders(&auth, pagination.page, pagination.per_page)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order detail"),
        (status = 403, description = "Order belongs to someone else"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_order(&auth, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status updated"),
        (status = 403, description = "Caller may not patch this order")
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .update_order_status(&auth, id, request.status)
        .await?;
    Ok(Json(ApiResponse::with_message("Order status updated", order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order cancelled, stock and points restored"),
        (status = 400, description = "Order is not PENDING"),
        (status = 403, description = "Caller does not own the order")
    )
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.cancel_order(&auth, id).await?;
    Ok(Json(ApiResponse::with_message("Order cancelled", order)))
}
