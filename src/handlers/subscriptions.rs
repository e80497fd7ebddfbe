use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    auth::AuthUser,
    entities::subscription,
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::subscriptions::{
        CreateSubscriptionRequest, SubscriptionListResponse, UpdateSubscriptionRequest,
    },
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/me", get(get_own_subscription).delete(deactivate_own_subscription))
        .route(
            "/:id",
            get(get_subscription)
                .patch(update_subscription)
                .delete(delete_subscription),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    request_body = CreateSubscriptionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Subscription created"),
        (status = 400, description = "Plan tier does not match the caller's role"),
        (status = 409, description = "Caller already subscribes")
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<subscription::Model>>), ServiceError> {
    let created = state
        .services
        .subscriptions
        .create_subscription(&auth, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Subscription created", created)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All subscriptions"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<SubscriptionListResponse> {
    let subscriptions = state
        .services
        .subscriptions
        .list_subscriptions(&auth, pagination.page, pagination.per_page)
        .await?;
    Ok(Json(ApiResponse::success(subscriptions)))
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/me",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's subscription"),
        (status = 404, description = "Caller has no subscription")
    )
)]
pub async fn get_own_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<subscription::Model> {
    let sub = state.services.subscriptions.get_own_subscription(&auth).await?;
    Ok(Json(ApiResponse::success(sub)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions/me",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Subscription deactivated"))
)]
pub async fn deactivate_own_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<subscription::Model> {
    let sub = state
        .services
        .subscriptions
        .deactivate_own_subscription(&auth)
        .await?;
    Ok(Json(ApiResponse::with_message("Subscription deactivated", sub)))
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = String, Path, description = "Provider subscription id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription detail"),
        (status = 403, description = "Subscription belongs to someone else")
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<subscription::Model> {
    let sub = state
        .services
        .subscriptions
        .get_subscription(&auth, &id)
        .await?;
    Ok(Json(ApiResponse::success(sub)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = String, Path, description = "Provider subscription id")),
    request_body = UpdateSubscriptionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription updated"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> ApiResult<subscription::Model> {
    let sub = state
        .services
        .subscriptions
        .update_subscription(&auth, &id, request)
        .await?;
    Ok(Json(ApiResponse::with_message("Subscription updated", sub)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = String, Path, description = "Provider subscription id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription deleted"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .subscriptions
        .delete_subscription(&auth, &id)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Subscription deleted",
        serde_json::json!({ "id": id }),
    )))
}
