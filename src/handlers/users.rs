use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::{
    auth::AuthUser,
    entities::seller_profile,
    entities::user,
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::users::{BecomeSellerRequest, UpdateUserRequest, UserListResponse, UserResponse},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:id/become-seller", post(become_seller))
        .route("/:id/seller-profile", get(get_seller_profile))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<UserListResponse> {
    let users = state
        .services
        .users
        .list_users(&auth, pagination.page, pagination.per_page)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User with seller profile and subscription"),
        (status = 403, description = "Not the caller's account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<UserResponse> {
    let user = state.services.users.get_user(&auth, &id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Profile updated"))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<user::Model> {
    let updated = state.services.users.update_user(&auth, &id, request).await?;
    Ok(Json(ApiResponse::with_message("Profile updated", updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.services.users.delete_user(&auth, &id).await?;
    Ok(Json(ApiResponse::with_message(
        "User deleted",
        serde_json::json!({ "id": id }),
    )))
}

/// Promotes the caller to seller. The path id must match the caller;
/// admins may promote anyone.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/become-seller",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = BecomeSellerRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Seller profile created"),
        (status = 409, description = "User is already a seller")
    )
)]
pub async fn become_seller(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<BecomeSellerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<seller_profile::Model>>), ServiceError> {
    if !auth.is_admin() && auth.user_id != id {
        return Err(ServiceError::Forbidden(
            "You may only promote your own account".to_string(),
        ));
    }

    let profile = state.services.users.become_seller(&id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Seller profile created", profile)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/seller-profile",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Seller profile"),
        (status = 404, description = "User has no seller profile")
    )
)]
pub async fn get_seller_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<seller_profile::Model> {
    let profile = state.services.users.get_seller_profile(&id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
