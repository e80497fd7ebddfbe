use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::user::{self, UserRole},
    errors::ServiceError,
    handlers::common::validate_input,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be valid"))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    /// Optional role override; defaults to CLIENT
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be valid"))]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    #[schema(value_type = Object)]
    pub user: user::Model,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Creates an account and returns a signed access token.
/// Credential verification is the identity provider's responsibility.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(axum::http::StatusCode, Json<ApiResponse<AuthResponse>>), ServiceError> {
    validate_input(&request)?;

    let role = request.role.unwrap_or(UserRole::Client);
    let created = state
        .services
        .users
        .register(&request.email, request.first_name, request.last_name, role)
        .await?;

    let access_token = state
        .auth
        .issue_token(&created.id, &created.email, created.role())?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Account created",
            AuthResponse {
                access_token,
                user: created,
            },
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Unknown account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    validate_input(&request)?;

    let user = state
        .services
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("Unknown account".to_string()))?;

    let access_token = state.auth.issue_token(&user.id, &user.email, user.role())?;

    Ok(Json(ApiResponse::success(AuthResponse {
        access_token,
        user,
    })))
}
