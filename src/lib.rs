/*!
 * Marketplace API: a two-sided storefront backend over an external
 * identity provider, payment provider and headless CMS.
 *
 * Layering follows request flow: handlers extract and authorize, services
 * own the business rules and transactions, entities map the schema.
 */

use axum::{
    extract::{FromRef, State},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;

use auth::{AuthConfig, AuthService};
use config::AppConfig;
use db::DbPool;
use errors::ServiceError;
use events::EventSender;
use middleware_helpers::request_context::request_context_middleware;
use services::{
    clerk::ClerkService, directus::DirectusService, orders::OrderService,
    products::ProductService, stripe::StripeService, subscriptions::SubscriptionService,
    users::UserService,
};

/// Uniform success envelope; failures use [`errors::ErrorResponse`],
/// which mirrors this shape with an `error` block attached.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

/// All domain services, wired once at startup and cloned per request
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub users: UserService,
    pub products: ProductService,
    pub subscriptions: SubscriptionService,
    pub stripe: Option<Arc<StripeService>>,
    pub clerk: Option<Arc<ClerkService>>,
    pub directus: Option<Arc<DirectusService>>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

// Lets the AuthUser extractor pull the auth service straight from state
impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: AppConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            std::time::Duration::from_secs(config.jwt_expiration),
        )));

        let stripe = config.stripe_secret_key.as_ref().map(|key| {
            Arc::new(StripeService::new(
                key.clone(),
                config.frontend_url.clone(),
            ))
        });
        let clerk = config
            .clerk_secret_key
            .as_ref()
            .map(|key| Arc::new(ClerkService::new(key.clone(), config.clerk_api_url.clone())));
        let directus = match (&config.directus_url, &config.directus_admin_token) {
            (Some(url), Some(token)) => {
                Some(Arc::new(DirectusService::new(url.clone(), token.clone())))
            }
            _ => None,
        };

        let services = AppServices {
            orders: OrderService::new(
                db.clone(),
                event_sender.clone(),
                config.allow_seller_status_updates,
            ),
            users: UserService::new(db.clone(), event_sender.clone()),
            products: ProductService::new(db.clone(), event_sender.clone()),
            subscriptions: SubscriptionService::new(db.clone(), event_sender),
            stripe,
            clerk,
            directus,
        };

        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the full application router
pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .nest("/users", handlers::users::routes())
        .nest("/products", handlers::products::routes())
        .nest("/orders", handlers::orders::routes())
        .nest("/subscriptions", handlers::subscriptions::routes())
        .nest("/payments", handlers::payments::routes())
        .route("/status", get(api_status));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", handlers::auth::routes())
        .nest("/api/v1", api_v1)
        .nest("/webhooks", handlers::webhooks::routes())
        .merge(openapi::swagger_router())
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy"))
)]
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    if database == "down" {
        return Err(ServiceError::InternalError(
            "Database connectivity check failed".to_string(),
        ));
    }

    Ok(Json(ApiResponse::success(json!({
        "status": "healthy",
        "database": database,
    }))))
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses((status = 200, description = "API build and environment info"))
)]
pub async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))))
}
