use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use marketplace_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{product, user, user::UserRole},
    AppState,
};

/// Test harness: full application router over an in-memory SQLite
/// database with the real migrations applied.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".into(),
        jwt_expiration: 3600,
        auth_issuer: "marketplace-api".into(),
        auth_audience: "marketplace-clients".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 5,
        allow_seller_status_updates: false,
        frontend_url: "http://localhost:3000".into(),
        stripe_secret_key: None,
        stripe_webhook_secret: Some("whsec_stripe_test_secret".into()),
        webhook_tolerance_secs: 300,
        clerk_secret_key: None,
        clerk_api_url: "https://api.clerk.com/v1".into(),
        // base64 of "0123456789abcdef0123456789abcdef"
        clerk_webhook_secret: Some(
            "whsec_MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=".into(),
        ),
        directus_url: None,
        directus_admin_token: None,
        directus_webhook_secret: Some("directus_shared_test_token".into()),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        // An in-memory SQLite database lives and dies with its connection,
        // so the pool is pinned to a single connection.
        let db_config = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("test database");
        db::run_migrations(&pool).await.expect("migrations");

        let state = AppState::new(Arc::new(pool), cfg, None);
        let router = marketplace_api::create_router(state.clone());
        Self { router, state }
    }

    pub async fn seed_user(
        &self,
        id: &str,
        email: &str,
        role: UserRole,
        points: i32,
    ) -> user::Model {
        user::ActiveModel {
            id: Set(id.to_string()),
            email: Set(email.to_string()),
            first_name: Set(Some("Test".into())),
            last_name: Set(None),
            role: Set(role.to_string()),
            points: Set(points),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user")
    }

    pub async fn seed_product(
        &self,
        seller_id: &str,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            image_url: Set(None),
            stock: Set(stock),
            seller_id: Set(seller_id.to_string()),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .issue_token(&user.id, &user.email, user.role())
            .expect("token")
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Raw-body request with custom headers, for webhook endpoints
    pub async fn raw_request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let request = builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}
