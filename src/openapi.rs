use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marketplace API",
        version = env!("CARGO_PKG_VERSION"),
        description = r#"
Two-sided marketplace backend: storefront, seller management and order
workflow over an external identity provider, payment provider and
headless CMS.

All responses share the envelope
`{ success, message, data, error?: { statusCode, timestamp, path } }`.

Authenticated endpoints expect `Authorization: Bearer <jwt>`.
        "#
    ),
    tags(
        (name = "auth", description = "Registration and token issuance"),
        (name = "users", description = "Accounts and seller profiles"),
        (name = "products", description = "Catalog, mirrored from the CMS"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "subscriptions", description = "Subscription plans"),
        (name = "payments", description = "Checkout sessions"),
        (name = "webhooks", description = "Inbound provider events"),
        (name = "system", description = "Health and status")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,

        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::become_seller,
        crate::handlers::users::get_seller_profile,

        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::list_seller_products,

        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,

        crate::handlers::subscriptions::create_subscription,
        crate::handlers::subscriptions::list_subscriptions,
        crate::handlers::subscriptions::get_own_subscription,
        crate::handlers::subscriptions::deactivate_own_subscription,
        crate::handlers::subscriptions::get_subscription,
        crate::handlers::subscriptions::update_subscription,
        crate::handlers::subscriptions::delete_subscription,

        crate::handlers::payments::order_checkout,
        crate::handlers::payments::subscription_checkout,

        crate::handlers::webhooks::stripe_webhook,
        crate::handlers::webhooks::clerk_webhook,
        crate::handlers::webhooks::directus_webhook,
        crate::handlers::webhooks::directus_sync_products,

        crate::health,
        crate::api_status,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::errors::ErrorDetail,

            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,

            crate::entities::user::UserRole,
            crate::entities::order::OrderStatus,
            crate::entities::subscription::SubscriptionType,
            crate::entities::subscription::SubscriptionStatus,

            crate::services::users::UpdateUserRequest,
            crate::services::users::BecomeSellerRequest,
            crate::services::users::UserResponse,
            crate::services::users::UserListResponse,

            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::ProductListResponse,

            crate::services::orders::CreateOrderRequest,
            crate::services::orders::OrderItemInput,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::ProductSummary,
            crate::services::orders::OrderListResponse,

            crate::services::subscriptions::CreateSubscriptionRequest,
            crate::services::subscriptions::UpdateSubscriptionRequest,
            crate::services::subscriptions::SubscriptionListResponse,

            crate::handlers::payments::SubscriptionCheckoutRequest,
            crate::services::stripe::CheckoutSession,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI mounted at `/docs`, serving the schema at
/// `/api-docs/openapi.json`
pub fn swagger_router() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
