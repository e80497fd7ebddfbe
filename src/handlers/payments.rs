use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::order::OrderStatus,
    entities::subscription::SubscriptionType,
    entities::user::UserRole,
    errors::ServiceError,
    handlers::common::validate_input,
    services::stripe::{CheckoutSession, StripeService},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubscriptionCheckoutRequest {
    #[validate(length(min = 1, message = "Price id is required"))]
    pub price_id: String,
    #[serde(rename = "type")]
    pub subscription_type: SubscriptionType,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/order/:id", post(order_checkout))
        .route("/checkout/subscription", post(subscription_checkout))
}

fn stripe_service(state: &AppState) -> Result<Arc<StripeService>, ServiceError> {
    state.services.stripe.clone().ok_or_else(|| {
        ServiceError::InvalidOperation("Payments are not configured".to_string())
    })
}

/// Resolves the caller's payment-provider customer id, creating the
/// customer on first use and persisting the reference.
async fn get_or_create_customer(
    state: &AppState,
    stripe: &StripeService,
    user_id: &str,
) -> Result<String, ServiceError> {
    let user = state
        .services
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

    if let Some(customer_id) = user.stripe_customer_id {
        return Ok(customer_id);
    }

    let customer_id = stripe.create_customer(&user.email, &user.full_name()).await?;
    state
        .services
        .users
        .set_stripe_customer_id(user_id, &customer_id)
        .await?;
    Ok(customer_id)
}

/// Starts checkout for a PENDING order the caller owns
#[utoipa::path(
    post,
    path = "/api/v1/payments/checkout/order/{id}",
    tag = "payments",
    params(("id" = Uuid, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout session created"),
        (status = 400, description = "Order is not payable"),
        (status = 502, description = "Payment provider unavailable")
    )
)]
pub async fn order_checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<CheckoutSession> {
    let stripe = stripe_service(&state)?;

    let order = state.services.orders.get_order(&auth, id).await?;
    if order.status.parse::<OrderStatus>().ok() != Some(OrderStatus::Pending) {
        return Err(ServiceError::InvalidOperation(format!(
            "Only PENDING orders can be paid (current status: {})",
            order.status
        )));
    }

    let customer_id = get_or_create_customer(&state, &stripe, &order.user_id).await?;
    let session = stripe
        .create_order_checkout_session(
            &order.id.to_string(),
            &order.user_id,
            Some(&customer_id),
            order.total_amount,
        )
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Checkout session created",
        session,
    )))
}

/// Starts a recurring checkout for a subscription plan
#[utoipa::path(
    post,
    path = "/api/v1/payments/checkout/subscription",
    tag = "payments",
    request_body = SubscriptionCheckoutRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout session created"),
        (status = 400, description = "Plan tier does not match the caller's role")
    )
)]
pub async fn subscription_checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<SubscriptionCheckoutRequest>,
) -> ApiResult<CheckoutSession> {
    validate_input(&request)?;
    let stripe = stripe_service(&state)?;

    let plan_is_seller = request.subscription_type.is_seller_plan();
    let role_matches = match auth.role {
        UserRole::Seller | UserRole::Admin => plan_is_seller,
        UserRole::Client => !plan_is_seller,
    };
    if !role_matches {
        return Err(ServiceError::ValidationError(format!(
            "Subscription type {} does not match role {}",
            request.subscription_type, auth.role
        )));
    }

    let customer_id = get_or_create_customer(&state, &stripe, &auth.user_id).await?;
    let session = stripe
        .create_subscription_checkout_session(
            &request.price_id,
            &auth.user_id,
            &request.subscription_type.to_string(),
            Some(&customer_id),
        )
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Checkout session created",
        session,
    )))
}
