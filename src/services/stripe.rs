use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, instrument};

const DEFAULT_API_URL: &str = "https://api.stripe.com";

/// Checkout session handed back to the storefront for redirection
#[derive(Debug, Clone, Deserialize, serde::Serialize, utoipa::ToSchema)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

/// Thin client for the payment provider's REST API. The provider speaks
/// form-encoded requests with bracketed nested keys.
#[derive(Clone)]
pub struct StripeService {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
    frontend_url: String,
}

impl StripeService {
    pub fn new(secret_key: String, frontend_url: String) -> Self {
        Self::with_api_url(secret_key, frontend_url, DEFAULT_API_URL.to_string())
    }

    /// Overridable base URL, used to point tests at a stub server
    pub fn with_api_url(secret_key: String, frontend_url: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            secret_key,
            frontend_url,
        }
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = %status, path, "payment provider request failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment provider returned {}",
                status
            )));
        }

        serde_json::from_str(&body).map_err(ServiceError::from)
    }

    /// Creates a customer record at the payment provider
    #[instrument(skip(self))]
    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<String, ServiceError> {
        let params = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        let value = self.post_form("/v1/customers", &params).await?;
        let customer: Customer = serde_json::from_value(value)?;
        Ok(customer.id)
    }

    /// One-shot checkout session for an order. The amount is converted to
    /// the provider's minor unit (cents); order and user ids travel in the
    /// session metadata so the completion webhook can find the order.
    #[instrument(skip(self, amount))]
    pub async fn create_order_checkout_session(
        &self,
        order_id: &str,
        user_id: &str,
        customer_id: Option<&str>,
        amount: Decimal,
    ) -> Result<CheckoutSession, ServiceError> {
        let cents = (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::InvalidOperation("Order amount out of range".to_string())
            })?;
        if cents <= 0 {
            return Err(ServiceError::InvalidOperation(
                "Order amount must be positive to start checkout".to_string(),
            ));
        }

        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                format!("{}/orders/{}?checkout=success", self.frontend_url, order_id),
            ),
            (
                "cancel_url".to_string(),
                format!("{}/orders/{}?checkout=cancelled", self.frontend_url, order_id),
            ),
            (
                "line_items[0][price_data][currency]".to_string(),
                "usd".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("Order {}", order_id),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                cents.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[order_id]".to_string(), order_id.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];
        if let Some(customer) = customer_id {
            params.push(("customer".to_string(), customer.to_string()));
        }

        let value = self.post_form("/v1/checkout/sessions", &params).await?;
        serde_json::from_value(value).map_err(ServiceError::from)
    }

    /// Recurring checkout session for a subscription price
    #[instrument(skip(self))]
    pub async fn create_subscription_checkout_session(
        &self,
        price_id: &str,
        user_id: &str,
        plan_type: &str,
        customer_id: Option<&str>,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut params = vec![
            ("mode".to_string(), "subscription".to_string()),
            (
                "success_url".to_string(),
                format!("{}/account/subscription?checkout=success", self.frontend_url),
            ),
            (
                "cancel_url".to_string(),
                format!("{}/account/subscription?checkout=cancelled", self.frontend_url),
            ),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
            (
                "subscription_data[metadata][user_id]".to_string(),
                user_id.to_string(),
            ),
            (
                "subscription_data[metadata][type]".to_string(),
                plan_type.to_string(),
            ),
        ];
        if let Some(customer) = customer_id {
            params.push(("customer".to_string(), customer.to_string()));
        }

        let value = self.post_form("/v1/checkout/sessions", &params).await?;
        serde_json::from_value(value).map_err(ServiceError::from)
    }
}
