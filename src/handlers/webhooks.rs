//! Inbound webhook adapters for the three upstream providers.
//!
//! Every adapter follows the same shape: verify the request, persist the
//! raw event row, dispatch to the matching service, then mark the row
//! processed. A failing handler leaves the row unprocessed for manual
//! inspection; the provider still gets a 200 so it does not retry forever.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::subscription::SubscriptionType,
    entities::webhook_event,
    errors::ServiceError,
    services::clerk::ClerkUser,
    ApiResponse, ApiResult, AppState,
};

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stripe", post(stripe_webhook))
        .route("/clerk", post(clerk_webhook))
        .route("/directus", post(directus_webhook))
        .route("/directus/sync/products", post(directus_sync_products))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verifies a `Stripe-Signature` header: `t=<ts>,v1=<hex hmac>` over
/// `"{t}.{payload}"`, with a timestamp tolerance window.
fn verify_stripe_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: u64,
    now_ts: i64,
) -> bool {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value,
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_ts - ts).unsigned_abs() > tolerance_secs {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    signatures.iter().any(|sig| constant_time_eq(&expected, sig))
}

/// Verifies Svix-style signatures (`svix-id`/`svix-timestamp`/
/// `svix-signature`): base64 HMAC over `"{id}.{timestamp}.{payload}"`,
/// secret carried as `whsec_<base64>`.
fn verify_svix_signature(
    secret: &str,
    id: &str,
    timestamp: &str,
    signature_header: &str,
    payload: &[u8],
    tolerance_secs: u64,
    now_ts: i64,
) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_ts - ts).unsigned_abs() > tolerance_secs {
        return false;
    }

    let key_b64 = secret.strip_prefix("whsec_").unwrap_or(secret);
    let Ok(key) = base64::engine::general_purpose::STANDARD.decode(key_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
        return false;
    };
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    // Header holds space-separated "v1,<base64>" entries
    signature_header.split_whitespace().any(|entry| {
        entry
            .split_once(',')
            .map(|(version, sig)| version == "v1" && constant_time_eq(&expected, sig))
            .unwrap_or(false)
    })
}

async fn record_event(
    db: &DbPool,
    source: &str,
    event_type: &str,
    payload: &str,
) -> Result<webhook_event::Model, ServiceError> {
    Ok(webhook_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        source: Set(source.to_string()),
        event_type: Set(event_type.to_string()),
        payload: Set(payload.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

async fn mark_processed(db: &DbPool, event: webhook_event::Model) -> Result<(), ServiceError> {
    let mut active: webhook_event::ActiveModel = event.into();
    active.processed = Set(true);
    active.processed_at = Set(Some(Utc::now()));
    active.update(db).await?;
    Ok(())
}

/// Completes the persist/dispatch/mark cycle. Handler failures leave the
/// event row unprocessed and are logged, not surfaced to the provider.
async fn finish_event(
    state: &AppState,
    event: webhook_event::Model,
    outcome: Result<(), ServiceError>,
) -> ApiResult<Value> {
    match outcome {
        Ok(()) => {
            mark_processed(&state.db, event).await?;
        }
        Err(e) => {
            warn!(event_id = %event.id, source = %event.source, event_type = %event.event_type,
                error = %e, "webhook handler failed; event left unprocessed");
        }
    }
    Ok(Json(ApiResponse::success(json!({ "received": true }))))
}

fn payload_str(body: &Bytes) -> Result<&str, ServiceError> {
    std::str::from_utf8(body)
        .map_err(|_| ServiceError::ValidationError("Webhook body is not valid UTF-8".to_string()))
}

#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "webhooks",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Signature verification failed")
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        ServiceError::InvalidOperation("Payments webhook is not configured".to_string())
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Missing webhook signature".to_string()))?;

    if !verify_stripe_signature(
        secret,
        signature,
        &body,
        state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    ) {
        return Err(ServiceError::Unauthorized(
            "Invalid webhook signature".to_string(),
        ));
    }

    let payload = payload_str(&body)?;
    let event: Value = serde_json::from_str(payload)?;
    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let row = record_event(&state.db, "stripe", &event_type, payload).await?;
    info!(event_type = %event_type, "payment webhook received");

    let outcome = dispatch_stripe_event(&state, &event_type, &event).await;
    finish_event(&state, row, outcome).await
}

async fn dispatch_stripe_event(
    state: &AppState,
    event_type: &str,
    event: &Value,
) -> Result<(), ServiceError> {
    let object = event
        .pointer("/data/object")
        .ok_or_else(|| ServiceError::ValidationError("Event has no data object".to_string()))?;

    match event_type {
        "checkout.session.completed" => {
            if object.get("mode").and_then(Value::as_str) != Some("payment") {
                // subscription checkouts are handled by subscription events
                return Ok(());
            }
            let order_id = object
                .pointer("/metadata/order_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "Checkout session carries no order metadata".to_string(),
                    )
                })?;
            let payment_intent = object
                .get("payment_intent")
                .and_then(Value::as_str)
                .map(str::to_string);

            state
                .services
                .orders
                .mark_order_paid(order_id, payment_intent)
                .await
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let id = object
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ServiceError::ValidationError("Subscription event has no id".to_string())
                })?;
            let user_id = object
                .pointer("/metadata/user_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "Subscription event carries no user metadata".to_string(),
                    )
                })?;
            let subscription_type = object
                .pointer("/metadata/type")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<SubscriptionType>().ok())
                .unwrap_or(SubscriptionType::VipClient);
            let provider_status = object
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("active");
            let price_id = object
                .pointer("/items/data/0/price/id")
                .and_then(Value::as_str)
                .map(str::to_string);
            let customer_id = object
                .get("customer")
                .and_then(Value::as_str)
                .map(str::to_string);
            let current_period_end = object
                .get("current_period_end")
                .and_then(Value::as_i64)
                .and_then(|secs| DateTime::from_timestamp(secs, 0));

            state
                .services
                .subscriptions
                .upsert_from_provider(
                    id,
                    user_id,
                    subscription_type,
                    provider_status,
                    price_id,
                    customer_id,
                    current_period_end,
                )
                .await
                .map(|_| ())
        }
        "customer.subscription.deleted" => {
            let id = object
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ServiceError::ValidationError("Subscription event has no id".to_string())
                })?;
            state.services.subscriptions.cancel_from_provider(id).await
        }
        _ => {
            info!(event_type = %event_type, "ignoring unhandled payment event");
            Ok(())
        }
    }
}

#[utoipa::path(
    post,
    path = "/webhooks/clerk",
    tag = "webhooks",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Signature verification failed")
    )
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let secret = state.config.clerk_webhook_secret.as_deref().ok_or_else(|| {
        ServiceError::InvalidOperation("Identity webhook is not configured".to_string())
    })?;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {} header", name)))
    };
    let svix_id = header("svix-id")?;
    let svix_timestamp = header("svix-timestamp")?;
    let svix_signature = header("svix-signature")?;

    if !verify_svix_signature(
        secret,
        svix_id,
        svix_timestamp,
        svix_signature,
        &body,
        state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    ) {
        return Err(ServiceError::Unauthorized(
            "Invalid webhook signature".to_string(),
        ));
    }

    let payload = payload_str(&body)?;
    let event: Value = serde_json::from_str(payload)?;
    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let row = record_event(&state.db, "clerk", &event_type, payload).await?;
    info!(event_type = %event_type, "identity webhook received");

    let outcome = dispatch_clerk_event(&state, &event_type, &event).await;
    finish_event(&state, row, outcome).await
}

async fn dispatch_clerk_event(
    state: &AppState,
    event_type: &str,
    event: &Value,
) -> Result<(), ServiceError> {
    let data = event
        .get("data")
        .cloned()
        .ok_or_else(|| ServiceError::ValidationError("Event has no data".to_string()))?;

    match event_type {
        "user.created" | "user.updated" => {
            let mut provider_user: ClerkUser = serde_json::from_value(data)?;

            // Some payload variants omit the addresses; fall back to the
            // management API when we have credentials for it.
            if provider_user.primary_email().is_none() {
                if let Some(clerk) = &state.services.clerk {
                    provider_user = clerk.get_user(&provider_user.id).await?;
                }
            }
            let email = provider_user.primary_email().ok_or_else(|| {
                ServiceError::ValidationError("User event carries no email address".to_string())
            })?;

            state
                .services
                .users
                .upsert_from_identity_provider(
                    &provider_user.id,
                    email,
                    provider_user.first_name.clone(),
                    provider_user.last_name.clone(),
                )
                .await
                .map(|_| ())
        }
        "user.deleted" => {
            let id = event
                .pointer("/data/id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ServiceError::ValidationError("User event has no id".to_string())
                })?;
            state.services.users.delete_from_identity_provider(id).await
        }
        _ => {
            info!(event_type = %event_type, "ignoring unhandled identity event");
            Ok(())
        }
    }
}

fn check_directus_token(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let secret = state.config.directus_webhook_secret.as_deref().ok_or_else(|| {
        ServiceError::InvalidOperation("CMS webhook is not configured".to_string())
    })?;
    let token = headers
        .get("x-directus-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Missing CMS token".to_string()))?;
    if !constant_time_eq(secret, token) {
        return Err(ServiceError::Unauthorized("Invalid CMS token".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/webhooks/directus",
    tag = "webhooks",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Token verification failed")
    )
)]
pub async fn directus_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    check_directus_token(&state, &headers)?;

    let payload = payload_str(&body)?;
    let event: Value = serde_json::from_str(payload)?;
    let event_type = event
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let row = record_event(&state.db, "directus", &event_type, payload).await?;
    info!(event_type = %event_type, "CMS webhook received");

    let outcome = dispatch_directus_event(&state, &event_type, &event).await;
    finish_event(&state, row, outcome).await
}

/// Collects the affected item ids from `key`, `keys` or the payload body
fn directus_item_ids(event: &Value) -> Vec<Uuid> {
    let mut ids = Vec::new();
    let push = |ids: &mut Vec<Uuid>, value: &Value| {
        let parsed = match value {
            Value::String(s) => Uuid::parse_str(s).ok(),
            _ => None,
        };
        if let Some(id) = parsed {
            ids.push(id);
        }
    };

    if let Some(key) = event.get("key") {
        push(&mut ids, key);
    }
    if let Some(keys) = event.get("keys").and_then(Value::as_array) {
        for key in keys {
            push(&mut ids, key);
        }
    }
    if ids.is_empty() {
        if let Some(id) = event.pointer("/payload/id") {
            push(&mut ids, id);
        }
    }
    ids
}

async fn dispatch_directus_event(
    state: &AppState,
    event_type: &str,
    event: &Value,
) -> Result<(), ServiceError> {
    if event.get("collection").and_then(Value::as_str) != Some("products") {
        info!("ignoring CMS event for unmirrored collection");
        return Ok(());
    }

    let ids = directus_item_ids(event);
    if ids.is_empty() {
        return Err(ServiceError::ValidationError(
            "CMS event carries no item ids".to_string(),
        ));
    }

    if event_type.ends_with("items.delete") || event_type.ends_with("delete") {
        for id in ids {
            state.services.products.delete_from_cms(id).await?;
        }
        return Ok(());
    }

    let directus = state.services.directus.as_ref().ok_or_else(|| {
        ServiceError::InvalidOperation("CMS client is not configured".to_string())
    })?;

    for id in ids {
        let item = directus.fetch_product(id).await?;
        state
            .services
            .products
            .upsert_from_cms(
                item.id,
                item.name,
                item.description,
                item.price,
                item.image_url,
                item.stock,
                item.seller_id,
            )
            .await?;
    }
    Ok(())
}

/// Full pull-sync of the CMS product catalog into the local mirror
#[utoipa::path(
    post,
    path = "/webhooks/directus/sync/products",
    tag = "webhooks",
    responses(
        (status = 200, description = "Catalog synced"),
        (status = 401, description = "Token verification failed")
    )
)]
pub async fn directus_sync_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Value> {
    check_directus_token(&state, &headers)?;

    let directus = state.services.directus.as_ref().ok_or_else(|| {
        ServiceError::InvalidOperation("CMS client is not configured".to_string())
    })?;

    let items = directus.fetch_products().await?;
    let total = items.len();
    for item in items {
        state
            .services
            .products
            .upsert_from_cms(
                item.id,
                item.name,
                item.description,
                item.price,
                item.image_url,
                item.stock,
                item.seller_id,
            )
            .await?;
    }

    info!(total, "CMS catalog synced");
    Ok(Json(ApiResponse::with_message(
        "Catalog synced",
        json!({ "synced": total }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe_header(secret: &str, ts: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(payload);
        format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn stripe_signature_accepts_valid_header() {
        let secret = "whsec_test";
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = stripe_header(secret, now, payload);
        assert!(verify_stripe_signature(secret, &header, payload, 300, now));
    }

    #[test]
    fn stripe_signature_rejects_tampered_payload() {
        let secret = "whsec_test";
        let now = 1_700_000_000;
        let header = stripe_header(secret, now, b"original");
        assert!(!verify_stripe_signature(secret, &header, b"tampered", 300, now));
    }

    #[test]
    fn stripe_signature_rejects_stale_timestamp() {
        let secret = "whsec_test";
        let payload = b"payload";
        let signed_at = 1_700_000_000;
        let header = stripe_header(secret, signed_at, payload);
        assert!(!verify_stripe_signature(
            secret,
            &header,
            payload,
            300,
            signed_at + 301
        ));
    }

    #[test]
    fn svix_signature_round_trip() {
        let key = b"0123456789abcdef";
        let secret = format!(
            "whsec_{}",
            base64::engine::general_purpose::STANDARD.encode(key)
        );
        let id = "msg_abc";
        let ts = 1_700_000_000i64;
        let payload = br#"{"type":"user.created"}"#;

        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(format!("{id}.{ts}.").as_bytes());
        mac.update(payload);
        let sig = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        let header = format!("v1,{sig}");

        assert!(verify_svix_signature(
            &secret,
            id,
            &ts.to_string(),
            &header,
            payload,
            300,
            ts
        ));
        assert!(!verify_svix_signature(
            &secret,
            "msg_other",
            &ts.to_string(),
            &header,
            payload,
            300,
            ts
        ));
    }

    #[test]
    fn directus_ids_from_key_and_keys() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let event = json!({
            "event": "items.delete",
            "collection": "products",
            "keys": [id_a.to_string(), id_b.to_string()],
        });
        assert_eq!(directus_item_ids(&event), vec![id_a, id_b]);

        let event = json!({
            "event": "items.create",
            "collection": "products",
            "key": id_a.to_string(),
            "payload": { "id": id_b.to_string() },
        });
        assert_eq!(directus_item_ids(&event), vec![id_a]);
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
