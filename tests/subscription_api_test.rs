mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use marketplace_api::entities::user::UserRole;
use serde_json::json;

#[tokio::test]
async fn plan_tier_must_match_the_role() {
    let app = TestApp::new().await;
    let client = app
        .seed_user("user_client", "client@example.com", UserRole::Client, 0)
        .await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;

    // a client may not take a seller plan
    let token = app.token_for(&client);
    let response = app
        .request(
            Method::POST,
            "/api/v1/subscriptions",
            Some(&token),
            Some(json!({ "id": "sub_c1", "type": "SELLER_BASIC" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // nor a seller a client plan
    let token = app.token_for(&seller);
    let response = app
        .request(
            Method::POST,
            "/api/v1/subscriptions",
            Some(&token),
            Some(json!({ "id": "sub_s1", "type": "VIP_CLIENT" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/subscriptions",
            Some(&token),
            Some(json!({ "id": "sub_s1", "type": "SELLER_PREMIUM" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["type"], json!("SELLER_PREMIUM"));
    assert_eq!(body["data"]["status"], json!("ACTIVE"));
    assert_eq!(body["data"]["is_active"], json!(true));
}

#[tokio::test]
async fn at_most_one_subscription_per_user() {
    let app = TestApp::new().await;
    let client = app
        .seed_user("user_client", "client@example.com", UserRole::Client, 0)
        .await;
    let token = app.token_for(&client);

    let response = app
        .request(
            Method::POST,
            "/api/v1/subscriptions",
            Some(&token),
            Some(json!({ "id": "sub_1", "type": "VIP_CLIENT" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/subscriptions",
            Some(&token),
            Some(json!({ "id": "sub_2", "type": "VIP_CLIENT" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn own_subscription_lifecycle() {
    let app = TestApp::new().await;
    let client = app
        .seed_user("user_client", "client@example.com", UserRole::Client, 0)
        .await;
    let token = app.token_for(&client);

    // nothing yet
    let response = app
        .request(Method::GET, "/api/v1/subscriptions/me", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.request(
        Method::POST,
        "/api/v1/subscriptions",
        Some(&token),
        Some(json!({ "id": "sub_1", "type": "VIP_CLIENT" })),
    )
    .await;

    let response = app
        .request(Method::GET, "/api/v1/subscriptions/me", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], json!("sub_1"));

    // deactivation keeps the row but flips it off
    let response = app
        .request(Method::DELETE, "/api/v1/subscriptions/me", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("CANCELED"));
    assert_eq!(body["data"]["is_active"], json!(false));
    assert!(body["data"]["end_date"].is_string());
}

#[tokio::test]
async fn subscription_reads_are_scoped() {
    let app = TestApp::new().await;
    let owner = app
        .seed_user("user_owner", "owner@example.com", UserRole::Client, 0)
        .await;
    let other = app
        .seed_user("user_other", "other@example.com", UserRole::Client, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;

    let token = app.token_for(&owner);
    app.request(
        Method::POST,
        "/api/v1/subscriptions",
        Some(&token),
        Some(json!({ "id": "sub_1", "type": "VIP_CLIENT" })),
    )
    .await;

    let token = app.token_for(&other);
    let response = app
        .request(Method::GET, "/api/v1/subscriptions/sub_1", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::GET, "/api/v1/subscriptions", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&admin);
    let response = app
        .request(Method::GET, "/api/v1/subscriptions", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));
}

#[tokio::test]
async fn admin_updates_and_deletes_subscriptions() {
    let app = TestApp::new().await;
    let owner = app
        .seed_user("user_owner", "owner@example.com", UserRole::Client, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;

    let token = app.token_for(&owner);
    app.request(
        Method::POST,
        "/api/v1/subscriptions",
        Some(&token),
        Some(json!({ "id": "sub_1", "type": "VIP_CLIENT" })),
    )
    .await;

    // owners cannot patch
    let response = app
        .request(
            Method::PATCH,
            "/api/v1/subscriptions/sub_1",
            Some(&token),
            Some(json!({ "status": "PAST_DUE" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&admin);
    let response = app
        .request(
            Method::PATCH,
            "/api/v1/subscriptions/sub_1",
            Some(&token),
            Some(json!({ "status": "PAST_DUE", "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("PAST_DUE"));

    let response = app
        .request(Method::DELETE, "/api/v1/subscriptions/sub_1", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/subscriptions/sub_1", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
