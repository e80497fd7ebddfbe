mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use marketplace_api::entities::user::UserRole;
use serde_json::json;

#[tokio::test]
async fn register_issues_a_working_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["user"]["role"], json!("CLIENT"));
    assert_eq!(body["data"]["user"]["points"], json!(0));
    let token = body["data"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string();

    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = TestApp::new().await;
    app.seed_user("user_ada", "ada@example.com", UserRole::Client, 0)
        .await;

    let response = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "ada@example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_rejects_unknown_accounts() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_returns_a_token_for_existing_accounts() {
    let app = TestApp::new().await;
    let user = app
        .seed_user("user_ada", "ada@example.com", UserRole::Client, 42)
        .await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let token = body["data"]["access_token"].as_str().expect("token");

    let path = format!("/api/v1/users/{}", user.id);
    let response = app.request(Method::GET, &path, Some(token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["points"], json!(42));
}

#[tokio::test]
async fn requests_with_garbage_tokens_are_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/orders", Some("not-a-jwt"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_may_only_view_their_own_account() {
    let app = TestApp::new().await;
    let alice = app
        .seed_user("user_alice", "alice@example.com", UserRole::Client, 0)
        .await;
    let bob = app
        .seed_user("user_bob", "bob@example.com", UserRole::Client, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;

    let path = format!("/api/v1/users/{}", bob.id);

    let token = app.token_for(&alice);
    let response = app.request(Method::GET, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&admin);
    let response = app.request(Method::GET, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_users_is_admin_only() {
    let app = TestApp::new().await;
    let client = app
        .seed_user("user_client", "client@example.com", UserRole::Client, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;

    let token = app.token_for(&client);
    let response = app
        .request(Method::GET, "/api/v1/users", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&admin);
    let response = app
        .request(Method::GET, "/api/v1/users", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(2));
}

#[tokio::test]
async fn become_seller_promotes_and_creates_a_profile() {
    let app = TestApp::new().await;
    let user = app
        .seed_user("user_maker", "maker@example.com", UserRole::Client, 0)
        .await;
    let token = app.token_for(&user);

    let path = format!("/api/v1/users/{}/become-seller", user.id);
    let response = app
        .request(
            Method::POST,
            &path,
            Some(&token),
            Some(json!({
                "company_name": "Maker Works",
                "description": "Handmade furniture",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["company_name"], json!("Maker Works"));

    // the role change shows up on the account
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;
    let admin_token = app.token_for(&admin);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/users/{}", user.id),
            Some(&admin_token),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["role"], json!("SELLER"));
    assert!(body["data"]["seller_profile"].is_object());

    // promoting again conflicts; the seeded token still carries CLIENT but
    // the path check passes, so the service-level conflict is what fires
    let response = app
        .request(
            Method::POST,
            &path,
            Some(&token),
            Some(json!({ "company_name": "Maker Works" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn become_seller_is_limited_to_own_account() {
    let app = TestApp::new().await;
    let alice = app
        .seed_user("user_alice", "alice@example.com", UserRole::Client, 0)
        .await;
    let bob = app
        .seed_user("user_bob", "bob@example.com", UserRole::Client, 0)
        .await;

    let token = app.token_for(&alice);
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/users/{}/become-seller", bob.id),
            Some(&token),
            Some(json!({ "company_name": "Not Mine" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // admins may promote anyone
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;
    let token = app.token_for(&admin);
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/users/{}/become-seller", bob.id),
            Some(&token),
            Some(json!({ "company_name": "Bob's Goods" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn health_and_status_report_the_service() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("healthy"));
    assert_eq!(body["data"]["database"], json!("up"));

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], json!("marketplace-api"));
    assert_eq!(body["data"]["environment"], json!("test"));
}
