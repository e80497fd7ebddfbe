mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, test_config, TestApp};
use marketplace_api::entities::user::{self, UserRole};
use rust_decimal_macros::dec;
use serde_json::json;

struct Scene {
    app: TestApp,
    buyer: user::Model,
    other_client: user::Model,
    seller: user::Model,
    other_seller: user::Model,
    admin: user::Model,
    order_id: String,
}

async fn scene_with(app: TestApp) -> Scene {
    let buyer = app
        .seed_user("user_buyer", "buyer@example.com", UserRole::Client, 0)
        .await;
    let other_client = app
        .seed_user("user_other", "other@example.com", UserRole::Client, 0)
        .await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    let other_seller = app
        .seed_user("user_rival", "rival@example.com", UserRole::Seller, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;

    let product = app.seed_product(&seller.id, "Teapot", dec!(40), 10).await;
    let token = app.token_for(&buyer);
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "items": [{ "product_id": product.id, "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("order id")
        .to_string();

    Scene {
        app,
        buyer,
        other_client,
        seller,
        other_seller,
        admin,
        order_id,
    }
}

async fn scene() -> Scene {
    scene_with(TestApp::new().await).await
}

#[tokio::test]
async fn order_detail_is_role_scoped() {
    let s = scene().await;
    let path = format!("/api/v1/orders/{}", s.order_id);

    let cases = [
        (&s.buyer, StatusCode::OK),
        (&s.other_client, StatusCode::FORBIDDEN),
        (&s.seller, StatusCode::OK),
        (&s.other_seller, StatusCode::FORBIDDEN),
        (&s.admin, StatusCode::OK),
    ];
    for (caller, expected) in cases {
        let token = s.app.token_for(caller);
        let response = s.app.request(Method::GET, &path, Some(&token), None).await;
        assert_eq!(response.status(), expected, "caller {}", caller.id);
    }
}

#[tokio::test]
async fn order_listing_is_role_scoped() {
    let s = scene().await;

    let cases = [
        (&s.buyer, 1),
        (&s.other_client, 0),
        (&s.seller, 1),
        (&s.other_seller, 0),
        (&s.admin, 1),
    ];
    for (caller, expected) in cases {
        let token = s.app.token_for(caller);
        let response = s
            .app
            .request(Method::GET, "/api/v1/orders", Some(&token), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(
            body["data"]["orders"].as_array().map(Vec::len),
            Some(expected),
            "caller {}",
            caller.id
        );
    }
}

#[tokio::test]
async fn only_admins_may_patch_order_status_by_default() {
    let s = scene().await;
    let path = format!("/api/v1/orders/{}/status", s.order_id);
    let patch = json!({ "status": "SHIPPED" });

    for caller in [&s.buyer, &s.seller] {
        let token = s.app.token_for(caller);
        let response = s
            .app
            .request(Method::PATCH, &path, Some(&token), Some(patch.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "caller {}", caller.id);
    }

    let token = s.app.token_for(&s.admin);
    let response = s
        .app
        .request(Method::PATCH, &path, Some(&token), Some(patch))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("SHIPPED"));
}

#[tokio::test]
async fn sellers_may_patch_status_when_enabled() {
    let mut cfg = test_config();
    cfg.allow_seller_status_updates = true;
    let s = scene_with(TestApp::with_config(cfg).await).await;
    let path = format!("/api/v1/orders/{}/status", s.order_id);

    // only for orders carrying the seller's own products
    let token = s.app.token_for(&s.other_seller);
    let response = s
        .app
        .request(
            Method::PATCH,
            &path,
            Some(&token),
            Some(json!({ "status": "SHIPPED" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = s.app.token_for(&s.seller);
    let response = s
        .app
        .request(
            Method::PATCH,
            &path,
            Some(&token),
            Some(json!({ "status": "SHIPPED" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_the_owner_may_cancel() {
    let s = scene().await;
    let path = format!("/api/v1/orders/{}/cancel", s.order_id);

    let token = s.app.token_for(&s.other_client);
    let response = s.app.request(Method::POST, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = s.app.token_for(&s.seller);
    let response = s.app.request(Method::POST, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = s.app.token_for(&s.buyer);
    let response = s.app.request(Method::POST, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
