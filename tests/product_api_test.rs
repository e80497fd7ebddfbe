mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use marketplace_api::entities::user::UserRole;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn only_sellers_may_create_products() {
    let app = TestApp::new().await;
    let client = app
        .seed_user("user_client", "client@example.com", UserRole::Client, 0)
        .await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;

    let payload = json!({
        "name": "Walnut desk",
        "description": "Solid walnut, oiled finish",
        "price": "450.00",
        "stock": 3,
    });

    let token = app.token_for(&client);
    let response = app
        .request(Method::POST, "/api/v1/products", Some(&token), Some(payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&seller);
    let response = app
        .request(Method::POST, "/api/v1/products", Some(&token), Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], json!("Walnut desk"));
    assert_eq!(body["data"]["seller_id"], json!(seller.id));
    assert_eq!(body["data"]["stock"], json!(3));
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let app = TestApp::new().await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    let token = app.token_for(&seller);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({ "name": "Freebie", "price": "-1", "stock": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_is_public_and_filterable() {
    let app = TestApp::new().await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    app.seed_product(&seller.id, "Oak chair", dec!(120), 4).await;
    app.seed_product(&seller.id, "Oak table", dec!(480), 2).await;
    app.seed_product(&seller.id, "Brass lamp", dec!(75), 9).await;

    let response = app.request(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(3));

    let response = app
        .request(Method::GET, "/api/v1/products?search=Oak", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(2));

    let response = app
        .request(Method::GET, "/api/v1/products?min_price=100&max_price=200", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["products"][0]["name"], json!("Oak chair"));
}

#[tokio::test]
async fn sellers_may_only_modify_their_own_products() {
    let app = TestApp::new().await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    let rival = app
        .seed_user("user_rival", "rival@example.com", UserRole::Seller, 0)
        .await;
    let product = app.seed_product(&seller.id, "Oak chair", dec!(120), 4).await;

    let path = format!("/api/v1/products/{}", product.id);
    let patch = json!({ "stock": 10 });

    let token = app.token_for(&rival);
    let response = app
        .request(Method::PATCH, &path, Some(&token), Some(patch.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = app.token_for(&seller);
    let response = app
        .request(Method::PATCH, &path, Some(&token), Some(patch))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock"], json!(10));
}

#[tokio::test]
async fn admins_may_modify_any_product() {
    let app = TestApp::new().await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    let admin = app
        .seed_user("user_admin", "admin@example.com", UserRole::Admin, 0)
        .await;
    let product = app.seed_product(&seller.id, "Oak chair", dec!(120), 4).await;

    let token = app.token_for(&admin);
    let path = format!("/api/v1/products/{}", product.id);
    let response = app.request(Method::DELETE, &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, &path, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_product_returns_not_found() {
    let app = TestApp::new().await;
    let path = format!("/api/v1/products/{}", Uuid::new_v4());
    let response = app.request(Method::GET, &path, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn seller_catalog_listing() {
    let app = TestApp::new().await;
    let seller = app
        .seed_user("user_seller", "seller@example.com", UserRole::Seller, 0)
        .await;
    let rival = app
        .seed_user("user_rival", "rival@example.com", UserRole::Seller, 0)
        .await;
    app.seed_product(&seller.id, "Oak chair", dec!(120), 4).await;
    app.seed_product(&rival.id, "Brass lamp", dec!(75), 9).await;

    let path = format!("/api/v1/products/seller/{}", seller.id);
    let response = app.request(Method::GET, &path, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let products = body["data"].as_array().expect("product list");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], json!("Oak chair"));
}
