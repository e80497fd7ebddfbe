use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    handlers::common::PaginationParams,
    services::directus::CmsProduct,
    services::products::{
        CreateProductRequest, ProductFilters, ProductListResponse, UpdateProductRequest,
    },
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/seller/:seller_id", get(list_seller_products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    params(ProductFilters, PaginationParams),
    responses((status = 200, description = "Product catalog page"))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<ProductListResponse> {
    let products = state
        .services
        .products
        .list_products(filters, pagination.page, pagination.per_page)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Creates a product and, when a CMS is configured, pushes it out so the
/// catalog stays in sync.
#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "products",
    request_body = CreateProductRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Product created"),
        (status = 403, description = "Caller is not a seller")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    let created = state.services.products.create_product(&auth, request).await?;
    push_to_cms(&state, &created).await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Product created", created)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let found = state.services.products.get_product(id).await?;
    Ok(Json(ApiResponse::success(found)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product updated"),
        (status = 403, description = "Caller does not own the product")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<product::Model> {
    let updated = state
        .services
        .products
        .update_product(&auth, id, request)
        .await?;
    push_to_cms(&state, &updated).await;

    Ok(Json(ApiResponse::with_message("Product updated", updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Caller does not own the product")
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.products.delete_product(&auth, id).await?;
    Ok(Json(ApiResponse::with_message(
        "Product deleted",
        serde_json::json!({ "id": id }),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/seller/{seller_id}",
    tag = "products",
    params(("seller_id" = String, Path, description = "Seller user id")),
    responses((status = 200, description = "All products of one seller"))
)]
pub async fn list_seller_products(
    State(state): State<AppState>,
    Path(seller_id): Path<String>,
) -> ApiResult<Vec<product::Model>> {
    let products = state
        .services
        .products
        .list_seller_products(&seller_id)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Mirrors a local product write out to the CMS. Sync failures are logged
/// and never fail the request that caused them.
async fn push_to_cms(state: &AppState, product: &product::Model) {
    let Some(directus) = &state.services.directus else {
        return;
    };

    let item = CmsProduct {
        id: product.id,
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price,
        image_url: product.image_url.clone(),
        stock: product.stock,
        seller_id: product.seller_id.clone(),
    };

    if let Err(e) = directus.push_product(&item).await {
        tracing::warn!(product_id = %product.id, error = %e, "CMS push failed");
    }
}
