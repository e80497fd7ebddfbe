use crate::{
    auth::{policy, AuthUser},
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
}

/// Query-string filters for the product listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductFilters {
    /// Substring match on the product name
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub seller_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    #[schema(value_type = Vec<Object>)]
    pub products: Vec<product::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Catalog operations. Products mirror the headless CMS; writes made here
/// are pushed back out by the CMS sync layer.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send(event).await;
        }
    }

    /// Creates a product owned by the calling seller
    #[instrument(skip(self, caller, request))]
    pub async fn create_product(
        &self,
        caller: &AuthUser,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        if !(caller.is_seller() || caller.is_admin()) {
            return Err(ServiceError::Forbidden(
                "Only sellers may create products".to_string(),
            ));
        }
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            image_url: Set(request.image_url),
            stock: Set(request.stock),
            seller_id: Set(caller.user_id.clone()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(product_id = %created.id, seller_id = %created.seller_id, "product created");
        self.emit(Event::ProductCreated(created.id)).await;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Lists products with optional search and price filters, newest first
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filters: ProductFilters,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let mut condition = Condition::all();
        if let Some(search) = &filters.search {
            condition = condition.add(product::Column::Name.contains(search));
        }
        if let Some(min_price) = filters.min_price {
            condition = condition.add(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = filters.max_price {
            condition = condition.add(product::Column::Price.lte(max_price));
        }
        if let Some(seller_id) = &filters.seller_id {
            condition = condition.add(product::Column::SellerId.eq(seller_id.as_str()));
        }

        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let paginator = ProductEntity::find()
            .filter(condition)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok(ProductListResponse {
            products,
            total,
            page,
            per_page,
        })
    }

    /// All products belonging to one seller
    #[instrument(skip(self))]
    pub async fn list_seller_products(
        &self,
        seller_id: &str,
    ) -> Result<Vec<product::Model>, ServiceError> {
        Ok(ProductEntity::find()
            .filter(product::Column::SellerId.eq(seller_id))
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    /// Updates a product; restricted to the owning seller or an admin
    #[instrument(skip(self, caller, request))]
    pub async fn update_product(
        &self,
        caller: &AuthUser,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        let existing = self.get_product(product_id).await?;
        if !policy::can_modify_product(caller, &existing.seller_id) {
            return Err(ServiceError::Forbidden(
                "You may only edit your own products".to_string(),
            ));
        }
        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(image_url) = request.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(stock) = request.stock {
            active.stock = Set(stock);
        }

        let updated = active.update(&*self.db_pool).await?;
        self.emit(Event::ProductUpdated(product_id)).await;
        Ok(updated)
    }

    /// Deletes a product; restricted to the owning seller or an admin
    #[instrument(skip(self, caller))]
    pub async fn delete_product(
        &self,
        caller: &AuthUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = self.get_product(product_id).await?;
        if !policy::can_modify_product(caller, &existing.seller_id) {
            return Err(ServiceError::Forbidden(
                "You may only delete your own products".to_string(),
            ));
        }

        ProductEntity::delete_by_id(product_id)
            .exec(&*self.db_pool)
            .await?;
        self.emit(Event::ProductDeleted(product_id)).await;
        Ok(())
    }

    /// Upserts a product row mirrored from the CMS, keyed by the CMS item id
    pub async fn upsert_from_cms(
        &self,
        id: Uuid,
        name: String,
        description: Option<String>,
        price: Decimal,
        image_url: Option<String>,
        stock: i32,
        seller_id: String,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db_pool;

        match ProductEntity::find_by_id(id).one(db).await? {
            Some(existing) => {
                let mut active: product::ActiveModel = existing.into();
                active.name = Set(name);
                active.description = Set(description);
                active.price = Set(price);
                active.image_url = Set(image_url);
                active.stock = Set(stock);
                active.seller_id = Set(seller_id);
                let updated = active.update(db).await?;
                self.emit(Event::ProductUpdated(id)).await;
                Ok(updated)
            }
            None => {
                let created = product::ActiveModel {
                    id: Set(id),
                    name: Set(name),
                    description: Set(description),
                    price: Set(price),
                    image_url: Set(image_url),
                    stock: Set(stock),
                    seller_id: Set(seller_id),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                self.emit(Event::ProductCreated(id)).await;
                Ok(created)
            }
        }
    }

    /// Removes a product in response to a CMS deletion; missing rows are
    /// ignored so webhook replays stay idempotent.
    pub async fn delete_from_cms(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = ProductEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected > 0 {
            self.emit(Event::ProductDeleted(id)).await;
        }
        Ok(())
    }
}
