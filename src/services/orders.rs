use crate::{
    auth::{policy, AuthUser},
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Fraction of the payable total credited back as reward points
const POINTS_EARN_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    /// Reward points the buyer chooses to redeem against this order
    #[serde(default)]
    pub points_used: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Product detail joined into order reads. The line item keeps its own
/// `price` as charged; this summary reflects the catalog at read time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub image_url: Option<String>,
}

impl From<product::Model> for ProductSummary {
    fn from(product: product::Model) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            image_url: product.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// None when the product has since been removed from the catalog
    pub product: Option<ProductSummary>,
}

impl From<(order_item::Model, Option<product::Model>)> for OrderItemResponse {
    fn from((item, product): (order_item::Model, Option<product::Model>)) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            product: product.map(ProductSummary::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: String,
    pub status: String,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub points_used: i32,
    pub points_earned: i32,
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_parts(
        order: order::Model,
        items: Vec<(order_item::Model, Option<product::Model>)>,
    ) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            points_used: order.points_used,
            points_earned: order.points_earned,
            stripe_payment_intent_id: order.stripe_payment_intent_id,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order workflow: placement, role-scoped reads, status patches and
/// cancellation. All multi-row writes go through one transaction.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    allow_seller_status_updates: bool,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        allow_seller_status_updates: bool,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            allow_seller_status_updates,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send(event).await;
        }
    }

    /// Places an order.
    ///
    /// Validation happens before any write: the items must be non-empty with
    /// positive quantities, every product must exist, and `points_used` may
    /// not exceed the buyer's balance. Stock is then taken with a conditional
    /// decrement (`stock = stock - q WHERE stock >= q`) so two concurrent
    /// orders can never oversell a product.
    ///
    /// The payable total is the item total minus `min(points_used, total)`;
    /// the buyer earns `floor(payable * 0.05)` points and is debited the
    /// full `points_used` they chose to redeem.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: &str,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        for item in &request.items {
            item.validate()?;
        }
        if request.points_used < 0 {
            return Err(ServiceError::ValidationError(
                "Points used cannot be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let buyer = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if request.points_used > buyer.points {
            return Err(ServiceError::ValidationError(format!(
                "Insufficient points: requested {}, available {}",
                request.points_used, buyer.points
            )));
        }

        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let mut item_total = Decimal::ZERO;
        let mut priced_items = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for product {}: requested {}, available {}",
                    product.name, item.quantity, product.stock
                )));
            }

            // Conditional decrement; a concurrent order may have taken the
            // stock between the read above and this write.
            let result = ProductEntity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for product {}",
                    product.name
                )));
            }

            item_total += product.price * Decimal::from(item.quantity);
            priced_items.push((item.quantity, product));
        }

        let discount = Decimal::from(request.points_used).min(item_total);
        let total_amount = item_total - discount;
        let points_earned = (total_amount * POINTS_EARN_RATE)
            .floor()
            .to_i32()
            .unwrap_or(0);

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id.to_string()),
            status: Set(OrderStatus::Pending.to_string()),
            total_amount: Set(total_amount),
            points_used: Set(request.points_used),
            points_earned: Set(points_earned),
            stripe_payment_intent_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut saved_items = Vec::with_capacity(priced_items.len());
        for (quantity, product) in priced_items {
            let saved = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                price: Set(product.price),
            }
            .insert(&txn)
            .await?;
            saved_items.push((saved, Some(product)));
        }

        let new_balance = buyer.points - request.points_used + points_earned;
        let mut buyer_active: user::ActiveModel = buyer.into();
        buyer_active.points = Set(new_balance);
        buyer_active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total = %total_amount, "order created");
        self.emit(Event::OrderCreated(order_id)).await;
        self.emit(Event::PointsAdjusted {
            user_id: user_id.to_string(),
            delta: points_earned - request.points_used,
            balance: new_balance,
        })
        .await;

        Ok(OrderResponse::from_parts(order_model, saved_items))
    }

    /// Returns the order if the caller is allowed to see it
    #[instrument(skip(self, caller))]
    pub async fn get_order(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let contains_caller_product = self.order_contains_seller_product(order_id, caller).await?;
        if !policy::can_view_order(caller, &order.user_id, contains_caller_product) {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        let items = OrderItemEntity::find()
            .find_also_related(ProductEntity)
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(OrderResponse::from_parts(order, items))
    }

    /// Lists orders visible to the caller, most recent first.
    /// Admins see everything, clients their own orders, sellers the orders
    /// containing at least one of their products.
    #[instrument(skip(self, caller))]
    pub async fn list_orders(
        &self,
        caller: &AuthUser,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);

        match caller.role {
            crate::entities::user::UserRole::Admin => {}
            crate::entities::user::UserRole::Client => {
                query = query.filter(order::Column::UserId.eq(caller.user_id.as_str()));
            }
            crate::entities::user::UserRole::Seller => {
                let order_ids = self.seller_order_ids(&caller.user_id).await?;
                query = query.filter(order::Column::Id.is_in(order_ids));
            }
        }

        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<(order_item::Model, Option<product::Model>)>> =
            HashMap::new();
        if !order_ids.is_empty() {
            for pair in OrderItemEntity::find()
                .find_also_related(ProductEntity)
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(db)
                .await?
            {
                items_by_order.entry(pair.0.order_id).or_default().push(pair);
            }
        }

        let orders = orders
            .into_iter()
            .map(|o| {
                let items = items_by_order.remove(&o.id).unwrap_or_default();
                OrderResponse::from_parts(o, items)
            })
            .collect();

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Applies a status patch. Who may patch is policy-driven; there is no
    /// transition-legality check beyond that.
    #[instrument(skip(self, caller))]
    pub async fn update_order_status(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let contains_caller_product = self.order_contains_seller_product(order_id, caller).await?;
        if !policy::can_update_order_status(
            caller,
            contains_caller_product,
            self.allow_seller_status_updates,
        ) {
            return Err(ServiceError::Forbidden(
                "You are not allowed to update this order's status".to_string(),
            ));
        }

        let old_status = order.status.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        let updated = active.update(db).await?;

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: new_status.to_string(),
        })
        .await;

        let items = OrderItemEntity::find()
            .find_also_related(ProductEntity)
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(OrderResponse::from_parts(updated, items))
    }

    /// Cancels a PENDING order, restoring stock and reversing the points
    /// movement in one transaction. Non-PENDING orders are rejected without
    /// touching anything. The reversal is clamped so the owner's balance
    /// never goes negative, even when earned points were spent since.
    #[instrument(skip(self, caller))]
    pub async fn cancel_order(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !policy::can_cancel_order(caller, &order.user_id) {
            return Err(ServiceError::Forbidden(
                "Only the order's owner may cancel it".to_string(),
            ));
        }

        if order.status() != Some(OrderStatus::Pending) {
            return Err(ServiceError::InvalidOperation(format!(
                "Only PENDING orders can be cancelled (current status: {})",
                order.status
            )));
        }

        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let items = OrderItemEntity::find()
            .find_also_related(ProductEntity)
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        for (item, _) in &items {
            ProductEntity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }

        let owner = UserEntity::find_by_id(&order.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", order.user_id)))?;

        let new_balance = (owner.points + order.points_used - order.points_earned).max(0);
        let mut owner_active: user::ActiveModel = owner.into();
        owner_active.points = Set(new_balance);
        owner_active.update(&txn).await?;

        let order_user_id = order.user_id.clone();
        let points_delta = order.points_used - order.points_earned;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled.to_string());
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit cancellation transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "order cancelled");
        self.emit(Event::OrderCancelled(order_id)).await;
        self.emit(Event::PointsAdjusted {
            user_id: order_user_id,
            delta: points_delta,
            balance: new_balance,
        })
        .await;

        Ok(OrderResponse::from_parts(updated, items))
    }

    /// Marks the order referenced by a payment intent as PAID.
    /// Used by the payment webhook adapter.
    pub async fn mark_order_paid(
        &self,
        order_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status.clone();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Paid.to_string());
        if let Some(pi) = payment_intent_id {
            active.stripe_payment_intent_id = Set(Some(pi));
        }
        active.update(db).await?;

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: OrderStatus::Paid.to_string(),
        })
        .await;

        Ok(())
    }

    /// Whether the order carries at least one product owned by the caller.
    /// Only meaningful for sellers; skipped for other roles.
    async fn order_contains_seller_product(
        &self,
        order_id: Uuid,
        caller: &AuthUser,
    ) -> Result<bool, ServiceError> {
        if !caller.is_seller() {
            return Ok(false);
        }

        let count = OrderItemEntity::find()
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(product::Column::SellerId.eq(caller.user_id.as_str()))
            .count(&*self.db_pool)
            .await?;

        Ok(count > 0)
    }

    /// Ids of all orders containing at least one of the seller's products
    async fn seller_order_ids(&self, seller_id: &str) -> Result<Vec<Uuid>, ServiceError> {
        let ids: Vec<Uuid> = OrderItemEntity::find()
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .filter(product::Column::SellerId.eq(seller_id))
            .select_only()
            .column(order_item::Column::OrderId)
            .distinct()
            .into_tuple()
            .all(&*self.db_pool)
            .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn earn_rate_constant_is_five_percent() {
        assert_eq!(POINTS_EARN_RATE, dec!(0.05));
    }

    #[test]
    fn points_arithmetic_matches_worked_example() {
        // two items at 50 each, 30 points redeemed
        let item_total = Decimal::from(100);
        let points_used = 30;

        let discount = Decimal::from(points_used).min(item_total);
        let total = item_total - discount;
        let earned = (total * POINTS_EARN_RATE).floor().to_i32().unwrap();

        assert_eq!(total, Decimal::from(70));
        assert_eq!(earned, 3);
        assert_eq!(100 - points_used + earned, 73);
    }

    #[test]
    fn discount_is_capped_at_item_total() {
        let item_total = Decimal::from(20);
        let discount = Decimal::from(50).min(item_total);
        assert_eq!(discount, Decimal::from(20));
        assert_eq!(item_total - discount, Decimal::ZERO);
    }
}
