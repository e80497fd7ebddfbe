use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Subscription plan tiers; the tier must match the subscriber's role
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, utoipa::ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    VipClient,
    SellerBasic,
    SellerPremium,
}

impl SubscriptionType {
    pub fn is_seller_plan(self) -> bool {
        matches!(self, Self::SellerBasic | Self::SellerPremium)
    }
}

/// Local mirror of the payment provider's subscription status
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, utoipa::ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Trial,
}

impl SubscriptionStatus {
    /// Maps a payment-provider status string onto the local taxonomy.
    /// Unknown statuses fall back to ACTIVE, matching upstream behavior.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "trialing" => Self::Trial,
            _ => Self::Active,
        }
    }
}

/// Subscription row keyed by the payment provider's subscription id
/// (e.g. `sub_1N...`); at most one row per user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub user_id: String,

    /// Stored as text; parsed through [`SubscriptionType`]
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub subscription_type: String,

    /// Stored as text; parsed through [`SubscriptionStatus`]
    pub status: String,

    pub stripe_price_id: Option<String>,
    pub stripe_customer_id: Option<String>,

    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
            if let ActiveValue::NotSet = active_model.is_active {
                active_model.is_active = Set(true);
            }
        }
        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_provider("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Trial
        );
        // unknown statuses are treated as active
        assert_eq!(
            SubscriptionStatus::from_provider("incomplete"),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn seller_plans_are_flagged() {
        assert!(SubscriptionType::SellerBasic.is_seller_plan());
        assert!(SubscriptionType::SellerPremium.is_seller_plan());
        assert!(!SubscriptionType::VipClient.is_seller_plan());
    }
}
