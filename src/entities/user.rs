use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role assigned to every marketplace account.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, utoipa::ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Client,
    Seller,
    Admin,
}

/// User mirrored from the identity provider. The primary key is the
/// provider-issued id (e.g. `user_2aB...`), kept verbatim so webhook
/// payloads can address rows directly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// Stored as text; parsed through [`UserRole`]
    pub role: String,

    /// Reward-point balance, never negative
    pub points: i32,

    /// Payment-provider customer reference, set lazily on first checkout
    pub stripe_customer_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_one = "super::seller_profile::Entity")]
    SellerProfile,
    #[sea_orm(has_one = "super::subscription::Entity")]
    Subscription,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::seller_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SellerProfile.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Model {
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Client)
    }

    pub fn full_name(&self) -> String {
        let mut name = String::new();
        if let Some(first) = &self.first_name {
            name.push_str(first);
        }
        if let Some(last) = &self.last_name {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(last);
        }
        name
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
            if let ActiveValue::NotSet = active_model.points {
                active_model.points = Set(0);
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
    fn role_round_trips_through_text() {
        assert_eq!("SELLER".parse::<UserRole>().unwrap(), UserRole::Seller);
        assert_eq!(UserRole::Admin.to_string(), "ADMIN");
    }

    #[test]
    fn unknown_role_defaults_to_client() {
        let user = Model {
            id: "user_1".into(),
            email: "a@b.c".into(),
            first_name: None,
            last_name: None,
            role: "SOMETHING_ELSE".into(),
            points: 0,
            stripe_customer_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(user.role(), UserRole::Client);
    }

    #[test]
    fn full_name_joins_present_parts() {
        let user = Model {
            id: "user_1".into(),
            email: "a@b.c".into(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            role: "CLIENT".into(),
            points: 0,
            stripe_customer_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
