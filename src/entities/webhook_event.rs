use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw webhook payload persisted for audit before interpretation.
/// Rows whose handler failed stay unprocessed for manual inspection.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Originating provider: "stripe", "clerk" or "directus"
    pub source: String,

    pub event_type: String,

    /// Verbatim JSON payload
    pub payload: String,

    pub processed: bool,

    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.received_at {
                active_model.received_at = Set(Utc::now());
            }
            if let ActiveValue::NotSet = active_model.processed {
                active_model.processed = Set(false);
            }
        }
        Ok(active_model)
    }
}
