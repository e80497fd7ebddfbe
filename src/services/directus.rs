use crate::errors::ServiceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};
use uuid::Uuid;

/// Product item as stored in the headless CMS `products` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsProduct {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: i32,
    pub seller_id: String,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope<T> {
    data: T,
}

/// Client for the headless CMS REST API. The CMS wraps every payload in a
/// `data` envelope; admin-token auth throughout.
#[derive(Clone)]
pub struct DirectusService {
    client: reqwest::Client,
    base_url: String,
    admin_token: String,
}

impl DirectusService {
    pub fn new(base_url: String, admin_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_token,
        }
    }

    /// Fetches every product item from the CMS
    #[instrument(skip(self))]
    pub async fn fetch_products(&self) -> Result<Vec<CmsProduct>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/items/products", self.base_url))
            .bearer_auth(&self.admin_token)
            .query(&[("limit", "-1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "CMS product listing failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "CMS returned {}",
                status
            )));
        }

        let envelope: ItemEnvelope<Vec<CmsProduct>> = response.json().await?;
        Ok(envelope.data)
    }

    /// Fetches a single product item by its CMS id
    #[instrument(skip(self))]
    pub async fn fetch_product(&self, id: Uuid) -> Result<CmsProduct, ServiceError> {
        let response = self
            .client
            .get(format!("{}/items/products/{}", self.base_url, id))
            .bearer_auth(&self.admin_token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found in CMS",
                id
            )));
        }
        if !status.is_success() {
            error!(status = %status, "CMS product fetch failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "CMS returned {}",
                status
            )));
        }

        let envelope: ItemEnvelope<CmsProduct> = response.json().await?;
        Ok(envelope.data)
    }

    /// Pushes one product to the CMS with upsert semantics: patch the
    /// existing item, create it when the CMS does not know the id yet.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn push_product(&self, product: &CmsProduct) -> Result<(), ServiceError> {
        let patch = self
            .client
            .patch(format!("{}/items/products/{}", self.base_url, product.id))
            .bearer_auth(&self.admin_token)
            .json(product)
            .send()
            .await?;

        if patch.status().is_success() {
            return Ok(());
        }
        if patch.status() != reqwest::StatusCode::NOT_FOUND {
            error!(status = %patch.status(), "CMS product patch failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "CMS returned {}",
                patch.status()
            )));
        }

        let post = self
            .client
            .post(format!("{}/items/products", self.base_url))
            .bearer_auth(&self.admin_token)
            .json(product)
            .send()
            .await?;

        if !post.status().is_success() {
            error!(status = %post.status(), "CMS product create failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "CMS returned {}",
                post.status()
            )));
        }
        Ok(())
    }
}
