use crate::errors::ServiceError;
use serde::Deserialize;
use tracing::{error, instrument};

#[derive(Debug, Clone, Deserialize)]
pub struct ClerkEmailAddress {
    pub id: String,
    pub email_address: String,
}

/// User record as served by the identity provider's management API
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkUser {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmailAddress>,
    pub primary_email_address_id: Option<String>,
}

impl ClerkUser {
    /// The primary email address, falling back to the first one on record
    pub fn primary_email(&self) -> Option<&str> {
        let by_primary_id = self.primary_email_address_id.as_ref().and_then(|id| {
            self.email_addresses
                .iter()
                .find(|e| &e.id == id)
                .map(|e| e.email_address.as_str())
        });
        by_primary_id.or_else(|| {
            self.email_addresses
                .first()
                .map(|e| e.email_address.as_str())
        })
    }
}

/// Client for the identity provider's management API. Only used as a
/// fallback when webhook payloads arrive without the fields we mirror.
#[derive(Clone)]
pub struct ClerkService {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl ClerkService {
    pub fn new(secret_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            secret_key,
        }
    }

    /// Fetches a user from the identity provider by id
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<ClerkUser, ServiceError> {
        let response = self
            .client
            .get(format!("{}/users/{}", self.api_url, user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "User {} not found at identity provider",
                user_id
            )));
        }
        if !status.is_success() {
            error!(status = %status, "identity provider request failed");
            return Err(ServiceError::ExternalServiceError(format!(
                "Identity provider returned {}",
                status
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_email_prefers_primary_id() {
        let user: ClerkUser = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "first_name": "Ada",
            "last_name": null,
            "primary_email_address_id": "idn_2",
            "email_addresses": [
                { "id": "idn_1", "email_address": "old@example.com" },
                { "id": "idn_2", "email_address": "ada@example.com" }
            ]
        }))
        .unwrap();
        assert_eq!(user.primary_email(), Some("ada@example.com"));
    }

    #[test]
    fn primary_email_falls_back_to_first() {
        let user: ClerkUser = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "first_name": null,
            "last_name": null,
            "primary_email_address_id": null,
            "email_addresses": [
                { "id": "idn_1", "email_address": "only@example.com" }
            ]
        }))
        .unwrap();
        assert_eq!(user.primary_email(), Some("only@example.com"));
    }
}
