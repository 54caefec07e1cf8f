//! API key management

use std::sync::Arc;

use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::ApiKey;
use crate::utils::constants::API_KEY_NAME_MAX_LEN;
use crate::utils::mask_sensitive;

const VISIBLE_KEY_CHARS: usize = 4;

pub fn validate_name(name: &str) -> Result<&str, ClientError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::validation("API key name is required"));
    }
    if name.chars().count() > API_KEY_NAME_MAX_LEN {
        return Err(ClientError::validation(format!(
            "API key name must be at most {} characters",
            API_KEY_NAME_MAX_LEN
        )));
    }
    Ok(name)
}

/// Key as shown in lists: first and last four characters unless revealed
pub fn display_key(key: &ApiKey, revealed: bool) -> String {
    if revealed {
        key.key.clone()
    } else {
        mask_sensitive(&key.key, VISIBLE_KEY_CHARS)
    }
}

#[derive(Clone)]
pub struct ApiKeyManager {
    api: Arc<dyn GatewayApi>,
}

impl ApiKeyManager {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, ClientError> {
        self.api.list_api_keys().await
    }

    pub async fn create(&self, name: &str) -> Result<ApiKey, ClientError> {
        let name = validate_name(name)?;
        let key = self.api.create_api_key(name).await?;
        tracing::info!(id = key.id, name = %key.name, "created API key");
        Ok(key)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.api.delete_api_key(id).await?;
        tracing::info!(id, "deleted API key");
        Ok(())
    }
}
