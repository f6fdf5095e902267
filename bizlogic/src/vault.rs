use crate::config::VaultConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// Config values starting with this prefix name a key in the secret store.
pub const VAULT_PREFIX: &str = "[vault]";

#[derive(thiserror::Error, Debug)]
pub enum SecretError {
    #[error("vault token variable {0} is not set")]
    MissingToken(String),
    #[error("invalid vault URL: {0}")]
    InvalidUrl(String),
    #[error("vault request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("vault returned {status} for key {key}")]
    Status {
        key: String,
        status: reqwest::StatusCode,
    },
    #[error("vault key {0} has no string value")]
    MissingValue(String),
    #[error("config references vault secrets but has no vault section")]
    NotConfigured,
}

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<String, SecretError>;
}

#[derive(Deserialize)]
struct SecretResponse {
    data: HashMap<String, Value>,
}

/// Reads `{address}/v1/{mount}/{key}` and returns its `data.value`.
pub struct VaultResolver {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl VaultResolver {
    pub fn from_config(config: &VaultConfig) -> Result<Self, SecretError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| SecretError::MissingToken(config.token_env.clone()))?;
        Self::new(&config.address, &config.mount, token)
    }

    pub fn new(address: &Url, mount: &str, token: String) -> Result<Self, SecretError> {
        let base_url = address
            .join(&format!("v1/{}/", mount.trim_matches('/')))
            .map_err(|e| SecretError::InvalidUrl(e.to_string()))?;
        Ok(VaultResolver {
            client: reqwest::Client::new(),
            base_url,
            token,
        })
    }
}

#[async_trait]
impl SecretResolver for VaultResolver {
    async fn resolve(&self, key: &str) -> Result<String, SecretError> {
        let url = self
            .base_url
            .join(key)
            .map_err(|e| SecretError::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SecretError::Status {
                key: key.to_string(),
                status: response.status(),
            });
        }

        let secret = response.json::<SecretResponse>().await?;
        match secret.data.get("value") {
            Some(Value::String(value)) => Ok(value.clone()),
            _ => Err(SecretError::MissingValue(key.to_string())),
        }
    }
}
