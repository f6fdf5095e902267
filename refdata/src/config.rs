use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("instance_environments must map at least one environment")]
    EmptySchemaMap,

    #[error("schema name {schema:?} for {environment:?} is not a plain identifier")]
    InvalidSchemaName { environment: String, schema: String },

    #[error("{field} references unknown instance environment {environment:?}")]
    UnknownTarget {
        field: &'static str,
        environment: String,
    },

    #[error("manager lead entries need both a manager and an app_map")]
    EmptyManagerLead,

    #[error("max_chunk_bytes cannot be 0")]
    ZeroChunkLimit,
}

/// Maps an instance-environment key (e.g. `ecal-prod-live`) to a database schema.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SchemaMap(HashMap<String, String>);

impl SchemaMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        SchemaMap(entries)
    }

    pub fn resolve(&self, environment: &str) -> Option<&str> {
        self.0.get(environment).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Schema names are spliced into SQL text, so only plain identifiers are accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::EmptySchemaMap);
        }
        for (environment, schema) in &self.0 {
            if !is_identifier(schema) {
                return Err(ValidationError::InvalidSchemaName {
                    environment: environment.clone(),
                    schema: schema.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for SchemaMap {
    fn from(entries: [(&str, &str); N]) -> Self {
        SchemaMap(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A top-level manager whose organization is synchronized to the directory,
/// and the tag written to `app_map` for everyone under them.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ManagerLead {
    pub manager: String,
    pub app_map: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IdentityConfig {
    /// Where the identity snapshot is written after each successful identity load.
    pub snapshot_path: PathBuf,
    #[serde(default = "default_directory_suffix")]
    pub directory_suffix: String,
    #[serde(default)]
    pub manager_leads: Vec<ManagerLead>,
}

fn default_directory_suffix() -> String {
    ",l=amer,dc=oracle,dc=com".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Directory holding the `<kind>.json` chunk files.
    #[serde(default = "default_chunk_dir")]
    pub chunk_dir: PathBuf,
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
    /// Instance environment whose schema receives the employee feed.
    pub identity_target: String,
    /// Instance environment whose schema receives opportunity and account feeds.
    pub sync_target: String,
    pub identity: IdentityConfig,
}

fn default_chunk_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_chunk_bytes() -> usize {
    64 * 1024 * 1024
}

impl Config {
    pub fn validate(&self, schemas: &SchemaMap) -> Result<(), ValidationError> {
        if self.max_chunk_bytes == 0 {
            return Err(ValidationError::ZeroChunkLimit);
        }
        for (field, environment) in [
            ("identity_target", &self.identity_target),
            ("sync_target", &self.sync_target),
        ] {
            if schemas.resolve(environment).is_none() {
                return Err(ValidationError::UnknownTarget {
                    field,
                    environment: environment.clone(),
                });
            }
        }
        if self
            .identity
            .manager_leads
            .iter()
            .any(|lead| lead.manager.is_empty() || lead.app_map.is_empty())
        {
            return Err(ValidationError::EmptyManagerLead);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// `postgres://` connection string. May be a `[vault]` reference until secrets are resolved.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout_secs() -> u64 {
    30
}
