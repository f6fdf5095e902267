use crate::vault::{SecretError, SecretResolver, VAULT_PREFIX};
use refdata::SchemaMap;
use refdata::config::DatabaseConfig;
use serde::Deserialize;
use service::config::{BasicAuth, HierarchyQueries, Listener};
use std::fmt::Write;
use std::fs::File;
use url::Url;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct VaultConfig {
    pub address: Url,
    #[serde(default = "default_vault_mount")]
    pub mount: String,
    /// Environment variable holding the vault token.
    #[serde(default = "default_vault_token_env")]
    pub token_env: String,
}

fn default_vault_mount() -> String {
    "cto".into()
}

fn default_vault_token_env() -> String {
    "VAULT_TOKEN".into()
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    pub vault: Option<VaultConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub listener: Listener,
    pub auth: BasicAuth,
    pub database: DatabaseConfig,
    /// Instance environment key to database schema.
    pub instance_environments: SchemaMap,
    #[serde(default)]
    pub queries: HierarchyQueries,
    pub reference_data: refdata::Config,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listener.validate()?;
        self.auth.validate()?;
        self.queries.validate()?;
        self.instance_environments.validate()?;
        self.reference_data.validate(&self.instance_environments)?;
        Ok(())
    }

    /// True when any secret-bearing field still holds a `[vault]` reference.
    pub fn has_secret_references(&self) -> bool {
        self.secret_fields()
            .iter()
            .any(|value| value.starts_with(VAULT_PREFIX))
    }

    fn secret_fields(&self) -> [&str; 3] {
        [
            &self.auth.username,
            &self.auth.password,
            &self.database.url,
        ]
    }

    /// Replaces every `[vault]<key>` value with the secret stored under `<key>`.
    pub async fn resolve_secrets(
        &mut self,
        resolver: &dyn SecretResolver,
    ) -> Result<usize, SecretError> {
        let mut resolved = 0;
        for value in [
            &mut self.auth.username,
            &mut self.auth.password,
            &mut self.database.url,
        ] {
            if let Some(key) = value.strip_prefix(VAULT_PREFIX) {
                let secret = resolver.resolve(key.trim()).await?;
                *value = secret;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    /// Human-readable overview with credentials left out.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "listener: {}:{}", self.listener.host, self.listener.port);
        let _ = writeln!(out, "auth user: {}", self.auth.username);
        let _ = writeln!(
            out,
            "database: max_connections={} acquire_timeout={}s",
            self.database.max_connections, self.database.acquire_timeout_secs
        );
        let mut environments: Vec<_> = self.instance_environments.iter().collect();
        environments.sort();
        for (environment, schema) in environments {
            let _ = writeln!(out, "instance environment: {environment} -> {schema}");
        }
        let reference_data = &self.reference_data;
        let _ = writeln!(out, "chunk dir: {}", reference_data.chunk_dir.display());
        let _ = writeln!(out, "max chunk bytes: {}", reference_data.max_chunk_bytes);
        let _ = writeln!(out, "identity target: {}", reference_data.identity_target);
        let _ = writeln!(out, "sync target: {}", reference_data.sync_target);
        let _ = writeln!(
            out,
            "identity snapshot: {}",
            reference_data.identity.snapshot_path.display()
        );
        let _ = write!(
            out,
            "manager leads: {}",
            reference_data.identity.manager_leads.len()
        );
        out
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid service config: {0}")]
    Service(#[from] service::config::ValidationError),
    #[error("invalid reference data config: {0}")]
    ReferenceData(#[from] refdata::config::ValidationError),
}
