use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Basic auth username and password must both be set")]
    EmptyCredentials,

    #[error("Hierarchy query `{0}` does not reference %SCHEMA%")]
    UnscopedQuery(&'static str),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Credentials every endpoint except `/health` is checked against.
/// Either value may be a `[vault]` reference until secrets are resolved.
#[derive(Clone, Deserialize, PartialEq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ValidationError::EmptyCredentials);
        }
        Ok(())
    }
}

/// Templates returning the `useremail` of every manager under `$1`.
/// `%SCHEMA%` is replaced with the schema of the requested instance environment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HierarchyQueries {
    #[serde(default = "default_ecal_hierarchy")]
    pub ecal_manager_hierarchy: String,
    #[serde(default = "default_sts_hierarchy")]
    pub sts_manager_hierarchy: String,
}

impl Default for HierarchyQueries {
    fn default() -> Self {
        HierarchyQueries {
            ecal_manager_hierarchy: default_ecal_hierarchy(),
            sts_manager_hierarchy: default_sts_hierarchy(),
        }
    }
}

impl HierarchyQueries {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.ecal_manager_hierarchy.contains(crate::reports::SCHEMA_PLACEHOLDER) {
            return Err(ValidationError::UnscopedQuery("ecal_manager_hierarchy"));
        }
        if !self.sts_manager_hierarchy.contains(crate::reports::SCHEMA_PLACEHOLDER) {
            return Err(ValidationError::UnscopedQuery("sts_manager_hierarchy"));
        }
        Ok(())
    }
}

fn default_ecal_hierarchy() -> String {
    manager_hierarchy("user1", "roletype")
}

fn default_sts_hierarchy() -> String {
    manager_hierarchy("stsuser", "stsrole")
}

fn manager_hierarchy(users: &str, roles: &str) -> String {
    format!(
        "WITH RECURSIVE hierarchy AS (
            SELECT u.useremail FROM %SCHEMA%.{users} u WHERE u.useremail = $1
            UNION
            SELECT u.useremail FROM %SCHEMA%.{users} u INNER JOIN hierarchy h ON u.manager = h.useremail
        )
        SELECT u.useremail
        FROM hierarchy h
        INNER JOIN %SCHEMA%.{users} u ON u.useremail = h.useremail
        INNER JOIN %SCHEMA%.{roles} r ON u.rolename = r.id
        WHERE r.rolename = 'Manager'"
    )
}
