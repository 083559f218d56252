//! Server configuration

use crate::logging::LoggingConfig;
use assetdesk_authz::{AuthzConfig, UserPermissions};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration and startup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`ServerConfig`]
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The tracing subscriber could not be installed
    #[error("Logging setup error: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create an invalid configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create a logging error
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Header carrying the authenticated user id, set by the upstream authenticator
    pub identity_header: String,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Authorization settings
    pub authz: AuthzConfig,
    /// Seed user records
    pub users: Vec<UserPermissions>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            identity_header: "x-user-id".to_string(),
            logging: LoggingConfig::default(),
            authz: AuthzConfig::default(),
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the identity header name and that user ids are unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_header.trim().is_empty() {
            return Err(ConfigError::invalid("identity_header must not be empty"));
        }
        if axum::http::HeaderName::from_bytes(self.identity_header.as_bytes()).is_err() {
            return Err(ConfigError::invalid(format!(
                "identity_header '{}' is not a valid header name",
                self.identity_header
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if !seen.insert(user.user_id.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate user id '{}'",
                    user.user_id
                )));
            }
        }
        Ok(())
    }
}
