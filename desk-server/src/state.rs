//! Shared application state

use crate::config::{ConfigError, ServerConfig};
use crate::directory::{MemoryUserDirectory, UserDirectory};
use assetdesk_authz::AuthorizationGate;
use axum::http::HeaderName;
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Permission checks and resolution
    pub gate: Arc<AuthorizationGate>,
    /// User records
    pub directory: Arc<dyn UserDirectory>,
    /// Header carrying the caller's user id
    pub identity_header: HeaderName,
}

impl AppState {
    /// Assemble state from its parts
    pub fn new(
        gate: Arc<AuthorizationGate>,
        directory: Arc<dyn UserDirectory>,
        identity_header: HeaderName,
    ) -> Self {
        Self {
            gate,
            directory,
            identity_header,
        }
    }

    /// Build the gate and seed the in-memory directory from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
            .map_err(|e| ConfigError::invalid(format!("identity_header: {e}")))?;
        let gate = Arc::new(config.authz.build_gate());
        let directory = Arc::new(MemoryUserDirectory::new(config.users.iter().cloned()));
        Ok(Self::new(gate, directory, identity_header))
    }
}
