//! AssetDesk permission service
//!
//! Serves the effective permissions of the calling user and the
//! administration endpoints for role and user permissions, on top of
//! [`assetdesk_authz`].

pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod logging;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use directory::{DirectoryError, MemoryUserDirectory, UserDirectory};
pub use error::ApiError;
pub use logging::{LogFormat, LogOutput, LoggingConfig};
pub use state::AppState;

/// Build the router for a configuration
pub fn app(config: &ServerConfig) -> Result<axum::Router, ConfigError> {
    let state = AppState::from_config(config)?;
    Ok(api::router(state))
}
