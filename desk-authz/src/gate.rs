//! Authorization gate
//!
//! The gate is the request-handling boundary: it takes the authenticated
//! subject and the (resource, action) pair being attempted, applies the
//! superuser bypass, resolves the subject's matrix and turns a denial into an
//! [`AuthzError`] naming what was refused.

use crate::matrix::{CapabilityMatrix, check};
use crate::models::{Action, Resource, Role, UserPermissions};
use crate::resolver::PermissionResolver;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors returned by the gate
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The subject lacks the permission
    #[error("You do not have permission to {action} {resource}")]
    Forbidden {
        /// Refused action
        action: Action,
        /// Resource tag the action was attempted on
        resource: String,
    },

    /// No subject is attached to the request
    #[error("Authentication required")]
    Unauthenticated,

    /// The permission store failed and the policy is to deny
    #[error("Permission lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl AuthzError {
    /// Denial of `action` on `resource`
    pub fn forbidden(resource: impl Into<String>, action: Action) -> Self {
        Self::Forbidden {
            action,
            resource: resource.into(),
        }
    }
}

/// What to do when the persisted role permissions cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Fall back to the built-in role table
    #[default]
    FailOpen,
    /// Deny the request
    FailClosed,
}

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Role that bypasses every permission check
    pub superuser_role: Role,
    /// Behaviour when the permission store cannot be read
    pub on_store_error: StoreFailurePolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            superuser_role: Role::Superuser,
            on_store_error: StoreFailurePolicy::FailOpen,
        }
    }
}

/// Authorizes subjects against resolved capability matrices
#[derive(Clone)]
pub struct AuthorizationGate {
    resolver: PermissionResolver,
    config: GateConfig,
}

impl AuthorizationGate {
    /// Create a gate over `resolver`
    pub fn new(resolver: PermissionResolver, config: GateConfig) -> Self {
        Self { resolver, config }
    }

    /// The underlying resolver
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Gate configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether `subject` holds the configured superuser role
    pub fn is_superuser(&self, subject: &UserPermissions) -> bool {
        subject.role == self.config.superuser_role
    }

    /// Authorize `subject` to perform `action` on `resource`.
    ///
    /// Under [`StoreFailurePolicy::FailClosed`] a storage failure is returned
    /// as [`AuthzError::Store`] rather than as a denial.
    pub async fn authorize(
        &self,
        subject: &UserPermissions,
        resource: Resource,
        action: Action,
    ) -> Result<(), AuthzError> {
        if self.is_superuser(subject) {
            debug!(user = %subject.user_id, "Superuser bypass for {} on {}", action, resource);
            return Ok(());
        }

        let matrix = self.resolve_subject(subject).await?;
        if check(&matrix, resource.as_str(), action) {
            debug!(
                user = %subject.user_id,
                role = %subject.role,
                "Granted {} on {}", action, resource
            );
            Ok(())
        } else {
            Err(AuthzError::forbidden(resource.as_str(), action))
        }
    }

    /// Check a raw resource tag. Tags unknown to this build are never granted.
    pub async fn is_allowed(&self, subject: &UserPermissions, resource: &str, action: Action) -> bool {
        if self.is_superuser(subject) {
            debug!(
                user = %subject.user_id,
                "Superuser bypass for {} on {}", action, resource
            );
            return true;
        }

        if resource.parse::<Resource>().is_err() {
            debug!(user = %subject.user_id, "Denying unknown resource {}", resource);
            return false;
        }

        let Ok(matrix) = self.resolve_subject(subject).await else {
            return false;
        };

        let allowed = check(&matrix, resource, action);
        debug!(
            user = %subject.user_id,
            role = %subject.role,
            allowed,
            "Permission check for {} on {}", action, resource
        );
        allowed
    }

    /// The subject's effective matrix.
    ///
    /// Superusers get a full matrix over every known resource. Under
    /// [`StoreFailurePolicy::FailClosed`] a storage failure yields an empty
    /// matrix.
    pub async fn effective_matrix(&self, subject: &UserPermissions) -> CapabilityMatrix {
        if self.is_superuser(subject) {
            return CapabilityMatrix::full();
        }
        self.resolve_subject(subject).await.unwrap_or_default()
    }

    /// Resolve with the configured failure policy applied.
    ///
    /// An error means the lookup failed and the policy says deny.
    async fn resolve_subject(
        &self,
        subject: &UserPermissions,
    ) -> Result<CapabilityMatrix, StoreError> {
        let overrides = subject.custom_permissions.as_ref();
        match self
            .resolver
            .resolve(&subject.role, subject.use_custom_permissions, overrides)
            .await
        {
            Ok(matrix) => Ok(matrix),
            Err(e) => match self.config.on_store_error {
                StoreFailurePolicy::FailOpen => {
                    warn!(
                        role = %subject.role,
                        "Role permission lookup failed, using built-in defaults: {}", e
                    );
                    Ok(self.resolver.resolve_static(
                        &subject.role,
                        subject.use_custom_permissions,
                        overrides,
                    ))
                }
                StoreFailurePolicy::FailClosed => {
                    error!(
                        role = %subject.role,
                        "Role permission lookup failed, denying: {}", e
                    );
                    Err(e)
                }
            },
        }
    }
}
