//! Axum integration
//!
//! An upstream identity layer is expected to place the caller's
//! [`UserPermissions`] into the request extensions. [`enforce`] then guards a
//! route with a single (resource, action) requirement.

use crate::gate::{AuthorizationGate, AuthzError};
use crate::models::{Action, Resource, UserPermissions};
use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// JSON body returned for authorization failures
#[derive(Debug, Serialize)]
pub struct AuthzErrorBody {
    /// Machine-readable error code
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
    /// Refused resource, for `forbidden`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Refused action, for `forbidden`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AuthzError::Forbidden { action, resource } => (
                StatusCode::FORBIDDEN,
                AuthzErrorBody {
                    error: "forbidden",
                    message,
                    resource: Some(resource),
                    action: Some(action),
                },
            ),
            AuthzError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                AuthzErrorBody {
                    error: "unauthenticated",
                    message,
                    resource: None,
                    action: None,
                },
            ),
            AuthzError::Store(e) => {
                error!("Permission storage error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    AuthzErrorBody {
                        error: "storage_unavailable",
                        message: "Permission storage is unavailable".to_string(),
                        resource: None,
                        action: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Extractor for the authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserPermissions);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserPermissions>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthzError::Unauthenticated)
    }
}

/// A route's permission requirement, used as middleware state
#[derive(Clone)]
pub struct PermissionRequirement {
    gate: Arc<AuthorizationGate>,
    resource: Resource,
    action: Action,
}

impl PermissionRequirement {
    /// Guarded resource
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Required action
    pub fn action(&self) -> Action {
        self.action
    }
}

/// Build the state for [`enforce`].
///
/// ```rust,ignore
/// use axum::{Router, middleware, routing::get};
///
/// let app = Router::new().route("/api/roles", get(list_roles)).route_layer(
///     middleware::from_fn_with_state(require(gate, Resource::Roles, Action::View), enforce),
/// );
/// ```
pub fn require(gate: Arc<AuthorizationGate>, resource: Resource, action: Action) -> PermissionRequirement {
    PermissionRequirement {
        gate,
        resource,
        action,
    }
}

/// Middleware rejecting callers that lack the route's requirement
pub async fn enforce(
    State(requirement): State<PermissionRequirement>,
    request: Request,
    next: Next,
) -> Response {
    let Some(subject) = request.extensions().get::<UserPermissions>() else {
        return AuthzError::Unauthenticated.into_response();
    };

    if let Err(e) = requirement
        .gate
        .authorize(subject, requirement.resource, requirement.action)
        .await
    {
        warn!(
            user = %subject.user_id,
            method = %request.method(),
            path = %request.uri().path(),
            "{}", e
        );
        return e.into_response();
    }

    next.run(request).await
}
