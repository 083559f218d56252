//! HTTP endpoints
//!
//! Permission introspection for the frontend plus the administration
//! endpoints for role and user permissions.

use crate::directory::DirectoryError;
use crate::error::ApiError;
use crate::identity::identify;
use crate::state::AppState;
use assetdesk_authz::{
    Action, CapabilityMatrix, CurrentUser, DefaultsSource, PermissionError, PermissionSet,
    Resource, Role, RoleOverride, UserPermissions, enforce, require,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Response of `GET /api/permissions/me`
#[derive(Debug, Serialize, Deserialize)]
pub struct MyPermissionsResponse {
    /// Caller's user id
    pub user_id: String,
    /// Caller's role
    pub role: Role,
    /// Whether the caller bypasses permission checks
    pub superuser: bool,
    /// Whether the caller's custom permissions are applied
    pub use_custom_permissions: bool,
    /// Effective matrix the frontend gates its navigation on
    pub permissions: CapabilityMatrix,
}

/// Query of `GET /api/authorize`
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    /// Resource tag
    pub resource: String,
    /// Action name
    pub action: String,
}

/// Response of `GET /api/authorize`
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Resource tag as queried
    pub resource: String,
    /// Parsed action
    pub action: Action,
    /// Whether the caller may perform the action
    pub allowed: bool,
}

/// One row of `GET /api/roles`
#[derive(Debug, Serialize, Deserialize)]
pub struct RoleSummary {
    /// Role tag
    pub role: Role,
    /// Human-readable description
    pub description: String,
    /// Where the role's current defaults come from
    pub source: DefaultsSource,
}

/// Response of `GET /api/roles/:role/permissions`
#[derive(Debug, Serialize, Deserialize)]
pub struct RolePermissionsResponse {
    /// Role tag
    pub role: Role,
    /// Where `permissions` comes from
    pub source: DefaultsSource,
    /// The role's default permission set
    pub permissions: PermissionSet,
}

/// Response of `DELETE /api/roles/:role/permissions`
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetRoleResponse {
    /// Role tag
    pub role: Role,
    /// Whether a persisted override existed and was removed
    pub reset: bool,
    /// Source of the defaults now in effect
    pub source: DefaultsSource,
    /// Defaults now in effect
    pub permissions: PermissionSet,
}

/// Body of `PUT /api/users/:id/permissions`
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserPermissions {
    /// Whether the user's custom permissions apply
    pub use_custom_permissions: bool,
    /// Replacement custom set; omitted keeps the stored set
    #[serde(default)]
    pub custom_permissions: Option<PermissionSet>,
}

/// Response of the `/api/users/:id/permissions` endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct UserPermissionsResponse {
    /// User id
    pub user_id: String,
    /// User's role
    pub role: Role,
    /// Whether the custom set applies
    pub use_custom_permissions: bool,
    /// Stored custom set, applied or not
    pub custom_permissions: Option<PermissionSet>,
    /// Resulting effective matrix
    pub effective: CapabilityMatrix,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let gate = state.gate.clone();
    let guard = |resource: Resource, action: Action| {
        middleware::from_fn_with_state(require(gate.clone(), resource, action), enforce)
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/permissions/me", get(my_permissions))
        .route("/api/authorize", get(authorize))
        .route(
            "/api/roles",
            get(list_roles).route_layer(guard(Resource::Roles, Action::View)),
        )
        .route(
            "/api/roles/:role/permissions",
            get(get_role_permissions).route_layer(guard(Resource::Roles, Action::View)),
        )
        .route(
            "/api/roles/:role/permissions",
            put(put_role_permissions).route_layer(guard(Resource::Roles, Action::Edit)),
        )
        .route(
            "/api/roles/:role/permissions",
            delete(reset_role_permissions).route_layer(guard(Resource::Roles, Action::Edit)),
        )
        .route(
            "/api/users",
            get(list_users).route_layer(guard(Resource::Users, Action::View)),
        )
        .route(
            "/api/users/:id/permissions",
            get(get_user_permissions).route_layer(guard(Resource::Users, Action::View)),
        )
        .route(
            "/api/users/:id/permissions",
            put(put_user_permissions).route_layer(guard(Resource::Users, Action::Edit)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), identify))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn my_permissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<MyPermissionsResponse> {
    let permissions = state.gate.effective_matrix(&user).await;
    Json(MyPermissionsResponse {
        superuser: state.gate.is_superuser(&user),
        user_id: user.user_id,
        role: user.role,
        use_custom_permissions: user.use_custom_permissions,
        permissions,
    })
}

async fn authorize(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let action: Action = query
        .action
        .parse()
        .map_err(|e: PermissionError| ApiError::bad_request(e.to_string()))?;
    let allowed = state.gate.is_allowed(&user, &query.resource, action).await;
    Ok(Json(AuthorizeResponse {
        resource: query.resource,
        action,
        allowed,
    }))
}

async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleSummary>>, ApiError> {
    let resolver = state.gate.resolver();
    let mut roles: Vec<Role> = resolver.defaults().roles().cloned().collect();
    if let Some(store) = resolver.store() {
        for record in store.list_role_overrides().await? {
            if !roles.contains(&record.role) {
                roles.push(record.role);
            }
        }
    }
    roles.sort();

    let mut summaries = Vec::with_capacity(roles.len());
    for role in roles {
        let (_, source) = resolver.role_defaults(&role).await?;
        summaries.push(RoleSummary {
            description: role.description(),
            role,
            source,
        });
    }
    Ok(Json(summaries))
}

async fn get_role_permissions(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<RolePermissionsResponse>, ApiError> {
    let role = Role::from(role);
    let (permissions, source) = state.gate.resolver().role_defaults(&role).await?;
    Ok(Json(RolePermissionsResponse {
        role,
        source,
        permissions,
    }))
}

async fn put_role_permissions(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(role): Path<String>,
    Json(permissions): Json<PermissionSet>,
) -> Result<Json<RoleOverride>, ApiError> {
    let role = Role::from(role);
    if role == state.gate.config().superuser_role {
        return Err(ApiError::bad_request(format!(
            "role '{}' bypasses permission checks and has no editable permissions",
            role
        )));
    }
    let store = state.gate.resolver().store().ok_or(ApiError::StorageDisabled)?;

    let record = RoleOverride::new(role, permissions, Some(admin.user_id.clone()));
    store.save_role_override(record.clone()).await?;
    info!(
        admin = %admin.user_id,
        role = %record.role,
        entries = record.permissions.len(),
        "Updated role permissions"
    );
    Ok(Json(record))
}

async fn reset_role_permissions(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(role): Path<String>,
) -> Result<Json<ResetRoleResponse>, ApiError> {
    let role = Role::from(role);
    let resolver = state.gate.resolver();
    let store = resolver.store().ok_or(ApiError::StorageDisabled)?;

    let reset = store.delete_role_override(&role).await?;
    if reset {
        info!(admin = %admin.user_id, role = %role, "Reset role permissions to built-in defaults");
    }
    let (permissions, source) = resolver.role_defaults(&role).await?;
    Ok(Json(ResetRoleResponse {
        role,
        reset,
        source,
        permissions,
    }))
}

async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserPermissions>>, ApiError> {
    Ok(Json(state.directory.list().await?))
}

async fn get_user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserPermissionsResponse>, ApiError> {
    let user = state
        .directory
        .get(&user_id)
        .await?
        .ok_or(DirectoryError::NotFound(user_id))?;
    let effective = state.gate.effective_matrix(&user).await;
    Ok(Json(UserPermissionsResponse {
        user_id: user.user_id,
        role: user.role,
        use_custom_permissions: user.use_custom_permissions,
        custom_permissions: user.custom_permissions,
        effective,
    }))
}

async fn put_user_permissions(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<String>,
    Json(update): Json<UpdateUserPermissions>,
) -> Result<Json<UserPermissionsResponse>, ApiError> {
    let user = state
        .directory
        .update_permissions(
            &user_id,
            update.use_custom_permissions,
            update.custom_permissions,
        )
        .await?;
    info!(
        admin = %admin.user_id,
        user = %user.user_id,
        use_custom_permissions = user.use_custom_permissions,
        "Updated user permissions"
    );

    let effective = state.gate.effective_matrix(&user).await;
    Ok(Json(UserPermissionsResponse {
        user_id: user.user_id,
        role: user.role,
        use_custom_permissions: user.use_custom_permissions,
        custom_permissions: user.custom_permissions,
        effective,
    }))
}
