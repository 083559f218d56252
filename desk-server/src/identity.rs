//! Identity layer
//!
//! Maps the user id header set by the upstream authenticator to the user's
//! authorization record and stores it in the request extensions. Requests
//! without a known user pass through anonymously; guarded routes and the
//! [`CurrentUser`](assetdesk_authz::CurrentUser) extractor reject them.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

/// Attach the caller's [`UserPermissions`](assetdesk_authz::UserPermissions)
/// to the request when the identity header names a known user
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let user_id = match request.headers().get(&state.identity_header) {
        Some(value) => match value.to_str() {
            Ok(user_id) => user_id.trim().to_string(),
            Err(_) => {
                debug!("Ignoring non-text identity header");
                return next.run(request).await;
            }
        },
        None => return next.run(request).await,
    };

    match state.directory.get(&user_id).await {
        Ok(Some(user)) => {
            debug!(user = %user.user_id, role = %user.role, "Identified caller");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => {
            debug!(user = %user_id, "Unknown user id, continuing anonymously");
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
