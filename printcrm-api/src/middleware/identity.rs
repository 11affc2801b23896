/// Identity resolution middleware
///
/// Reads the `Authorization` header, asks the configured
/// [`IdentityProvider`](printcrm_shared::identity::IdentityProvider) who is
/// calling and inserts the resulting [`Identity`] into request extensions.
/// Handlers behind this layer take `Extension<Identity>` and never look at
/// credentials themselves.
///
/// An unresolved caller is answered with 401 `User not authenticated` before
/// the handler runs, so no store operation is attempted.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use printcrm_shared::identity::{Credentials, IdentityError};

pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = Credentials::from_authorization_header(
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    );

    let identity = match state.identity.current_identity(&credentials).await {
        Ok(identity) => identity,
        Err(IdentityError::Backend(e)) => {
            tracing::error!(provider = state.identity.name(), error = %e, "Identity lookup failed");
            return Err(ApiError::InternalError(e));
        }
        Err(e) => {
            tracing::debug!(provider = state.identity.name(), error = %e, "Request not authenticated");
            return Err(ApiError::unauthenticated());
        }
    };

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
