/// Identity resolution
///
/// An [`IdentityProvider`] turns request credentials into an [`Identity`],
/// removes identities, and ends sessions. Two implementations ship:
///
/// - [`session::SessionIdentityProvider`]: bearer JWT bound to a session
///   row in PostgreSQL
/// - [`fixed::FixedIdentityProvider`]: one configured identity, for demos
///   and tests
///
/// Account workflows only see the trait, so they behave the same whichever
/// provider the server was started with.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub mod fixed;
pub mod session;

pub use fixed::FixedIdentityProvider;
pub use session::SessionIdentityProvider;

/// Message returned for every unauthenticated request
pub const UNAUTHENTICATED_MESSAGE: &str = "User not authenticated";

/// Error type for identity operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Credentials missing, malformed, expired or revoked
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The identity to remove does not exist
    #[error("Identity not found")]
    NotFound,

    /// The provider itself failed
    #[error("Identity provider error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(e: sqlx::Error) -> Self {
        IdentityError::Backend(e.to_string())
    }
}

/// The authenticated principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,

    /// Free-form profile attributes
    pub metadata: JsonValue,

    /// Session the request was authenticated with, if the provider has one
    pub session_id: Option<Uuid>,
}

/// Raw credentials carried by a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    /// Parses an `Authorization` header value
    ///
    /// Only the `Bearer` scheme (case-insensitive) yields a token; anything
    /// else is treated as no credentials.
    pub fn from_authorization_header(value: Option<&str>) -> Self {
        let token = value.and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            let token = token.trim();
            (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
        });

        Self { bearer_token: token }
    }
}

/// Source of truth for who is calling and whether they still exist
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves credentials to an identity
    ///
    /// # Errors
    ///
    /// [`IdentityError::Unauthenticated`] when no valid identity backs the
    /// credentials.
    async fn current_identity(&self, credentials: &Credentials) -> Result<Identity, IdentityError>;

    /// Permanently removes the identity record
    async fn remove_identity(&self, user_id: Uuid) -> Result<(), IdentityError>;

    /// Ends the session the identity was resolved from
    ///
    /// Succeeds when the session is already gone.
    async fn invalidate_session(&self, identity: &Identity) -> Result<(), IdentityError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_parsed() {
        let creds = Credentials::from_authorization_header(Some("Bearer abc.def.ghi"));
        assert_eq!(creds.bearer_token.as_deref(), Some("abc.def.ghi"));

        let creds = Credentials::from_authorization_header(Some("bearer   tok  "));
        assert_eq!(creds.bearer_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_other_headers_yield_no_token() {
        assert_eq!(Credentials::from_authorization_header(None), Credentials::none());
        assert_eq!(
            Credentials::from_authorization_header(Some("Basic dXNlcjpwYXNz")),
            Credentials::none()
        );
        assert_eq!(Credentials::from_authorization_header(Some("Bearer")), Credentials::none());
        assert_eq!(Credentials::from_authorization_header(Some("Bearer ")), Credentials::none());
    }
}
