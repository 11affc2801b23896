/// Fixed identity provider
///
/// Answers every request with one configured identity, ignoring the
/// credentials. Removing that identity signs the provider out for good, so
/// a second deletion attempt sees an unauthenticated caller.
///
/// Attached to a pool with [`FixedIdentityProvider::with_pool`], removal
/// also deletes the identity's `users` row; the in-memory identity is only
/// cleared once that delete succeeds.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Credentials, Identity, IdentityError, IdentityProvider, UNAUTHENTICATED_MESSAGE};
use crate::models::user::User;

/// Email of the built-in demo identity
pub const DEMO_EMAIL: &str = "demo@signtrack.com";

/// Stable id of the built-in demo identity
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_d3e0);

pub struct FixedIdentityProvider {
    identity: RwLock<Option<Identity>>,
    removal_error: Option<String>,
    invalidation_error: Option<String>,
    db: Option<PgPool>,
}

impl FixedIdentityProvider {
    /// Always answers with `identity`
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
            removal_error: None,
            invalidation_error: None,
            db: None,
        }
    }

    /// An identity with the given id and email and empty metadata
    pub fn for_user(user_id: Uuid, email: impl Into<String>) -> Self {
        Self::with_identity(Identity {
            user_id,
            email: email.into(),
            created_at: Utc::now(),
            last_sign_in_at: None,
            metadata: serde_json::json!({}),
            session_id: None,
        })
    }

    /// The built-in demo identity
    pub fn demo() -> Self {
        Self::for_user(DEMO_USER_ID, DEMO_EMAIL)
    }

    /// Never authenticates anyone
    pub fn signed_out() -> Self {
        Self {
            identity: RwLock::new(None),
            removal_error: None,
            invalidation_error: None,
            db: None,
        }
    }

    /// Also deletes the `users` row on removal
    pub fn with_pool(mut self, db: PgPool) -> Self {
        self.db = Some(db);
        self
    }

    /// Makes `remove_identity` fail with a backend error
    pub fn failing_removal(mut self, message: impl Into<String>) -> Self {
        self.removal_error = Some(message.into());
        self
    }

    /// Makes `invalidate_session` fail with a backend error
    pub fn failing_invalidation(mut self, message: impl Into<String>) -> Self {
        self.invalidation_error = Some(message.into());
        self
    }

    /// True while the identity has not been removed
    pub async fn is_present(&self) -> bool {
        self.identity.read().await.is_some()
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentityProvider {
    async fn current_identity(&self, _credentials: &Credentials) -> Result<Identity, IdentityError> {
        self.identity
            .read()
            .await
            .clone()
            .ok_or_else(|| IdentityError::Unauthenticated(UNAUTHENTICATED_MESSAGE.to_string()))
    }

    async fn remove_identity(&self, user_id: Uuid) -> Result<(), IdentityError> {
        if let Some(message) = &self.removal_error {
            return Err(IdentityError::Backend(message.clone()));
        }

        let mut guard = self.identity.write().await;
        match guard.as_ref() {
            Some(identity) if identity.user_id == user_id => {}
            _ => return Err(IdentityError::NotFound),
        }

        if let Some(db) = &self.db {
            let deleted = User::delete(db, user_id)
                .await
                .map_err(|e| IdentityError::Backend(e.to_string()))?;
            tracing::debug!(user_id = %user_id, deleted, "Fixed identity user row removed");
        }

        *guard = None;
        Ok(())
    }

    async fn invalidate_session(&self, _identity: &Identity) -> Result<(), IdentityError> {
        match &self.invalidation_error {
            Some(message) => Err(IdentityError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
