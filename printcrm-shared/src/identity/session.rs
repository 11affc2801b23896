/// Session-backed identity provider
///
/// A request is authenticated when:
///
/// 1. the bearer token is a valid, unexpired access JWT signed with the
///    configured secret,
/// 2. the session named by its `sid` claim exists, belongs to the token's
///    subject, and is neither revoked nor expired, and
/// 3. the user row still exists.
///
/// Removing the identity deletes the user row; its sessions go with it, so
/// every outstanding token stops working at once.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Credentials, Identity, IdentityError, IdentityProvider};
use crate::auth::jwt::validate_access_token;
use crate::models::session::Session;
use crate::models::user::User;

pub struct SessionIdentityProvider {
    pool: PgPool,
    jwt_secret: String,
}

impl SessionIdentityProvider {
    pub fn new(pool: PgPool, jwt_secret: impl Into<String>) -> Self {
        Self {
            pool,
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Builds the identity view of a user row
pub fn identity_from_user(user: &User, session_id: Option<Uuid>) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email.clone(),
        created_at: user.created_at,
        last_sign_in_at: user.last_login_at,
        metadata: user.metadata.clone(),
        session_id,
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn current_identity(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        let token = credentials
            .bearer_token
            .as_deref()
            .ok_or_else(|| IdentityError::Unauthenticated("Missing bearer token".to_string()))?;

        let claims = validate_access_token(token, &self.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            IdentityError::Unauthenticated(e.to_string())
        })?;

        let session = Session::find_active(&self.pool, claims.sid)
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or_else(|| IdentityError::Unauthenticated("Session is not active".to_string()))?;

        let user = User::find_by_id(&self.pool, claims.sub)
            .await?
            .ok_or_else(|| IdentityError::Unauthenticated("User no longer exists".to_string()))?;

        Ok(identity_from_user(&user, Some(session.id)))
    }

    async fn remove_identity(&self, user_id: Uuid) -> Result<(), IdentityError> {
        if User::delete(&self.pool, user_id).await? {
            tracing::info!(user_id = %user_id, "User row deleted");
            Ok(())
        } else {
            Err(IdentityError::NotFound)
        }
    }

    async fn invalidate_session(&self, identity: &Identity) -> Result<(), IdentityError> {
        let Some(session_id) = identity.session_id else {
            return Ok(());
        };

        let revoked = Session::revoke(&self.pool, session_id).await?;
        tracing::debug!(session_id = %session_id, revoked, "Session invalidated");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "session"
    }
}
