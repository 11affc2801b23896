/// JWT issuance and validation
///
/// Tokens are HS256-signed and always bound to a server-side session
/// (`sid` claim). Validating the signature is only half of authentication:
/// the session-backed identity provider also checks that the session row is
/// still active, which is what makes logout and account deletion effective
/// before a token expires.
///
/// # Token Types
///
/// - **Access**: one hour, sent as `Authorization: Bearer <token>`
/// - **Refresh**: thirty days, exchanged for new access tokens
///
/// # Example
///
/// ```
/// use printcrm_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_access_token(&token, secret)?;
/// assert_eq!(validated.sid, claims.sid);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim written into and required from every token
pub const ISSUER: &str = "printcrm";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Expected {expected} token, got {actual}")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Default lifetime for the token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(1),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// Standard claims (`sub`, `iss`, `iat`, `exp`, `nbf`) plus the session id
/// and token type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Session ID the token belongs to
    pub sid: Uuid,

    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the token type's default lifetime
    pub fn new(user_id: Uuid, session_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(
            user_id,
            session_id,
            token_type,
            token_type.default_expiration(),
        )
    }

    /// Claims expiring `expires_in` from now (negative values produce an
    /// already-expired token, which tests rely on)
    pub fn with_expiration(
        user_id: Uuid,
        session_id: Uuid,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            sid: session_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })
}

fn validate_kind(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_kind(token, secret, TokenType::Access)
}

/// Validates a token and requires it to be a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_kind(token, secret, TokenType::Refresh)
}

/// Issues an access/refresh pair for one session
pub fn issue_token_pair(
    user_id: Uuid,
    session_id: Uuid,
    secret: &str,
) -> Result<(String, String), JwtError> {
    let access = create_token(&Claims::new(user_id, session_id, TokenType::Access), secret)?;
    let refresh = create_token(&Claims::new(user_id, session_id, TokenType::Refresh), secret)?;
    Ok((access, refresh))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_carry_session() {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let claims = Claims::new(user_id, session_id, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.is_expired());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_create_and_validate() {
        let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.sid, claims.sid);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(validate_token(&token, "another-secret-of-sufficient-length").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_type_enforced() {
        let (access, refresh) = issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), SECRET).unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongTokenType { expected: "access", actual: "refresh" })
        ));
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET),
            Err(JwtError::ValidationError(_))
        ));
    }
}
