/// Authentication primitives
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`jwt`]: session-bound access/refresh tokens
///
/// Resolving a request to an identity is the job of
/// [`crate::identity::IdentityProvider`]; this module only supplies the
/// building blocks the session-backed provider and the auth routes share.

pub mod jwt;
pub mod password;
