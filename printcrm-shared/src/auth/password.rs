/// Password hashing with Argon2id
///
/// Hashes are stored in PHC string format, so the parameters travel with
/// each hash and can be raised later without invalidating existing
/// accounts.
///
/// Parameters: 19 MiB memory, 2 passes, 1 lane, 32-byte output.
///
/// # Example
///
/// ```
/// use printcrm_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sign&Print2024")?;
/// assert!(verify_password("Sign&Print2024", &hash)?);
/// assert!(!verify_password("sign&print2024", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};

const MEMORY_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const LANES: u32 = 1;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(MEMORY_KIB)
        .t_cost(ITERATIONS)
        .p_cost(LANES)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the
/// stored hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters come from the hash itself.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Rejects weak passwords at registration and password change
///
/// Requires at least eight characters mixing upper case, lower case,
/// a digit and a symbol. The message is safe to show to the user.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    let checks: [(fn(char) -> bool, &str); 4] = [
        (char::is_uppercase, "an uppercase letter"),
        (char::is_lowercase, "a lowercase letter"),
        (char::is_numeric, "a digit"),
        (|c: char| !c.is_alphanumeric(), "a special character"),
    ];

    for (matches, label) in checks {
        if !password.chars().any(matches) {
            return Err(format!("Password must contain {}", label));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_with_configured_params() {
        let hash = hash_password("Banner#2024").expect("hash should succeed");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_hash_salts_differ() {
        let a = hash_password("Banner#2024").unwrap();
        let b = hash_password("Banner#2024").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_correct_and_wrong() {
        let hash = hash_password("Vinyl-Roll9").unwrap();
        assert!(verify_password("Vinyl-Roll9", &hash).unwrap());
        assert!(!verify_password("Vinyl-Roll8", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("whatever", "not-a-phc-string").is_err());
        assert!(verify_password("whatever", "$argon2id$broken").is_err());
    }

    #[test]
    fn test_strength_accepts_strong_password() {
        assert!(validate_password_strength("Flex0Print!").is_ok());
        assert!(validate_password_strength("Ünïcode9$x").is_ok());
    }

    #[test]
    fn test_strength_reports_first_missing_class() {
        assert!(validate_password_strength("Sh0rt!")
            .unwrap_err()
            .contains("at least 8"));
        assert!(validate_password_strength("lowercase1!")
            .unwrap_err()
            .contains("uppercase"));
        assert!(validate_password_strength("UPPERCASE1!")
            .unwrap_err()
            .contains("lowercase"));
        assert!(validate_password_strength("NoDigits!!")
            .unwrap_err()
            .contains("digit"));
        assert!(validate_password_strength("NoSpecial123")
            .unwrap_err()
            .contains("special"));
    }
}
