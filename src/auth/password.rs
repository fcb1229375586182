//! Password hashing with Argon2id (PHC string format).
//!
//! Both operations are CPU-bound; async callers should go through
//! [`hash_blocking`] and [`verify_blocking`].

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use std::sync::OnceLock;

use super::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Counts [`verify_dummy`] runs so tests can see which login paths pay for a verify.
#[cfg(test)]
pub(crate) static DUMMY_VERIFICATIONS: std::sync::atomic::AtomicUsize =
    std::sync::atomic::AtomicUsize::new(0);

/// Hash with the same parameters as real credentials, built on first use.
fn dummy_hash() -> Result<&'static str, AuthError> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash.as_str());
    }
    let hash = hash_password("sitewarden-dummy-credential")?;
    Ok(DUMMY_HASH.get_or_init(|| hash).as_str())
}

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns [`AuthError::Internal`] if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(format!("password hashing failed: {err}")))
}

/// Returns `Ok(false)` on mismatch; malformed stored hashes are errors.
///
/// # Errors
/// Returns [`AuthError::Internal`] when `hash` is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AuthError::Internal(format!("invalid password hash: {err}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Internal(format!("password verify failed: {err}"))),
    }
}

/// Run a full verify against a throwaway hash and discard the result, so
/// unknown and inactive identities cost as much as a wrong password.
///
/// # Errors
/// Returns [`AuthError::Internal`] if the throwaway hash cannot be built.
pub fn verify_dummy(password: &str) -> Result<(), AuthError> {
    #[cfg(test)]
    DUMMY_VERIFICATIONS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    verify_password(password, dummy_hash()?).map(|_| ())
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
/// Propagates hashing errors and blocking task failures.
pub async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::Internal(format!("hashing task failed: {err}")))?
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
/// Propagates verification errors and blocking task failures.
pub async fn verify_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| AuthError::Internal(format!("verify task failed: {err}")))?
}

/// [`verify_dummy`] on the blocking pool.
///
/// # Errors
/// Propagates verification errors and blocking task failures.
pub async fn verify_dummy_blocking(password: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || verify_dummy(&password))
        .await
        .map_err(|err| AuthError::Internal(format!("verify task failed: {err}")))?
}
