use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("password does not match")]
    Mismatch,

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Salted argon2 hash in PHC string form.
pub fn hash_password(plain: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            CredentialError::Hashing(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<(), CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        CredentialError::MalformedHash(e.to_string())
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(CredentialError::Mismatch),
        Err(e) => {
            error!(error = %e, "argon2 verify_password error");
            Err(CredentialError::Hashing(e.to_string()))
        }
    }
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_blocking(plain: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_blocking(plain: String, hash: String) -> Result<(), CredentialError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
}
