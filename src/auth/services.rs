use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    jwt::{JwtKeys, TokenError},
    password::{
        hash_password, hash_password_blocking, verify_password, verify_password_blocking,
        CredentialError,
    },
    repo::UserStore,
    repo_types::UserProfile,
};
use crate::{db::StoreError, state::AppState};

const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex");
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DUMMY_HASH: Option<String> = hash_password("not-a-real-password").ok();
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("password too short")]
    WeakPassword,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Credential(CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => Self::DuplicateEmail,
            StoreError::NotFound => Self::UserNotFound,
            other => Self::Store(other),
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Registration, login and profile lookup.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.jwt.clone())
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AuthError::WeakPassword);
        }

        let hash = hash_password_blocking(password.to_string())
            .await
            .map_err(AuthError::Credential)?;
        let user = self.users.create(&email, &hash).await.map_err(|e| {
            if matches!(e, StoreError::DuplicateEmail) {
                warn!(email = %email, "email already registered");
            }
            AuthError::from(e)
        })?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Returns a signed token and the user it was issued for.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserProfile), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = match self.users.find_by_email(&email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                let plain = password.to_string();
                let _ = tokio::task::spawn_blocking(move || {
                    if let Some(hash) = DUMMY_HASH.as_deref() {
                        let _ = verify_password(&plain, hash);
                    }
                })
                .await;
                warn!(email = %email, "login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Store(e)),
        };

        match verify_password_blocking(password.to_string(), user.password_hash.clone()).await {
            Ok(()) => {}
            Err(CredentialError::Mismatch) => {
                warn!(email = %email, user_id = user.id, "login invalid password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Credential(e)),
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = user.id, "user logged in");
        Ok((token, user.into()))
    }

    pub async fn me(&self, user_id: i64) -> Result<UserProfile, AuthError> {
        if user_id <= 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(self.users.find_by_id(user_id).await?)
    }
}
