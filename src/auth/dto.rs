use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::UserProfile;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserProfile> for PublicUser {
    fn from(u: UserProfile) -> Self {
        Self {
            id: u.id,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

/// Body of `GET /users/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: i64,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserProfile> for MeResponse {
    fn from(u: UserProfile) -> Self {
        Self {
            user_id: u.id,
            email: u.email,
            created_at: u.created_at,
        }
    }
}
