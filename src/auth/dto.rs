use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::users::repo_types::User;

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

/// Request body for login. Password length is not checked here.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned after registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            registration_date: u.registration_date,
        }
    }
}

/// What a user sees of their own record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
}

impl From<User> for Profile {
    fn from(u: User) -> Self {
        Self {
            name: u.name,
            email: u.email,
            registration_date: u.registration_date,
        }
    }
}

/// Trimmed, lower-cased form under which emails are stored and looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
