use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use super::repo_types::{Role, User};

/// Admin request body for creating a user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Admin request body for updating a user. Absent fields are left alone.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Query string of the user listing. Kept as raw strings so malformed
/// values fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// A user as admins see it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
}

impl From<User> for UserRecord {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            registration_date: u.registration_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub page: i64,
    pub total_pages: i64,
    pub total_users: i64,
}
