use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use super::repo::UserStore;
use super::repo_types::{NewUser, Role, User, UserFilter};
use crate::{
    auth::{dto::normalize_email, password::hash_password_blocking},
    error::AppError,
};

/// Users per listing page.
pub const PAGE_SIZE: i64 = 10;

/// Window of the startup registration report.
pub const RECENT_WINDOW: Duration = Duration::days(7);

/// Shared by self-registration and admin creation: uniqueness pre-check,
/// hash, insert. A lost race on the unique index still ends in `Conflict`.
pub async fn create_user(
    store: &dyn UserStore,
    name: String,
    email: &str,
    password: String,
    role: Role,
) -> Result<User, AppError> {
    let email = normalize_email(email);

    if store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already in use");
        return Err(AppError::Conflict);
    }

    let password_hash = hash_password_blocking(password).await?;

    let user = store
        .create(NewUser {
            name,
            email,
            password_hash,
            role,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user created");
    Ok(user)
}

/// `page` query value, defaulting to 1 when absent, non-numeric or below 1.
/// The whole value must be an integer: `2abc` is non-numeric.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

pub fn total_pages(total_users: i64) -> i64 {
    (total_users + PAGE_SIZE - 1) / PAGE_SIZE
}

pub fn page_offset(page: i64) -> i64 {
    (page - 1).saturating_mul(PAGE_SIZE)
}

/// Builds the listing filter; empty strings mean "no filter".
pub fn build_filter(
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
) -> Result<UserFilter, AppError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let role = match non_empty(role) {
        Some(raw) => Some(
            raw.parse::<Role>()
                .map_err(|e| AppError::invalid_field("role", e))?,
        ),
        None => None,
    };
    Ok(UserFilter {
        name: non_empty(name),
        email: non_empty(email),
        role,
    })
}

/// Logs the ids of users who registered within [`RECENT_WINDOW`].
pub async fn report_recent_registrations(store: Arc<dyn UserStore>) {
    let since = OffsetDateTime::now_utc() - RECENT_WINDOW;
    match store.registered_since(since).await {
        Ok(ids) => info!(count = ids.len(), ids = ?ids, "users registered in the last 7 days"),
        Err(e) => warn!(error = %e, "recent registrations report failed"),
    }
}
