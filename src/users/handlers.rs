use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserPage, UserRecord},
    repo_types::UserChanges,
    services::{build_filter, create_user, page_offset, parse_page, total_pages, PAGE_SIZE},
};
use crate::{
    auth::{dto::normalize_email, middleware::Identity},
    dto::{DataResponse, MessageResponse},
    error::AppError,
    extract::{QueryParams, ValidatedJson},
    state::AppState,
};

/// Ids that do not parse cannot exist.
fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<MessageResponse<UserRecord>>), AppError> {
    let user = create_user(
        state.users.as_ref(),
        payload.name,
        &payload.email,
        payload.password,
        payload.role.unwrap_or_default(),
    )
    .await?;

    info!(user_id = %user.id, created_by = %admin.id, "user created by admin");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::with_data(
            "User created successfully",
            UserRecord::from(user),
        )),
    ))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListUsersQuery>,
) -> Result<Json<DataResponse<UserPage>>, AppError> {
    let page = parse_page(query.page.as_deref());
    let filter = build_filter(query.name, query.email, query.role)?;

    let (users, total_users) = tokio::try_join!(
        state.users.list(&filter, PAGE_SIZE, page_offset(page)),
        state.users.count(&filter),
    )?;

    Ok(Json(DataResponse {
        data: UserPage {
            users: users.into_iter().map(UserRecord::from).collect(),
            page,
            total_pages: total_pages(total_users),
            total_users,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<MessageResponse<UserRecord>>, AppError> {
    let id = parse_user_id(&id)?;
    let current = state.users.find_by_id(id).await?.ok_or(AppError::NotFound)?;

    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref().filter(|e| *e != current.email) {
        if state.users.find_by_email(email).await?.is_some() {
            warn!(user_id = %id, email = %email, "email already in use");
            return Err(AppError::Conflict);
        }
    }

    let changes = UserChanges {
        name: payload.name,
        email,
        role: payload.role,
    };
    let updated = state
        .users
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound)?;

    info!(user_id = %updated.id, "user updated");
    Ok(Json(MessageResponse::with_data(
        "User updated successfully",
        UserRecord::from(updated),
    )))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse<()>>, AppError> {
    let id = parse_user_id(&id)?;

    if id == admin.id {
        warn!(user_id = %id, "admin tried to delete themselves");
        return Err(AppError::SelfDeletion);
    }

    if !state.users.delete(id).await? {
        return Err(AppError::NotFound);
    }

    info!(user_id = %id, deleted_by = %admin.id, "user deleted");
    Ok(Json(MessageResponse::message("User deleted successfully")))
}
