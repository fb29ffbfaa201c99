use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::{info, instrument, warn};

use super::{
    dto::{normalize_email, LoginRequest, Profile, PublicUser, RegisterRequest, TokenResponse},
    middleware::Identity,
    password::{verify_password_blocking, DUMMY_HASH},
};
use crate::{
    dto::{DataResponse, MessageResponse},
    error::AppError,
    extract::ValidatedJson,
    state::AppState,
    users::{repo_types::Role, services::create_user},
};

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse<PublicUser>>), AppError> {
    let user = create_user(
        state.users.as_ref(),
        payload.name,
        &payload.email,
        payload.password,
        Role::User,
    )
    .await?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::with_data(
            "User registered successfully",
            PublicUser::from(user),
        )),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(&payload.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_password_blocking(payload.password, DUMMY_HASH.to_owned()).await?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DataResponse<Profile>>, AppError> {
    let user = state.users.find_by_id(identity.id).await?.ok_or_else(|| {
        warn!(user_id = %identity.id, "user vanished after authentication");
        AppError::NotFound
    })?;

    Ok(Json(DataResponse {
        data: Profile::from(user),
    }))
}
