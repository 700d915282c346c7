use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::password::{hash_password, is_long_enough, verify_password};
use crate::auth::validation::{is_valid_email, non_blank, normalize_email};
use crate::db::models::{PublicUser, User};
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::media::discard_asset;
use crate::response::ApiResponse;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize, Default)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn with_session(state: &AppState, status: StatusCode, user: &User) -> AppResult<Response> {
    let token = state.sessions.issue(&user.id)?;
    Ok((
        status,
        [(header::SET_COOKIE, state.sessions.session_cookie(&token))],
        Json(ApiResponse::data(PublicUser::from(user))),
    )
        .into_response())
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> AppResult<Response> {
    let username = non_blank(req.username);
    let email = non_blank(req.email);
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        return Err(AppError::BadRequest(
            "Please provide name, email and password".into(),
        ));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }
    if !is_long_enough(&password) {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters long".into(),
        ));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }
    if state.users.find_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let password_hash = hash_password(&password, state.config.auth.bcrypt_cost).await?;

    let (image, image_id) = match non_blank(req.image) {
        Some(payload) => {
            let asset = state.media.store(&payload).await?;
            (Some(asset.url), Some(asset.asset_id))
        }
        None => (None, None),
    };

    let now = now_timestamp();
    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        username,
        email,
        password_hash,
        image,
        image_id,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = state.users.insert(&user).await {
        if let Some(asset_id) = &user.image_id {
            discard_asset(state.media.as_ref(), state.orphans.as_ref(), asset_id).await;
        }
        return Err(e.into());
    }

    tracing::info!("New user signed up: {}", user.username);
    with_session(&state, StatusCode::CREATED, &user)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Response> {
    let email = non_blank(req.email);
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::BadRequest(
            "Please provide email and password".into(),
        ));
    };

    let user = state
        .users
        .find_by_email(&normalize_email(&email))
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".into()))?;

    if !verify_password(&password, &user.password_hash).await? {
        return Err(AppError::BadRequest("Incorrect email or password".into()));
    }

    tracing::info!("User logged in: {}", user.username);
    with_session(&state, StatusCode::OK, &user)
}

/// POST /api/auth/logout. Expires the cookie; always succeeds.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(ApiResponse::message("Logged out successfully")),
    )
        .into_response()
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<PublicUser>> {
    Json(ApiResponse::data(PublicUser::from(&user)))
}
