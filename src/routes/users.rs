use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::password::{hash_password, is_long_enough, verify_password};
use crate::auth::validation::{is_valid_email, non_blank, normalize_email};
use crate::db::models::{Product, PublicUser, User};
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::media::{discard_asset, image_change, replace_asset, ImageChange};
use crate::response::ApiResponse;
use crate::search::{ProductQuery, SearchParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/search", get(search_products))
        .route("/api/user/update", post(update_user))
}

async fn search_products(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    let query = ProductQuery::from_params(&params);
    let products = state.products.search(&query).await?;
    Ok(Json(ApiResponse::data(products)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub image: Option<String>,
}

/// POST /api/user/update
///
/// The current password is always required and the password is always
/// rotated, so a profile-only edit still needs the pair.
async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let current_password = req
        .current_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Password is required".into()))?;
    let new_password = req.new_password.filter(|p| !p.is_empty()).ok_or_else(|| {
        AppError::BadRequest("Please provide both current password and new password".into())
    })?;

    if !verify_password(&current_password, &user.password_hash).await? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }
    if !is_long_enough(&new_password) {
        return Err(AppError::BadRequest(
            "New password must be at least 6 characters long".into(),
        ));
    }

    let email = match non_blank(req.email).map(|e| normalize_email(&e)) {
        Some(email) if email != user.email => {
            if !is_valid_email(&email) {
                return Err(AppError::BadRequest("Invalid email address".into()));
            }
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("User already exists".into()));
            }
            email
        }
        _ => user.email.clone(),
    };

    let username = match non_blank(req.username) {
        Some(username) if username != user.username => {
            if state.users.find_by_username(&username).await?.is_some() {
                return Err(AppError::Conflict("Username already taken".into()));
            }
            username
        }
        _ => user.username.clone(),
    };

    let password_hash = hash_password(&new_password, state.config.auth.bcrypt_cost).await?;

    let mut updated = User {
        username,
        email,
        password_hash,
        updated_at: now_timestamp(),
        ..user.clone()
    };

    let mut new_asset = None;
    if let ImageChange::Replace(payload) = image_change(
        req.image.as_deref(),
        user.image.as_deref(),
        user.image_id.as_deref(),
    ) {
        let asset = replace_asset(
            state.media.as_ref(),
            state.orphans.as_ref(),
            user.image_id.as_deref(),
            payload,
        )
        .await?;
        updated.image = Some(asset.url);
        updated.image_id = Some(asset.asset_id.clone());
        new_asset = Some(asset.asset_id);
    }

    if let Err(e) = state.users.update(&updated).await {
        if let Some(asset_id) = &new_asset {
            discard_asset(state.media.as_ref(), state.orphans.as_ref(), asset_id).await;
        }
        return Err(e.into());
    }

    tracing::info!("User {} updated their profile", updated.username);
    Ok(Json(ApiResponse::data(PublicUser::from(&updated))))
}
