use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::validation::non_blank;
use crate::db::models::Product;
use crate::db::now_timestamp;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::media::{discard_asset, image_change, replace_asset, ImageChange};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/user/product/create", post(create_product))
        .route("/api/user/product/", delete(missing_product_id))
        .route("/api/user/product/{id}", delete(delete_product))
        .route("/api/user/product/update/{id}", put(update_product))
}

/// Clients send price either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    /// Blank text counts as a missing price.
    fn is_blank(&self) -> bool {
        matches!(self, PriceInput::Text(s) if s.trim().is_empty())
    }

    fn parse(&self) -> AppResult<f64> {
        let value = match self {
            PriceInput::Number(n) => Some(*n),
            PriceInput::Text(s) => s.trim().parse::<f64>().ok(),
        };
        match value {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(AppError::BadRequest(
                "Price must be a non-negative number".into(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<PriceInput>,
    pub image: Option<String>,
}

async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<ProductRequest>,
) -> AppResult<Response> {
    let name = non_blank(req.name);
    let description = non_blank(req.description);
    let price = req.price.filter(|p| !p.is_blank());
    let image = non_blank(req.image);

    let missing: Vec<&str> = [
        ("name", name.is_none()),
        ("description", description.is_none()),
        ("price", price.is_none()),
        ("image", image.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();

    let (Some(name), Some(description), Some(price), Some(image)) =
        (name, description, price, image)
    else {
        return Err(AppError::BadRequest(format!(
            "Please provide all fields: {}",
            missing.join(", ")
        )));
    };

    let price = price.parse()?;

    if state.products.find_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict("Product Already Exist".into()));
    }

    let asset = state.media.store(&image).await?;

    let now = now_timestamp();
    let product = Product {
        id: uuid::Uuid::now_v7().to_string(),
        name,
        description,
        price,
        image: asset.url,
        image_id: asset.asset_id,
        created_at: now.clone(),
        updated_at: now,
    };

    if let Err(e) = state.products.insert(&product).await {
        discard_asset(state.media.as_ref(), state.orphans.as_ref(), &product.image_id).await;
        return Err(e.into());
    }

    tracing::info!("{} created product {}", user.username, product.name);
    Ok((StatusCode::CREATED, Json(ApiResponse::data(product))).into_response())
}

async fn missing_product_id(_user: CurrentUser) -> AppError {
    AppError::Unauthorized("Please provide product id".into())
}

async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::Unauthorized("Please provide product id".into()));
    }

    let product = state
        .products
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product Not Found".into()))?;

    discard_asset(state.media.as_ref(), state.orphans.as_ref(), &product.image_id).await;

    if !state.products.delete(&product.id).await? {
        return Err(AppError::NotFound("Product Not Found".into()));
    }

    tracing::info!("{} deleted product {}", user.username, product.name);
    Ok(Json(ApiResponse::message("Product Deleted Successfully")))
}

async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let existing = state
        .products
        .find_by_id(id.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Product Not Found".into()))?;

    let name = non_blank(req.name);
    if let Some(name) = name.as_deref().filter(|n| *n != existing.name) {
        if state.products.find_by_name(name).await?.is_some() {
            return Err(AppError::Conflict("Product Already Exist".into()));
        }
    }

    let price = match req.price.filter(|p| !p.is_blank()) {
        Some(price) => price.parse()?,
        None => existing.price,
    };

    let mut updated = Product {
        name: name.unwrap_or_else(|| existing.name.clone()),
        description: non_blank(req.description).unwrap_or_else(|| existing.description.clone()),
        price,
        updated_at: now_timestamp(),
        ..existing.clone()
    };

    let mut new_asset = None;
    if let ImageChange::Replace(payload) = image_change(
        req.image.as_deref(),
        Some(&existing.image),
        Some(&existing.image_id),
    ) {
        let asset = replace_asset(
            state.media.as_ref(),
            state.orphans.as_ref(),
            Some(&existing.image_id),
            payload,
        )
        .await?;
        updated.image = asset.url;
        updated.image_id = asset.asset_id.clone();
        new_asset = Some(asset.asset_id);
    }

    if let Err(e) = state.products.update(&updated).await {
        if let Some(asset_id) = &new_asset {
            discard_asset(state.media.as_ref(), state.orphans.as_ref(), asset_id).await;
        }
        return Err(e.into());
    }

    tracing::info!("{} updated product {}", user.username, updated.name);
    Ok(Json(ApiResponse::data(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(json: &str) -> PriceInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn price_accepts_numbers_and_numeric_text() {
        assert_eq!(price("19.5").parse().unwrap(), 19.5);
        assert_eq!(price("\"19.5\"").parse().unwrap(), 19.5);
        assert_eq!(price("0").parse().unwrap(), 0.0);
    }

    #[test]
    fn price_rejects_negative_and_garbage() {
        assert!(price("-1").parse().is_err());
        assert!(price("\"abc\"").parse().is_err());
        assert!(price("\"NaN\"").parse().is_err());
        assert!(price("\"inf\"").parse().is_err());
    }

    #[test]
    fn blank_text_price_counts_as_missing() {
        assert!(price("\"  \"").is_blank());
        assert!(!price("3").is_blank());
    }
}
