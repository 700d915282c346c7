use axum::Json;

use crate::response::ApiResponse;

pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("ok"))
}
