// handlers/protected/favorites.rs - POST /api/files/:id/favorite and GET /api/orgs/:org_id/favorites

use axum::extract::{Extension, Path, State};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::Favorite;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteState {
    pub file_id: Uuid,
    pub favorited: bool,
}

pub async fn toggle(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<FavoriteState> {
    let favorited = state.favorites.toggle_favorite(caller.identity(), file_id).await?;
    Ok(ApiResponse::success(FavoriteState { file_id, favorited }))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(org_id): Path<String>,
) -> ApiResult<Vec<Favorite>> {
    let favorites = state.favorites.list_favorites(caller.identity(), &org_id).await?;
    Ok(ApiResponse::success(favorites))
}
