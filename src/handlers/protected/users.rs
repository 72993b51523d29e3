// handlers/protected/users.rs - GET /api/me and GET /api/users/:id/profile

use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::UserProfile;
use crate::AppState;

/// GET /api/me - the caller's user record with memberships, or null
pub async fn me(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<Option<User>> {
    let user = state.identity.get_me(caller.identity()).await?;
    Ok(ApiResponse::success(user))
}

/// GET /api/users/:id/profile - uploader name and avatar
pub async fn profile(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<UserProfile> {
    let profile = state.identity.get_user_profile(user_id).await?;
    Ok(ApiResponse::success(profile))
}
