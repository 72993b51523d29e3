// handlers/protected/blobs.rs - GET /api/blobs/:blob_ref/url

use axum::extract::{Extension, Path, State};
use serde::Serialize;

use crate::database::models::BlobRef;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BlobUrl {
    /// null when the blob no longer exists
    pub url: Option<String>,
}

pub async fn url(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(blob_ref): Path<String>,
) -> ApiResult<BlobUrl> {
    let url = state.files.get_file_url(caller.identity(), &BlobRef(blob_ref)).await?;
    Ok(ApiResponse::success(BlobUrl { url }))
}
