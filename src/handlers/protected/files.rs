// handlers/protected/files.rs - File listing, registration and soft delete
//
// GET    /api/orgs/:org_id/files       list_files
// POST   /api/orgs/:org_id/files       create_file
// DELETE /api/files/:id                mark_for_deletion
// POST   /api/files/:id/restore        restore
// POST   /api/uploads                  generate_upload_url

use axum::extract::{Extension, Json, Path, Query, State};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{FileRecord, NewFile};
use crate::filter::FileFilter;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::storage::UploadTicket;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionState {
    pub id: Uuid,
    pub marked_for_deletion: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(org_id): Path<String>,
    Query(filter): Query<FileFilter>,
) -> ApiResult<Vec<FileRecord>> {
    let files = state.files.list_files(caller.identity(), &org_id, &filter).await?;
    Ok(ApiResponse::success(files))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(org_id): Path<String>,
    Json(new_file): Json<NewFile>,
) -> ApiResult<FileRecord> {
    let file = state.files.create_file(caller.identity(), &org_id, new_file).await?;
    Ok(ApiResponse::created(file))
}

pub async fn mark_for_deletion(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletionState> {
    state.files.mark_for_deletion(caller.identity(), id).await?;
    Ok(ApiResponse::success(DeletionState {
        id,
        marked_for_deletion: true,
    }))
}

pub async fn restore(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeletionState> {
    state.files.restore(caller.identity(), id).await?;
    Ok(ApiResponse::success(DeletionState {
        id,
        marked_for_deletion: false,
    }))
}

pub async fn upload_ticket(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> ApiResult<UploadTicket> {
    let ticket = state.files.generate_upload_url(caller.identity()).await?;
    Ok(ApiResponse::created(ticket))
}
