//! File upload endpoints.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::Deleted;
use crate::AppState;
use crate::domain::Upload;
use crate::error::{AppError, AppResult};
use crate::gateway::auth::AuthenticatedUser;
use crate::storage::{MAX_FILE_SIZE, NewUpload};

/// Room for multipart framing around a maximum-size file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/uploads", get(list_uploads).post(upload_file))
        .route("/api/v1/uploads/{id}", get(download_url).delete(delete_upload))
        // One byte over the cap still reaches validation and gets its message.
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + 1 + MULTIPART_OVERHEAD))
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrl {
    pub url: String,
}

fn multipart_error(err: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("Invalid multipart body: {err}"))
}

async fn read_upload(mut multipart: Multipart) -> AppResult<NewUpload> {
    let mut file = None;
    let mut category = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, content_type, bytes));
            }
            Some("category") => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                if !value.is_empty() {
                    category = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::validation("No file provided"))?;
    Ok(NewUpload {
        file_name,
        content_type,
        bytes,
        category,
    })
}

async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Upload>)> {
    let file = read_upload(multipart).await?;
    let upload = state.uploads.upload(&user.user_id, file).await?;
    Ok((StatusCode::CREATED, Json(upload)))
}

async fn list_uploads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UploadQuery>,
) -> AppResult<Json<Vec<Upload>>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.uploads.list(&user.user_id, category).await?))
}

async fn download_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<DownloadUrl>> {
    let url = state.uploads.download_url(&user.user_id, &id).await?;
    Ok(Json(DownloadUrl { url }))
}

async fn delete_upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted>> {
    state.uploads.delete(&user.user_id, &id).await?;
    Ok(Json(Deleted::new()))
}
