//! Document endpoints and the document catalogue.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::Deleted;
use crate::AppState;
use crate::domain::{Document, DocumentType};
use crate::error::{AppError, AppResult};
use crate::gateway::auth::AuthenticatedUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/documents", get(list_documents).post(create_document))
        .route("/api/v1/documents/types/{type}", get(document_by_type))
        .route(
            "/api/v1/documents/{id}",
            get(get_document).patch(update_document).delete(delete_document),
        )
}

/// A document with its catalogue entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub label: &'static str,
    pub description: &'static str,
    pub is_framework: bool,
}

impl From<Document> for DocumentView {
    fn from(document: Document) -> Self {
        let kind = document.document_type;
        Self {
            document,
            label: kind.label(),
            description: kind.description(),
            is_framework: kind.is_framework(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub content: String,
}

fn parse_type(raw: &str) -> AppResult<DocumentType> {
    raw.parse::<DocumentType>().map_err(AppError::validation)
}

async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentView>>> {
    let documents = state.store.list_documents(&user.user_id).await?;
    Ok(Json(documents.into_iter().map(DocumentView::from).collect()))
}

async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<DocumentView>)> {
    let document = state
        .store
        .create_document(&user.user_id, req.document_type, req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// Fetch the caller's document of a type, creating it from its template on
/// first view.
async fn document_by_type(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(raw_type): Path<String>,
) -> AppResult<Json<DocumentView>> {
    let kind = parse_type(&raw_type)?;
    let document = state.store.get_or_create_document(&user.user_id, kind).await?;
    Ok(Json(document.into()))
}

async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<DocumentView>> {
    Ok(Json(state.store.get_document(&user.user_id, &id).await?.into()))
}

async fn update_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> AppResult<Json<DocumentView>> {
    let document = state
        .store
        .update_document(&user.user_id, &id, req.content)
        .await?;
    Ok(Json(document.into()))
}

async fn delete_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted>> {
    // An open editing session would resurrect the content on its next flush.
    state.sessions.discard(&user.user_id, &id);
    state.store.delete_document(&user.user_id, &id).await?;
    Ok(Json(Deleted::new()))
}
