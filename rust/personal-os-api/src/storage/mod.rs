//! Object storage for uploaded files.
//!
//! [`ObjectStorage`] is the narrow contract uploads depend on. File
//! constraints are checked by [`validate_file`] before any storage call.

pub mod memory;
pub mod supabase;
pub mod uploads;

pub use memory::MemoryStorage;
pub use supabase::SupabaseStorage;
pub use uploads::{NewUpload, UploadService};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, AppResult};

/// Largest accepted upload: 10 MiB.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Accepted MIME types: PDF, DOCX, plain text and markdown.
pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/markdown",
];

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path`. Fails if the path is taken.
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()>;

    /// Time-bounded retrieval URL.
    async fn sign(&self, path: &str, ttl: Duration) -> anyhow::Result<String>;

    async fn delete(&self, path: &str) -> anyhow::Result<()>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Check size and MIME type. The MIME parameter list (`; charset=..`) is
/// ignored.
pub fn validate_file(size: usize, content_type: &str) -> AppResult<()> {
    if size == 0 {
        return Err(AppError::validation("File is empty"));
    }
    if size > MAX_FILE_SIZE {
        return Err(AppError::validation("File size exceeds 10MB limit"));
    }
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_FILE_TYPES.contains(&essence.as_str()) {
        return Err(AppError::validation(
            "Invalid file type. Allowed types: PDF, DOCX, TXT, MD",
        ));
    }
    Ok(())
}

/// Replace path separators and control characters so a client-supplied
/// name stays a single path segment.
#[must_use]
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => cleaned,
    }
}

/// `{userId}[/{category}]/{millis}-{fileName}`.
#[must_use]
pub fn storage_path(user_id: &str, category: Option<&str>, millis: i64, file_name: &str) -> String {
    let file = format!("{millis}-{}", sanitize_segment(file_name));
    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => format!("{user_id}/{}/{file}", sanitize_segment(category)),
        None => format!("{user_id}/{file}"),
    }
}
