use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use roomcast_db::Database;
use roomcast_types::api::UploadResponse;
use roomcast_types::models::{DEFAULT_FILE_TYPE, FileBlob, FileMeta};

use crate::state::AppStateInner;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O failure: {0}")]
    Io(#[from] anyhow::Error),
}

/// An incoming attachment, as read from the upload form.
#[derive(Debug, Default)]
pub struct NewFile {
    pub data: Bytes,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub sender: Option<String>,
    pub room_id: Option<String>,
}

/// Stores and fetches attachments. Holds no state of its own.
#[derive(Clone)]
pub struct FileService {
    db: Arc<Database>,
}

impl FileService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist an upload under a freshly generated id.
    pub async fn store(&self, file: NewFile) -> Result<FileMeta, FileError> {
        let meta = FileMeta {
            id: Uuid::new_v4().to_string(),
            file_name: file.file_name.filter(|name| !name.is_empty()),
            file_type: file
                .file_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
            size: file.data.len() as u64,
            sha256: hex::encode(Sha256::digest(&file.data)),
            sender: file.sender,
            room_id: file.room_id,
            created_at: Utc::now(),
        };

        let db = self.db.clone();
        let stored = meta.clone();
        tokio::task::spawn_blocking(move || db.insert_file(&stored, &file.data))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

        Ok(meta)
    }

    /// The full record, content included. `None` if no file has this id.
    pub async fn retrieve(&self, id: &str) -> Result<Option<FileBlob>, FileError> {
        let db = self.db.clone();
        let id = id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_file(&id))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

        Ok(row.map(|(row, data)| row.into_blob(data)))
    }

    /// Metadata without the content.
    pub async fn retrieve_metadata(&self, id: &str) -> Result<Option<FileMeta>, FileError> {
        let db = self.db.clone();
        let id = id.to_string();
        let row = tokio::task::spawn_blocking(move || db.get_file_meta(&id))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

        Ok(row.map(Into::into))
    }
}

/// POST /api/files/upload: multipart form with `file`, `sender`, `roomId`.
pub async fn upload_file(
    State(state): State<Arc<AppStateInner>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut upload = NewFile::default();
    let mut saw_file = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_failed(e)),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.file_type = field.content_type().map(str::to_string);
                upload.data = field
                    .bytes()
                    .await
                    .map_err(multipart_failed)?;
                saw_file = true;
            }
            Some("sender") => {
                upload.sender = Some(read_text(field).await?);
            }
            Some("roomId") => {
                upload.room_id = Some(read_text(field).await?);
            }
            _ => {}
        }
    }

    if !saw_file {
        return Err((StatusCode::BAD_REQUEST, "Missing 'file' field".to_string()));
    }

    let meta = state.files.store(upload).await.map_err(upload_failed)?;

    info!(
        "Stored file {} ({} bytes, {}) for room {:?}",
        meta.id, meta.size, meta.file_type, meta.room_id
    );

    Ok(Json(UploadResponse::new(meta.id, meta.file_name)))
}

/// GET /api/files/{id}: the raw bytes, shown inline by browsers.
pub async fn download_file(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<String>,
) -> Result<Response, StatusCode> {
    let blob = state
        .files
        .retrieve(&id)
        .await
        .map_err(|e| {
            error!("Failed to load file {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let content_type = HeaderValue::from_str(blob.file_type())
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_FILE_TYPE));
    let disposition = content_disposition(blob.file_name());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        blob.data,
    )
        .into_response())
}

/// GET /api/files/metadata/{id}
pub async fn file_metadata(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<String>,
) -> Result<Json<FileMeta>, StatusCode> {
    state
        .files
        .retrieve_metadata(&id)
        .await
        .map_err(|e| {
            error!("Failed to load metadata for file {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn read_text(field: Field<'_>) -> Result<String, (StatusCode, String)> {
    field.text().await.map_err(multipart_failed)
}

/// Body-limit overruns keep axum's 413; every other read error is an I/O failure.
fn multipart_failed(e: MultipartError) -> (StatusCode, String) {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        info!("Upload rejected: {}", e.body_text());
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Error uploading file: {}", e.body_text()),
        );
    }
    upload_failed(FileError::Io(anyhow::Error::new(e)))
}

fn upload_failed(e: FileError) -> (StatusCode, String) {
    error!("Upload failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error uploading file: {}", e),
    )
}

/// `inline; filename="..."`, with anything that cannot sit in a quoted
/// header value replaced by `_`.
fn content_disposition(file_name: Option<&str>) -> HeaderValue {
    let Some(name) = file_name else {
        return HeaderValue::from_static("inline");
    };

    let safe: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("inline; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}
