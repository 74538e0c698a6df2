//! Route handlers. Each one extracts a folder by `dir` and delegates to its
//! public operation; no business logic lives here (spec.md §4.G).

use super::AppState;
use crate::error::Error;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) | Error::ConfigError(_) => StatusCode::BAD_REQUEST,
        Error::DecodeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Permanent(_) => StatusCode::BAD_GATEWAY,
        Error::Io(_) | Error::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: Error) -> Response {
    let status = status_for(&error);
    (status, error.to_string()).into_response()
}

/// `GET /metadatas/folders`
pub async fn list_folders(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.project.folder_dirs().into_iter().map(str::to_string).collect())
}

/// `GET {dir}/list`
pub async fn list_one(State(state): State<Arc<AppState>>, Path(dir): Path<String>) -> Response {
    let folder = match state.project.folder(&dir) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };
    match folder.read_all().await {
        Ok(files) => Json(files).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET {dir}/download/{name}`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((dir, name)): Path<(String, String)>,
) -> Response {
    let folder = match state.project.folder(&dir) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };
    match folder.download(&name).await {
        Ok(bytes) => bytes.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Serialize)]
struct UploadResponse {
    name: String,
    content_type: String,
    content_length: u64,
    automation_errors: Vec<String>,
}

/// `POST {dir}/upload`, multipart field `file`.
///
/// Per spec.md §7: the source write (step 2 of the upload algorithm) is what
/// determines success. Partial derivative failures are reported but do not
/// turn the response into an error.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(dir): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let folder = match state.project.folder(&dir) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    let mut file_name = None;
    let mut bytes = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }
        file_name = field.file_name().map(str::to_string);
        bytes = match field.bytes().await {
            Ok(b) => Some(b.to_vec()),
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
    }

    let (Some(name), Some(bytes)) = (file_name, bytes) else {
        return (StatusCode::BAD_REQUEST, "missing multipart field \"file\"").into_response();
    };

    match folder.upload(&name, bytes).await {
        Ok(outcome) => Json(UploadResponse {
            name: outcome.file.name,
            content_type: outcome.file.content_type,
            content_length: outcome.file.content_length,
            automation_errors: outcome
                .automation_errors
                .into_iter()
                .map(|(automation, e)| format!("{automation}: {e}"))
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// `DELETE {dir}/file/{name}`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((dir, name)): Path<(String, String)>,
) -> Response {
    let folder = match state.project.folder(&dir) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };
    match folder.delete_one(&name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
