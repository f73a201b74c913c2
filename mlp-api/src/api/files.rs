//! File records and downloads
//!
//! `fs_path` values are stored relative to the library root. Paths are
//! checked component by component before they are joined to the root, so
//! neither a stored value nor a `?path=` query can leave the library.

use std::path::{Component, Path as FsPath, PathBuf};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use mlp_common::db::{self, permissions::View};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

use super::auth::Principal;
use super::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuery {
    pub path: String,
}

/// GET /api/files/list?owner_id=
pub async fn list_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, "files", View::List)?;
    let owner_id = query
        .owner_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_id)
        .transpose()?;

    let files = db::list_files(&state.db, owner_id).await?;
    Ok(Json(json!({ "data": files })))
}

/// GET /api/files/download/:id
pub async fn download(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    principal.require(&state.permissions, "files", View::Download)?;
    let id = parse_id(&id)?;

    let file = db::get_file(&state.db, id).await?;
    let fs_path = file.get("fs_path").and_then(Value::as_str).unwrap_or_default();
    let path = library_path(&state.library_root, fs_path)?;
    let filename = file
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or_default();

    serve(path, request, &content_disposition("attachment", filename)).await
}

/// GET /api/files/download/raw?path=
///
/// Only paths registered in the `files` view are served.
pub async fn download_raw(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<RawQuery>,
    request: Request,
) -> ApiResult<Response> {
    principal.require(&state.permissions, "files", View::Download)?;
    let path = library_path(&state.library_root, &query.path)?;

    let file = db::file_by_path(&state.db, query.path.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no file registered at '{}'", query.path)))?;
    let filename = file
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or_default();

    serve(path, request, &content_disposition("inline", filename)).await
}

/// Join a stored relative path to the library root
pub fn library_path(root: &FsPath, fs_path: &str) -> ApiResult<PathBuf> {
    let relative = FsPath::new(fs_path.trim());
    let clean = !relative.as_os_str().is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if !clean {
        warn!("Rejected file path '{}'", fs_path);
        return Err(ApiError::BadRequest(format!("invalid file path '{}'", fs_path)));
    }
    Ok(root.join(relative))
}

fn content_disposition(disposition: &str, filename: &str) -> String {
    let filename: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    if filename.is_empty() {
        disposition.to_string()
    } else {
        format!("{}; filename=\"{}\"", disposition, filename)
    }
}

async fn serve(path: PathBuf, request: Request, disposition: &str) -> ApiResult<Response> {
    debug!("Serving {}", path.display());

    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        warn!("Registered file missing from library: {}", path.display());
        return Err(ApiError::NotFound("file is missing from the library".to_string()));
    }

    if let Ok(value) = HeaderValue::from_str(disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
