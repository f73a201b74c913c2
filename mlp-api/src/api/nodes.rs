//! Node hierarchy browsing

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use mlp_common::db::{self, permissions::View};
use serde_json::{json, Value};

use super::auth::Principal;
use super::parse_id;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/nodes/show/:id
///
/// The node row, its model row and the nodes it directly owns.
pub async fn show_node(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, "nodes", View::Show)?;
    let id = parse_id(&id)?;

    let tree = db::show_node(&state.db, id).await?;
    Ok(Json(json!({ "data": tree })))
}
