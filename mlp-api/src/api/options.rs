//! Option lists for form selects

use axum::{extract::State, Extension, Json};
use mlp_common::db::{self, permissions::View};
use serde_json::{json, Value};

use super::auth::Principal;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/options
pub async fn get_options(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, "options", View::List)?;

    let options = db::options(&state.db).await?;
    Ok(Json(json!({ "data": options })))
}
