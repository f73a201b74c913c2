//! Declared field map for form building
//!
//! Served straight from the catalog; never touches the database.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use mlp_common::db::permissions::View;
use mlp_common::schema::{ModelSchema, CATALOG};
use serde_json::{json, Value};

use super::auth::Principal;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/metadata/:model
pub async fn get_metadata(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(model): Path<String>,
) -> ApiResult<Json<Value>> {
    let schema = CATALOG
        .get(&model)
        .ok_or_else(|| ApiError::NotFound(format!("model '{}'", model)))?;
    principal.require(&state.permissions, &schema.name, View::Show)?;

    Ok(Json(json!({ "data": describe(schema) })))
}

/// Labels, types, constraints and ownership of one model
pub fn describe(schema: &ModelSchema) -> Value {
    let fields: Vec<Value> = schema
        .columns
        .iter()
        .map(|column| {
            json!({
                "name": column.name,
                "label": column.label,
                "type": column.pg_type,
                "required": column.required(),
                "readonly": column.primary_key || column.generated || column.timestamp,
                "choices": column.choices,
                "references": column.references,
            })
        })
        .collect();

    json!({
        "model": schema.name,
        "label": schema.label,
        "kind": schema.kind,
        "owners": schema.owners,
        "children": CATALOG.children_of(&schema.name),
        "fields": fields,
    })
}
