//! Generic model handlers
//!
//! Shared by every catalog model; [`crate::routes`] binds them to a schema.
//! The permission check always comes first, and request bodies are parsed
//! only after it, so a visitor posting garbage still gets `restrict`.

use axum::{body::Bytes, Json};
use mlp_common::db::{self, permissions::View};
use mlp_common::schema::ModelSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::Principal;
use super::{parse_body, parse_id};
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::AppState;

/// Query parameters for listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub owner_id: Option<String>,
}

impl PageQuery {
    /// Requested page, 1 when absent
    pub fn page(&self) -> ApiResult<i64> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("'{}' is not a valid page", raw))),
        }
    }
}

/// GET /api/<model>?page= and GET /api/<model>?owner_id=
///
/// Listing by owner returns every row attached to that node, unpaged.
pub async fn list(
    state: AppState,
    principal: Principal,
    schema: &'static ModelSchema,
    query: PageQuery,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, &schema.name, View::List)?;

    if let Some(owner_id) = query.owner_id.as_deref().filter(|raw| !raw.trim().is_empty()) {
        let owner_id = parse_id(owner_id)?;
        let rows = db::select_by_owner(&state.db, schema, owner_id).await?;
        return Ok(Json(json!({
            "model": schema.name,
            "owner_id": owner_id,
            "data": rows,
            "total": rows.len(),
        })));
    }

    let requested = query.page()?;

    let total = db::count(&state.db, schema).await?;
    let pagination = calculate_pagination(total, requested);
    let rows = db::get_all(&state.db, schema, pagination.offset).await?;

    Ok(Json(json!({
        "model": schema.name,
        "data": rows,
        "page": pagination.page,
        "total_pages": pagination.total_pages,
        "total": total,
    })))
}

/// GET /api/<model>/show/:id
pub async fn show(
    state: AppState,
    principal: Principal,
    schema: &'static ModelSchema,
    id: String,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, &schema.name, View::Show)?;
    let id = parse_id(&id)?;

    let row = db::select(&state.db, schema, id).await?;
    Ok(Json(json!({ "model": schema.name, "data": row })))
}

/// POST /api/<model>/new and /api/<model>/new/:owner_id
pub async fn create(
    state: AppState,
    principal: Principal,
    schema: &'static ModelSchema,
    owner_id: Option<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, &schema.name, View::Create)?;
    let owner_id = owner_id.as_deref().map(parse_id).transpose()?;
    let data = parse_body(&body)?;

    let row = db::create(&state.db, schema, owner_id, &data).await?;
    Ok(Json(json!({ "model": schema.name, "data": row })))
}

/// POST /api/<model>/edit/:id
pub async fn edit(
    state: AppState,
    principal: Principal,
    schema: &'static ModelSchema,
    id: String,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, &schema.name, View::Edit)?;
    let id = parse_id(&id)?;
    let data = parse_body(&body)?;

    let row = db::update(&state.db, schema, id, &data).await?;
    Ok(Json(json!({ "model": schema.name, "data": row })))
}

/// POST /api/<model>/remove/:id
pub async fn remove(
    state: AppState,
    principal: Principal,
    schema: &'static ModelSchema,
    id: String,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, &schema.name, View::Remove)?;
    let id = parse_id(&id)?;

    let row = db::remove(&state.db, schema, id).await?;
    Ok(Json(json!({ "model": schema.name, "data": row })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query() {
        assert_eq!(PageQuery::default().page().unwrap(), 1);
        let query = PageQuery {
            page: Some("3".to_string()),
            ..PageQuery::default()
        };
        assert_eq!(query.page().unwrap(), 3);
        let query = PageQuery {
            page: Some("last".to_string()),
            ..PageQuery::default()
        };
        assert_eq!(query.page().unwrap_err().code(), "invalid");
    }
}
