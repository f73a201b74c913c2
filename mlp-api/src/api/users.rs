//! Account registration

use axum::{body::Bytes, extract::State, Extension, Json};
use mlp_common::auth::Role;
use mlp_common::db::{permissions::View, users};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::Principal;
use super::parse_body;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
    role: Option<Role>,
}

/// POST /api/users/register
///
/// Nobody can hand out a role above their own.
pub async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    principal.require(&state.permissions, "users", View::Register)?;

    let request: RegisterRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| ApiError::BadRequest(format!("invalid registration: {}", e)))?;
    let role = request.role.unwrap_or(Role::Registered);
    if role > principal.role {
        return Err(ApiError::Forbidden(format!(
            "{} may not register a {}",
            principal.role, role
        )));
    }

    let user = users::create_user(
        &state.db,
        &request.email,
        request.name.as_deref(),
        &request.password,
        role,
    )
    .await?;
    info!("Registered user {} as {}", user.id, user.role);

    Ok(Json(json!({ "data": user })))
}
