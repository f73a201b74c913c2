//! Sessions and login
//!
//! The session middleware runs on every `/api` route. It reads the
//! `mlp_session` cookie, looks up the session and attaches a [`Principal`]
//! to the request. Requests without a cookie are visitors and cost no
//! database round trip.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use mlp_common::auth::{session_token_from_cookie, Role, SESSION_COOKIE};
use mlp_common::db::permissions::View;
use mlp_common::db::users::{authenticate, LoginOutcome, User};
use mlp_common::db::{sessions, Permissions};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::parse_body;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Caller identity attached by [`session_middleware`]
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: Option<User>,
    pub role: Role,
    /// Cookie token as presented, even if it no longer names a session
    pub token: Option<String>,
}

impl Principal {
    pub fn visitor() -> Self {
        Self {
            user: None,
            role: Role::Visitor,
            token: None,
        }
    }

    pub fn authenticated(user: User, token: String) -> Self {
        Self {
            role: user.role,
            user: Some(user),
            token: Some(token),
        }
    }

    /// Fail with `restrict` unless the role may perform `view` on `model`
    pub fn require(&self, permissions: &Permissions, model: &str, view: View) -> ApiResult<()> {
        if permissions.allows(self.role, model, view) {
            Ok(())
        } else {
            debug!("Denied {} on {} for {}", view.as_str(), model, self.role);
            Err(ApiError::Forbidden(format!(
                "{} may not {} {}",
                self.role,
                view.as_str(),
                model
            )))
        }
    }
}

/// Resolve the session cookie into a [`Principal`]
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = cookie_token(request.headers());

    let principal = match token {
        None => Principal::visitor(),
        Some(token) => match sessions::session_user(&state.db, &token).await {
            Ok(Some(user)) => Principal::authenticated(user, token),
            Ok(None) => {
                debug!("Session cookie does not match an active session");
                Principal {
                    token: Some(token),
                    ..Principal::visitor()
                }
            }
            Err(e) => return ApiError::from(e).into_response(),
        },
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_token_from_cookie)
        .map(str::to_string)
}

/// `Set-Cookie` value carrying a new session token
pub fn session_cookie(token: &str, ttl: chrono::Duration, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        ttl.num_seconds(),
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE,
        if secure { "; Secure" } else { "" }
    )
}

fn set_cookie(value: String) -> ApiResult<[(header::HeaderName, HeaderValue); 1]> {
    let value = HeaderValue::from_str(&value).map_err(|e| {
        ApiError::Common(mlp_common::Error::Internal(format!("cookie header: {}", e)))
    })?;
    Ok([(header::SET_COOKIE, value)])
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/login
///
/// Unknown email is `nouser`, wrong password is `login`; both are 401.
pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let credentials: LoginRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| ApiError::BadRequest(format!("email and password are required: {}", e)))?;

    let user = match authenticate(&state.db, &credentials.email, &credentials.password).await? {
        LoginOutcome::Accepted(user) => user,
        LoginOutcome::UnknownUser => {
            warn!("Login attempt for unknown account");
            return Err(ApiError::NoUser);
        }
        LoginOutcome::WrongPassword => {
            warn!("Failed login for user");
            return Err(ApiError::Login);
        }
    };

    let token = sessions::create_session(&state.db, user.id, state.session_ttl).await?;
    info!("User {} signed in", user.id);

    let headers = set_cookie(session_cookie(&token, state.session_ttl, state.secure_cookie))?;
    Ok((headers, Json(json!({ "data": user }))).into_response())
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Response> {
    if let Some(token) = &principal.token {
        sessions::delete_session(&state.db, token).await?;
    }
    if let Some(user) = &principal.user {
        info!("User {} signed out", user.id);
    }

    let headers = set_cookie(clear_cookie(state.secure_cookie))?;
    Ok((headers, Json(json!({ "data": null }))).into_response())
}

/// GET /api/auth/session
pub async fn current_session(Extension(principal): Extension<Principal>) -> ApiResult<Json<Value>> {
    let user = principal.user.ok_or(ApiError::Session)?;
    Ok(Json(json!({ "data": user })))
}
