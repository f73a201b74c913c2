//! HTTP API handlers for mlp-api

pub mod auth;
pub mod files;
pub mod health;
pub mod metadata;
pub mod models;
pub mod nodes;
pub mod options;
pub mod users;

pub use health::health_routes;

use axum::{body::Bytes, http::Uri};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

/// Numeric id from a path segment; ids are PostgreSQL `integer` keys
pub(crate) fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0 && *id <= i64::from(i32::MAX))
        .ok_or_else(|| ApiError::BadRequest(format!("'{}' is not a valid id", raw)))
}

/// JSON object from a request body; an empty body is an empty object
pub(crate) fn parse_body(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ApiError::BadRequest("request body must be a JSON object".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-3").is_err());
        assert!(parse_id("abc").is_err());
        assert_eq!(parse_id("2147483647").unwrap(), 2147483647);
        assert!(parse_id("2147483648").is_err());
        assert!(parse_id("3000000000").is_err());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(
            parse_body(&Bytes::from_static(b"{\"name\":\"x\"}")).unwrap(),
            json!({"name": "x"})
        );
        assert!(parse_body(&Bytes::from_static(b"[1,2]")).is_err());
        assert!(parse_body(&Bytes::from_static(b"{oops")).is_err());
    }
}
