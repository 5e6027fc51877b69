//! JSON response envelope
//!
//! Success bodies always carry `success: true`, plus `cached: <bool>` on
//! endpoints where caching applies. Failures are HTTP 500 with
//! `{ "success": false, "error": "…" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Wrap a payload as a success body.
pub fn success(data: Value) -> Response {
    let mut body = data;
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
    } else {
        body = json!({ "success": true, "data": body });
    }
    (StatusCode::OK, Json(body)).into_response()
}

/// Success body with the cache flag.
pub fn success_cached(data: Value, cached: bool) -> Response {
    let mut body = data;
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
        map.insert("cached".to_string(), Value::Bool(cached));
    }
    (StatusCode::OK, Json(body)).into_response()
}

/// Unrecoverable handler error.
pub fn internal_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}
