// handlers/mod.rs - three access tiers, mirrored by the router:
// public (anyone, subject to tenant privacy), protected (signed-in users)
// and elevated (administrators).

pub mod elevated;
pub mod protected;
pub mod public;

use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// `?k=` of every verification link.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeyQuery {
    pub k: String,
}

pub(crate) fn ok() -> ApiResponse<Value> {
    ApiResponse::success(json!({}))
}

pub(crate) fn redirect_with_cookie(location: &str, cookie: HeaderValue) -> Response {
    ([(SET_COOKIE, cookie)], Redirect::temporary(location)).into_response()
}

pub(crate) fn with_cookie(response: impl IntoResponse, cookie: HeaderValue) -> Response {
    ([(SET_COOKIE, cookie)], response).into_response()
}

/// Unmatched routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
