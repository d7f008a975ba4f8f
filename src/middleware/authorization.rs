use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::ClaimsOrigin;
use crate::context::{CurrentTenant, CurrentUser, SessionClaims};
use crate::error::ApiError;
use crate::models::{Role, User};

const API_PREFIX: &str = "/api/";

fn current_user(request: &Request) -> Option<&User> {
    request.extensions().get::<CurrentUser>().map(|u| &u.0)
}

/// Tokens issued to API clients are only honoured under `/api/`.
pub async fn check_token_origin(request: Request, next: Next) -> Response {
    let origin = request.extensions().get::<SessionClaims>().map(|c| c.0.origin);
    if origin == Some(ClaimsOrigin::Api) && !request.uri().path().starts_with(API_PREFIX) {
        return ApiError::unauthorized("API tokens are not accepted here").into_response();
    }
    next.run(request).await
}

pub async fn require_authenticated(request: Request, next: Next) -> Response {
    if current_user(&request).is_none() {
        return ApiError::unauthorized("Authentication required").into_response();
    }
    next.run(request).await
}

fn require_role(request: &Request, role: Role) -> Result<(), ApiError> {
    match current_user(request) {
        None => Err(ApiError::unauthorized("Authentication required")),
        Some(user) if user.role >= role => Ok(()),
        Some(_) => Err(ApiError::forbidden("You are not allowed to access this resource")),
    }
}

/// Collaborators and administrators.
pub async fn require_collaborator(request: Request, next: Next) -> Response {
    if let Err(err) = require_role(&request, Role::Collaborator) {
        return err.into_response();
    }
    next.run(request).await
}

pub async fn require_administrator(request: Request, next: Next) -> Response {
    if let Err(err) = require_role(&request, Role::Administrator) {
        return err.into_response();
    }
    next.run(request).await
}

/// Private tenants only show their content to signed-in users.
pub async fn check_private_tenant(request: Request, next: Next) -> Response {
    let is_private = request.extensions().get::<CurrentTenant>().is_some_and(|t| t.0.is_private);
    if is_private && current_user(&request).is_none() {
        return ApiError::unauthorized("This site is private").into_response();
    }
    next.run(request).await
}
