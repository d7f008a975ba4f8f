use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};

use crate::auth::UserClaims;
use crate::config::SecurityConfig;
use crate::context::{ActiveTransaction, AppState, CurrentTenant, CurrentUser, SessionClaims};
use crate::error::ApiError;
use crate::storage::{Scope, StoreError};

pub const AUTH_COOKIE: &str = "auth";
const JWT_QUERY_PARAM: &str = "jwt";
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn cookie(value: &str, lifetime: Duration, security: &SecurityConfig) -> Result<HeaderValue, ApiError> {
    let expires = (Utc::now() + lifetime).format(COOKIE_DATE_FORMAT);
    let mut cookie = format!(
        "{}={}; Path=/; Expires={}; Max-Age={}; HttpOnly; SameSite=Lax",
        AUTH_COOKIE,
        value,
        expires,
        lifetime.num_seconds().max(0)
    );
    if security.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(ApiError::internal)
}

/// `Set-Cookie` value carrying a session token.
pub fn auth_cookie(token: &str, security: &SecurityConfig) -> Result<HeaderValue, ApiError> {
    cookie(token, Duration::days(security.session_expiry_days), security)
}

/// Expired `auth` cookie.
pub fn remove_auth_cookie(security: &SecurityConfig) -> Result<HeaderValue, ApiError> {
    cookie("", Duration::zero(), security)
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, AUTH_COOKIE).or_else(|| bearer_token(headers))
}

/// Attaches the signed-in user of the resolved tenant. A missing, invalid
/// or foreign token leaves the request anonymous.
pub async fn read_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return next.run(request).await;
    };

    let claims = match state.signer().decode::<UserClaims>(&token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring session token");
            return next.run(request).await;
        }
    };

    let trx = request.extensions().get::<ActiveTransaction>().cloned();
    let tenant = request.extensions().get::<CurrentTenant>().map(|t| t.0.clone());
    let (Some(trx), Some(tenant)) = (trx, tenant) else {
        return next.run(request).await;
    };

    let users = trx.0.stores(&Scope::new(Some(tenant), None)).users;
    match users.get_by_id(claims.user_id).await {
        Ok(user) => {
            tracing::Span::current().record("user_id", user.id);
            request.extensions_mut().insert(CurrentUser(user));
            request.extensions_mut().insert(SessionClaims(claims));
        }
        Err(StoreError::NotFound) => {
            tracing::debug!(user_id = claims.user_id, "session user not found in tenant");
        }
        Err(err) => return ApiError::from(err).into_response(),
    }

    next.run(request).await
}

/// Takes the `jwt` parameter out of `query`, returning it with the
/// re-encoded remainder.
fn split_jwt_param(query: &str) -> (Option<String>, String) {
    let mut token = None;
    let mut rest = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == JWT_QUERY_PARAM {
            token = Some(value.into_owned());
        } else {
            rest.append_pair(&key, &value);
        }
    }
    (token, rest.finish())
}

/// `?jwt=` stores the token as the session cookie and redirects to the
/// same URL without it.
pub async fn set_jwt_from_query(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(query) = request.uri().query() else {
        return next.run(request).await;
    };

    let (token, rest) = split_jwt_param(query);
    let Some(token) = token else {
        return next.run(request).await;
    };

    let target = if rest.is_empty() {
        request.uri().path().to_string()
    } else {
        format!("{}?{}", request.uri().path(), rest)
    };

    match auth_cookie(&token, &state.config().security) {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::temporary(&target)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn security(secure: bool) -> SecurityConfig {
        SecurityConfig {
            jwt_secret: "s3cr3t".to_string(),
            session_expiry_days: 365,
            secure_cookies: secure,
        }
    }

    #[test]
    fn auth_cookie_attributes() {
        let value = auth_cookie("abc.def", &security(false)).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("auth=abc.def; Path=/;"));
        assert!(value.contains("Max-Age=31536000"));
        assert!(value.contains("HttpOnly"));
        assert!(!value.contains("Secure"));

        let secure = auth_cookie("abc.def", &security(true)).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn removed_cookie_expires_now() {
        let value = remove_auth_cookie(&security(false)).unwrap();
        assert!(value.to_str().unwrap().starts_with("auth=; Path=/;"));
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; auth=tok123; lang=en"));
        assert_eq!(read_cookie(&headers, "auth").as_deref(), Some("tok123"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn jwt_param_is_split_from_the_rest() {
        assert_eq!(split_jwt_param("jwt=abc&page=2"), (Some("abc".to_string()), "page=2".to_string()));
        assert_eq!(split_jwt_param("q=a+b"), (None, "q=a+b".to_string()));
        assert_eq!(split_jwt_param("jwt=abc"), (Some("abc".to_string()), String::new()));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

        headers.insert(COOKIE, HeaderValue::from_static("auth=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }
}
