//! OAuth2 federation: authorize URLs, profile parsing, the provider
//! registry and reconciliation of provider identities with local users.

pub mod federation;
pub mod http;
pub mod providers;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::jsonq::Query;
use crate::models::{OAuthConfig, UserProfile};
use crate::validate;

pub use federation::{reconcile, Reconciliation};
pub use http::HttpOAuthClient;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("user id is required")]
    UserIdRequired,

    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),

    #[error("provider returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider responded {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("provider response has no {0}")]
    MissingField(&'static str),
}

/// Exchanges an authorization code for the caller's profile.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    async fn fetch_profile(
        &self,
        config: &OAuthConfig,
        redirect_uri: &str,
        code: &str,
    ) -> Result<UserProfile, OAuthError>;
}

/// `{endpoint}/oauth/{provider}/callback`
pub fn callback_url(endpoint: &str, provider: &str) -> String {
    format!("{}/oauth/{}/callback", endpoint.trim_end_matches('/'), provider)
}

/// Provider URL the browser is sent to. `state` carries the post-login
/// redirect and a nonce as `redirect|nonce`.
pub fn authorize_url(
    config: &OAuthConfig,
    redirect_uri: &str,
    redirect: &str,
    nonce: &str,
) -> Result<String, OAuthError> {
    let mut url = Url::parse(&config.authorize_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scope)
        .append_pair("state", &format!("{}|{}", redirect, nonce));
    Ok(url.to_string())
}

/// Redirect part of a `redirect|nonce` state.
pub fn redirect_from_state(state: &str) -> &str {
    match state.rsplit_once('|') {
        Some((redirect, _)) => redirect,
        None => state,
    }
}

/// Maps a provider profile document through the configured JSON paths.
pub fn parse_profile(body: &str, config: &OAuthConfig) -> Result<UserProfile, OAuthError> {
    let query = Query::parse(body)?;
    profile_from_query(&query, config)
}

pub fn profile_from_query(query: &Query, config: &OAuthConfig) -> Result<UserProfile, OAuthError> {
    let id = query.string(&config.json_user_id_path).trim().to_string();
    if id.is_empty() {
        return Err(OAuthError::UserIdRequired);
    }

    let mut email = query.string(&config.json_user_email_path).trim().to_lowercase();
    if !validate::is_email(&email) {
        email.clear();
    }

    let mut name = query.string(&config.json_user_name_path).trim().to_string();
    if name.is_empty() {
        name = match email.split_once('@') {
            Some((local, _)) if !local.is_empty() => local.to_string(),
            _ => "Anonymous".to_string(),
        };
    }

    Ok(UserProfile { id, name, email })
}
