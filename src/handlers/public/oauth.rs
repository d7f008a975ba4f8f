// handlers/public/oauth.rs - OAuth2 sign-in: initiate, callback, token exchange
//
// Built-in providers call back to the shared auth endpoint, which forwards
// the code to the tenant that started the flow. Sign-up on the platform
// host gets a short lived claim token instead of a session.

use axum::extract::OriginalUri;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::auth::OAuthClaims;
use crate::context::{ApiPath, ApiQuery, RequestContext};
use crate::error::ApiError;
use crate::handlers::redirect_with_cookie;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{is_custom_provider, OAuthConfig, OAuthProviderOption};
use crate::oauth::{self, providers, Reconciliation};

const SIGNUP_PATH: &str = "/signup";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OAuthQuery {
    pub redirect: String,
    pub code: String,
    pub state: String,
    pub path: String,
}

/// Custom providers belong to a tenant and cannot be resolved without one.
async fn resolve_provider(ctx: &RequestContext, provider: &str) -> Result<OAuthConfig, ApiError> {
    if is_custom_provider(provider) && ctx.tenant().is_err() {
        return Err(ApiError::not_found("OAuth provider not found"));
    }
    providers::resolve(ctx.services(), provider).await
}

/// `redirect_uri` registered for this tenant and provider.
fn redirect_uri(ctx: &RequestContext, config: &OAuthConfig) -> String {
    let tenant_base_url = ctx.tenant_base_url();
    let endpoint = providers::redirect_endpoint(config, &ctx.config().host.auth_endpoint, &tenant_base_url);
    oauth::callback_url(endpoint, &config.provider)
}

/// Hosts the code may be forwarded to: the request and tenant hosts,
/// anything under the platform domain and registered tenant CNAMEs.
async fn is_trusted_redirect(ctx: &RequestContext, url: &Url) -> Result<bool, ApiError> {
    let Some(host) = url.host_str().filter(|_| matches!(url.scheme(), "http" | "https")) else {
        return Ok(false);
    };

    let known = [ctx.base_url(), ctx.tenant_base_url()]
        .iter()
        .filter_map(|base| Url::parse(base).ok())
        .any(|base| base.host_str() == Some(host));
    let domain = &ctx.config().host.domain;
    let under_domain = !domain.is_empty() && (host == domain || host.ends_with(&format!(".{}", domain)));
    if known || under_domain {
        return Ok(true);
    }

    match ctx.services().tenants.get_by_domain("", host).await {
        Ok(tenant) => Ok(tenant.cname.as_deref() == Some(host)),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// GET /oauth/:provider?redirect=
pub async fn start(
    ctx: RequestContext,
    ApiPath(provider): ApiPath<String>,
    ApiQuery(query): ApiQuery<OAuthQuery>,
) -> Result<Response, ApiError> {
    let config = resolve_provider(&ctx, &provider).await?;

    let redirect = match Url::parse(&query.redirect) {
        Ok(url) if is_trusted_redirect(&ctx, &url).await? => url.to_string(),
        _ => ctx.tenant_base_url(),
    };
    let nonce = Uuid::new_v4().simple().to_string();
    let url = oauth::authorize_url(&config, &redirect_uri(&ctx, &config), &redirect, &nonce)?;
    Ok(Redirect::temporary(&url).into_response())
}

/// GET /oauth/:provider/callback?code&state
pub async fn callback(
    ctx: RequestContext,
    ApiPath(provider): ApiPath<String>,
    ApiQuery(query): ApiQuery<OAuthQuery>,
) -> Result<Response, ApiError> {
    let redirect = oauth::redirect_from_state(&query.state);
    let mut target = Url::parse(redirect).map_err(|_| ApiError::bad_request("Invalid OAuth state"))?;
    if !is_trusted_redirect(&ctx, &target).await? {
        return Err(ApiError::bad_request("Invalid OAuth state"));
    }

    if query.code.is_empty() {
        return Ok(Redirect::temporary(target.as_str()).into_response());
    }

    if target.path() == SIGNUP_PATH {
        let config = resolve_provider(&ctx, &provider).await?;
        let redirect_uri = oauth::callback_url(&ctx.base_url(), &provider);
        let profile = ctx.services().oauth.fetch_profile(&config, &redirect_uri, &query.code).await?;
        let token = ctx.signer().encode(&OAuthClaims::new(&provider, &profile))?;
        target.query_pairs_mut().append_pair("token", &token);
        return Ok(Redirect::temporary(target.as_str()).into_response());
    }

    let path = target.path().to_string();
    target.set_path(&format!("/oauth/{}/token", provider));
    target.set_query(None);
    target
        .query_pairs_mut()
        .append_pair("code", &query.code)
        .append_pair("path", &path);
    Ok(Redirect::temporary(target.as_str()).into_response())
}

/// Request URL with `path` as its path and the exchange parameters dropped.
fn landing_url(base_url: &str, uri: &str, path: &str) -> Result<String, ApiError> {
    let mut url = Url::parse(&format!("{}{}", base_url, uri)).map_err(ApiError::internal)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| *key != "code" && *key != "path")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_path(if path.is_empty() { "/" } else { path });
    url.set_query(None);
    if !kept.is_empty() {
        url.query_pairs_mut().extend_pairs(kept);
    }
    Ok(url.to_string())
}

/// GET /oauth/:provider/token?code&path
pub async fn token(
    ctx: RequestContext,
    ApiPath(provider): ApiPath<String>,
    ApiQuery(query): ApiQuery<OAuthQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    if query.code.is_empty() {
        return Ok(Redirect::temporary(&ctx.base_url()).into_response());
    }

    let tenant = ctx.tenant()?;
    let config = resolve_provider(&ctx, &provider).await?;
    let profile = ctx
        .services()
        .oauth
        .fetch_profile(&config, &redirect_uri(&ctx, &config), &query.code)
        .await?;

    let user = match oauth::reconcile(ctx.services(), tenant, &provider, &profile).await? {
        Reconciliation::NotInvited => return Err(ApiError::not_invited()),
        Reconciliation::Registered(user) => {
            tracing::info!(user_id = user.id, provider = %provider, "user registered through oauth");
            user
        }
        other => other.user().ok_or_else(ApiError::not_invited)?,
    };

    let cookie = ctx.session_cookie(&user)?;
    let location = landing_url(&ctx.base_url(), &uri.to_string(), &query.path)?;
    Ok(redirect_with_cookie(&location, cookie))
}

/// GET /_api/oauth/providers - sign-in options for the current host
pub async fn list_providers(ctx: RequestContext) -> ApiResult<Vec<OAuthProviderOption>> {
    let options = providers::list(ctx.services(), ctx.tenant().is_ok()).await?;
    Ok(ApiResponse::success(options))
}
