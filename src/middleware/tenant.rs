use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::context::{ActiveTransaction, AppState, CurrentTenant};
use crate::error::ApiError;
use crate::models::Tenant;
use crate::storage::{Scope, StoreError};

/// Inactive tenants only answer on this path, so sign-up can finish.
const SIGNUP_VERIFY_PATH: &str = "/signup/verify";

/// Host the client asked for, port included: `X-Forwarded-Host` first,
/// then `Host`.
pub fn forwarded_host(headers: &HeaderMap) -> Option<String> {
    ["x-forwarded-host", "host"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_lowercase())
        .find(|value| !value.is_empty())
}

pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// `theavengers.test.fider.io` under `test.fider.io` is `theavengers`.
/// Any other host is returned unchanged so it can match a CNAME.
pub fn extract_subdomain<'a>(host: &'a str, domain: &str) -> &'a str {
    if domain.is_empty() {
        return host;
    }
    host.strip_suffix(domain)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|sub| !sub.is_empty())
        .unwrap_or(host)
}

/// Taken off the request before awaiting; the body is not `Sync`.
fn lookup_inputs(request: &Request) -> Result<(ActiveTransaction, String), ApiError> {
    let trx = request
        .extensions()
        .get::<ActiveTransaction>()
        .cloned()
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("tenant resolution outside a transaction")))?;
    Ok((trx, forwarded_host(request.headers()).unwrap_or_default()))
}

async fn resolve(state: &AppState, trx: ActiveTransaction, host: &str) -> Result<Option<Tenant>, ApiError> {
    let tenants = trx.0.stores(&Scope::default()).tenants;

    let lookup = if state.config().is_single_host() {
        tenants.first().await
    } else {
        let host = strip_port(host);
        let subdomain = extract_subdomain(host, &state.config().host.domain);
        tenants.get_by_domain(subdomain, host).await
    };

    match lookup {
        Ok(tenant) => Ok(Some(tenant)),
        Err(StoreError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn attach(request: &mut Request, tenant: Option<Tenant>) -> Result<(), ApiError> {
    let Some(tenant) = tenant else {
        return Ok(());
    };
    if !tenant.is_active() && request.uri().path() != SIGNUP_VERIFY_PATH {
        tracing::debug!(tenant_id = tenant.id, "tenant is not active");
        return Err(ApiError::not_found("Tenant not found"));
    }
    tracing::Span::current().record("tenant_id", tenant.id);
    request.extensions_mut().insert(CurrentTenant(tenant));
    Ok(())
}

/// Resolves the tenant addressed by the request host; no tenant is a 404.
pub async fn require_tenant(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (trx, host) = match lookup_inputs(&request) {
        Ok(inputs) => inputs,
        Err(err) => return err.into_response(),
    };
    let tenant = match resolve(&state, trx, &host).await {
        Ok(Some(tenant)) => Some(tenant),
        Ok(None) => return ApiError::not_found("Tenant not found").into_response(),
        Err(err) => return err.into_response(),
    };
    if let Err(err) = attach(&mut request, tenant) {
        return err.into_response();
    }
    next.run(request).await
}

/// Like [`require_tenant`] for platform routes that also work without one.
pub async fn optional_tenant(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (trx, host) = match lookup_inputs(&request) {
        Ok(inputs) => inputs,
        Err(err) => return err.into_response(),
    };
    let tenant = match resolve(&state, trx, &host).await {
        Ok(tenant) => tenant,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = attach(&mut request, tenant) {
        return err.into_response();
    }
    next.run(request).await
}
