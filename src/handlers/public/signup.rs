// handlers/public/signup.rs - tenant sign-up on the platform host

use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{json, Value};

use crate::actions::tenant::CreateTenantInput;
use crate::actions::CreateTenant;
use crate::auth::OAuthClaims;
use crate::context::{ApiPath, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::with_cookie;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{EmailVerificationKind, NewEmailVerification, Role, TenantStatus, User, UserProvider};
use crate::tasks;
use crate::validate;

/// Subdomain of the sole tenant in single host mode.
const SINGLE_HOST_SUBDOMAIN: &str = "default";

#[derive(Debug, Serialize)]
struct CreatedTenant {
    id: i32,
    url: String,
}

fn administrator(claims: &OAuthClaims) -> User {
    let mut user = User::visitor(claims.oauth_name.clone(), claims.oauth_email.clone());
    user.role = Role::Administrator;
    user.providers.push(UserProvider {
        name: claims.oauth_provider.clone(),
        uid: claims.oauth_id.clone(),
    });
    user
}

/// POST /_api/tenants
///
/// With an OAuth claim token the tenant starts active and its owner is
/// signed in right away; otherwise it waits for the mailed sign-up link.
pub async fn create(ctx: RequestContext, JsonInput(input): JsonInput<CreateTenantInput>) -> Result<Response, ApiError> {
    let action = ctx.bind_to::<CreateTenant>(input).await?;
    let config = ctx.config();

    let subdomain = if config.is_single_host() {
        SINGLE_HOST_SUBDOMAIN
    } else {
        action.subdomain.as_str()
    };
    let status = if action.claims.is_some() {
        TenantStatus::Active
    } else {
        TenantStatus::Inactive
    };

    let tenant = ctx.services().tenants.add(&action.tenant_name, subdomain, status).await?;
    let services = ctx.scoped_services(Some(tenant.clone()), None);
    let mut url = ctx.base_url_for(&tenant);
    tracing::info!(tenant_id = tenant.id, subdomain, "tenant created");

    match &action.claims {
        Some(claims) => {
            let user = services.users.register(&administrator(claims)).await?;
            if !config.is_single_host() {
                url = format!("{}/?jwt={}", url, ctx.session_token(&user)?);
            }
            let cookie = ctx.session_cookie(&user)?;
            Ok(with_cookie(ApiResponse::created(CreatedTenant { id: tenant.id, url }), cookie))
        }
        None => {
            let kind = EmailVerificationKind::SignUp;
            let request = NewEmailVerification::new(kind, action.email.clone()).with_name(action.name.clone());
            services
                .tenants
                .save_verification_key(&action.verification_key, kind.validity(), &request)
                .await?;

            ctx.enqueue_as(
                tasks::send_signup_email(action.name, action.email, action.verification_key),
                tenant.clone(),
                None,
            );
            Ok(ApiResponse::created(CreatedTenant { id: tenant.id, url }).into_response())
        }
    }
}

/// GET /_api/tenants/:subdomain/availability
pub async fn check_availability(ctx: RequestContext, ApiPath(subdomain): ApiPath<String>) -> ApiResult<Value> {
    let subdomain = subdomain.trim().to_lowercase();
    let messages = validate::subdomain(ctx.services().tenants.as_ref(), &subdomain).await?;
    Ok(ApiResponse::success(json!({
        "available": messages.is_empty(),
        "message": messages.into_iter().next().unwrap_or_default(),
    })))
}
