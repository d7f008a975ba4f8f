// handlers/public/signin.rs - email sign-in and the verification links it mails

use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actions::signin::{find_usable_key, CompleteProfileInput, SignInByEmailInput};
use crate::actions::{CompleteProfile, SignInByEmail};
use crate::context::{ApiQuery, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::{ok, redirect_with_cookie, with_cookie, KeyQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{EmailVerification, EmailVerificationKind, NewEmailVerification, Role, User};
use crate::storage::StoreError;
use crate::tasks;

async fn find_by_email(ctx: &RequestContext, email: &str) -> Result<Option<User>, ApiError> {
    match ctx.services().users.get_by_email(email).await {
        Ok(user) => Ok(Some(user)),
        Err(StoreError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Consumes the key and signs `user` in with a redirect to the tenant home.
async fn sign_in_with_key(ctx: &RequestContext, key: &str, user: &User) -> Result<Response, ApiError> {
    ctx.services().tenants.set_key_as_verified(key).await?;
    let cookie = ctx.session_cookie(user)?;
    Ok(redirect_with_cookie(&ctx.base_url(), cookie))
}

fn local_part(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}

/// POST /_api/signin - mails a sign-in link
pub async fn sign_in_by_email(
    ctx: RequestContext,
    JsonInput(input): JsonInput<SignInByEmailInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<SignInByEmail>(input).await?;

    if ctx.tenant()?.is_private && find_by_email(&ctx, &action.email).await?.is_none() {
        return Err(ApiError::not_invited());
    }

    let kind = EmailVerificationKind::SignIn;
    let request = NewEmailVerification::new(kind, action.email.clone());
    ctx.services()
        .tenants
        .save_verification_key(&action.verification_key, kind.validity(), &request)
        .await?;

    ctx.enqueue(tasks::send_signin_email(action.email, action.verification_key));
    Ok(ok())
}

/// GET /signin/verify?k=
pub async fn verify_sign_in(ctx: RequestContext, ApiQuery(query): ApiQuery<KeyQuery>) -> Result<Response, ApiError> {
    let verification = find_usable_key(ctx.services(), EmailVerificationKind::SignIn, &query.k).await?;

    match find_by_email(&ctx, &verification.email).await? {
        Some(user) => sign_in_with_key(&ctx, &verification.key, &user).await,
        None if ctx.tenant()?.is_private => Err(ApiError::not_invited()),
        None => Ok(ApiResponse::success(json!({
            "profileRequired": true,
            "key": verification.key,
            "email": verification.email,
        }))
        .into_response()),
    }
}

/// POST /_api/signin/complete - names a first-time email sign-in
pub async fn complete_profile(
    ctx: RequestContext,
    JsonInput(input): JsonInput<CompleteProfileInput>,
) -> Result<Response, ApiError> {
    let action = ctx.bind_to::<CompleteProfile>(input).await?;

    if find_by_email(&ctx, &action.email).await?.is_some() {
        return Ok(ok().into_response());
    }
    // the key may predate the tenant going private
    if ctx.tenant()?.is_private {
        return Err(ApiError::not_invited());
    }

    let user = ctx.services().users.register(&User::visitor(action.name, action.email)).await?;
    ctx.services().tenants.set_key_as_verified(&action.key).await?;
    let cookie = ctx.session_cookie(&user)?;
    Ok(with_cookie(ok(), cookie))
}

/// GET /invite/verify?k=
pub async fn verify_invite(ctx: RequestContext, ApiQuery(query): ApiQuery<KeyQuery>) -> Result<Response, ApiError> {
    let verification = find_usable_key(ctx.services(), EmailVerificationKind::UserInvitation, &query.k).await?;

    let user = match find_by_email(&ctx, &verification.email).await? {
        Some(user) => user,
        None => {
            let visitor = User::visitor(local_part(&verification.email), verification.email.clone());
            ctx.services().users.register(&visitor).await?
        }
    };
    sign_in_with_key(&ctx, &verification.key, &user).await
}

fn administrator(verification: &EmailVerification) -> User {
    let mut user = User::visitor(verification.name.clone(), verification.email.clone());
    user.role = Role::Administrator;
    user
}

/// GET /signup/verify?k= - activates a tenant created by email
pub async fn verify_sign_up(ctx: RequestContext, ApiQuery(query): ApiQuery<KeyQuery>) -> Result<Response, ApiError> {
    let tenant = ctx.tenant()?;
    let verification = find_usable_key(ctx.services(), EmailVerificationKind::SignUp, &query.k).await?;
    if tenant.is_active() {
        return Err(ApiError::not_found("Verification key not found"));
    }

    ctx.services().tenants.activate(tenant.id).await?;
    let user = ctx.services().users.register(&administrator(&verification)).await?;
    tracing::info!(tenant_id = tenant.id, user_id = user.id, "tenant activated");
    sign_in_with_key(&ctx, &verification.key, &user).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignOutQuery {
    pub redirect: String,
}

/// GET /signout?redirect= - only same-site paths are followed
pub async fn sign_out(ctx: RequestContext, ApiQuery(query): ApiQuery<SignOutQuery>) -> Result<Response, ApiError> {
    let cookie = ctx.remove_session_cookie()?;
    let path = if query.redirect.starts_with('/') && !query.redirect.starts_with("//") {
        query.redirect.as_str()
    } else {
        "/"
    };
    let location = format!("{}{}", ctx.base_url(), path);
    Ok(with_cookie(Redirect::temporary(&location), cookie))
}
