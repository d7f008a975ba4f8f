// handlers/protected/user.rs - the signed-in user's own account

use axum::response::{IntoResponse, Redirect, Response};
use serde_json::Value;

use crate::actions::signin::find_usable_key;
use crate::actions::user::{ChangeUserEmailInput, UpdateUserSettingsInput};
use crate::actions::{ChangeUserEmail, UpdateUserSettings};
use crate::context::{ApiQuery, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::{ok, KeyQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{EmailVerificationKind, NewEmailVerification, User};
use crate::tasks;

/// GET /_api/user
pub async fn current(ctx: RequestContext) -> ApiResult<User> {
    Ok(ApiResponse::success(ctx.require_user()?.clone()))
}

/// POST /_api/user/settings
pub async fn update_settings(
    ctx: RequestContext,
    JsonInput(input): JsonInput<UpdateUserSettingsInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<UpdateUserSettings>(input).await?;
    let user = ctx.require_user()?;
    ctx.services().users.update_name(user.id, &action.name).await?;
    Ok(ok())
}

/// POST /_api/user/change-email - mails a confirmation to the new address
pub async fn change_email(ctx: RequestContext, JsonInput(input): JsonInput<ChangeUserEmailInput>) -> ApiResult<Value> {
    let action = ctx.bind_to::<ChangeUserEmail>(input).await?;
    let user = ctx.require_user()?;

    let kind = EmailVerificationKind::ChangeEmail;
    let request = NewEmailVerification::new(kind, action.email.clone()).for_user(user.id);
    ctx.services()
        .tenants
        .save_verification_key(&action.verification_key, kind.validity(), &request)
        .await?;

    ctx.enqueue(tasks::send_change_email_confirmation(action.email, action.verification_key));
    Ok(ok())
}

/// GET /change-email/verify?k=
///
/// A key issued to someone else is ignored rather than reported.
pub async fn verify_change_email(ctx: RequestContext, ApiQuery(query): ApiQuery<KeyQuery>) -> Result<Response, ApiError> {
    let user = ctx.require_user()?;
    let verification = find_usable_key(ctx.services(), EmailVerificationKind::ChangeEmail, &query.k).await?;
    if verification.user_id != Some(user.id) {
        return Ok(Redirect::temporary(&ctx.base_url()).into_response());
    }

    ctx.services().users.change_email(user.id, &verification.email).await?;
    ctx.services().tenants.set_key_as_verified(&verification.key).await?;
    tracing::info!(user_id = user.id, "email address changed");
    Ok(Redirect::temporary(&format!("{}/settings", ctx.base_url())).into_response())
}
