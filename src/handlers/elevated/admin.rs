// handlers/elevated/admin.rs - tenant settings, invitations, roles and custom OAuth

use serde_json::{json, Value};

use crate::actions::oauth::CreateEditOAuthConfigInput;
use crate::actions::tenant::{InviteUsersInput, UpdateTenantPrivacyInput, UpdateTenantSettingsInput};
use crate::actions::user::ChangeUserRoleInput;
use crate::actions::{ChangeUserRole, CreateEditOAuthConfig, InviteUsers, UpdateTenantPrivacy, UpdateTenantSettings};
use crate::context::{ApiPath, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::ok;
use crate::handlers::public::images::save_image;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{EmailVerificationKind, NewEmailVerification, OAuthConfig, TenantSettings, User};
use crate::tasks;

const LOGO_PREFIX: &str = "logos";
const OAUTH_LOGO_PREFIX: &str = "oauth";

/// POST /_api/admin/settings/general
pub async fn update_settings(
    ctx: RequestContext,
    JsonInput(input): JsonInput<UpdateTenantSettingsInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<UpdateTenantSettings>(input).await?;
    let logo_bkey = save_image(ctx.services(), &action.logo, LOGO_PREFIX).await?;

    let settings = TenantSettings {
        title: action.title,
        invitation: action.invitation,
        welcome_message: action.welcome_message,
        cname: Some(action.cname).filter(|cname| !cname.is_empty()),
        logo_bkey,
    };
    ctx.services().tenants.update_settings(&settings).await?;
    Ok(ok())
}

/// POST /_api/admin/settings/privacy
pub async fn update_privacy(
    ctx: RequestContext,
    JsonInput(input): JsonInput<UpdateTenantPrivacyInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<UpdateTenantPrivacy>(input).await?;
    ctx.services().tenants.update_privacy(action.is_private).await?;
    tracing::info!(tenant_id = ctx.tenant()?.id, is_private = action.is_private, "privacy changed");
    Ok(ok())
}

/// POST /_api/admin/invitations/send - one key per recipient, one email batch
pub async fn send_invitations(ctx: RequestContext, JsonInput(input): JsonInput<InviteUsersInput>) -> ApiResult<Value> {
    let action = ctx.bind_to::<InviteUsers>(input).await?;

    let kind = EmailVerificationKind::UserInvitation;
    for invitation in &action.invitations {
        let request = NewEmailVerification::new(kind, invitation.email.clone());
        ctx.services()
            .tenants
            .save_verification_key(&invitation.verification_key, kind.validity(), &request)
            .await?;
    }

    ctx.enqueue(tasks::send_invites(action.subject, action.message, action.invitations));
    Ok(ok())
}

/// GET /_api/admin/users
pub async fn list_users(ctx: RequestContext) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(ctx.services().users.get_all().await?))
}

/// POST /_api/admin/users/:user_id/role
pub async fn change_role(
    ctx: RequestContext,
    ApiPath(user_id): ApiPath<i32>,
    JsonInput(input): JsonInput<ChangeUserRoleInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<ChangeUserRole>(ChangeUserRoleInput { user_id, ..input }).await?;
    let role = action.role.ok_or_else(|| ApiError::not_found("Role not found"))?;
    ctx.services().users.change_role(action.user_id, role).await?;
    Ok(ok())
}

/// GET /_api/admin/oauth - secrets are masked on the way out
pub async fn list_oauth_configs(ctx: RequestContext) -> ApiResult<Vec<OAuthConfig>> {
    Ok(ApiResponse::success(ctx.services().tenants.list_oauth_configs().await?))
}

/// GET /_api/admin/oauth/:provider
pub async fn get_oauth_config(ctx: RequestContext, ApiPath(provider): ApiPath<String>) -> ApiResult<OAuthConfig> {
    let config = ctx
        .services()
        .tenants
        .get_oauth_config_by_provider(&provider)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                ApiError::not_found("OAuth provider not found")
            } else {
                err.into()
            }
        })?;
    Ok(ApiResponse::success(config))
}

/// POST /_api/admin/oauth - creates when no provider slug is sent
pub async fn save_oauth_config(
    ctx: RequestContext,
    JsonInput(input): JsonInput<CreateEditOAuthConfigInput>,
) -> ApiResult<Value> {
    let action = ctx.bind_to::<CreateEditOAuthConfig>(input).await?;
    let logo_bkey = save_image(ctx.services(), &action.logo, OAUTH_LOGO_PREFIX).await?;
    ctx.services().tenants.save_oauth_config(&action.to_config(logo_bkey)).await?;
    Ok(ApiResponse::success(json!({ "provider": action.provider })))
}
