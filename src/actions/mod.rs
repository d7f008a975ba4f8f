//! Mutating operations. Each action binds its input explicitly, decides
//! authorization from the caller alone and validates against the stores
//! before any handler writes.

pub mod oauth;
pub mod post;
pub mod signin;
pub mod tag;
pub mod tenant;
pub mod user;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::User;
use crate::services::Services;
use crate::validate::ValidationResult;

pub use oauth::CreateEditOAuthConfig;
pub use post::{AddComment, CreatePost, SetResponse, SupportPost, UpdatePost};
pub use signin::{CompleteProfile, SignInByEmail};
pub use tag::{AddEditTag, AssignTag, DeleteTag};
pub use tenant::{CreateTenant, InviteUsers, UpdateTenantPrivacy, UpdateTenantSettings};
pub use user::{ChangeUserEmail, ChangeUserRole, UpdateUserSettings};

#[async_trait]
pub trait Action: Sized + Send + Sync {
    type Input: DeserializeOwned + Send;

    /// Decodes and normalizes the raw input.
    fn bind(input: Self::Input) -> Result<Self, ApiError>;

    fn is_authorized(&self, user: Option<&User>) -> bool;

    async fn validate(&mut self, user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError>;
}

/// bind, then authorize, then validate. Anonymous callers are told to
/// authenticate, signed-in callers that lack permission are forbidden.
pub async fn run<A: Action>(input: A::Input, user: Option<&User>, services: &Services) -> Result<A, ApiError> {
    let mut action = A::bind(input)?;

    if !action.is_authorized(user) {
        return Err(match user {
            None => ApiError::unauthorized("Authentication required"),
            Some(_) => ApiError::forbidden("You are not allowed to perform this action"),
        });
    }

    let result = action.validate(user, services).await?;
    if !result.is_ok() {
        return Err(ApiError::validation(result));
    }
    Ok(action)
}

pub(crate) fn trim(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn lower(value: String) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn is_administrator(user: Option<&User>) -> bool {
    user.is_some_and(User::is_administrator)
}

pub(crate) fn is_collaborator(user: Option<&User>) -> bool {
    user.is_some_and(User::is_collaborator)
}

/// Character count, which is what length limits are stated in.
pub(crate) fn chars(value: &str) -> usize {
    value.chars().count()
}
