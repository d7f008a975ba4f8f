use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{chars, is_administrator, lower, trim, Action};
use crate::error::ApiError;
use crate::models::{ImageUpload, ImageUploadInput, OAuthConfig, OAuthConfigStatus, User};
use crate::services::Services;
use crate::validate::{self, ImageUploadOpts, ValidationResult};

/// Status as a storage code (`1`, `2`) or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatusInput {
    Code(i16),
    Name(String),
}

impl Default for StatusInput {
    fn default() -> Self {
        StatusInput::Code(0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateEditOAuthConfigInput {
    pub provider: String,
    pub status: StatusInput,
    pub display_name: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "authorizeURL")]
    pub authorize_url: String,
    #[serde(rename = "tokenURL")]
    pub token_url: String,
    #[serde(rename = "profileURL")]
    pub profile_url: String,
    pub scope: String,
    #[serde(rename = "jsonUserIDPath")]
    pub json_user_id_path: String,
    pub json_user_name_path: String,
    pub json_user_email_path: String,
    pub logo: Option<ImageUploadInput>,
}

#[derive(Debug)]
pub struct CreateEditOAuthConfig {
    /// 0 until validation finds the provider being edited.
    pub id: i32,
    pub provider: String,
    pub status: Option<OAuthConfigStatus>,
    pub display_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scope: String,
    pub json_user_id_path: String,
    pub json_user_name_path: String,
    pub json_user_email_path: String,
    pub logo: ImageUpload,
}

impl CreateEditOAuthConfig {
    /// The config to persist, with the logo key already resolved.
    pub fn to_config(&self, logo_bkey: Option<String>) -> OAuthConfig {
        OAuthConfig {
            id: self.id,
            provider: self.provider.clone(),
            display_name: self.display_name.clone(),
            status: self.status.unwrap_or(OAuthConfigStatus::Disabled),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            authorize_url: self.authorize_url.clone(),
            token_url: self.token_url.clone(),
            profile_url: self.profile_url.clone(),
            scope: self.scope.clone(),
            json_user_id_path: self.json_user_id_path.clone(),
            json_user_name_path: self.json_user_name_path.clone(),
            json_user_email_path: self.json_user_email_path.clone(),
            logo_bkey,
        }
    }
}

fn random_provider_slug() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("_{}", &random[..10])
}

#[async_trait]
impl Action for CreateEditOAuthConfig {
    type Input = CreateEditOAuthConfigInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        let status = match input.status {
            StatusInput::Code(code) => OAuthConfigStatus::from_i16(code),
            StatusInput::Name(name) => OAuthConfigStatus::parse(&lower(name)),
        };
        let logo = input
            .logo
            .unwrap_or_default()
            .decode()
            .map_err(|_| ApiError::bad_request("Logo content is not valid base64"))?;

        Ok(Self {
            id: 0,
            provider: trim(input.provider),
            status,
            display_name: trim(input.display_name),
            client_id: trim(input.client_id),
            client_secret: trim(input.client_secret),
            authorize_url: lower(input.authorize_url),
            token_url: lower(input.token_url),
            profile_url: lower(input.profile_url),
            scope: trim(input.scope),
            json_user_id_path: trim(input.json_user_id_path),
            json_user_name_path: trim(input.json_user_name_path),
            json_user_email_path: trim(input.json_user_email_path),
            logo,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        if self.provider.is_empty() {
            self.provider = random_provider_slug();
        } else {
            let existing = services.tenants.get_oauth_config_by_provider(&self.provider).await?;
            self.id = existing.id;
            if self.logo.bkey.is_none() {
                self.logo.bkey = existing.logo_bkey;
            }
            if self.client_secret.is_empty() {
                self.client_secret = existing.client_secret;
            }
        }

        let mut result = ValidationResult::success();
        result.add_failures("logo", validate::image_upload(Some(&self.logo), &ImageUploadOpts::default()));

        if self.status.is_none() {
            result.add_failure("status", "Invalid status.");
        }

        required_within(&mut result, "displayName", "Display Name", &self.display_name, 50);
        required_within(&mut result, "clientID", "Client ID", &self.client_id, 100);
        required_within(&mut result, "clientSecret", "Client Secret", &self.client_secret, 500);
        required_within(&mut result, "scope", "Scope", &self.scope, 100);

        if self.authorize_url.is_empty() {
            result.add_failure("authorizeURL", "Authorize URL is required.");
        } else {
            result.add_failures("authorizeURL", validate::url(&self.authorize_url));
        }
        if self.token_url.is_empty() {
            result.add_failure("tokenURL", "Token URL is required.");
        } else {
            result.add_failures("tokenURL", validate::url(&self.token_url));
        }
        if !self.profile_url.is_empty() {
            result.add_failures("profileURL", validate::url(&self.profile_url));
        }

        required_within(&mut result, "jsonUserIDPath", "JSON User ID Path", &self.json_user_id_path, 100);
        if chars(&self.json_user_name_path) > 100 {
            result.add_failure("jsonUserNamePath", "JSON User Name Path must have less than 100 characters.");
        }
        if chars(&self.json_user_email_path) > 100 {
            result.add_failure("jsonUserEmailPath", "JSON User Email Path must have less than 100 characters.");
        }

        Ok(result)
    }
}

fn required_within(result: &mut ValidationResult, field: &str, label: &str, value: &str, max: usize) {
    if value.is_empty() {
        result.add_failure(field, format!("{} is required.", label));
    } else if chars(value) > max {
        result.add_failure(field, format!("{} must have less than {} characters.", label, max));
    }
}
