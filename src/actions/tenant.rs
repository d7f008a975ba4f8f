use async_trait::async_trait;
use serde::Deserialize;

use super::{chars, is_administrator, lower, trim, Action};
use crate::auth::OAuthClaims;
use crate::error::ApiError;
use crate::models::verification::generate_secret_key;
use crate::models::{ImageUpload, ImageUploadInput, User};
use crate::services::Services;
use crate::storage::StoreError;
use crate::validate::{self, ImageUploadOpts, ValidationResult};

/// Text every invitation message must contain; replaced by the link.
pub const INVITE_PLACEHOLDER: &str = "%invite%";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTenantInput {
    pub token: String,
    pub name: String,
    pub email: String,
    pub tenant_name: String,
    pub subdomain: String,
}

#[derive(Debug)]
pub struct CreateTenant {
    pub token: String,
    pub name: String,
    pub email: String,
    pub tenant_name: String,
    pub subdomain: String,
    pub verification_key: String,
    /// Decoded from `token` during validation.
    pub claims: Option<OAuthClaims>,
}

#[async_trait]
impl Action for CreateTenant {
    type Input = CreateTenantInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            token: trim(input.token),
            name: trim(input.name),
            email: lower(input.email),
            tenant_name: trim(input.tenant_name),
            subdomain: lower(input.subdomain),
            verification_key: generate_secret_key(),
            claims: None,
        })
    }

    fn is_authorized(&self, _user: Option<&User>) -> bool {
        true
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();

        if self.name.is_empty() && self.email.is_empty() {
            if self.token.is_empty() {
                result.add_failure("token", "Please identify yourself before proceeding.");
            } else {
                match services.signer.decode::<OAuthClaims>(&self.token) {
                    Ok(claims) => self.claims = Some(claims),
                    Err(err) => {
                        tracing::debug!(error = %err, "rejected sign-up token");
                        result.add_failure("token", "Your sign-up session has expired. Please sign in again.");
                    }
                }
            }
        } else {
            if self.name.is_empty() {
                result.add_failure("name", "Name is required.");
            }
            result.add_failures("email", validate::email(&self.email));
        }

        if self.tenant_name.is_empty() {
            result.add_failure("tenantName", "Name is required.");
        } else if chars(&self.tenant_name) > 60 {
            result.add_failure("tenantName", "Name must have less than 60 characters.");
        }

        if services.config.is_single_host() {
            match services.tenants.first().await {
                Ok(_) => return Err(ApiError::forbidden("This instance already has a site.")),
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
        } else {
            result.add_failures("subdomain", validate::subdomain(services.tenants.as_ref(), &self.subdomain).await?);
        }

        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTenantSettingsInput {
    pub title: String,
    pub invitation: String,
    pub welcome_message: String,
    pub cname: String,
    pub logo: Option<ImageUploadInput>,
}

#[derive(Debug)]
pub struct UpdateTenantSettings {
    pub title: String,
    pub invitation: String,
    pub welcome_message: String,
    pub cname: String,
    pub logo: ImageUpload,
}

#[async_trait]
impl Action for UpdateTenantSettings {
    type Input = UpdateTenantSettingsInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        let logo = input
            .logo
            .unwrap_or_default()
            .decode()
            .map_err(|_| ApiError::bad_request("Logo content is not valid base64"))?;
        Ok(Self {
            title: trim(input.title),
            invitation: trim(input.invitation),
            welcome_message: trim(input.welcome_message),
            cname: lower(input.cname),
            logo,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();

        if self.title.is_empty() {
            result.add_failure("title", "Title is required.");
        } else if chars(&self.title) > 60 {
            result.add_failure("title", "Title must have less than 60 characters.");
        }
        if chars(&self.invitation) > 60 {
            result.add_failure("invitation", "Invitation must have less than 60 characters.");
        }

        let domain = &services.config.host.domain;
        result.add_failures("cname", validate::cname(services.tenants.as_ref(), &self.cname, domain).await?);
        result.add_failures("logo", validate::image_upload(Some(&self.logo), &ImageUploadOpts::default()));
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTenantPrivacyInput {
    pub is_private: bool,
}

#[derive(Debug)]
pub struct UpdateTenantPrivacy {
    pub is_private: bool,
}

#[async_trait]
impl Action for UpdateTenantPrivacy {
    type Input = UpdateTenantPrivacyInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            is_private: input.is_private,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, _services: &Services) -> Result<ValidationResult, ApiError> {
        Ok(ValidationResult::success())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InviteUsersInput {
    pub subject: String,
    pub message: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invitation {
    pub email: String,
    pub verification_key: String,
}

#[derive(Debug)]
pub struct InviteUsers {
    pub subject: String,
    pub message: String,
    pub recipients: Vec<String>,
    pub invitations: Vec<Invitation>,
}

#[async_trait]
impl Action for InviteUsers {
    type Input = InviteUsersInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        let recipients = input
            .recipients
            .into_iter()
            .map(lower)
            .filter(|email| !email.is_empty())
            .collect();
        Ok(Self {
            subject: trim(input.subject),
            message: trim(input.message),
            recipients,
            invitations: Vec::new(),
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, _services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();

        if self.subject.is_empty() {
            result.add_failure("subject", "Subject is required.");
        } else if chars(&self.subject) > 70 {
            result.add_failure("subject", "Subject must have less than 70 characters.");
        }

        if self.message.is_empty() {
            result.add_failure("message", "Message is required.");
        } else if !self.message.contains(INVITE_PLACEHOLDER) {
            result.add_failure(
                "message",
                "Your message is missing the invitation link placeholder. Please add '%invite%' to your message.",
            );
        }

        if self.recipients.is_empty() {
            result.add_failure("recipients", "At least one recipient is required.");
        } else if self.recipients.len() > 30 {
            result.add_failure("recipients", "Too many recipients. We limit at 30 recipients per invite.");
        }

        self.invitations.clear();
        for email in &self.recipients {
            let messages = validate::email(email);
            if messages.is_empty() {
                self.invitations.push(Invitation {
                    email: email.clone(),
                    verification_key: generate_secret_key(),
                });
            } else {
                result.add_failures("recipients", messages);
            }
        }
        Ok(result)
    }
}
