use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{chars, lower, trim, Action};
use crate::error::ApiError;
use crate::models::verification::generate_secret_key;
use crate::models::{EmailVerification, EmailVerificationKind, User};
use crate::services::Services;
use crate::validate::{self, ValidationResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInByEmailInput {
    pub email: String,
}

#[derive(Debug)]
pub struct SignInByEmail {
    pub email: String,
    pub verification_key: String,
}

#[async_trait]
impl Action for SignInByEmail {
    type Input = SignInByEmailInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            email: lower(input.email),
            verification_key: generate_secret_key(),
        })
    }

    fn is_authorized(&self, _user: Option<&User>) -> bool {
        true
    }

    async fn validate(&mut self, _user: Option<&User>, _services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();
        result.add_failures("email", validate::email(&self.email));
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompleteProfileInput {
    pub key: String,
    pub name: String,
}

/// Finishes an email sign-in for an address without an account.
#[derive(Debug)]
pub struct CompleteProfile {
    pub key: String,
    pub name: String,
    /// Filled by validation from the stored key.
    pub email: String,
}

#[async_trait]
impl Action for CompleteProfile {
    type Input = CompleteProfileInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            key: trim(input.key),
            name: trim(input.name),
            email: String::new(),
        })
    }

    fn is_authorized(&self, _user: Option<&User>) -> bool {
        true
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();
        if self.name.is_empty() {
            result.add_failure("name", "Name is required.");
        } else if chars(&self.name) > 50 {
            result.add_failure("name", "Name must have less than 50 characters.");
        }

        let verification = find_usable_key(services, EmailVerificationKind::SignIn, &self.key).await?;
        self.email = verification.email;
        Ok(result)
    }
}

/// An unconsumed, unexpired verification key; anything else is a 404 or 400.
pub async fn find_usable_key(
    services: &Services,
    kind: EmailVerificationKind,
    key: &str,
) -> Result<EmailVerification, ApiError> {
    if key.is_empty() {
        return Err(ApiError::not_found("Verification key not found"));
    }
    let verification = services.tenants.find_verification_by_key(kind, key).await?;
    if verification.is_expired(Utc::now()) {
        return Err(ApiError::bad_request("This link has expired."));
    }
    Ok(verification)
}
