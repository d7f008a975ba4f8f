use async_trait::async_trait;
use serde::Deserialize;

use super::{chars, is_administrator, lower, trim, Action};
use crate::error::ApiError;
use crate::models::verification::generate_secret_key;
use crate::models::{Role, User};
use crate::services::Services;
use crate::validate::{self, ValidationResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeUserRoleInput {
    pub user_id: i32,
    pub role: String,
}

#[derive(Debug)]
pub struct ChangeUserRole {
    pub user_id: i32,
    /// `None` for a role name that does not exist.
    pub role: Option<Role>,
}

#[async_trait]
impl Action for ChangeUserRole {
    type Input = ChangeUserRoleInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            user_id: input.user_id,
            role: lower(input.role).parse().ok(),
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user) && user.is_some_and(|u| u.id != self.user_id)
    }

    async fn validate(&mut self, user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        if self.role.is_none() {
            return Err(ApiError::not_found("Role not found"));
        }

        let mut result = ValidationResult::success();
        if user.is_some_and(|u| u.id == self.user_id) {
            result.add_failure("userId", "It is not allowed to change your own Role.");
        }

        match services.users.get_by_id(self.user_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => result.add_failure("userId", "User not found."),
            Err(err) => return Err(err.into()),
        }
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeUserEmailInput {
    pub email: String,
}

#[derive(Debug)]
pub struct ChangeUserEmail {
    pub email: String,
    pub verification_key: String,
}

#[async_trait]
impl Action for ChangeUserEmail {
    type Input = ChangeUserEmailInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            email: lower(input.email),
            verification_key: generate_secret_key(),
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        user.is_some()
    }

    async fn validate(&mut self, user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let Some(user) = user else {
            return Err(ApiError::unauthorized("Authentication required"));
        };

        if self.email.is_empty() {
            return Ok(ValidationResult::failed("email", "Email is required."));
        }
        if chars(&self.email) > 200 {
            return Ok(ValidationResult::failed("email", "Email must have less than 200 characters."));
        }
        if user.email == self.email {
            return Ok(ValidationResult::failed("email", "Choose a different email."));
        }

        let messages = validate::email(&self.email);
        if !messages.is_empty() {
            let mut result = ValidationResult::success();
            result.add_failures("email", messages);
            return Ok(result);
        }

        match services.users.get_by_email(&self.email).await {
            Ok(existing) if existing.id != user.id => Ok(ValidationResult::failed(
                "email",
                "This email is already in use by someone else",
            )),
            Ok(_) => Ok(ValidationResult::success()),
            Err(err) if err.is_not_found() => Ok(ValidationResult::success()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserSettingsInput {
    pub name: String,
}

#[derive(Debug)]
pub struct UpdateUserSettings {
    pub name: String,
}

#[async_trait]
impl Action for UpdateUserSettings {
    type Input = UpdateUserSettingsInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self { name: trim(input.name) })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        user.is_some()
    }

    async fn validate(&mut self, _user: Option<&User>, _services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();
        if self.name.is_empty() {
            result.add_failure("name", "Name is required.");
        } else if chars(&self.name) > 50 {
            result.add_failure("name", "Name must have less than 50 characters.");
        }
        Ok(result)
    }
}
