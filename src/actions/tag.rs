use async_trait::async_trait;
use serde::Deserialize;

use super::{chars, is_administrator, is_collaborator, trim, Action};
use crate::error::ApiError;
use crate::models::{Post, Tag, User};
use crate::services::Services;
use crate::validate::{self, ValidationResult};

async fn load_tag(services: &Services, slug: &str) -> Result<Tag, ApiError> {
    services.tags.get_by_slug(slug).await.map_err(|err| {
        if err.is_not_found() {
            ApiError::not_found("Tag not found")
        } else {
            err.into()
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddEditTagInput {
    /// Tag being edited; empty when adding.
    pub slug: String,
    pub name: String,
    pub color: String,
    pub is_public: bool,
}

#[derive(Debug)]
pub struct AddEditTag {
    pub slug: String,
    pub name: String,
    pub color: String,
    pub is_public: bool,
    /// Set when editing.
    pub tag: Option<Tag>,
}

#[async_trait]
impl Action for AddEditTag {
    type Input = AddEditTagInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            slug: trim(input.slug),
            name: trim(input.name),
            color: trim(input.color),
            is_public: input.is_public,
            tag: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        if !self.slug.is_empty() {
            self.tag = Some(load_tag(services, &self.slug).await?);
        }

        let mut result = ValidationResult::success();
        if self.name.is_empty() {
            result.add_failure("name", "Name is required.");
        } else if chars(&self.name) > 30 {
            result.add_failure("name", "Name must have less than 30 characters.");
        } else if Tag::slug_for(&self.name).is_empty() {
            result.add_failure("name", "Name needs letters or digits.");
        } else {
            match services.tags.get_by_slug(&Tag::slug_for(&self.name)).await {
                Ok(existing) if self.tag.as_ref().map(|t| t.id) != Some(existing.id) => {
                    result.add_failure("name", "This tag name is already in use.");
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }
        result.add_failures("color", validate::color(&self.color));
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteTagInput {
    pub slug: String,
}

#[derive(Debug)]
pub struct DeleteTag {
    pub slug: String,
    pub tag: Option<Tag>,
}

#[async_trait]
impl Action for DeleteTag {
    type Input = DeleteTagInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            slug: trim(input.slug),
            tag: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_administrator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        self.tag = Some(load_tag(services, &self.slug).await?);
        Ok(ValidationResult::success())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignTagInput {
    pub number: i32,
    pub slug: String,
}

/// Assign or unassign a tag on a post.
#[derive(Debug)]
pub struct AssignTag {
    pub number: i32,
    pub slug: String,
    pub post: Option<Post>,
    pub tag: Option<Tag>,
}

#[async_trait]
impl Action for AssignTag {
    type Input = AssignTagInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            number: input.number,
            slug: trim(input.slug),
            post: None,
            tag: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_collaborator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        self.tag = Some(load_tag(services, &self.slug).await?);
        let post = services.posts.get_by_number(self.number).await.map_err(|err| {
            if err.is_not_found() {
                ApiError::not_found("Post not found")
            } else {
                ApiError::from(err)
            }
        })?;
        self.post = Some(post);
        Ok(ValidationResult::success())
    }
}
