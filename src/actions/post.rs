use async_trait::async_trait;
use serde::Deserialize;

use super::{chars, is_collaborator, lower, trim, Action};
use crate::error::ApiError;
use crate::models::post::slugify;
use crate::models::{Post, PostStatus, User};
use crate::services::Services;
use crate::storage::NewResponse;
use crate::validate::ValidationResult;

/// Title rules shared by create and edit. `current` is the post being
/// edited, which may keep its own title.
async fn validate_title(
    result: &mut ValidationResult,
    services: &Services,
    title: &str,
    current: Option<i32>,
) -> Result<(), ApiError> {
    if title.is_empty() {
        result.add_failure("title", "Title is required.");
        return Ok(());
    }
    if chars(title) < 10 || !title.contains(char::is_alphanumeric) {
        result.add_failure("title", "Title needs to be more descriptive.");
        return Ok(());
    }
    if chars(title) > 100 {
        result.add_failure("title", "Title must have less than 100 characters.");
        return Ok(());
    }

    match services.posts.get_by_slug(&slugify(title)).await {
        Ok(existing) if Some(existing.id) != current && existing.status != PostStatus::Duplicate => {
            result.add_failure("title", "This has already been posted before.");
        }
        Ok(_) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn load_post(services: &Services, number: i32) -> Result<Post, ApiError> {
    services.posts.get_by_number(number).await.map_err(|err| {
        if err.is_not_found() {
            ApiError::not_found("Post not found")
        } else {
            err.into()
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostInput {
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub struct CreatePost {
    pub title: String,
    pub description: String,
}

#[async_trait]
impl Action for CreatePost {
    type Input = CreatePostInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            title: trim(input.title),
            description: trim(input.description),
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        user.is_some()
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let mut result = ValidationResult::success();
        validate_title(&mut result, services, &self.title, None).await?;
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePostInput {
    pub number: i32,
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub struct UpdatePost {
    pub number: i32,
    pub title: String,
    pub description: String,
    pub post: Option<Post>,
}

#[async_trait]
impl Action for UpdatePost {
    type Input = UpdatePostInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            number: input.number,
            title: trim(input.title),
            description: trim(input.description),
            post: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_collaborator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let post = load_post(services, self.number).await?;
        let mut result = ValidationResult::success();
        validate_title(&mut result, services, &self.title, Some(post.id)).await?;
        self.post = Some(post);
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetResponseInput {
    pub number: i32,
    pub status: String,
    pub text: String,
    pub original_number: i32,
}

#[derive(Debug)]
pub struct SetResponse {
    pub number: i32,
    pub status: Option<PostStatus>,
    pub text: String,
    pub original_number: i32,
    pub post: Option<Post>,
    pub original: Option<Post>,
}

impl SetResponse {
    pub fn response(&self) -> NewResponse {
        NewResponse {
            text: self.text.clone(),
            status: self.status.unwrap_or(PostStatus::Open),
            original_id: self.original.as_ref().map(|p| p.id),
        }
    }
}

#[async_trait]
impl Action for SetResponse {
    type Input = SetResponseInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            number: input.number,
            status: PostStatus::parse(&lower(input.status)),
            text: trim(input.text),
            original_number: input.original_number,
            post: None,
            original: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        is_collaborator(user)
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let post = load_post(services, self.number).await?;
        let mut result = ValidationResult::success();

        match self.status {
            None => result.add_failure("status", "Status is invalid."),
            Some(PostStatus::Duplicate) => {
                if self.original_number == post.number {
                    result.add_failure("originalNumber", "Cannot be a duplicate of itself");
                } else {
                    match services.posts.get_by_number(self.original_number).await {
                        Ok(original) => self.original = Some(original),
                        Err(err) if err.is_not_found() => {
                            result.add_failure("originalNumber", "Original post not found");
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            Some(_) => {}
        }

        self.post = Some(post);
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddCommentInput {
    pub number: i32,
    pub content: String,
}

#[derive(Debug)]
pub struct AddComment {
    pub number: i32,
    pub content: String,
    pub post: Option<Post>,
}

#[async_trait]
impl Action for AddComment {
    type Input = AddCommentInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            number: input.number,
            content: trim(input.content),
            post: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        user.is_some()
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let post = load_post(services, self.number).await?;
        let mut result = ValidationResult::success();
        if self.content.is_empty() {
            result.add_failure("content", "Comment is required.");
        }
        self.post = Some(post);
        Ok(result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SupportPostInput {
    pub number: i32,
}

/// Support or withdraw support, allowed while the post is still open.
#[derive(Debug)]
pub struct SupportPost {
    pub number: i32,
    pub post: Option<Post>,
}

#[async_trait]
impl Action for SupportPost {
    type Input = SupportPostInput;

    fn bind(input: Self::Input) -> Result<Self, ApiError> {
        Ok(Self {
            number: input.number,
            post: None,
        })
    }

    fn is_authorized(&self, user: Option<&User>) -> bool {
        user.is_some()
    }

    async fn validate(&mut self, _user: Option<&User>, services: &Services) -> Result<ValidationResult, ApiError> {
        let post = load_post(services, self.number).await?;
        let mut result = ValidationResult::success();
        if post.status.is_closed() {
            result.add_failure("status", "This post is no longer accepting support.");
        }
        self.post = Some(post);
        Ok(result)
    }
}
