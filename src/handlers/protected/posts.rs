// handlers/protected/posts.rs - write side of /api/v1/posts

use serde_json::Value;

use crate::actions::post::{AddCommentInput, CreatePostInput, SetResponseInput, SupportPostInput, UpdatePostInput};
use crate::actions::{AddComment, CreatePost, SetResponse, SupportPost, UpdatePost};
use crate::context::{ApiPath, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::ok;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Comment, Post};
use crate::tasks;

/// Validation loads the post an action works on; it is always set afterwards.
fn bound(post: Option<Post>) -> Result<Post, ApiError> {
    post.ok_or_else(|| ApiError::internal(anyhow::anyhow!("action validated without loading its post")))
}

/// POST /api/v1/posts - the author becomes the first supporter
pub async fn create(ctx: RequestContext, JsonInput(input): JsonInput<CreatePostInput>) -> ApiResult<Post> {
    let action = ctx.bind_to::<CreatePost>(input).await?;
    let user = ctx.require_user()?;
    let posts = &ctx.services().posts;

    let post = posts.add(&action.title, &action.description).await?;
    posts.add_supporter(post.id, user.id).await?;
    let post = posts.get_by_id(post.id).await?;

    ctx.enqueue(tasks::notify_about_new_post(post.clone()));
    Ok(ApiResponse::created(post))
}

/// PUT /api/v1/posts/:number
pub async fn update(
    ctx: RequestContext,
    ApiPath(number): ApiPath<i32>,
    JsonInput(input): JsonInput<UpdatePostInput>,
) -> ApiResult<Post> {
    let action = ctx.bind_to::<UpdatePost>(UpdatePostInput { number, ..input }).await?;
    let post = bound(action.post)?;
    let post = ctx.services().posts.update(post.id, &action.title, &action.description).await?;
    Ok(ApiResponse::success(post))
}

/// PUT /api/v1/posts/:number/status
///
/// Subscribers hear about it only if the status actually moved.
pub async fn respond(
    ctx: RequestContext,
    ApiPath(number): ApiPath<i32>,
    JsonInput(input): JsonInput<SetResponseInput>,
) -> ApiResult<Post> {
    let mut action = ctx.bind_to::<SetResponse>(SetResponseInput { number, ..input }).await?;
    let previous = bound(action.post.take())?;
    let response = action.response();

    let posts = &ctx.services().posts;
    posts.set_response(previous.id, &response).await?;
    let post = posts.get_by_id(previous.id).await?;

    if post.status != previous.status {
        ctx.enqueue(tasks::notify_about_status_change(post.clone(), response.status));
    }
    Ok(ApiResponse::success(post))
}

/// POST /api/v1/posts/:number/comments
pub async fn comment(
    ctx: RequestContext,
    ApiPath(number): ApiPath<i32>,
    JsonInput(input): JsonInput<AddCommentInput>,
) -> ApiResult<Comment> {
    let action = ctx.bind_to::<AddComment>(AddCommentInput { number, ..input }).await?;
    let post = bound(action.post)?;
    let comment = ctx.services().posts.add_comment(post.id, &action.content).await?;

    ctx.enqueue(tasks::notify_about_new_comment(post, action.content));
    Ok(ApiResponse::created(comment))
}

/// POST /api/v1/posts/:number/support
pub async fn support(ctx: RequestContext, ApiPath(number): ApiPath<i32>) -> ApiResult<Value> {
    let action = ctx.bind_to::<SupportPost>(SupportPostInput { number }).await?;
    let post = bound(action.post)?;
    ctx.services().posts.add_supporter(post.id, ctx.require_user()?.id).await?;
    Ok(ok())
}

/// POST /api/v1/posts/:number/unsupport
pub async fn unsupport(ctx: RequestContext, ApiPath(number): ApiPath<i32>) -> ApiResult<Value> {
    let action = ctx.bind_to::<SupportPost>(SupportPostInput { number }).await?;
    let post = bound(action.post)?;
    ctx.services().posts.remove_supporter(post.id, ctx.require_user()?.id).await?;
    Ok(ok())
}
