// handlers/public/posts.rs - read side of /api/v1/posts

use crate::context::{ApiPath, RequestContext};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Comment, Post};

/// GET /api/v1/posts - newest first
pub async fn list(ctx: RequestContext) -> ApiResult<Vec<Post>> {
    let posts = ctx.services().posts.get_all().await?;
    Ok(ApiResponse::success(posts))
}

/// GET /api/v1/posts/:number
pub async fn show(ctx: RequestContext, ApiPath(number): ApiPath<i32>) -> ApiResult<Post> {
    let post = ctx.services().posts.get_by_number(number).await?;
    Ok(ApiResponse::success(post))
}

/// GET /api/v1/posts/:number/comments
pub async fn comments(ctx: RequestContext, ApiPath(number): ApiPath<i32>) -> ApiResult<Vec<Comment>> {
    let post = ctx.services().posts.get_by_number(number).await?;
    let comments = ctx.services().posts.get_comments(post.id).await?;
    Ok(ApiResponse::success(comments))
}
