// handlers/public/tags.rs - tag listings; private tags only for collaborators

use crate::context::{ApiPath, RequestContext};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::Tag;

/// GET /api/v1/tags
pub async fn list(ctx: RequestContext) -> ApiResult<Vec<Tag>> {
    let tags = ctx.services().tags.get_all().await?;
    Ok(ApiResponse::success(tags))
}

/// GET /api/v1/posts/:number/tags
pub async fn of_post(ctx: RequestContext, ApiPath(number): ApiPath<i32>) -> ApiResult<Vec<Tag>> {
    let post = ctx.services().posts.get_by_number(number).await?;
    let tags = ctx.services().tags.get_assigned(post.id).await?;
    Ok(ApiResponse::success(tags))
}
