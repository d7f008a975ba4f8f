// handlers/protected/tags.rs - tagging posts, collaborators only

use serde_json::Value;

use crate::actions::tag::AssignTagInput;
use crate::actions::AssignTag;
use crate::context::{ApiPath, RequestContext};
use crate::error::ApiError;
use crate::handlers::ok;
use crate::middleware::ApiResult;

async fn bind(ctx: &RequestContext, number: i32, slug: String) -> Result<(i32, i32), ApiError> {
    let action = ctx.bind_to::<AssignTag>(AssignTagInput { number, slug }).await?;
    match (action.tag, action.post) {
        (Some(tag), Some(post)) => Ok((tag.id, post.id)),
        _ => Err(ApiError::internal(anyhow::anyhow!("action validated without loading its tag and post"))),
    }
}

/// POST /api/v1/posts/:number/tags/:slug
pub async fn assign(ctx: RequestContext, ApiPath((number, slug)): ApiPath<(i32, String)>) -> ApiResult<Value> {
    let (tag_id, post_id) = bind(&ctx, number, slug).await?;
    ctx.services().tags.assign(tag_id, post_id).await?;
    Ok(ok())
}

/// DELETE /api/v1/posts/:number/tags/:slug
pub async fn unassign(ctx: RequestContext, ApiPath((number, slug)): ApiPath<(i32, String)>) -> ApiResult<Value> {
    let (tag_id, post_id) = bind(&ctx, number, slug).await?;
    ctx.services().tags.unassign(tag_id, post_id).await?;
    Ok(ok())
}
