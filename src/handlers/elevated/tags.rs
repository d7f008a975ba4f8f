// handlers/elevated/tags.rs - tag management under /_api/admin/tags

use serde_json::Value;

use crate::actions::tag::{AddEditTagInput, DeleteTagInput};
use crate::actions::{AddEditTag, DeleteTag};
use crate::context::{ApiPath, JsonInput, RequestContext};
use crate::error::ApiError;
use crate::handlers::ok;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::Tag;

fn bound(tag: Option<Tag>) -> Result<Tag, ApiError> {
    tag.ok_or_else(|| ApiError::internal(anyhow::anyhow!("action validated without loading its tag")))
}

/// POST /_api/admin/tags
pub async fn add(ctx: RequestContext, JsonInput(input): JsonInput<AddEditTagInput>) -> ApiResult<Tag> {
    let action = ctx
        .bind_to::<AddEditTag>(AddEditTagInput {
            slug: String::new(),
            ..input
        })
        .await?;
    let tag = ctx.services().tags.add(&action.name, &action.color, action.is_public).await?;
    Ok(ApiResponse::created(tag))
}

/// PUT /_api/admin/tags/:slug
pub async fn edit(
    ctx: RequestContext,
    ApiPath(slug): ApiPath<String>,
    JsonInput(input): JsonInput<AddEditTagInput>,
) -> ApiResult<Tag> {
    let action = ctx.bind_to::<AddEditTag>(AddEditTagInput { slug, ..input }).await?;
    let tag = bound(action.tag)?;
    let tag = ctx
        .services()
        .tags
        .update(tag.id, &action.name, &action.color, action.is_public)
        .await?;
    Ok(ApiResponse::success(tag))
}

/// DELETE /_api/admin/tags/:slug - also removes it from every post
pub async fn delete(ctx: RequestContext, ApiPath(slug): ApiPath<String>) -> ApiResult<Value> {
    let action = ctx.bind_to::<DeleteTag>(DeleteTagInput { slug }).await?;
    let tag = bound(action.tag)?;
    ctx.services().tags.delete(tag.id).await?;
    Ok(ok())
}
