// handlers/protected/notifications.rs - /_api/notifications

use serde_json::{json, Value};

use crate::context::{ApiPath, RequestContext};
use crate::handlers::ok;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::Notification;

pub async fn total_unread(ctx: RequestContext) -> ApiResult<Value> {
    let total = ctx.services().notifications.total_unread().await?;
    Ok(ApiResponse::success(json!({ "total": total })))
}

/// Unread ones plus whatever changed in the last 30 days.
pub async fn list(ctx: RequestContext) -> ApiResult<Vec<Notification>> {
    let notifications = ctx.services().notifications.get_active().await?;
    Ok(ApiResponse::success(notifications))
}

pub async fn read(ctx: RequestContext, ApiPath(id): ApiPath<i32>) -> ApiResult<Value> {
    ctx.services().notifications.mark_as_read(id).await?;
    Ok(ok())
}

pub async fn read_all(ctx: RequestContext) -> ApiResult<Value> {
    ctx.services().notifications.mark_all_as_read().await?;
    Ok(ok())
}
