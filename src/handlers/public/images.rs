// handlers/public/images.rs - GET /images/*bkey and blob persistence of uploads

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::context::{ApiPath, RequestContext};
use crate::error::ApiError;
use crate::models::ImageUpload;
use crate::services::Services;

/// Applies an image field to blob storage and returns the key the owner
/// should reference from now on.
pub async fn save_image(services: &Services, image: &ImageUpload, prefix: &str) -> Result<Option<String>, ApiError> {
    if image.remove {
        if let Some(bkey) = &image.bkey {
            services.blobs.delete(bkey).await?;
        }
        return Ok(None);
    }

    match &image.upload {
        Some(file) => {
            let bkey = file.blob_key(prefix);
            services.blobs.put(&bkey, &file.content_type, &file.content).await?;
            if let Some(previous) = image.bkey.as_deref().filter(|previous| *previous != bkey) {
                services.blobs.delete(previous).await?;
            }
            Ok(Some(bkey))
        }
        None => Ok(image.bkey.clone()),
    }
}

pub async fn serve(ctx: RequestContext, ApiPath(bkey): ApiPath<String>) -> Result<Response, ApiError> {
    let blob = ctx.services().blobs.get(&bkey).await.map_err(|err| {
        if err.is_not_found() {
            ApiError::not_found("Image not found")
        } else {
            err.into()
        }
    })?;

    Ok((
        [
            (CONTENT_TYPE, blob.content_type),
            (CACHE_CONTROL, "public, max-age=2592000".to_string()),
        ],
        blob.content,
    )
        .into_response())
}
