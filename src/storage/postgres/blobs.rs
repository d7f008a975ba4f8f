use async_trait::async_trait;
use chrono::Utc;

use super::Handle;
use crate::models::Blob;
use crate::storage::{BlobStore, StoreError};

pub struct PgBlobs(pub(crate) Handle);

#[derive(sqlx::FromRow)]
struct DbBlob {
    key: String,
    content_type: String,
    file: Vec<u8>,
}

#[async_trait]
impl BlobStore for PgBlobs {
    async fn put(&self, key: &str, content_type: &str, content: &[u8]) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let now = Utc::now();
        let mut guard = self.0.lock().await;
        sqlx::query(
            "INSERT INTO blobs (tenant_id, key, content_type, size, file, created_at, modified_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (tenant_id, key) DO UPDATE \
             SET content_type = EXCLUDED.content_type, size = EXCLUDED.size, file = EXCLUDED.file, \
                 modified_at = EXCLUDED.modified_at",
        )
        .bind(tenant_id)
        .bind(key)
        .bind(content_type)
        .bind(content.len() as i64)
        .bind(content)
        .bind(now)
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Blob, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let row: DbBlob = sqlx::query_as("SELECT key, content_type, file FROM blobs WHERE tenant_id = $1 AND key = $2")
            .bind(tenant_id)
            .bind(key)
            .fetch_one(guard.conn()?)
            .await?;
        Ok(Blob {
            key: row.key,
            content_type: row.content_type,
            content: row.file,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query("DELETE FROM blobs WHERE tenant_id = $1 AND key = $2")
            .bind(tenant_id)
            .bind(key)
            .execute(guard.conn()?)
            .await?;
        Ok(())
    }
}
