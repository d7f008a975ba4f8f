use async_trait::async_trait;
use chrono::Utc;

use super::Handle;
use crate::models::Tag;
use crate::storage::{StoreError, TagStore};

pub struct PgTags(pub(crate) Handle);

const TAG_COLUMNS: &str = "t.id, t.name, t.slug, t.color, t.is_public";

#[derive(sqlx::FromRow)]
struct DbTag {
    id: i32,
    name: String,
    slug: String,
    color: String,
    is_public: bool,
}

impl From<DbTag> for Tag {
    fn from(row: DbTag) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            slug: row.slug,
            color: row.color,
            is_public: row.is_public,
        }
    }
}

impl PgTags {
    async fn get_by_id(&self, tag_id: i32) -> Result<Tag, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let row: DbTag = sqlx::query_as(&format!(
            "SELECT {} FROM tags t WHERE t.tenant_id = $1 AND t.id = $2",
            TAG_COLUMNS
        ))
        .bind(tenant_id)
        .bind(tag_id)
        .fetch_one(guard.conn()?)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl TagStore for PgTags {
    async fn add(&self, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let tag_id: i32 = {
            let mut guard = self.0.lock().await;
            sqlx::query_scalar(
                "INSERT INTO tags (tenant_id, name, slug, color, is_public, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(tenant_id)
            .bind(name)
            .bind(Tag::slug_for(name))
            .bind(color)
            .bind(is_public)
            .bind(Utc::now())
            .fetch_one(guard.conn()?)
            .await?
        };
        self.get_by_id(tag_id).await
    }

    async fn update(&self, tag_id: i32, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        {
            let mut guard = self.0.lock().await;
            let result = sqlx::query(
                "UPDATE tags SET name = $1, slug = $2, color = $3, is_public = $4 WHERE id = $5 AND tenant_id = $6",
            )
            .bind(name)
            .bind(Tag::slug_for(name))
            .bind(color)
            .bind(is_public)
            .bind(tag_id)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
        }
        self.get_by_id(tag_id).await
    }

    async fn delete(&self, tag_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        sqlx::query("DELETE FROM post_tags WHERE tag_id = $1 AND tenant_id = $2")
            .bind(tag_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM tags WHERE id = $1 AND tenant_id = $2")
            .bind(tag_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Tag, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let row: DbTag = sqlx::query_as(&format!(
            "SELECT {} FROM tags t WHERE t.tenant_id = $1 AND t.slug = $2",
            TAG_COLUMNS
        ))
        .bind(tenant_id)
        .bind(slug)
        .fetch_one(guard.conn()?)
        .await?;
        Ok(row.into())
    }

    async fn get_all(&self) -> Result<Vec<Tag>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let only_public = !self.0.scope().is_collaborator();
        let mut guard = self.0.lock().await;
        let rows: Vec<DbTag> = sqlx::query_as(&format!(
            "SELECT {} FROM tags t WHERE t.tenant_id = $1 AND (t.is_public OR NOT $2) ORDER BY t.name",
            TAG_COLUMNS
        ))
        .bind(tenant_id)
        .bind(only_public)
        .fetch_all(guard.conn()?)
        .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn assign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query(
            "INSERT INTO post_tags (tenant_id, tag_id, post_id, created_by_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(tenant_id)
        .bind(tag_id)
        .bind(post_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }

    async fn unassign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query("DELETE FROM post_tags WHERE tag_id = $1 AND post_id = $2 AND tenant_id = $3")
            .bind(tag_id)
            .bind(post_id)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
        Ok(())
    }

    async fn get_assigned(&self, post_id: i32) -> Result<Vec<Tag>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let only_public = !self.0.scope().is_collaborator();
        let mut guard = self.0.lock().await;
        let rows: Vec<DbTag> = sqlx::query_as(&format!(
            "SELECT {} FROM tags t \
             INNER JOIN post_tags pt ON pt.tag_id = t.id AND pt.tenant_id = t.tenant_id \
             WHERE pt.post_id = $1 AND t.tenant_id = $2 AND (t.is_public OR NOT $3) ORDER BY t.name",
            TAG_COLUMNS
        ))
        .bind(post_id)
        .bind(tenant_id)
        .bind(only_public)
        .fetch_all(guard.conn()?)
        .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }
}
