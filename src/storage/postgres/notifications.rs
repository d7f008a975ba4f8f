use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::Handle;
use crate::models::{Notification, User};
use crate::storage::{NotificationStore, StoreError};

pub struct PgNotifications(pub(crate) Handle);

#[derive(sqlx::FromRow)]
struct DbNotification {
    id: i32,
    title: String,
    link: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<DbNotification> for Notification {
    fn from(row: DbNotification) -> Self {
        Notification {
            id: row.id,
            title: row.title,
            link: row.link,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl NotificationStore for PgNotifications {
    async fn insert(
        &self,
        recipient: &User,
        title: &str,
        link: &str,
        post_id: i32,
    ) -> Result<Option<Notification>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let author_id = self.0.user_id()?;
        if recipient.id == author_id {
            return Ok(None);
        }
        let now = Utc::now();
        let mut guard = self.0.lock().await;
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO notifications (tenant_id, user_id, title, link, read, post_id, author_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7, $7) RETURNING id",
        )
        .bind(tenant_id)
        .bind(recipient.id)
        .bind(title)
        .bind(link)
        .bind(post_id)
        .bind(author_id)
        .bind(now)
        .fetch_one(guard.conn()?)
        .await?;
        Ok(Some(Notification {
            id,
            title: title.to_string(),
            link: link.to_string(),
            read: false,
            created_at: now,
        }))
    }

    async fn total_unread(&self) -> Result<i64, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE tenant_id = $1 AND user_id = $2 AND read = FALSE",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(guard.conn()?)
        .await?;
        Ok(total)
    }

    async fn get_active(&self) -> Result<Vec<Notification>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        let rows: Vec<DbNotification> = sqlx::query_as(
            "SELECT id, title, link, read, created_at FROM notifications \
             WHERE tenant_id = $1 AND user_id = $2 AND (read = FALSE OR updated_at > $3) \
             ORDER BY updated_at DESC, id DESC",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(Utc::now() - Duration::days(30))
        .fetch_all(guard.conn()?)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_as_read(&self, notification_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, updated_at = $1 \
             WHERE id = $2 AND tenant_id = $3 AND user_id = $4",
        )
        .bind(Utc::now())
        .bind(notification_id)
        .bind(tenant_id)
        .bind(user_id)
        .execute(guard.conn()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query(
            "UPDATE notifications SET read = TRUE, updated_at = $1 \
             WHERE tenant_id = $2 AND user_id = $3 AND read = FALSE",
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(user_id)
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }
}
