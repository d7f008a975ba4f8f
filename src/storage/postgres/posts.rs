use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{decode, Handle};
use crate::models::{Comment, Post, PostResponse, PostStatus, Role, User};
use crate::storage::{NewResponse, PostStore, StoreError};

pub struct PgPosts(pub(crate) Handle);

#[derive(sqlx::FromRow)]
struct DbPost {
    id: i32,
    number: i32,
    title: String,
    slug: String,
    description: String,
    created_at: DateTime<Utc>,
    supporters: i32,
    comments: i32,
    status: i16,
    author_id: i32,
    author_name: String,
    response: Option<String>,
    response_date: Option<DateTime<Utc>>,
    responder_id: Option<i32>,
    responder_name: Option<String>,
    original_number: Option<i32>,
}

impl DbPost {
    fn to_model(self) -> Result<Post, StoreError> {
        let status = decode(PostStatus::from_i16(self.status), "post status", self.status)?;
        let response = match (self.response_date, self.responder_id) {
            (Some(responded_at), Some(user_id)) => Some(PostResponse {
                text: self.response.unwrap_or_default(),
                responded_at,
                user_id,
                user_name: self.responder_name.unwrap_or_default(),
                original_number: self.original_number,
            }),
            _ => None,
        };
        Ok(Post {
            id: self.id,
            number: self.number,
            title: self.title,
            slug: self.slug,
            description: self.description,
            created_at: self.created_at,
            author_id: self.author_id,
            author_name: self.author_name,
            total_supporters: self.supporters,
            total_comments: self.comments,
            status,
            response,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DbComment {
    id: i32,
    post_id: i32,
    content: String,
    created_at: DateTime<Utc>,
    author_id: i32,
    author_name: String,
}

impl From<DbComment> for Comment {
    fn from(row: DbComment) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            content: row.content,
            created_at: row.created_at,
            author_id: row.author_id,
            author_name: row.author_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DbSubscriber {
    id: i32,
    tenant_id: i32,
    name: String,
    email: String,
    role: i16,
}

const POST_SELECT: &str = "SELECT p.id, p.number, p.title, p.slug, p.description, p.created_at, \
     p.supporters, p.comments, p.status, p.response, p.response_date, \
     u.id AS author_id, u.name AS author_name, \
     r.id AS responder_id, r.name AS responder_name, \
     o.number AS original_number \
     FROM posts p \
     INNER JOIN users u ON u.id = p.user_id AND u.tenant_id = p.tenant_id \
     LEFT JOIN users r ON r.id = p.response_user_id AND r.tenant_id = p.tenant_id \
     LEFT JOIN posts o ON o.id = p.original_id AND o.tenant_id = p.tenant_id";

impl PgPosts {
    async fn get_where(&self, condition: &str, value: PostKey<'_>) -> Result<Post, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let sql = format!("{} WHERE p.tenant_id = $1 AND {}", POST_SELECT, condition);
        let mut guard = self.0.lock().await;
        let query = sqlx::query_as::<_, DbPost>(&sql).bind(tenant_id);
        let query = match value {
            PostKey::Int(v) => query.bind(v),
            PostKey::Text(v) => query.bind(v),
        };
        query.fetch_one(guard.conn()?).await?.to_model()
    }

    async fn recount_supporters(&self, post_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query(
            "UPDATE posts SET supporters = \
             (SELECT COUNT(*) FROM post_supporters s WHERE s.post_id = posts.id AND s.tenant_id = posts.tenant_id) \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(post_id)
        .bind(tenant_id)
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }
}

enum PostKey<'a> {
    Int(i32),
    Text(&'a str),
}

#[async_trait]
impl PostStore for PgPosts {
    async fn add(&self, title: &str, description: &str) -> Result<Post, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let post_id: i32 = {
            let mut guard = self.0.lock().await;
            let conn = guard.conn()?;
            let number: i32 =
                sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM posts WHERE tenant_id = $1")
                    .bind(tenant_id)
                    .fetch_one(&mut *conn)
                    .await?;
            sqlx::query_scalar(
                "INSERT INTO posts (tenant_id, number, title, slug, description, user_id, created_at, \
                 supporters, comments, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8) RETURNING id",
            )
            .bind(tenant_id)
            .bind(number)
            .bind(title)
            .bind(crate::models::post::slugify(title))
            .bind(description)
            .bind(user_id)
            .bind(Utc::now())
            .bind(PostStatus::Open.as_i16())
            .fetch_one(&mut *conn)
            .await?
        };
        self.get_by_id(post_id).await
    }

    async fn update(&self, post_id: i32, title: &str, description: &str) -> Result<Post, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        {
            let mut guard = self.0.lock().await;
            let result = sqlx::query(
                "UPDATE posts SET title = $1, slug = $2, description = $3 WHERE id = $4 AND tenant_id = $5",
            )
            .bind(title)
            .bind(crate::models::post::slugify(title))
            .bind(description)
            .bind(post_id)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
        }
        self.get_by_id(post_id).await
    }

    async fn get_by_id(&self, post_id: i32) -> Result<Post, StoreError> {
        self.get_where("p.id = $2", PostKey::Int(post_id)).await
    }

    async fn get_by_number(&self, number: i32) -> Result<Post, StoreError> {
        self.get_where("p.number = $2", PostKey::Int(number)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Post, StoreError> {
        self.get_where(
            &format!("p.slug = $2 AND p.status <> {} ORDER BY p.id LIMIT 1", PostStatus::Duplicate.as_i16()),
            PostKey::Text(slug),
        )
        .await
    }

    async fn get_all(&self) -> Result<Vec<Post>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let sql = format!("{} WHERE p.tenant_id = $1 ORDER BY p.id DESC", POST_SELECT);
        let mut guard = self.0.lock().await;
        let rows: Vec<DbPost> = sqlx::query_as(&sql).bind(tenant_id).fetch_all(guard.conn()?).await?;
        rows.into_iter().map(DbPost::to_model).collect()
    }

    async fn set_response(&self, post_id: i32, response: &NewResponse) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        {
            let mut guard = self.0.lock().await;
            let conn = guard.conn()?;
            let result = sqlx::query(
                "UPDATE posts SET response = $1, response_user_id = $2, response_date = $3, status = $4, \
                 original_id = $5 WHERE id = $6 AND tenant_id = $7",
            )
            .bind(&response.text)
            .bind(user_id)
            .bind(Utc::now())
            .bind(response.status.as_i16())
            .bind(response.original_id)
            .bind(post_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }

            if let Some(original_id) = response.original_id {
                sqlx::query(
                    "INSERT INTO post_supporters (tenant_id, post_id, user_id, created_at) \
                     SELECT tenant_id, $1, user_id, created_at FROM post_supporters \
                     WHERE post_id = $2 AND tenant_id = $3 ON CONFLICT DO NOTHING",
                )
                .bind(original_id)
                .bind(post_id)
                .bind(tenant_id)
                .execute(&mut *conn)
                .await?;
            }
        }
        if let Some(original_id) = response.original_id {
            self.recount_supporters(original_id).await?;
        }
        Ok(())
    }

    async fn add_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let result = sqlx::query(
            "INSERT INTO post_supporters (tenant_id, post_id, user_id, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING",
        )
        .bind(tenant_id)
        .bind(post_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() > 0 {
            sqlx::query("UPDATE posts SET supporters = supporters + 1 WHERE id = $1 AND tenant_id = $2")
                .bind(post_id)
                .bind(tenant_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn remove_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let result = sqlx::query("DELETE FROM post_supporters WHERE post_id = $1 AND user_id = $2 AND tenant_id = $3")
            .bind(post_id)
            .bind(user_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() > 0 {
            sqlx::query("UPDATE posts SET supporters = supporters - 1 WHERE id = $1 AND tenant_id = $2")
                .bind(post_id)
                .bind(tenant_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn supported_by_user(&self) -> Result<Vec<i32>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let user_id = self.0.user_id()?;
        let mut guard = self.0.lock().await;
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT post_id FROM post_supporters WHERE user_id = $1 AND tenant_id = $2 ORDER BY post_id",
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(guard.conn()?)
        .await?;
        Ok(ids)
    }

    async fn add_comment(&self, post_id: i32, content: &str) -> Result<Comment, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let author = self.0.scope().user()?.clone();
        let now = Utc::now();
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO comments (tenant_id, post_id, user_id, content, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(tenant_id)
        .bind(post_id)
        .bind(author.id)
        .bind(content)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        sqlx::query("UPDATE posts SET comments = comments + 1 WHERE id = $1 AND tenant_id = $2")
            .bind(post_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;
        Ok(Comment {
            id,
            post_id,
            content: content.to_string(),
            created_at: now,
            author_id: author.id,
            author_name: author.name,
        })
    }

    async fn get_comments(&self, post_id: i32) -> Result<Vec<Comment>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let rows: Vec<DbComment> = sqlx::query_as(
            "SELECT c.id, c.post_id, c.content, c.created_at, u.id AS author_id, u.name AS author_name \
             FROM comments c INNER JOIN users u ON u.id = c.user_id AND u.tenant_id = c.tenant_id \
             WHERE c.post_id = $1 AND c.tenant_id = $2 ORDER BY c.created_at, c.id",
        )
        .bind(post_id)
        .bind(tenant_id)
        .fetch_all(guard.conn()?)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn get_subscribers(&self, post_id: i32) -> Result<Vec<User>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let rows: Vec<DbSubscriber> = sqlx::query_as(
            "SELECT u.id, u.tenant_id, u.name, u.email, u.role FROM users u \
             WHERE u.tenant_id = $1 AND u.id IN ( \
                 SELECT user_id FROM posts WHERE id = $2 AND tenant_id = $1 \
                 UNION SELECT user_id FROM post_supporters WHERE post_id = $2 AND tenant_id = $1 \
                 UNION SELECT user_id FROM comments WHERE post_id = $2 AND tenant_id = $1 \
             ) ORDER BY u.id",
        )
        .bind(tenant_id)
        .bind(post_id)
        .fetch_all(guard.conn()?)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(User {
                    id: row.id,
                    tenant_id: row.tenant_id,
                    name: row.name,
                    email: row.email,
                    role: decode(Role::from_i16(row.role), "role", row.role)?,
                    providers: Vec::new(),
                })
            })
            .collect()
    }
}
