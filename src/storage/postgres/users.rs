use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;
use std::collections::HashMap;

use super::{decode, Handle};
use crate::models::{Role, User, UserProvider};
use crate::storage::{StoreError, UserStore};

pub struct PgUsers(pub(crate) Handle);

#[derive(sqlx::FromRow)]
struct DbUser {
    id: i32,
    tenant_id: i32,
    name: String,
    email: String,
    role: i16,
}

impl DbUser {
    fn to_model(self, providers: Vec<UserProvider>) -> Result<User, StoreError> {
        Ok(User {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            email: self.email,
            role: decode(Role::from_i16(self.role), "role", self.role)?,
            providers,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DbUserProvider {
    user_id: i32,
    provider: String,
    provider_uid: String,
}

async fn with_providers(conn: &mut PgConnection, row: DbUser) -> Result<User, StoreError> {
    let providers: Vec<DbUserProvider> = sqlx::query_as(
        "SELECT user_id, provider, provider_uid FROM user_providers \
         WHERE user_id = $1 AND tenant_id = $2 ORDER BY created_at, provider",
    )
    .bind(row.id)
    .bind(row.tenant_id)
    .fetch_all(&mut *conn)
    .await?;
    let providers = providers
        .into_iter()
        .map(|p| UserProvider {
            name: p.provider,
            uid: p.provider_uid,
        })
        .collect();
    row.to_model(providers)
}

const USER_COLUMNS: &str = "u.id, u.tenant_id, u.name, u.email, u.role";

#[async_trait]
impl UserStore for PgUsers {
    async fn get_by_id(&self, user_id: i32) -> Result<User, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let row: DbUser = sqlx::query_as(&format!(
            "SELECT {} FROM users u WHERE u.id = $1 AND u.tenant_id = $2",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(tenant_id)
        .fetch_one(&mut *conn)
        .await?;
        with_providers(conn, row).await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        if email.is_empty() {
            return Err(StoreError::NotFound);
        }
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let row: DbUser = sqlx::query_as(&format!(
            "SELECT {} FROM users u WHERE u.email = $1 AND u.tenant_id = $2",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(tenant_id)
        .fetch_one(&mut *conn)
        .await?;
        with_providers(conn, row).await
    }

    async fn get_by_provider(&self, provider: &str, uid: &str) -> Result<User, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let row: DbUser = sqlx::query_as(&format!(
            "SELECT {} FROM users u \
             INNER JOIN user_providers p ON p.user_id = u.id AND p.tenant_id = u.tenant_id \
             WHERE p.provider = $1 AND p.provider_uid = $2 AND u.tenant_id = $3",
            USER_COLUMNS
        ))
        .bind(provider)
        .bind(uid)
        .bind(tenant_id)
        .fetch_one(&mut *conn)
        .await?;
        with_providers(conn, row).await
    }

    async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let rows: Vec<DbUser> = sqlx::query_as(&format!(
            "SELECT {} FROM users u WHERE u.tenant_id = $1 ORDER BY u.id",
            USER_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        let links: Vec<DbUserProvider> = sqlx::query_as(
            "SELECT user_id, provider, provider_uid FROM user_providers \
             WHERE tenant_id = $1 ORDER BY created_at, provider",
        )
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_user: HashMap<i32, Vec<UserProvider>> = HashMap::new();
        for link in links {
            by_user.entry(link.user_id).or_default().push(UserProvider {
                name: link.provider,
                uid: link.provider_uid,
            });
        }

        rows.into_iter()
            .map(|row| {
                let providers = by_user.remove(&row.id).unwrap_or_default();
                row.to_model(providers)
            })
            .collect()
    }

    async fn register(&self, user: &User) -> Result<User, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let now = Utc::now();
        let mut guard = self.0.lock().await;
        let conn = guard.conn()?;
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO users (tenant_id, name, email, role, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(tenant_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_i16())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        for provider in &user.providers {
            sqlx::query(
                "INSERT INTO user_providers (tenant_id, user_id, provider, provider_uid, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(tenant_id)
            .bind(id)
            .bind(&provider.name)
            .bind(&provider.uid)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }

        Ok(User {
            id,
            tenant_id,
            ..user.clone()
        })
    }

    async fn register_provider(&self, user_id: i32, provider: &UserProvider) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query(
            "INSERT INTO user_providers (tenant_id, user_id, provider, provider_uid, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(&provider.name)
        .bind(&provider.uid)
        .bind(Utc::now())
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }

    async fn update_name(&self, user_id: i32, name: &str) -> Result<(), StoreError> {
        self.update_column("name", user_id, name).await
    }

    async fn change_email(&self, user_id: i32, email: &str) -> Result<(), StoreError> {
        self.update_column("email", user_id, email).await
    }

    async fn change_role(&self, user_id: i32, role: Role) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2 AND tenant_id = $3")
            .bind(role.as_i16())
            .bind(user_id)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl PgUsers {
    async fn update_column(&self, column: &'static str, user_id: i32, value: &str) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let result = sqlx::query(&format!("UPDATE users SET {} = $1 WHERE id = $2 AND tenant_id = $3", column))
            .bind(value)
            .bind(user_id)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
