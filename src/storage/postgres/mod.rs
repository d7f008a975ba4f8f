//! Postgres implementation of the storage traits, targeting the schema
//! built by applying `migrations/*.sql` in order.

mod blobs;
mod notifications;
mod posts;
mod tags;
mod tenants;
mod users;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::{Database, Scope, StoreError, Stores, Transaction};
use crate::config::DatabaseConfig;

pub use blobs::PgBlobs;
pub use notifications::PgNotifications;
pub use posts::PgPosts;
pub use tags::PgTags;
pub use tenants::PgTenants;
pub use users::PgUsers;

pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Builds the pool without connecting; the first `begin` opens a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Arc::new(Trx {
            inner: Mutex::new(Some(tx)),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A Postgres transaction shared by all stores of one unit of work.
pub struct Trx {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl Trx {
    pub(crate) async fn lock(&self) -> TrxGuard<'_> {
        TrxGuard(self.inner.lock().await)
    }
}

pub(crate) struct TrxGuard<'a>(MutexGuard<'a, Option<sqlx::Transaction<'static, Postgres>>>);

impl TrxGuard<'_> {
    pub(crate) fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        match self.0.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(StoreError::TransactionClosed),
        }
    }
}

#[async_trait]
impl Transaction for Trx {
    fn stores(self: Arc<Self>, scope: &Scope) -> Stores {
        let handle = Handle {
            trx: self,
            scope: scope.clone(),
        };
        Stores {
            tenants: Box::new(PgTenants(handle.clone())),
            users: Box::new(PgUsers(handle.clone())),
            posts: Box::new(PgPosts(handle.clone())),
            notifications: Box::new(PgNotifications(handle.clone())),
            blobs: Box::new(PgBlobs(handle.clone())),
            tags: Box::new(PgTags(handle)),
        }
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let tx = self.inner.lock().await.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        if let Some(tx) = self.inner.lock().await.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct Handle {
    trx: Arc<Trx>,
    scope: Scope,
}

impl Handle {
    pub(crate) async fn lock(&self) -> TrxGuard<'_> {
        self.trx.lock().await
    }

    pub(crate) fn tenant_id(&self) -> Result<i32, StoreError> {
        Ok(self.scope.tenant()?.id)
    }

    pub(crate) fn user_id(&self) -> Result<i32, StoreError> {
        Ok(self.scope.user()?.id)
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }
}

pub(crate) fn decode<T>(value: Option<T>, what: &str, raw: i16) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::InvalidData(format!("unknown {} code {}", what, raw)))
}
