//! Tenant-scoped persistence.
//!
//! A [`Database`] hands out one [`Transaction`] per unit of work. Every
//! store built from a transaction carries the [`Scope`] (tenant and user)
//! it was created for, so queries never need to be passed a tenant id.

pub mod postgres;

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    Blob, Comment, EmailVerification, EmailVerificationKind, NewEmailVerification, Notification, OAuthConfig,
    Post, PostStatus, Role, Tag, Tenant, TenantSettings, TenantStatus, User, UserProvider,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("operation requires a tenant in scope")]
    MissingTenant,

    #[error("operation requires a user in scope")]
    MissingUser,

    #[error("transaction already finished")]
    TransactionClosed,

    #[error("invalid stored value: {0}")]
    InvalidData(String),

    #[error("database error: {0}")]
    Sqlx(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Sqlx(other),
        }
    }
}

/// Who a set of stores acts for.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub tenant: Option<Tenant>,
    pub user: Option<User>,
}

impl Scope {
    pub fn new(tenant: Option<Tenant>, user: Option<User>) -> Self {
        Self { tenant, user }
    }

    pub fn tenant(&self) -> Result<&Tenant, StoreError> {
        self.tenant.as_ref().ok_or(StoreError::MissingTenant)
    }

    pub fn user(&self) -> Result<&User, StoreError> {
        self.user.as_ref().ok_or(StoreError::MissingUser)
    }

    pub fn is_collaborator(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_collaborator)
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

/// A unit of work. Commit and rollback consume the underlying transaction;
/// any store used after that fails with [`StoreError::TransactionClosed`].
#[async_trait]
pub trait Transaction: Send + Sync {
    fn stores(self: Arc<Self>, scope: &Scope) -> Stores;
    async fn commit(&self) -> Result<(), StoreError>;
    async fn rollback(&self) -> Result<(), StoreError>;
}

pub struct Stores {
    pub tenants: Box<dyn TenantStore>,
    pub users: Box<dyn UserStore>,
    pub posts: Box<dyn PostStore>,
    pub notifications: Box<dyn NotificationStore>,
    pub blobs: Box<dyn BlobStore>,
    pub tags: Box<dyn TagStore>,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn add(&self, name: &str, subdomain: &str, status: TenantStatus) -> Result<Tenant, StoreError>;
    async fn first(&self) -> Result<Tenant, StoreError>;
    /// Tenant whose subdomain is `subdomain` or whose CNAME is `host`; CNAME wins.
    async fn get_by_domain(&self, subdomain: &str, host: &str) -> Result<Tenant, StoreError>;
    async fn update_settings(&self, settings: &TenantSettings) -> Result<(), StoreError>;
    async fn update_privacy(&self, is_private: bool) -> Result<(), StoreError>;
    async fn activate(&self, tenant_id: i32) -> Result<(), StoreError>;
    async fn is_subdomain_available(&self, subdomain: &str) -> Result<bool, StoreError>;
    /// Ignores the tenant in scope, so keeping one's own CNAME is allowed.
    async fn is_cname_available(&self, cname: &str) -> Result<bool, StoreError>;

    async fn save_verification_key(
        &self,
        key: &str,
        duration: Duration,
        request: &NewEmailVerification,
    ) -> Result<(), StoreError>;
    async fn find_verification_by_key(
        &self,
        kind: EmailVerificationKind,
        key: &str,
    ) -> Result<EmailVerification, StoreError>;
    /// Marks an unverified key as consumed; a second call is `NotFound`.
    async fn set_key_as_verified(&self, key: &str) -> Result<(), StoreError>;

    async fn list_oauth_configs(&self) -> Result<Vec<OAuthConfig>, StoreError>;
    async fn get_oauth_config_by_provider(&self, provider: &str) -> Result<OAuthConfig, StoreError>;
    /// Inserts when `config.id == 0`, updates otherwise.
    async fn save_oauth_config(&self, config: &OAuthConfig) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, user_id: i32) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn get_by_provider(&self, provider: &str, uid: &str) -> Result<User, StoreError>;
    async fn get_all(&self) -> Result<Vec<User>, StoreError>;
    /// Persists `user` (and its providers) in the scoped tenant.
    async fn register(&self, user: &User) -> Result<User, StoreError>;
    async fn register_provider(&self, user_id: i32, provider: &UserProvider) -> Result<(), StoreError>;
    async fn update_name(&self, user_id: i32, name: &str) -> Result<(), StoreError>;
    async fn change_email(&self, user_id: i32, email: &str) -> Result<(), StoreError>;
    async fn change_role(&self, user_id: i32, role: Role) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub text: String,
    pub status: PostStatus,
    pub original_id: Option<i32>,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// New post authored by the scoped user.
    async fn add(&self, title: &str, description: &str) -> Result<Post, StoreError>;
    async fn update(&self, post_id: i32, title: &str, description: &str) -> Result<Post, StoreError>;
    async fn get_by_id(&self, post_id: i32) -> Result<Post, StoreError>;
    async fn get_by_number(&self, number: i32) -> Result<Post, StoreError>;
    async fn get_by_slug(&self, slug: &str) -> Result<Post, StoreError>;
    async fn get_all(&self) -> Result<Vec<Post>, StoreError>;
    /// Responds as the scoped user.
    async fn set_response(&self, post_id: i32, response: &NewResponse) -> Result<(), StoreError>;

    /// Idempotent.
    async fn add_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError>;
    /// Idempotent.
    async fn remove_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError>;
    /// Ids of the posts the scoped user supports.
    async fn supported_by_user(&self) -> Result<Vec<i32>, StoreError>;

    /// Comment by the scoped user.
    async fn add_comment(&self, post_id: i32, content: &str) -> Result<Comment, StoreError>;
    async fn get_comments(&self, post_id: i32) -> Result<Vec<Comment>, StoreError>;

    /// Author, supporters and commenters, deduplicated and ordered by id.
    async fn get_subscribers(&self, post_id: i32) -> Result<Vec<User>, StoreError>;
}

/// Notifications of the scoped user.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Notifies `recipient` about an event by the scoped user.
    /// Returns `None` when the recipient is the scoped user.
    async fn insert(
        &self,
        recipient: &User,
        title: &str,
        link: &str,
        post_id: i32,
    ) -> Result<Option<Notification>, StoreError>;
    async fn total_unread(&self) -> Result<i64, StoreError>;
    async fn get_active(&self) -> Result<Vec<Notification>, StoreError>;
    async fn mark_as_read(&self, notification_id: i32) -> Result<(), StoreError>;
    async fn mark_all_as_read(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, content: &[u8]) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Blob, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Tags of the scoped tenant. Listings leave private tags out unless the
/// scoped user is a collaborator.
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn add(&self, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError>;
    async fn update(&self, tag_id: i32, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError>;
    /// Also takes the tag off every post.
    async fn delete(&self, tag_id: i32) -> Result<(), StoreError>;
    async fn get_by_slug(&self, slug: &str) -> Result<Tag, StoreError>;
    async fn get_all(&self) -> Result<Vec<Tag>, StoreError>;
    /// Assigning an already assigned tag is a no-op.
    async fn assign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError>;
    async fn unassign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError>;
    async fn get_assigned(&self, post_id: i32) -> Result<Vec<Tag>, StoreError>;
}
