//! Everything a request or job may call: the scoped stores of its
//! transaction plus the process-wide collaborators.

use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::config::AppConfig;
use crate::email::Emailer;
use crate::oauth::OAuthClient;
use crate::storage::{BlobStore, NotificationStore, PostStore, Stores, TagStore, TenantStore, UserStore};

/// Shared, immutable collaborators. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct Collaborators {
    pub config: Arc<AppConfig>,
    pub signer: Arc<TokenSigner>,
    pub oauth: Arc<dyn OAuthClient>,
    pub emailer: Arc<dyn Emailer>,
}

pub struct Services {
    pub tenants: Box<dyn TenantStore>,
    pub users: Box<dyn UserStore>,
    pub posts: Box<dyn PostStore>,
    pub notifications: Box<dyn NotificationStore>,
    pub blobs: Box<dyn BlobStore>,
    pub tags: Box<dyn TagStore>,
    pub config: Arc<AppConfig>,
    pub signer: Arc<TokenSigner>,
    pub oauth: Arc<dyn OAuthClient>,
    pub emailer: Arc<dyn Emailer>,
}

impl Services {
    pub fn new(stores: Stores, collaborators: &Collaborators) -> Self {
        Self {
            tenants: stores.tenants,
            users: stores.users,
            posts: stores.posts,
            notifications: stores.notifications,
            blobs: stores.blobs,
            tags: stores.tags,
            config: collaborators.config.clone(),
            signer: collaborators.signer.clone(),
            oauth: collaborators.oauth.clone(),
            emailer: collaborators.emailer.clone(),
        }
    }
}
