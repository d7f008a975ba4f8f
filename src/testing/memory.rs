//! [`Database`] kept in process memory. A transaction works on a copy of
//! the committed data and writes it back on commit, so rolled back or
//! abandoned work leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::fixtures;
use crate::models::post::slugify;
use crate::models::{
    Blob, Comment, EmailVerification, EmailVerificationKind, NewEmailVerification, Notification, OAuthConfig,
    Post, PostResponse, PostStatus, Role, Tag, Tenant, TenantSettings, TenantStatus, User, UserProvider,
};
use crate::storage::{
    BlobStore, Database, NewResponse, NotificationStore, PostStore, Scope, StoreError, Stores, TagStore,
    TenantStore, Transaction, UserStore,
};

/// Read notifications stay listed this long after their last update.
const ACTIVE_NOTIFICATION_DAYS: i64 = 30;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct ResponseRow {
    text: String,
    responded_at: DateTime<Utc>,
    user_id: i32,
    original_id: Option<i32>,
}

#[derive(Debug, Clone)]
struct PostRow {
    tenant_id: i32,
    id: i32,
    number: i32,
    title: String,
    slug: String,
    description: String,
    created_at: DateTime<Utc>,
    author_id: i32,
    status: PostStatus,
    supporters: i32,
    comments: i32,
    response: Option<ResponseRow>,
}

#[derive(Debug, Clone)]
struct NotificationRow {
    tenant_id: i32,
    user_id: i32,
    updated_at: DateTime<Utc>,
    notification: Notification,
}

#[derive(Debug, Clone, Default)]
struct Data {
    sequences: HashMap<&'static str, i32>,
    tenants: Vec<Tenant>,
    users: Vec<User>,
    posts: Vec<PostRow>,
    /// `(post_id, user_id)`
    supporters: Vec<(i32, i32)>,
    comments: Vec<(i32, Comment)>,
    notifications: Vec<NotificationRow>,
    verifications: Vec<(i32, EmailVerification)>,
    oauth_configs: Vec<(i32, OAuthConfig)>,
    blobs: Vec<(i32, Blob)>,
    tags: Vec<(i32, Tag)>,
    /// `(tag_id, post_id)`
    post_tags: Vec<(i32, i32)>,
}

impl Data {
    fn seeded() -> Self {
        let mut data = Self {
            tenants: vec![fixtures::demo(), fixtures::avengers()],
            users: vec![fixtures::jon_snow(), fixtures::arya_stark(), fixtures::tony_stark()],
            ..Self::default()
        };
        data.sequences.insert("tenants", 2);
        data.sequences.insert("users", 3);
        data
    }

    fn next_id(&mut self, table: &'static str) -> i32 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn tenant_mut(&mut self, tenant_id: i32) -> Result<&mut Tenant, StoreError> {
        self.tenants
            .iter_mut()
            .find(|t| t.id == tenant_id)
            .ok_or(StoreError::NotFound)
    }

    fn user_mut(&mut self, tenant_id: i32, user_id: i32) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|u| u.tenant_id == tenant_id && u.id == user_id)
            .ok_or(StoreError::NotFound)
    }

    fn user_name(&self, user_id: i32) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    fn to_post(&self, row: &PostRow) -> Post {
        Post {
            id: row.id,
            number: row.number,
            title: row.title.clone(),
            slug: row.slug.clone(),
            description: row.description.clone(),
            created_at: row.created_at,
            author_id: row.author_id,
            author_name: self.user_name(row.author_id),
            total_supporters: row.supporters,
            total_comments: row.comments,
            status: row.status,
            response: row.response.as_ref().map(|response| PostResponse {
                text: response.text.clone(),
                responded_at: response.responded_at,
                user_id: response.user_id,
                user_name: self.user_name(response.user_id),
                original_number: response
                    .original_id
                    .and_then(|id| self.posts.iter().find(|p| p.id == id))
                    .map(|p| p.number),
            }),
        }
    }

    /// Lowest id first among the tenant's posts matching `matches`.
    fn find_post(&self, tenant_id: i32, matches: impl Fn(&PostRow) -> bool) -> Result<Post, StoreError> {
        self.posts
            .iter()
            .filter(|p| p.tenant_id == tenant_id && matches(p))
            .min_by_key(|p| p.id)
            .map(|p| self.to_post(p))
            .ok_or(StoreError::NotFound)
    }

    fn post_mut(&mut self, tenant_id: i32, post_id: i32) -> Result<&mut PostRow, StoreError> {
        self.posts
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.id == post_id)
            .ok_or(StoreError::NotFound)
    }

    fn is_supporter(&self, post_id: i32, user_id: i32) -> bool {
        self.supporters.contains(&(post_id, user_id))
    }

    fn count_supporters(&self, post_id: i32) -> i32 {
        self.supporters.iter().filter(|(post, _)| *post == post_id).count() as i32
    }

    fn unverified_key_mut(&mut self, tenant_id: i32, key: &str) -> Option<&mut EmailVerification> {
        self.verifications
            .iter_mut()
            .filter(|(tenant, _)| *tenant == tenant_id)
            .map(|(_, verification)| verification)
            .find(|v| v.key == key && v.verified_at.is_none())
    }
}

/// Shared across clones; every clone sees the same committed data.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    committed: Arc<Mutex<Data>>,
}

impl InMemoryDatabase {
    /// Holds the [`fixtures`] tenants and users.
    pub fn seeded() -> Self {
        Self {
            committed: Arc::new(Mutex::new(Data::seeded())),
        }
    }

    pub fn tenant(&self, tenant_id: i32) -> Option<Tenant> {
        lock(&self.committed).tenants.iter().find(|t| t.id == tenant_id).cloned()
    }

    pub fn user(&self, user_id: i32) -> Option<User> {
        lock(&self.committed).users.iter().find(|u| u.id == user_id).cloned()
    }

    pub fn users_of(&self, tenant_id: i32) -> Vec<User> {
        lock(&self.committed)
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn post(&self, tenant_id: i32, number: i32) -> Option<Post> {
        lock(&self.committed).find_post(tenant_id, |p| p.number == number).ok()
    }

    pub fn notifications_of(&self, user_id: i32) -> Vec<Notification> {
        let data = lock(&self.committed);
        let mut rows: Vec<_> = data.notifications.iter().filter(|n| n.user_id == user_id).collect();
        rows.sort_by_key(|n| n.notification.id);
        rows.into_iter().map(|n| n.notification.clone()).collect()
    }

    /// Most recently issued key mailed to `email`.
    pub fn verification_for(&self, email: &str) -> Option<EmailVerification> {
        lock(&self.committed)
            .verifications
            .iter()
            .map(|(_, verification)| verification)
            .filter(|v| v.email == email)
            .max_by_key(|v| v.id)
            .cloned()
    }

    pub fn blob(&self, tenant_id: i32, key: &str) -> Option<Blob> {
        lock(&self.committed)
            .blobs
            .iter()
            .find(|(tenant, blob)| *tenant == tenant_id && blob.key == key)
            .map(|(_, blob)| blob.clone())
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        let snapshot = lock(&self.committed).clone();
        Ok(Arc::new(MemoryTransaction {
            committed: self.committed.clone(),
            working: Mutex::new(Some(snapshot)),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    committed: Arc<Mutex<Data>>,
    working: Mutex<Option<Data>>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn stores(self: Arc<Self>, scope: &Scope) -> Stores {
        let store = MemoryStore {
            trx: self,
            scope: scope.clone(),
        };
        Stores {
            tenants: Box::new(store.clone()),
            users: Box::new(store.clone()),
            posts: Box::new(store.clone()),
            notifications: Box::new(store.clone()),
            blobs: Box::new(store.clone()),
            tags: Box::new(store),
        }
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let data = lock(&self.working).take().ok_or(StoreError::TransactionClosed)?;
        *lock(&self.committed) = data;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        lock(&self.working).take();
        Ok(())
    }
}

#[derive(Clone)]
struct MemoryStore {
    trx: Arc<MemoryTransaction>,
    scope: Scope,
}

impl MemoryStore {
    fn with<T>(&self, f: impl FnOnce(&mut Data) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut working = lock(&self.trx.working);
        let data = working.as_mut().ok_or(StoreError::TransactionClosed)?;
        f(data)
    }

    fn tenant_id(&self) -> Result<i32, StoreError> {
        Ok(self.scope.tenant()?.id)
    }

    fn user_id(&self) -> Result<i32, StoreError> {
        Ok(self.scope.user()?.id)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn add(&self, name: &str, subdomain: &str, status: TenantStatus) -> Result<Tenant, StoreError> {
        self.with(|data| {
            let tenant = Tenant {
                id: data.next_id("tenants"),
                name: name.to_string(),
                subdomain: subdomain.to_string(),
                cname: None,
                invitation: String::new(),
                welcome_message: String::new(),
                status,
                is_private: false,
                logo_bkey: None,
            };
            data.tenants.push(tenant.clone());
            Ok(tenant)
        })
    }

    async fn first(&self) -> Result<Tenant, StoreError> {
        self.with(|data| data.tenants.iter().min_by_key(|t| t.id).cloned().ok_or(StoreError::NotFound))
    }

    async fn get_by_domain(&self, subdomain: &str, host: &str) -> Result<Tenant, StoreError> {
        self.with(|data| {
            data.tenants
                .iter()
                .find(|t| t.cname.as_deref() == Some(host))
                .or_else(|| data.tenants.iter().find(|t| t.subdomain == subdomain))
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    async fn update_settings(&self, settings: &TenantSettings) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let tenant = data.tenant_mut(tenant_id)?;
            tenant.name = settings.title.clone();
            tenant.invitation = settings.invitation.clone();
            tenant.welcome_message = settings.welcome_message.clone();
            tenant.cname = settings.cname.clone();
            tenant.logo_bkey = settings.logo_bkey.clone();
            Ok(())
        })
    }

    async fn update_privacy(&self, is_private: bool) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.tenant_mut(tenant_id)?.is_private = is_private;
            Ok(())
        })
    }

    async fn activate(&self, tenant_id: i32) -> Result<(), StoreError> {
        self.with(|data| {
            data.tenant_mut(tenant_id)?.status = TenantStatus::Active;
            Ok(())
        })
    }

    async fn is_subdomain_available(&self, subdomain: &str) -> Result<bool, StoreError> {
        self.with(|data| Ok(!data.tenants.iter().any(|t| t.subdomain == subdomain)))
    }

    async fn is_cname_available(&self, cname: &str) -> Result<bool, StoreError> {
        let own = self.scope.tenant.as_ref().map(|t| t.id);
        self.with(|data| {
            Ok(!data
                .tenants
                .iter()
                .any(|t| t.cname.as_deref() == Some(cname) && Some(t.id) != own))
        })
    }

    async fn save_verification_key(
        &self,
        key: &str,
        duration: Duration,
        request: &NewEmailVerification,
    ) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        let now = Utc::now();
        self.with(|data| {
            let verification = EmailVerification {
                id: data.next_id("email_verifications"),
                email: request.email.clone(),
                name: request.name.clone(),
                key: key.to_string(),
                kind: request.kind,
                user_id: request.user_id,
                created_at: now,
                expires_at: now + duration,
                verified_at: None,
            };
            data.verifications.push((tenant_id, verification));
            Ok(())
        })
    }

    async fn find_verification_by_key(
        &self,
        kind: EmailVerificationKind,
        key: &str,
    ) -> Result<EmailVerification, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.verifications
                .iter()
                .filter(|(tenant, _)| *tenant == tenant_id)
                .map(|(_, verification)| verification)
                .find(|v| v.kind == kind && v.key == key && v.verified_at.is_none())
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    async fn set_key_as_verified(&self, key: &str) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let verification = data.unverified_key_mut(tenant_id, key).ok_or(StoreError::NotFound)?;
            verification.verified_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn list_oauth_configs(&self) -> Result<Vec<OAuthConfig>, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let mut configs: Vec<OAuthConfig> = data
                .oauth_configs
                .iter()
                .filter(|(tenant, _)| *tenant == tenant_id)
                .map(|(_, config)| config.clone())
                .collect();
            configs.sort_by_key(|c| c.id);
            Ok(configs)
        })
    }

    async fn get_oauth_config_by_provider(&self, provider: &str) -> Result<OAuthConfig, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.oauth_configs
                .iter()
                .find(|(tenant, config)| *tenant == tenant_id && config.provider == provider)
                .map(|(_, config)| config.clone())
                .ok_or(StoreError::NotFound)
        })
    }

    async fn save_oauth_config(&self, config: &OAuthConfig) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            if config.id == 0 {
                let id = data.next_id("oauth_providers");
                data.oauth_configs.push((tenant_id, OAuthConfig { id, ..config.clone() }));
                return Ok(());
            }
            let (_, existing) = data
                .oauth_configs
                .iter_mut()
                .find(|(tenant, existing)| *tenant == tenant_id && existing.provider == config.provider)
                .ok_or(StoreError::NotFound)?;
            *existing = OAuthConfig {
                id: existing.id,
                ..config.clone()
            };
            Ok(())
        })
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, user_id: i32) -> Result<User, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| data.user_mut(tenant_id, user_id).map(|u| u.clone()))
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        if email.is_empty() {
            return Err(StoreError::NotFound);
        }
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.users
                .iter()
                .find(|u| u.tenant_id == tenant_id && u.email == email)
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    async fn get_by_provider(&self, provider: &str, uid: &str) -> Result<User, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.users
                .iter()
                .find(|u| {
                    u.tenant_id == tenant_id && u.providers.iter().any(|p| p.name == provider && p.uid == uid)
                })
                .cloned()
                .ok_or(StoreError::NotFound)
        })
    }

    async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let mut users: Vec<User> = data.users.iter().filter(|u| u.tenant_id == tenant_id).cloned().collect();
            users.sort_by_key(|u| u.id);
            Ok(users)
        })
    }

    async fn register(&self, user: &User) -> Result<User, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let user = User {
                id: data.next_id("users"),
                tenant_id,
                ..user.clone()
            };
            data.users.push(user.clone());
            Ok(user)
        })
    }

    async fn register_provider(&self, user_id: i32, provider: &UserProvider) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let user = data.user_mut(tenant_id, user_id)?;
            if !user.has_provider(&provider.name) {
                user.providers.push(provider.clone());
            }
            Ok(())
        })
    }

    async fn update_name(&self, user_id: i32, name: &str) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.user_mut(tenant_id, user_id)?.name = name.to_string();
            Ok(())
        })
    }

    async fn change_email(&self, user_id: i32, email: &str) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.user_mut(tenant_id, user_id)?.email = email.to_string();
            Ok(())
        })
    }

    async fn change_role(&self, user_id: i32, role: Role) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.user_mut(tenant_id, user_id)?.role = role;
            Ok(())
        })
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn add(&self, title: &str, description: &str) -> Result<Post, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            let number = data
                .posts
                .iter()
                .filter(|p| p.tenant_id == tenant_id)
                .map(|p| p.number)
                .max()
                .unwrap_or(0)
                + 1;
            let id = data.next_id("posts");
            data.posts.push(PostRow {
                tenant_id,
                id,
                number,
                title: title.to_string(),
                slug: slugify(title),
                description: description.to_string(),
                created_at: Utc::now(),
                author_id: user_id,
                status: PostStatus::Open,
                supporters: 0,
                comments: 0,
                response: None,
            });
            data.find_post(tenant_id, |p| p.id == id)
        })
    }

    async fn update(&self, post_id: i32, title: &str, description: &str) -> Result<Post, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let row = data.post_mut(tenant_id, post_id)?;
            row.title = title.to_string();
            row.slug = slugify(title);
            row.description = description.to_string();
            data.find_post(tenant_id, |p| p.id == post_id)
        })
    }

    async fn get_by_id(&self, post_id: i32) -> Result<Post, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| data.find_post(tenant_id, |p| p.id == post_id))
    }

    async fn get_by_number(&self, number: i32) -> Result<Post, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| data.find_post(tenant_id, |p| p.number == number))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Post, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| data.find_post(tenant_id, |p| p.slug == slug && p.status != PostStatus::Duplicate))
    }

    async fn get_all(&self) -> Result<Vec<Post>, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let mut rows: Vec<&PostRow> = data.posts.iter().filter(|p| p.tenant_id == tenant_id).collect();
            rows.sort_by_key(|p| std::cmp::Reverse(p.id));
            Ok(rows.into_iter().map(|p| data.to_post(p)).collect())
        })
    }

    async fn set_response(&self, post_id: i32, response: &NewResponse) -> Result<(), StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            let row = data.post_mut(tenant_id, post_id)?;
            row.status = response.status;
            row.response = Some(ResponseRow {
                text: response.text.clone(),
                responded_at: Utc::now(),
                user_id,
                original_id: response.original_id,
            });

            if let Some(original_id) = response.original_id {
                let moved: Vec<i32> = data
                    .supporters
                    .iter()
                    .filter(|(post, _)| *post == post_id)
                    .map(|(_, user)| *user)
                    .collect();
                for user in moved {
                    if !data.is_supporter(original_id, user) {
                        data.supporters.push((original_id, user));
                    }
                }
                let total = data.count_supporters(original_id);
                data.post_mut(tenant_id, original_id)?.supporters = total;
            }
            Ok(())
        })
    }

    async fn add_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            if data.is_supporter(post_id, user_id) {
                return Ok(());
            }
            data.post_mut(tenant_id, post_id)?.supporters += 1;
            data.supporters.push((post_id, user_id));
            Ok(())
        })
    }

    async fn remove_supporter(&self, post_id: i32, user_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            if !data.is_supporter(post_id, user_id) {
                return Ok(());
            }
            data.post_mut(tenant_id, post_id)?.supporters -= 1;
            data.supporters.retain(|pair| *pair != (post_id, user_id));
            Ok(())
        })
    }

    async fn supported_by_user(&self) -> Result<Vec<i32>, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            let mut ids: Vec<i32> = data
                .supporters
                .iter()
                .filter(|(post, user)| {
                    *user == user_id && data.posts.iter().any(|p| p.id == *post && p.tenant_id == tenant_id)
                })
                .map(|(post, _)| *post)
                .collect();
            ids.sort_unstable();
            Ok(ids)
        })
    }

    async fn add_comment(&self, post_id: i32, content: &str) -> Result<Comment, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            data.post_mut(tenant_id, post_id)?.comments += 1;
            let comment = Comment {
                id: data.next_id("comments"),
                post_id,
                content: content.to_string(),
                created_at: Utc::now(),
                author_id: user_id,
                author_name: data.user_name(user_id),
            };
            data.comments.push((tenant_id, comment.clone()));
            Ok(comment)
        })
    }

    async fn get_comments(&self, post_id: i32) -> Result<Vec<Comment>, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let mut comments: Vec<Comment> = data
                .comments
                .iter()
                .filter(|(tenant, c)| *tenant == tenant_id && c.post_id == post_id)
                .map(|(_, c)| Comment {
                    author_name: data.user_name(c.author_id),
                    ..c.clone()
                })
                .collect();
            comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(comments)
        })
    }

    async fn get_subscribers(&self, post_id: i32) -> Result<Vec<User>, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let authors = data
                .posts
                .iter()
                .filter(|p| p.tenant_id == tenant_id && p.id == post_id)
                .map(|p| p.author_id);
            let supporters = data
                .supporters
                .iter()
                .filter(|(post, _)| *post == post_id)
                .map(|(_, user)| *user);
            let commenters = data
                .comments
                .iter()
                .filter(|(tenant, c)| *tenant == tenant_id && c.post_id == post_id)
                .map(|(_, c)| c.author_id);
            let ids: Vec<i32> = authors.chain(supporters).chain(commenters).collect();

            let mut users: Vec<User> = data
                .users
                .iter()
                .filter(|u| u.tenant_id == tenant_id && ids.contains(&u.id))
                .cloned()
                .collect();
            users.sort_by_key(|u| u.id);
            Ok(users)
        })
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(
        &self,
        recipient: &User,
        title: &str,
        link: &str,
        _post_id: i32,
    ) -> Result<Option<Notification>, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        if recipient.id == user_id {
            return Ok(None);
        }
        let now = Utc::now();
        self.with(|data| {
            let notification = Notification {
                id: data.next_id("notifications"),
                title: title.to_string(),
                link: link.to_string(),
                read: false,
                created_at: now,
            };
            data.notifications.push(NotificationRow {
                tenant_id,
                user_id: recipient.id,
                updated_at: now,
                notification: notification.clone(),
            });
            Ok(Some(notification))
        })
    }

    async fn total_unread(&self) -> Result<i64, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            Ok(data
                .notifications
                .iter()
                .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id && !n.notification.read)
                .count() as i64)
        })
    }

    async fn get_active(&self) -> Result<Vec<Notification>, StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        let since = Utc::now() - Duration::days(ACTIVE_NOTIFICATION_DAYS);
        self.with(|data| {
            let mut rows: Vec<&NotificationRow> = data
                .notifications
                .iter()
                .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id)
                .filter(|n| !n.notification.read || n.updated_at > since)
                .collect();
            rows.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then(b.notification.id.cmp(&a.notification.id))
            });
            Ok(rows.into_iter().map(|n| n.notification.clone()).collect())
        })
    }

    async fn mark_as_read(&self, notification_id: i32) -> Result<(), StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        self.with(|data| {
            let row = data
                .notifications
                .iter_mut()
                .find(|n| n.tenant_id == tenant_id && n.user_id == user_id && n.notification.id == notification_id)
                .ok_or(StoreError::NotFound)?;
            row.notification.read = true;
            row.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        let (tenant_id, user_id) = (self.tenant_id()?, self.user_id()?);
        let now = Utc::now();
        self.with(|data| {
            for row in data
                .notifications
                .iter_mut()
                .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id && !n.notification.read)
            {
                row.notification.read = true;
                row.updated_at = now;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, content_type: &str, content: &[u8]) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let blob = Blob {
                key: key.to_string(),
                content_type: content_type.to_string(),
                content: content.to_vec(),
            };
            match data.blobs.iter_mut().find(|(tenant, b)| *tenant == tenant_id && b.key == key) {
                Some((_, existing)) => *existing = blob,
                None => data.blobs.push((tenant_id, blob)),
            }
            Ok(())
        })
    }

    async fn get(&self, key: &str) -> Result<Blob, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.blobs
                .iter()
                .find(|(tenant, b)| *tenant == tenant_id && b.key == key)
                .map(|(_, blob)| blob.clone())
                .ok_or(StoreError::NotFound)
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.blobs.retain(|(tenant, b)| !(*tenant == tenant_id && b.key == key));
            Ok(())
        })
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn add(&self, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let slug = Tag::slug_for(name);
            if data.tags.iter().any(|(tenant, t)| *tenant == tenant_id && t.slug == slug) {
                return Err(StoreError::InvalidData(format!("duplicate tag slug {}", slug)));
            }
            let tag = Tag {
                id: data.next_id("tags"),
                name: name.to_string(),
                slug,
                color: color.to_string(),
                is_public,
            };
            data.tags.push((tenant_id, tag.clone()));
            Ok(tag)
        })
    }

    async fn update(&self, tag_id: i32, name: &str, color: &str, is_public: bool) -> Result<Tag, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            let (_, tag) = data
                .tags
                .iter_mut()
                .find(|(tenant, t)| *tenant == tenant_id && t.id == tag_id)
                .ok_or(StoreError::NotFound)?;
            tag.name = name.to_string();
            tag.slug = Tag::slug_for(name);
            tag.color = color.to_string();
            tag.is_public = is_public;
            Ok(tag.clone())
        })
    }

    async fn delete(&self, tag_id: i32) -> Result<(), StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            if data.tags.iter().any(|(tenant, t)| *tenant == tenant_id && t.id == tag_id) {
                data.post_tags.retain(|(tag, _)| *tag != tag_id);
                data.tags.retain(|(_, t)| t.id != tag_id);
            }
            Ok(())
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Tag, StoreError> {
        let tenant_id = self.tenant_id()?;
        self.with(|data| {
            data.tags
                .iter()
                .find(|(tenant, t)| *tenant == tenant_id && t.slug == slug)
                .map(|(_, tag)| tag.clone())
                .ok_or(StoreError::NotFound)
        })
    }

    async fn get_all(&self) -> Result<Vec<Tag>, StoreError> {
        let tenant_id = self.tenant_id()?;
        let all = self.scope.is_collaborator();
        self.with(|data| {
            let mut tags: Vec<Tag> = data
                .tags
                .iter()
                .filter(|(tenant, t)| *tenant == tenant_id && (all || t.is_public))
                .map(|(_, tag)| tag.clone())
                .collect();
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(tags)
        })
    }

    async fn assign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError> {
        self.user_id()?;
        self.with(|data| {
            if !data.post_tags.contains(&(tag_id, post_id)) {
                data.post_tags.push((tag_id, post_id));
            }
            Ok(())
        })
    }

    async fn unassign(&self, tag_id: i32, post_id: i32) -> Result<(), StoreError> {
        self.tenant_id()?;
        self.with(|data| {
            data.post_tags.retain(|pair| *pair != (tag_id, post_id));
            Ok(())
        })
    }

    async fn get_assigned(&self, post_id: i32) -> Result<Vec<Tag>, StoreError> {
        let mut tags = TagStore::get_all(self).await?;
        self.with(|data| {
            tags.retain(|tag| data.post_tags.contains(&(tag.id, post_id)));
            Ok(tags)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn stores(db: &InMemoryDatabase, user: Option<User>) -> (Arc<dyn Transaction>, Stores) {
        let trx = db.begin().await.unwrap();
        let stores = trx.clone().stores(&Scope::new(Some(fixtures::demo()), user));
        (trx, stores)
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let db = InMemoryDatabase::seeded();
        let (trx, stores) = stores(&db, None).await;
        stores.users.update_name(2, "No One").await.unwrap();
        trx.rollback().await.unwrap();

        assert_eq!(db.user(2).unwrap().name, "Arya Stark");
        let err = stores.users.get_by_id(2).await.unwrap_err();
        assert!(matches!(err, StoreError::TransactionClosed));
    }

    #[tokio::test]
    async fn post_numbers_are_per_tenant() {
        let db = InMemoryDatabase::seeded();
        let (trx, stores) = stores(&db, Some(fixtures::jon_snow())).await;
        assert_eq!(stores.posts.add("First", "").await.unwrap().number, 1);
        assert_eq!(stores.posts.add("Second", "").await.unwrap().number, 2);

        let other = trx
            .clone()
            .stores(&Scope::new(Some(fixtures::avengers()), Some(fixtures::tony_stark())));
        assert_eq!(other.posts.add("Elsewhere", "").await.unwrap().number, 1);
    }

    #[tokio::test]
    async fn duplicate_moves_supporters_to_original() {
        let db = InMemoryDatabase::seeded();
        let (_trx, stores) = stores(&db, Some(fixtures::jon_snow())).await;
        let original = stores.posts.add("Dark mode", "").await.unwrap();
        let duplicate = stores.posts.add("Night theme", "").await.unwrap();
        stores.posts.add_supporter(duplicate.id, 2).await.unwrap();

        let response = NewResponse {
            text: String::new(),
            status: PostStatus::Duplicate,
            original_id: Some(original.id),
        };
        stores.posts.set_response(duplicate.id, &response).await.unwrap();

        let original = stores.posts.get_by_id(original.id).await.unwrap();
        assert_eq!(original.total_supporters, 1);
        let duplicate = stores.posts.get_by_id(duplicate.id).await.unwrap();
        assert_eq!(duplicate.response.unwrap().original_number, Some(original.number));
    }

    #[tokio::test]
    async fn private_tags_are_hidden_from_visitors() {
        let db = InMemoryDatabase::seeded();
        let (trx, admin) = stores(&db, Some(fixtures::jon_snow())).await;
        let post = admin.posts.add("Dark mode", "").await.unwrap();
        let public = admin.tags.add("Easy", "FB3A62", true).await.unwrap();
        let private = admin.tags.add("Hard", "FBCA04", false).await.unwrap();
        admin.tags.assign(public.id, post.id).await.unwrap();
        admin.tags.assign(private.id, post.id).await.unwrap();
        admin.tags.assign(private.id, post.id).await.unwrap();
        assert_eq!(admin.tags.get_assigned(post.id).await.unwrap().len(), 2);

        let visitor = trx
            .clone()
            .stores(&Scope::new(Some(fixtures::demo()), Some(fixtures::arya_stark())));
        assert_eq!(visitor.tags.get_all().await.unwrap(), vec![public.clone()]);
        assert_eq!(visitor.tags.get_assigned(post.id).await.unwrap(), vec![public]);

        admin.tags.delete(private.id).await.unwrap();
        assert_eq!(admin.tags.get_assigned(post.id).await.unwrap().len(), 1);
    }
}
