//! Per request state: the [`AppState`] shared by the router and the
//! [`RequestContext`] extractor every handler works through.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::Json;
use chrono::Duration;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};

use crate::actions::{self, Action};
use crate::auth::{ClaimsOrigin, TokenSigner, UserClaims};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::middleware::session;
use crate::models::{Tenant, User};
use crate::services::{Collaborators, Services};
use crate::storage::{Database, Scope, Transaction};
use crate::worker::{JobEnvironment, Message, Task, TaskQueue};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub collaborators: Collaborators,
    pub queue: TaskQueue,
}

impl AppState {
    pub fn config(&self) -> &AppConfig {
        &self.collaborators.config
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.collaborators.signer
    }

    pub fn job_environment(&self) -> JobEnvironment {
        JobEnvironment {
            db: self.db.clone(),
            collaborators: self.collaborators.clone(),
        }
    }
}

/// The transaction opened for the current request.
#[derive(Clone)]
pub struct ActiveTransaction(pub Arc<dyn Transaction>);

/// Tasks waiting for the request transaction to commit.
#[derive(Clone, Default)]
pub struct PendingTasks(Arc<Mutex<Vec<Message>>>);

impl PendingTasks {
    pub fn push(&self, message: Message) {
        if let Ok(mut pending) = self.0.lock() {
            pending.push(message);
        }
    }

    pub fn take(&self) -> Vec<Message> {
        self.0.lock().map(|mut pending| std::mem::take(&mut *pending)).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub context_id: String,
    pub scheme: String,
    /// Request host including any port.
    pub host: String,
    pub path: String,
}

impl RequestInfo {
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn port(&self) -> Option<&str> {
        self.host.rsplit_once(':').map(|(_, port)| port).filter(|p| p.chars().all(|c| c.is_ascii_digit()))
    }
}

#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug, Clone)]
pub struct SessionClaims(pub UserClaims);

pub struct RequestContext {
    state: AppState,
    trx: Arc<dyn Transaction>,
    tasks: PendingTasks,
    info: RequestInfo,
    tenant: Option<Tenant>,
    user: Option<User>,
    services: Services,
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ActiveTransaction(trx) = parts
            .extensions
            .get::<ActiveTransaction>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("request has no active transaction")))?;
        let tasks = parts.extensions.get::<PendingTasks>().cloned().unwrap_or_default();
        let info = parts
            .extensions
            .get::<RequestInfo>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("request info missing")))?;
        let tenant = parts.extensions.get::<CurrentTenant>().map(|t| t.0.clone());
        let user = parts.extensions.get::<CurrentUser>().map(|u| u.0.clone());

        let scope = Scope::new(tenant.clone(), user.clone());
        let services = Services::new(trx.clone().stores(&scope), &state.collaborators);

        Ok(Self {
            state: state.clone(),
            trx,
            tasks,
            info,
            tenant,
            user,
            services,
        })
    }
}

impl RequestContext {
    pub fn config(&self) -> &AppConfig {
        self.state.config()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn info(&self) -> &RequestInfo {
        &self.info
    }

    pub fn tenant(&self) -> Result<&Tenant, ApiError> {
        self.tenant.as_ref().ok_or_else(|| ApiError::not_found("Tenant not found"))
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }

    pub fn base_url(&self) -> String {
        self.info.base_url()
    }

    /// Canonical address of the current tenant.
    pub fn tenant_base_url(&self) -> String {
        match &self.tenant {
            Some(tenant) => self.base_url_for(tenant),
            None => self.base_url(),
        }
    }

    /// CNAME when set, else `subdomain.domain`; scheme and port follow the
    /// request. Single host mode always answers on the request host.
    pub fn base_url_for(&self, tenant: &Tenant) -> String {
        let config = self.config();
        if config.is_single_host() {
            return self.base_url();
        }
        let host = match &tenant.cname {
            Some(cname) if !cname.is_empty() => cname.clone(),
            _ => format!("{}.{}", tenant.subdomain, config.host.domain),
        };
        match self.info.port() {
            Some(port) => format!("{}://{}:{}", self.info.scheme, host, port),
            None => format!("{}://{}", self.info.scheme, host),
        }
    }

    /// Stores acting for another tenant or user within the same transaction.
    pub fn scoped_services(&self, tenant: Option<Tenant>, user: Option<User>) -> Services {
        let scope = Scope::new(tenant, user);
        Services::new(self.trx.clone().stores(&scope), &self.state.collaborators)
    }

    /// Binds, authorizes and validates an action for the current user.
    pub async fn bind_to<A: Action>(&self, input: A::Input) -> Result<A, ApiError> {
        actions::run::<A>(input, self.user(), &self.services).await
    }

    /// Queues a task as the current tenant and user. It runs only if the
    /// request commits.
    pub fn enqueue(&self, task: Task) {
        self.tasks.push(Message {
            task,
            tenant: self.tenant.clone(),
            user: self.user.clone(),
            base_url: self.tenant_base_url(),
        });
    }

    pub fn enqueue_as(&self, task: Task, tenant: Tenant, user: Option<User>) {
        let base_url = self.base_url_for(&tenant);
        self.tasks.push(Message {
            task,
            tenant: Some(tenant),
            user,
            base_url,
        });
    }

    /// Signs a UI session for `user`.
    pub fn session_token(&self, user: &User) -> Result<String, ApiError> {
        let lifetime = Duration::days(self.config().security.session_expiry_days);
        let claims = UserClaims::new(user, ClaimsOrigin::Ui, lifetime);
        Ok(self.state.signer().encode(&claims)?)
    }

    /// [`Self::session_token`] rendered as a `Set-Cookie` value.
    pub fn session_cookie(&self, user: &User) -> Result<HeaderValue, ApiError> {
        let token = self.session_token(user)?;
        session::auth_cookie(&token, &self.config().security)
    }

    pub fn remove_session_cookie(&self) -> Result<HeaderValue, ApiError> {
        session::remove_auth_cookie(&self.config().security)
    }

    pub fn signer(&self) -> &TokenSigner {
        self.state.signer()
    }
}

/// JSON body whose rejections flow through [`ApiError`].
pub struct JsonInput<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonInput<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Path parameters whose rejections flow through [`ApiError`].
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Query string whose rejections flow through [`ApiError`].
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}
