//! Test support: an in-memory database seeded with [`fixtures`], capturing
//! collaborators, and a [`Harness`] wiring them into services, jobs and
//! the router.

pub mod doubles;
pub mod fixtures;
pub mod memory;

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use chrono::Duration;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tower::ServiceExt;

pub use doubles::{CapturingEmailer, SentEmail, StubOAuthClient};
pub use memory::InMemoryDatabase;

use crate::auth::{ClaimsOrigin, TokenSigner, UserClaims};
use crate::config::{AppConfig, HostMode, OAuthCredentials};
use crate::context::AppState;
use crate::models::{Tenant, User};
use crate::routes;
use crate::services::{Collaborators, Services};
use crate::storage::{Database, Scope, Transaction};
use crate::worker::{self, JobEnvironment, TaskQueue, TaskReceiver};

pub const DOMAIN: &str = "test.fider.io";

pub struct Harness {
    pub config: Arc<AppConfig>,
    pub db: Arc<InMemoryDatabase>,
    pub emailer: Arc<CapturingEmailer>,
    pub oauth: Arc<StubOAuthClient>,
    signer: Arc<TokenSigner>,
    queue: TaskQueue,
    receiver: Mutex<TaskReceiver>,
}

impl Harness {
    /// Multi host mode under [`DOMAIN`].
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.host.mode = HostMode::Multi;
        config.host.domain = DOMAIN.to_string();
        config.host.auth_endpoint = format!("http://login.{}", DOMAIN);
        config.oauth.github = OAuthCredentials {
            client_id: "github-client".to_string(),
            secret: "github-secret".to_string(),
        };
        Self::with_config(config)
    }

    pub fn single_host() -> Self {
        Self::with_config(AppConfig::development())
    }

    fn with_config(config: AppConfig) -> Self {
        let signer = TokenSigner::new(&config.security.jwt_secret).expect("development secret is set");
        let (queue, receiver) = TaskQueue::channel();
        Self {
            config: Arc::new(config),
            db: Arc::new(InMemoryDatabase::seeded()),
            emailer: Arc::new(CapturingEmailer::default()),
            oauth: Arc::new(StubOAuthClient::default()),
            signer: Arc::new(signer),
            queue,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            config: self.config.clone(),
            signer: self.signer.clone(),
            oauth: self.oauth.clone(),
            emailer: self.emailer.clone(),
        }
    }

    /// Opens a transaction and the services scoped to `tenant` and `user`.
    /// Nothing is visible to later transactions until it commits.
    pub async fn begin(&self, tenant: Option<Tenant>, user: Option<User>) -> (Arc<dyn Transaction>, Services) {
        let trx = self.db.begin().await.expect("in-memory begin");
        let stores = trx.clone().stores(&Scope::new(tenant, user));
        (trx, Services::new(stores, &self.collaborators()))
    }

    pub fn job_environment(&self) -> JobEnvironment {
        JobEnvironment {
            db: self.db.clone(),
            collaborators: self.collaborators(),
        }
    }

    /// Tasks published by requests land in this harness' queue; see
    /// [`Self::run_pending_jobs`].
    pub fn state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            collaborators: self.collaborators(),
            queue: self.queue.clone(),
        }
    }

    /// Runs every queued task to completion and returns how many ran.
    pub async fn run_pending_jobs(&self) -> usize {
        let env = self.job_environment();
        let mut ran = 0;
        while let Some(message) = self.next_message() {
            let _ = worker::execute(0, message, &env).await;
            ran += 1;
        }
        ran
    }

    fn next_message(&self) -> Option<worker::Message> {
        self.receiver.lock().unwrap_or_else(PoisonError::into_inner).try_recv().ok()
    }

    /// `Cookie` header value of a UI session for `user`.
    pub fn session_cookie(&self, user: &User) -> String {
        let claims = UserClaims::new(user, ClaimsOrigin::Ui, Duration::days(1));
        format!("auth={}", self.signer.encode(&claims).expect("token signs"))
    }

    /// Bearer token with the API origin.
    pub fn api_token(&self, user: &User) -> String {
        let claims = UserClaims::new(user, ClaimsOrigin::Api, Duration::days(1));
        self.signer.encode(&claims).expect("token signs")
    }

    pub async fn send(&self, request: TestRequest) -> TestResponse {
        let mut builder = Request::builder()
            .method(request.method)
            .uri(&request.uri)
            .header(HOST, &request.host);
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(token) = &request.bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match &request.body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = routes::app(self.state())
            .oneshot(builder.body(body).expect("valid test request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("readable body");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            text,
            body,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A request addressed to `demo.test.fider.io` unless [`Self::on`] says otherwise.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: String,
    host: String,
    body: Option<Value>,
    cookie: Option<String>,
    bearer: Option<String>,
}

impl TestRequest {
    fn new(method: Method, uri: &str, body: Option<Value>) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            host: format!("demo.{}", DOMAIN),
            body,
            cookie: None,
            bearer: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri, None)
    }

    pub fn post(uri: &str, body: Value) -> Self {
        Self::new(Method::POST, uri, Some(body))
    }

    pub fn put(uri: &str, body: Value) -> Self {
        Self::new(Method::PUT, uri, Some(body))
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri, None)
    }

    pub fn on(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn cookie(mut self, cookie: String) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn bearer(mut self, token: String) -> Self {
        self.bearer = Some(token);
        self
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    /// `Null` when the body is not JSON.
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|value| value.to_str().ok())
    }

    /// `name=value` part of the auth cookie being set, if any.
    pub fn auth_cookie(&self) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with("auth="))
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}
