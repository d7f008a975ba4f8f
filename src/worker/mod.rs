//! Background job execution. Requests buffer [`Message`]s and hand them to
//! the [`TaskQueue`] only after their transaction commits; a pool of tokio
//! workers drains the queue, running every job in its own transaction.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::models::{Tenant, User};
use crate::services::{Collaborators, Services};
use crate::storage::{Database, Scope, StoreError};

type Job = Box<dyn FnOnce(JobContext) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A named unit of background work.
pub struct Task {
    pub name: &'static str,
    job: Job,
}

impl Task {
    pub fn new<F, Fut>(name: &'static str, job: F) -> Self
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name,
            job: Box::new(move |ctx| job(ctx).boxed()),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

/// A task plus the identity it runs as.
#[derive(Debug)]
pub struct Message {
    pub task: Task,
    pub tenant: Option<Tenant>,
    pub user: Option<User>,
    pub base_url: String,
}

/// What a job sees: who it runs for and the services of its transaction.
pub struct JobContext {
    pub tenant: Option<Tenant>,
    pub user: Option<User>,
    pub base_url: String,
    pub services: Services,
}

impl JobContext {
    pub fn tenant(&self) -> anyhow::Result<&Tenant> {
        self.tenant.as_ref().ok_or_else(|| anyhow::anyhow!("job requires a tenant"))
    }

    pub fn user(&self) -> anyhow::Result<&User> {
        self.user.as_ref().ok_or_else(|| anyhow::anyhow!("job requires a user"))
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Message>,
}

pub type TaskReceiver = mpsc::UnboundedReceiver<Message>;

impl TaskQueue {
    pub fn channel() -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn publish(&self, message: Message) {
        let task = message.task.name;
        if self.sender.send(message).is_err() {
            tracing::error!(task, "task queue closed, dropping task");
        }
    }
}

#[derive(Clone)]
pub struct JobEnvironment {
    pub db: Arc<dyn Database>,
    pub collaborators: Collaborators,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to open transaction: {0}")]
    Begin(#[source] StoreError),
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] StoreError),
    #[error("job failed: {0:#}")]
    Failed(anyhow::Error),
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Starts `concurrency` workers sharing one receiver. Workers exit once
/// every [`TaskQueue`] clone is dropped and the queue is drained.
pub fn spawn(env: JobEnvironment, receiver: TaskReceiver, concurrency: usize) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..concurrency)
        .map(|worker_id| {
            let env = env.clone();
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(message) = next else { break };
                    // Failures are already logged inside the job span.
                    let _ = execute(worker_id, message, &env).await;
                }
                tracing::debug!(worker_id, "worker stopped");
            })
        })
        .collect()
}

/// Runs one message inside its own transaction: commit on success,
/// rollback on error or panic.
pub async fn execute(worker_id: usize, message: Message, env: &JobEnvironment) -> Result<(), JobError> {
    let Message {
        task,
        tenant,
        user,
        base_url,
    } = message;

    let span = tracing::info_span!(
        "job",
        worker_id,
        task = task.name,
        tenant_id = tenant.as_ref().map(|t| t.id),
        user_id = user.as_ref().map(|u| u.id),
    );

    async move {
        let started = Instant::now();
        tracing::info!("task started");

        let trx = env.db.begin().await.map_err(|err| {
            tracing::error!(error = %err, "task could not begin a transaction");
            JobError::Begin(err)
        })?;

        let scope = Scope::new(tenant.clone(), user.clone());
        let ctx = JobContext {
            tenant,
            user,
            base_url,
            services: Services::new(trx.clone().stores(&scope), &env.collaborators),
        };

        let outcome = AssertUnwindSafe((task.job)(ctx)).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => {
                trx.commit().await.map_err(|err| {
                    tracing::error!(error = %err, "task commit failed");
                    JobError::Commit(err)
                })?;
                tracing::info!(elapsed_ms, "task finished");
                Ok(())
            }
            Ok(Err(err)) => {
                rollback(trx.as_ref()).await;
                tracing::error!(error = ?err, elapsed_ms, "task failed");
                Err(JobError::Failed(err))
            }
            Err(payload) => {
                rollback(trx.as_ref()).await;
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, backtrace = %Backtrace::force_capture(), elapsed_ms, "task panicked");
                Err(JobError::Panicked(message))
            }
        }
    }
    .instrument(span)
    .await
}

pub(crate) async fn rollback(trx: &dyn crate::storage::Transaction) {
    if let Err(err) = trx.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
