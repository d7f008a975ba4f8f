//! Outbound email as a narrow collaborator. Rendering and transport live
//! outside this service; [`LogEmailer`] records what would be delivered.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub address: String,
    /// Template parameters for this recipient.
    pub params: Map<String, Value>,
}

impl Recipient {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Emailer: Send + Sync {
    async fn send(&self, template: &str, from_name: &str, to: Recipient) -> Result<(), EmailError>;
    async fn batch_send(&self, template: &str, from_name: &str, to: Vec<Recipient>) -> Result<(), EmailError>;
}

/// Recipients without an address are silently skipped.
pub fn can_send_to(recipient: &Recipient) -> bool {
    !recipient.address.trim().is_empty()
}

#[derive(Debug, Default, Clone)]
pub struct LogEmailer;

#[async_trait]
impl Emailer for LogEmailer {
    async fn send(&self, template: &str, from_name: &str, to: Recipient) -> Result<(), EmailError> {
        if !can_send_to(&to) {
            return Ok(());
        }
        tracing::info!(template, from = from_name, to = %to.address, "email queued for delivery");
        let params = Value::Object(to.params);
        tracing::debug!(template, params = %params, "email parameters");
        Ok(())
    }

    async fn batch_send(&self, template: &str, from_name: &str, to: Vec<Recipient>) -> Result<(), EmailError> {
        let recipients: Vec<_> = to.into_iter().filter(can_send_to).collect();
        if recipients.is_empty() {
            return Ok(());
        }
        tracing::info!(template, from = from_name, count = recipients.len(), "batch email queued for delivery");
        Ok(())
    }
}
