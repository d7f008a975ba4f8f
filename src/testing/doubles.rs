use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::email::{can_send_to, EmailError, Emailer, Recipient};
use crate::models::{OAuthConfig, UserProfile};
use crate::oauth::{OAuthClient, OAuthError};

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub template: String,
    pub from: String,
    pub to: Vec<Recipient>,
}

/// Records deliveries instead of sending them.
#[derive(Debug, Default)]
pub struct CapturingEmailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl CapturingEmailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Emailer for CapturingEmailer {
    async fn send(&self, template: &str, from_name: &str, to: Recipient) -> Result<(), EmailError> {
        self.batch_send(template, from_name, vec![to]).await
    }

    async fn batch_send(&self, template: &str, from_name: &str, to: Vec<Recipient>) -> Result<(), EmailError> {
        let to: Vec<Recipient> = to.into_iter().filter(can_send_to).collect();
        if to.is_empty() {
            return Ok(());
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(SentEmail {
            template: template.to_string(),
            from: from_name.to_string(),
            to,
        });
        Ok(())
    }
}

/// Answers every code exchange with the configured profile.
#[derive(Debug, Default)]
pub struct StubOAuthClient {
    profile: Mutex<Option<UserProfile>>,
    exchanges: Mutex<Vec<(String, String)>>,
}

impl StubOAuthClient {
    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = Some(profile);
    }

    /// `(redirect_uri, code)` of every exchange so far.
    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanges.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl OAuthClient for StubOAuthClient {
    async fn fetch_profile(
        &self,
        _config: &OAuthConfig,
        redirect_uri: &str,
        code: &str,
    ) -> Result<UserProfile, OAuthError> {
        self.exchanges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((redirect_uri.to_string(), code.to_string()));
        self.profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(OAuthError::Provider {
                status: 401,
                body: "invalid code".to_string(),
            })
    }
}
