use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmailVerificationKind {
    SignIn,
    SignUp,
    ChangeEmail,
    UserInvitation,
}

impl EmailVerificationKind {
    pub fn as_i16(self) -> i16 {
        match self {
            EmailVerificationKind::SignIn => 1,
            EmailVerificationKind::SignUp => 2,
            EmailVerificationKind::ChangeEmail => 3,
            EmailVerificationKind::UserInvitation => 4,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(EmailVerificationKind::SignIn),
            2 => Some(EmailVerificationKind::SignUp),
            3 => Some(EmailVerificationKind::ChangeEmail),
            4 => Some(EmailVerificationKind::UserInvitation),
            _ => None,
        }
    }

    /// How long a freshly issued key of this kind stays usable.
    pub fn validity(self) -> Duration {
        match self {
            EmailVerificationKind::SignIn => Duration::minutes(15),
            EmailVerificationKind::SignUp => Duration::hours(48),
            EmailVerificationKind::ChangeEmail => Duration::hours(24),
            EmailVerificationKind::UserInvitation => Duration::days(7),
        }
    }
}

/// A single-use, time-boxed key mailed to prove ownership of an address.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailVerification {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub key: String,
    pub kind: EmailVerificationKind,
    pub user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl EmailVerification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_verified() && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmailVerification {
    pub email: String,
    pub name: String,
    pub kind: EmailVerificationKind,
    pub user_id: Option<i32>,
}

impl NewEmailVerification {
    pub fn new(kind: EmailVerificationKind, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: String::new(),
            kind,
            user_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn for_user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// 64 hex characters from two random v4 uuids.
pub fn generate_secret_key() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
