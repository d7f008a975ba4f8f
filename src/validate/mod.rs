pub mod upload;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use url::Url;

use crate::storage::{StoreError, TenantStore};

pub use upload::{image_upload, probe_image, ImageInfo, ImageUploadOpts};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

static SUBDOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("subdomain pattern compiles"));

static HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}$")
        .expect("hostname pattern compiles")
});

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Fa-f0-9]{6}$").expect("color pattern compiles"));

const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "app", "api", "login", "signup", "admin", "mail", "blog", "help", "support", "status",
    "dev", "cdn", "static", "assets", "docs",
];

/// Outcome of validating an action: success, or field name to messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    failures: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::default();
        result.add_failure(field, message);
        result
    }

    pub fn add_failure(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.failures.entry(field.into()).or_default().push(message.into());
    }

    /// Adds every message of `messages` under `field`; no-op when empty.
    pub fn add_failures(&mut self, field: impl Into<String>, messages: Vec<String>) {
        if messages.is_empty() {
            return;
        }
        self.failures.entry(field.into()).or_default().extend(messages);
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &BTreeMap<String, Vec<String>> {
        &self.failures
    }

    pub fn into_failures(self) -> BTreeMap<String, Vec<String>> {
        self.failures
    }
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 200 && EMAIL.is_match(value)
}

pub fn email(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec!["Email is required.".to_string()];
    }
    if value.len() > 200 {
        return vec!["Email must have less than 200 characters.".to_string()];
    }
    if !EMAIL.is_match(value) {
        return vec![format!("'{}' is not a valid email address.", value)];
    }
    Vec::new()
}

/// Six hex digits without a leading `#`.
pub fn color(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec!["Color is required.".to_string()];
    }
    if !HEX_COLOR.is_match(value) {
        return vec![format!("Color '{}' is invalid.", value)];
    }
    Vec::new()
}

/// Absolute http(s) URL of at most 300 characters.
pub fn url(value: &str) -> Vec<String> {
    if value.len() > 300 {
        return vec!["URL must have less than 300 characters.".to_string()];
    }
    match Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => Vec::new(),
        _ => vec![format!("'{}' is not a valid URL.", value)],
    }
}

pub async fn subdomain(tenants: &dyn TenantStore, value: &str) -> Result<Vec<String>, StoreError> {
    if value.is_empty() {
        return Ok(vec!["Subdomain is required.".to_string()]);
    }
    if value.len() <= 2 {
        return Ok(vec!["Subdomain must have more than 2 characters.".to_string()]);
    }
    if value.len() > 40 {
        return Ok(vec!["Subdomain must have less than 40 characters.".to_string()]);
    }
    if !SUBDOMAIN.is_match(value) {
        return Ok(vec!["Subdomain contains invalid characters.".to_string()]);
    }
    if RESERVED_SUBDOMAINS.contains(&value) || !tenants.is_subdomain_available(value).await? {
        return Ok(vec!["This subdomain is not available anymore.".to_string()]);
    }
    Ok(Vec::new())
}

/// `domain` is the platform base domain; hosts under it cannot be a CNAME.
pub async fn cname(tenants: &dyn TenantStore, value: &str, domain: &str) -> Result<Vec<String>, StoreError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    if value.len() > 100 {
        return Ok(vec!["CNAME must have less than 100 characters.".to_string()]);
    }
    if !HOSTNAME.is_match(value) {
        return Ok(vec!["CNAME is not valid.".to_string()]);
    }
    if !domain.is_empty() && (value == domain || value.ends_with(&format!(".{}", domain))) {
        return Ok(vec![format!("'{}' is not a valid CNAME.", value)]);
    }
    if !tenants.is_cname_available(value).await? {
        return Ok(vec!["This CNAME is already taken.".to_string()]);
    }
    Ok(Vec::new())
}
