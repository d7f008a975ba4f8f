use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{User, UserProfile};

/// Where a session token was issued: the browser UI or an API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimsOrigin {
    Ui,
    Api,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(rename = "user/id")]
    pub user_id: i32,
    #[serde(rename = "user/name")]
    pub user_name: String,
    #[serde(rename = "user/email")]
    pub user_email: String,
    pub origin: ClaimsOrigin,
    pub iat: i64,
    pub exp: i64,
}

impl UserClaims {
    pub fn new(user: &User, origin: ClaimsOrigin, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            origin,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

/// Short lived proof of a provider identity, carried through sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClaims {
    #[serde(rename = "oauth/id")]
    pub oauth_id: String,
    #[serde(rename = "oauth/provider")]
    pub oauth_provider: String,
    #[serde(rename = "oauth/name")]
    pub oauth_name: String,
    #[serde(rename = "oauth/email")]
    pub oauth_email: String,
    pub exp: i64,
}

impl OAuthClaims {
    pub const LIFETIME_MINUTES: i64 = 10;

    pub fn new(provider: &str, profile: &UserProfile) -> Self {
        Self {
            oauth_id: profile.id.clone(),
            oauth_provider: provider.to_string(),
            oauth_name: profile.name.clone(),
            oauth_email: profile.email.clone(),
            exp: (Utc::now() + Duration::minutes(Self::LIFETIME_MINUTES)).timestamp(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// HS256 signer and verifier for every token the service issues.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
