use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthConfigStatus {
    Disabled,
    Enabled,
}

impl OAuthConfigStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            OAuthConfigStatus::Disabled => 1,
            OAuthConfigStatus::Enabled => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(OAuthConfigStatus::Disabled),
            2 => Some(OAuthConfigStatus::Enabled),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "disabled" => Some(OAuthConfigStatus::Disabled),
            "enabled" => Some(OAuthConfigStatus::Enabled),
            _ => None,
        }
    }
}

/// An OAuth2 identity provider. Built-in providers and tenant-defined
/// custom ones (slug prefixed with `_`) share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthConfig {
    pub id: i32,
    pub provider: String,
    pub display_name: String,
    pub status: OAuthConfigStatus,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scope: String,
    pub json_user_id_path: String,
    pub json_user_name_path: String,
    pub json_user_email_path: String,
    pub logo_bkey: Option<String>,
}

impl OAuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.status == OAuthConfigStatus::Enabled
    }

    pub fn is_custom(&self) -> bool {
        is_custom_provider(&self.provider)
    }
}

pub fn is_custom_provider(provider: &str) -> bool {
    provider.starts_with('_')
}

/// Outward preview of a client secret. Never reveals more than six characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() >= 10 {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "...".to_string()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicOAuthConfig<'a> {
    id: i32,
    provider: &'a str,
    display_name: &'a str,
    status: OAuthConfigStatus,
    #[serde(rename = "clientID")]
    client_id: &'a str,
    client_secret: String,
    #[serde(rename = "authorizeURL")]
    authorize_url: &'a str,
    #[serde(rename = "tokenURL")]
    token_url: &'a str,
    #[serde(rename = "profileURL")]
    profile_url: &'a str,
    scope: &'a str,
    #[serde(rename = "jsonUserIDPath")]
    json_user_id_path: &'a str,
    json_user_name_path: &'a str,
    json_user_email_path: &'a str,
    logo_bkey: Option<&'a str>,
}

impl Serialize for OAuthConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PublicOAuthConfig {
            id: self.id,
            provider: &self.provider,
            display_name: &self.display_name,
            status: self.status,
            client_id: &self.client_id,
            client_secret: mask_secret(&self.client_secret),
            authorize_url: &self.authorize_url,
            token_url: &self.token_url,
            profile_url: &self.profile_url,
            scope: &self.scope,
            json_user_id_path: &self.json_user_id_path,
            json_user_name_path: &self.json_user_name_path,
            json_user_email_path: &self.json_user_email_path,
            logo_bkey: self.logo_bkey.as_deref(),
        }
        .serialize(serializer)
    }
}

/// What the sign-in page needs to render a provider button.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthProviderOption {
    pub provider: String,
    pub display_name: String,
    pub is_custom: bool,
    pub logo_bkey: Option<String>,
}

impl From<&OAuthConfig> for OAuthProviderOption {
    fn from(config: &OAuthConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            display_name: config.display_name.clone(),
            is_custom: config.is_custom(),
            logo_bkey: config.logo_bkey.clone(),
        }
    }
}

/// Identity returned by a provider, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}
