use crate::config::{OAuthCredentials, OAuthSettings};
use crate::error::ApiError;
use crate::models::{is_custom_provider, OAuthConfig, OAuthConfigStatus, OAuthProviderOption};
use crate::services::Services;

pub const GOOGLE: &str = "google";
pub const FACEBOOK: &str = "facebook";
pub const GITHUB: &str = "github";

const BUILTIN: [&str; 3] = [FACEBOOK, GOOGLE, GITHUB];

struct Endpoints {
    display_name: &'static str,
    authorize_url: &'static str,
    token_url: &'static str,
    profile_url: &'static str,
    scope: &'static str,
    name_path: &'static str,
}

fn endpoints(provider: &str) -> Option<Endpoints> {
    match provider {
        GOOGLE => Some(Endpoints {
            display_name: "Google",
            authorize_url: "https://accounts.google.com/o/oauth2/auth",
            token_url: "https://accounts.google.com/o/oauth2/token",
            profile_url: "https://www.googleapis.com/oauth2/v2/userinfo",
            scope: "profile email",
            name_path: "name",
        }),
        FACEBOOK => Some(Endpoints {
            display_name: "Facebook",
            authorize_url: "https://www.facebook.com/dialog/oauth",
            token_url: "https://graph.facebook.com/oauth/access_token",
            profile_url: "https://graph.facebook.com/me?fields=name,email",
            scope: "public_profile email",
            name_path: "name",
        }),
        GITHUB => Some(Endpoints {
            display_name: "GitHub",
            authorize_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            profile_url: "https://api.github.com/user",
            scope: "user:email",
            name_path: "name, login",
        }),
        _ => None,
    }
}

fn credentials<'a>(provider: &str, settings: &'a OAuthSettings) -> Option<&'a OAuthCredentials> {
    match provider {
        GOOGLE => Some(&settings.google),
        FACEBOOK => Some(&settings.facebook),
        GITHUB => Some(&settings.github),
        _ => None,
    }
}

/// Configuration of a built-in provider; enabled only when both client id
/// and secret are configured.
pub fn builtin(provider: &str, settings: &OAuthSettings) -> Option<OAuthConfig> {
    let endpoints = endpoints(provider)?;
    let credentials = credentials(provider, settings)?;
    let status = if credentials.is_configured() {
        OAuthConfigStatus::Enabled
    } else {
        OAuthConfigStatus::Disabled
    };

    Some(OAuthConfig {
        id: 0,
        provider: provider.to_string(),
        display_name: endpoints.display_name.to_string(),
        status,
        client_id: credentials.client_id.clone(),
        client_secret: credentials.secret.clone(),
        authorize_url: endpoints.authorize_url.to_string(),
        token_url: endpoints.token_url.to_string(),
        profile_url: endpoints.profile_url.to_string(),
        scope: endpoints.scope.to_string(),
        json_user_id_path: "id".to_string(),
        json_user_name_path: endpoints.name_path.to_string(),
        json_user_email_path: "email".to_string(),
        logo_bkey: None,
    })
}

/// Enabled provider by slug. Unknown and disabled providers are a 404.
pub async fn resolve(services: &Services, provider: &str) -> Result<OAuthConfig, ApiError> {
    let config = if is_custom_provider(provider) {
        match services.tenants.get_oauth_config_by_provider(provider).await {
            Ok(config) => config,
            Err(err) if err.is_not_found() => return Err(ApiError::not_found("OAuth provider not found")),
            Err(err) => return Err(err.into()),
        }
    } else {
        builtin(provider, &services.config.oauth).ok_or_else(|| ApiError::not_found("OAuth provider not found"))?
    };

    if !config.is_enabled() {
        return Err(ApiError::not_found("OAuth provider not found"));
    }
    Ok(config)
}

/// Sign-in options: configured built-ins followed by the tenant's enabled
/// custom providers.
pub async fn list(services: &Services, include_custom: bool) -> Result<Vec<OAuthProviderOption>, ApiError> {
    let mut options: Vec<OAuthProviderOption> = BUILTIN
        .iter()
        .filter_map(|provider| builtin(provider, &services.config.oauth))
        .filter(OAuthConfig::is_enabled)
        .map(|config| OAuthProviderOption::from(&config))
        .collect();

    if include_custom {
        let custom = services.tenants.list_oauth_configs().await?;
        options.extend(custom.iter().filter(|c| c.is_enabled()).map(OAuthProviderOption::from));
    }
    Ok(options)
}

/// Origin the provider redirects back to: the shared auth endpoint for
/// built-in providers, the tenant itself for custom ones.
pub fn redirect_endpoint<'a>(config: &OAuthConfig, auth_endpoint: &'a str, tenant_base_url: &'a str) -> &'a str {
    if config.is_custom() || auth_endpoint.is_empty() {
        tenant_base_url
    } else {
        auth_endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> OAuthSettings {
        let mut settings = OAuthSettings::default();
        settings.github = OAuthCredentials {
            client_id: "GH_CL_ID".to_string(),
            secret: "GH_SECRET".to_string(),
        };
        settings
    }

    #[test]
    fn builtins_are_disabled_without_credentials() {
        let settings = configured();
        assert!(builtin(GITHUB, &settings).unwrap().is_enabled());
        assert!(!builtin(GOOGLE, &settings).unwrap().is_enabled());
        assert!(builtin("twitter", &settings).is_none());
    }

    #[test]
    fn github_falls_back_to_login() {
        let config = builtin(GITHUB, &configured()).unwrap();
        assert_eq!(config.json_user_name_path, "name, login");
        assert_eq!(config.scope, "user:email");
    }

    #[test]
    fn custom_providers_redirect_to_tenant() {
        let mut config = builtin(GITHUB, &configured()).unwrap();
        assert_eq!(
            redirect_endpoint(&config, "http://login.test.fider.io", "http://demo.test.fider.io"),
            "http://login.test.fider.io"
        );

        config.provider = "_custom".to_string();
        assert_eq!(
            redirect_endpoint(&config, "http://login.test.fider.io", "http://demo.test.fider.io"),
            "http://demo.test.fider.io"
        );
    }
}
