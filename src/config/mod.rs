use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub host: HostConfig,
    pub security: SecurityConfig,
    pub oauth: OAuthSettings,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before giving up.
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Every request resolves to the first (and only) tenant.
    Single,
    /// Tenants are addressed by `subdomain.domain` or by CNAME.
    Multi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub mode: HostMode,
    /// Base domain without a leading dot, e.g. `test.fider.io`.
    pub domain: String,
    /// Endpoint used as OAuth redirect base for the built-in providers.
    pub auth_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub session_expiry_days: i64,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub secret: String,
}

impl OAuthCredentials {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.secret.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub google: OAuthCredentials,
    pub facebook: OAuthCredentials,
    pub github: OAuthCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in production")]
    MissingJwtSecret,
    #[error("HOST_DOMAIN must be set when HOST_MODE is multi")]
    MissingHostDomain,
    #[error("WORKER_CONCURRENCY must be greater than zero")]
    NoWorkers,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production && self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.host.mode == HostMode::Multi && self.host.domain.is_empty() {
            return Err(ConfigError::MissingHostDomain);
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    pub fn is_single_host(&self) -> bool {
        self.host.mode == HostMode::Single
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Host overrides
        if let Ok(v) = env::var("HOST_MODE") {
            match v.trim().to_lowercase().as_str() {
                "single" => self.host.mode = HostMode::Single,
                "multi" => self.host.mode = HostMode::Multi,
                _ => {}
            }
        }
        if let Ok(v) = env::var("HOST_DOMAIN") {
            self.host.domain = v.trim().trim_start_matches('.').to_lowercase();
        }
        if let Ok(v) = env::var("AUTH_ENDPOINT") {
            self.host.auth_endpoint = v.trim().trim_end_matches('/').to_string();
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SESSION_EXPIRY_DAYS") {
            self.security.session_expiry_days = v.parse().unwrap_or(self.security.session_expiry_days);
        }
        if let Ok(v) = env::var("SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }

        // OAuth overrides
        read_credentials("GOOGLE", &mut self.oauth.google);
        read_credentials("FACEBOOK", &mut self.oauth.facebook);
        read_credentials("GITHUB", &mut self.oauth.github);

        // Worker overrides
        if let Ok(v) = env::var("WORKER_CONCURRENCY") {
            self.worker.concurrency = v.parse().unwrap_or(self.worker.concurrency);
        }

        self
    }

    pub(crate) fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/ideaboard".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            host: HostConfig {
                mode: HostMode::Single,
                domain: String::new(),
                auth_endpoint: "http://localhost:3000".to_string(),
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-do-not-use".to_string(),
                session_expiry_days: 365,
                secure_cookies: false,
            },
            oauth: OAuthSettings::default(),
            worker: WorkerConfig { concurrency: 2 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            host: HostConfig {
                mode: HostMode::Multi,
                domain: String::new(),
                auth_endpoint: String::new(),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_expiry_days: 365,
                secure_cookies: true,
            },
            oauth: OAuthSettings::default(),
            worker: WorkerConfig { concurrency: 4 },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                enable_cors: false,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            host: HostConfig {
                mode: HostMode::Multi,
                domain: String::new(),
                auth_endpoint: String::new(),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_expiry_days: 365,
                secure_cookies: true,
            },
            oauth: OAuthSettings::default(),
            worker: WorkerConfig { concurrency: 8 },
        }
    }
}

fn read_credentials(provider: &str, target: &mut OAuthCredentials) {
    if let Ok(v) = env::var(format!("OAUTH_{}_CLIENTID", provider)) {
        target.client_id = v.trim().to_string();
    }
    if let Ok(v) = env::var(format!("OAUTH_{}_SECRET", provider)) {
        target.secret = v.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.host.mode, HostMode::Single);
        assert_eq!(config.security.session_expiry_days, 365);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let mut config = AppConfig::production();
        config.host.domain = "fider.io".to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingJwtSecret));

        config.security.jwt_secret = "s3cr3t".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multi_host_requires_domain() {
        let mut config = AppConfig::development();
        config.host.mode = HostMode::Multi;
        assert_eq!(config.validate(), Err(ConfigError::MissingHostDomain));
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let creds = OAuthCredentials {
            client_id: "abc".to_string(),
            secret: String::new(),
        };
        assert!(!creds.is_configured());
    }
}
