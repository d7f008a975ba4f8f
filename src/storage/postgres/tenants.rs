use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{decode, Handle};
use crate::models::{
    EmailVerification, EmailVerificationKind, NewEmailVerification, OAuthConfig, OAuthConfigStatus, Tenant,
    TenantSettings, TenantStatus,
};
use crate::storage::{StoreError, TenantStore};

pub struct PgTenants(pub(crate) Handle);

#[derive(sqlx::FromRow)]
struct DbTenant {
    id: i32,
    name: String,
    subdomain: String,
    cname: Option<String>,
    invitation: String,
    welcome_message: String,
    status: i16,
    is_private: bool,
    logo_bkey: Option<String>,
}

impl DbTenant {
    fn to_model(self) -> Result<Tenant, StoreError> {
        Ok(Tenant {
            id: self.id,
            name: self.name,
            subdomain: self.subdomain,
            cname: self.cname,
            invitation: self.invitation,
            welcome_message: self.welcome_message,
            status: decode(TenantStatus::from_i16(self.status), "tenant status", self.status)?,
            is_private: self.is_private,
            logo_bkey: self.logo_bkey,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DbEmailVerification {
    id: i32,
    email: String,
    name: String,
    key: String,
    kind: i16,
    user_id: Option<i32>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl DbEmailVerification {
    fn to_model(self) -> Result<EmailVerification, StoreError> {
        Ok(EmailVerification {
            id: self.id,
            email: self.email,
            name: self.name,
            key: self.key,
            kind: decode(EmailVerificationKind::from_i16(self.kind), "verification kind", self.kind)?,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            verified_at: self.verified_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DbOAuthConfig {
    id: i32,
    provider: String,
    display_name: String,
    status: i16,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    profile_url: String,
    scope: String,
    json_user_id_path: String,
    json_user_name_path: String,
    json_user_email_path: String,
    logo_bkey: Option<String>,
}

impl DbOAuthConfig {
    fn to_model(self) -> Result<OAuthConfig, StoreError> {
        Ok(OAuthConfig {
            id: self.id,
            provider: self.provider,
            display_name: self.display_name,
            status: decode(OAuthConfigStatus::from_i16(self.status), "oauth status", self.status)?,
            client_id: self.client_id,
            client_secret: self.client_secret,
            authorize_url: self.authorize_url,
            token_url: self.token_url,
            profile_url: self.profile_url,
            scope: self.scope,
            json_user_id_path: self.json_user_id_path,
            json_user_name_path: self.json_user_name_path,
            json_user_email_path: self.json_user_email_path,
            logo_bkey: self.logo_bkey,
        })
    }
}

const TENANT_COLUMNS: &str =
    "id, name, subdomain, cname, invitation, welcome_message, status, is_private, logo_bkey";

const OAUTH_COLUMNS: &str = "id, provider, display_name, status, client_id, client_secret, authorize_url, \
     token_url, profile_url, scope, json_user_id_path, json_user_name_path, json_user_email_path, logo_bkey";

#[async_trait]
impl TenantStore for PgTenants {
    async fn add(&self, name: &str, subdomain: &str, status: TenantStatus) -> Result<Tenant, StoreError> {
        let mut guard = self.0.lock().await;
        let row: DbTenant = sqlx::query_as(&format!(
            "INSERT INTO tenants (name, subdomain, status, is_private, invitation, welcome_message, created_at) \
             VALUES ($1, $2, $3, FALSE, '', '', $4) RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(name)
        .bind(subdomain)
        .bind(status.as_i16())
        .bind(Utc::now())
        .fetch_one(guard.conn()?)
        .await?;
        row.to_model()
    }

    async fn first(&self) -> Result<Tenant, StoreError> {
        let mut guard = self.0.lock().await;
        let row: DbTenant = sqlx::query_as(&format!("SELECT {} FROM tenants ORDER BY id LIMIT 1", TENANT_COLUMNS))
            .fetch_one(guard.conn()?)
            .await?;
        row.to_model()
    }

    async fn get_by_domain(&self, subdomain: &str, host: &str) -> Result<Tenant, StoreError> {
        let mut guard = self.0.lock().await;
        let row: DbTenant = sqlx::query_as(&format!(
            "SELECT {} FROM tenants WHERE subdomain = $1 OR cname = $2 \
             ORDER BY CASE WHEN cname = $2 THEN 0 ELSE 1 END LIMIT 1",
            TENANT_COLUMNS
        ))
        .bind(subdomain)
        .bind(host)
        .fetch_one(guard.conn()?)
        .await?;
        row.to_model()
    }

    async fn update_settings(&self, settings: &TenantSettings) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query(
            "UPDATE tenants SET name = $1, invitation = $2, welcome_message = $3, cname = $4, logo_bkey = $5 WHERE id = $6",
        )
        .bind(&settings.title)
        .bind(&settings.invitation)
        .bind(&settings.welcome_message)
        .bind(settings.cname.as_deref())
        .bind(settings.logo_bkey.as_deref())
        .bind(tenant_id)
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }

    async fn update_privacy(&self, is_private: bool) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        sqlx::query("UPDATE tenants SET is_private = $1 WHERE id = $2")
            .bind(is_private)
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
        Ok(())
    }

    async fn activate(&self, tenant_id: i32) -> Result<(), StoreError> {
        let mut guard = self.0.lock().await;
        let result = sqlx::query("UPDATE tenants SET status = $1 WHERE id = $2")
            .bind(TenantStatus::Active.as_i16())
            .bind(tenant_id)
            .execute(guard.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn is_subdomain_available(&self, subdomain: &str) -> Result<bool, StoreError> {
        let mut guard = self.0.lock().await;
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenants WHERE subdomain = $1)")
            .bind(subdomain)
            .fetch_one(guard.conn()?)
            .await?;
        Ok(!taken)
    }

    async fn is_cname_available(&self, cname: &str) -> Result<bool, StoreError> {
        let own_id = self.0.scope().tenant.as_ref().map(|t| t.id).unwrap_or(0);
        let mut guard = self.0.lock().await;
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenants WHERE cname = $1 AND id <> $2)")
            .bind(cname)
            .bind(own_id)
            .fetch_one(guard.conn()?)
            .await?;
        Ok(!taken)
    }

    async fn save_verification_key(
        &self,
        key: &str,
        duration: Duration,
        request: &NewEmailVerification,
    ) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let now = Utc::now();
        let mut guard = self.0.lock().await;
        sqlx::query(
            "INSERT INTO email_verifications (tenant_id, email, name, key, kind, user_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(tenant_id)
        .bind(&request.email)
        .bind(&request.name)
        .bind(key)
        .bind(request.kind.as_i16())
        .bind(request.user_id)
        .bind(now)
        .bind(now + duration)
        .execute(guard.conn()?)
        .await?;
        Ok(())
    }

    async fn find_verification_by_key(
        &self,
        kind: EmailVerificationKind,
        key: &str,
    ) -> Result<EmailVerification, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let row: DbEmailVerification = sqlx::query_as(
            "SELECT id, email, name, key, kind, user_id, created_at, expires_at, verified_at \
             FROM email_verifications \
             WHERE tenant_id = $1 AND key = $2 AND kind = $3 AND verified_at IS NULL",
        )
        .bind(tenant_id)
        .bind(key)
        .bind(kind.as_i16())
        .fetch_one(guard.conn()?)
        .await?;
        row.to_model()
    }

    async fn set_key_as_verified(&self, key: &str) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let result = sqlx::query(
            "UPDATE email_verifications SET verified_at = $1 \
             WHERE tenant_id = $2 AND key = $3 AND verified_at IS NULL",
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(key)
        .execute(guard.conn()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_oauth_configs(&self) -> Result<Vec<OAuthConfig>, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let rows: Vec<DbOAuthConfig> = sqlx::query_as(&format!(
            "SELECT {} FROM oauth_providers WHERE tenant_id = $1 ORDER BY id",
            OAUTH_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(guard.conn()?)
        .await?;
        rows.into_iter().map(DbOAuthConfig::to_model).collect()
    }

    async fn get_oauth_config_by_provider(&self, provider: &str) -> Result<OAuthConfig, StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let row: DbOAuthConfig = sqlx::query_as(&format!(
            "SELECT {} FROM oauth_providers WHERE tenant_id = $1 AND provider = $2",
            OAUTH_COLUMNS
        ))
        .bind(tenant_id)
        .bind(provider)
        .fetch_one(guard.conn()?)
        .await?;
        row.to_model()
    }

    async fn save_oauth_config(&self, config: &OAuthConfig) -> Result<(), StoreError> {
        let tenant_id = self.0.tenant_id()?;
        let mut guard = self.0.lock().await;
        let query = if config.id == 0 {
            "INSERT INTO oauth_providers (tenant_id, provider, display_name, status, client_id, client_secret, \
             authorize_url, token_url, profile_url, scope, json_user_id_path, json_user_name_path, \
             json_user_email_path, logo_bkey) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        } else {
            "UPDATE oauth_providers SET display_name = $3, status = $4, client_id = $5, client_secret = $6, \
             authorize_url = $7, token_url = $8, profile_url = $9, scope = $10, json_user_id_path = $11, \
             json_user_name_path = $12, json_user_email_path = $13, logo_bkey = $14 \
             WHERE tenant_id = $1 AND provider = $2"
        };
        let result = sqlx::query(query)
            .bind(tenant_id)
            .bind(&config.provider)
            .bind(&config.display_name)
            .bind(config.status.as_i16())
            .bind(&config.client_id)
            .bind(&config.client_secret)
            .bind(&config.authorize_url)
            .bind(&config.token_url)
            .bind(&config.profile_url)
            .bind(&config.scope)
            .bind(&config.json_user_id_path)
            .bind(&config.json_user_name_path)
            .bind(&config.json_user_email_path)
            .bind(config.logo_bkey.as_deref())
            .execute(guard.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
