use crate::models::{Tenant, User, UserProfile, UserProvider};
use crate::services::Services;
use crate::storage::StoreError;

/// How a provider identity maps onto a user of the current tenant.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Already linked to this provider identity.
    Existing(User),
    /// Matched by email and now linked.
    Linked(User),
    /// New visitor registered with the provider attached.
    Registered(User),
    /// Unknown identity on a private tenant.
    NotInvited,
}

impl Reconciliation {
    pub fn user(self) -> Option<User> {
        match self {
            Reconciliation::Existing(user) | Reconciliation::Linked(user) | Reconciliation::Registered(user) => {
                Some(user)
            }
            Reconciliation::NotInvited => None,
        }
    }
}

/// Lookups stay inside the tenant the stores are scoped to.
pub async fn reconcile(
    services: &Services,
    tenant: &Tenant,
    provider: &str,
    profile: &UserProfile,
) -> Result<Reconciliation, StoreError> {
    match services.users.get_by_provider(provider, &profile.id).await {
        Ok(user) => return Ok(Reconciliation::Existing(user)),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    let link = UserProvider {
        name: provider.to_string(),
        uid: profile.id.clone(),
    };

    if !profile.email.is_empty() {
        match services.users.get_by_email(&profile.email).await {
            // one identity per provider and user; a second one is not linked
            Ok(user) if user.has_provider(provider) => return Ok(Reconciliation::Existing(user)),
            Ok(mut user) => {
                services.users.register_provider(user.id, &link).await?;
                user.providers.push(link);
                return Ok(Reconciliation::Linked(user));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
    }

    if tenant.is_private {
        return Ok(Reconciliation::NotInvited);
    }

    let mut user = User::visitor(profile.name.clone(), profile.email.clone());
    user.tenant_id = tenant.id;
    user.providers.push(link);
    let user = services.users.register(&user).await?;
    Ok(Reconciliation::Registered(user))
}
