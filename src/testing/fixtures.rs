//! Seed data every [`super::InMemoryDatabase`] starts with.

use crate::models::{Role, Tenant, TenantStatus, User};

pub fn demo() -> Tenant {
    Tenant {
        id: 1,
        name: "Demonstration".to_string(),
        subdomain: "demo".to_string(),
        cname: None,
        invitation: String::new(),
        welcome_message: String::new(),
        status: TenantStatus::Active,
        is_private: false,
        logo_bkey: None,
    }
}

pub fn avengers() -> Tenant {
    Tenant {
        id: 2,
        name: "Avengers".to_string(),
        subdomain: "avengers".to_string(),
        cname: Some("feedback.theavengers.com".to_string()),
        ..demo()
    }
}

/// Administrator of [`demo`].
pub fn jon_snow() -> User {
    User {
        id: 1,
        tenant_id: 1,
        name: "Jon Snow".to_string(),
        email: "jon.snow@got.com".to_string(),
        role: Role::Administrator,
        providers: Vec::new(),
    }
}

/// Visitor of [`demo`].
pub fn arya_stark() -> User {
    User {
        id: 2,
        tenant_id: 1,
        name: "Arya Stark".to_string(),
        email: "arya.stark@got.com".to_string(),
        role: Role::Visitor,
        providers: Vec::new(),
    }
}

/// Administrator of [`avengers`].
pub fn tony_stark() -> User {
    User {
        id: 3,
        tenant_id: 2,
        name: "Tony Stark".to_string(),
        email: "tony.stark@avengers.com".to_string(),
        role: Role::Administrator,
        providers: Vec::new(),
    }
}
