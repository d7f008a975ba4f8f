use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            TenantStatus::Active => 1,
            TenantStatus::Inactive => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(TenantStatus::Active),
            2 => Some(TenantStatus::Inactive),
            _ => None,
        }
    }
}

/// An organization hosting its own board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: i32,
    pub name: String,
    pub subdomain: String,
    pub cname: Option<String>,
    pub invitation: String,
    pub welcome_message: String,
    pub status: TenantStatus,
    pub is_private: bool,
    pub logo_bkey: Option<String>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Editable general settings of a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSettings {
    pub title: String,
    pub invitation: String,
    pub welcome_message: String,
    pub cname: Option<String>,
    pub logo_bkey: Option<String>,
}
