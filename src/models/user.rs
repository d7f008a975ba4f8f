use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Visitor,
    Collaborator,
    Administrator,
}

impl Role {
    pub fn as_i16(self) -> i16 {
        match self {
            Role::Visitor => 1,
            Role::Collaborator => 2,
            Role::Administrator => 3,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Role::Visitor),
            2 => Some(Role::Collaborator),
            3 => Some(Role::Administrator),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Collaborator => "collaborator",
            Role::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(Role::Visitor),
            "collaborator" => Ok(Role::Collaborator),
            "administrator" => Ok(Role::Administrator),
            _ => Err(()),
        }
    }
}

/// Identity of a user at an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProvider {
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    #[serde(skip)]
    pub tenant_id: i32,
    pub name: String,
    /// Empty for accounts created through a provider that shared no email.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub providers: Vec<UserProvider>,
}

impl User {
    /// A not yet persisted visitor.
    pub fn visitor(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            tenant_id: 0,
            name: name.into(),
            email: email.into(),
            role: Role::Visitor,
            providers: Vec::new(),
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }

    /// Collaborators and administrators can triage posts.
    pub fn is_collaborator(&self) -> bool {
        matches!(self.role, Role::Collaborator | Role::Administrator)
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Visitor < Role::Collaborator);
        assert!(Role::Collaborator < Role::Administrator);
    }

    #[test]
    fn role_round_trips_through_storage_codes() {
        for role in [Role::Visitor, Role::Collaborator, Role::Administrator] {
            assert_eq!(Role::from_i16(role.as_i16()), Some(role));
        }
        assert_eq!(Role::from_i16(0), None);
        assert_eq!("owner".parse::<Role>(), Err(()));
    }

    #[test]
    fn administrator_is_also_collaborator() {
        let mut user = User::visitor("Jon Snow", "jon.snow@got.com");
        assert!(!user.is_collaborator());
        user.role = Role::Administrator;
        assert!(user.is_collaborator());
        assert!(user.is_administrator());
    }
}
