//! Role model and capability checks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard account
    User,
    /// Content director, may curate the catalog
    Director,
    /// Administrator
    Admin,
}

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Browse movies and their metadata
    ReadCatalog,
    /// Create, edit and delete catalog entries
    ManageCatalog,
    /// Change account status, delete accounts, list users
    ManageUsers,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Director => "director",
            Role::Admin => "admin",
        }
    }

    /// Whether this role grants `capability`
    pub fn allows(&self, capability: Capability) -> bool {
        match (self, capability) {
            (_, Capability::ReadCatalog) => true,
            (Role::Admin | Role::Director, Capability::ManageCatalog) => true,
            (Role::User, Capability::ManageCatalog) => false,
            (Role::Admin, Capability::ManageUsers) => true,
            (Role::Director | Role::User, Capability::ManageUsers) => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "director" => Ok(Role::Director),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
