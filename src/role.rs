//! The closed set of personas a session can authenticate as. A session holds
//! exactly one role, fixed at login time; authorization decisions belong to
//! the server, roles here only gate client-side navigation.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Staff,
    Tenant,
    Owner,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Admin, Self::Staff, Self::Tenant, Self::Owner];

    /// Lowercase segment substituted into `/auth/{role}/...` paths.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Tenant => "tenant",
            Self::Owner => "owner",
        }
    }

    /// Wire form used in token claims and profiles.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
            Self::Tenant => "TENANT",
            Self::Owner => "OWNER",
        }
    }

    /// Dashboard route for this role, used when a guard redirects a caller
    /// holding an insufficient role back to its own area.
    #[must_use]
    pub fn dashboard_route(self) -> String {
        format!("/{}/dashboard", self.path_segment())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.wire_name())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "tenant" => Ok(Self::Tenant),
            "owner" => Ok(Self::Owner),
            _ => Err(Error::InvalidRole(value.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
