use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a principal within its college.
///
/// The set is closed. Identity providers occasionally send roles we do not
/// know (or none at all); those collapse to [`Role::default`], the
/// least-privileged role, via [`Role::parse_or_default`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Faculty,
    Admin,
    SuperAdmin,
    Parent,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Faculty,
        Role::Admin,
        Role::SuperAdmin,
        Role::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Parent => "parent",
        }
    }

    /// Lenient parse used at adapter boundaries.
    pub fn parse_or_default(raw: &str) -> Role {
        match raw.parse() {
            Ok(role) => role,
            Err(UnknownRole(raw)) => {
                if !raw.is_empty() {
                    tracing::debug!(role = %raw, "unknown role, using least-privileged default");
                }
                Role::default()
            }
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or(UnknownRole(normalized))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
