//! Strongly-typed identifiers used across the gateway.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Identifier of a locally persisted user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a local student enrollment record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier from a raw database id.
            ///
            /// Ids are always strictly positive; zero is reserved for "unset".
            pub fn new(raw: i64) -> Result<Self, IdError> {
                if raw <= 0 {
                    return Err(IdError::NotPositive { kind: $name });
                }
                Ok(Self(raw))
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<i64> for $t {
            type Error = IdError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| IdError::NotNumeric { kind: $name })?;
                Self::new(raw)
            }
        }
    };
}

impl_int_newtype!(UserId, "UserId");
impl_int_newtype!(StudentId, "StudentId");

/// Identifier of a tenant (a college), the unit of data isolation.
///
/// Verified tenants always carry the internal integer id. `Opaque` only appears
/// when the gateway runs in trusting mode and the external reference is not
/// numeric; downstream handlers treat it as an already-validated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantId {
    Id(i64),
    Opaque(String),
}

impl TenantId {
    pub fn internal(&self) -> Option<i64> {
        match self {
            TenantId::Id(id) => Some(*id),
            TenantId::Opaque(_) => None,
        }
    }
}

impl core::fmt::Display for TenantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TenantId::Id(id) => core::fmt::Display::fmt(id, f),
            TenantId::Opaque(raw) => f.write_str(raw),
        }
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        TenantId::Id(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_ids_are_rejected() {
        assert_eq!(UserId::new(0), Err(IdError::NotPositive { kind: "UserId" }));
        assert_eq!(
            StudentId::new(-4),
            Err(IdError::NotPositive { kind: "StudentId" })
        );
    }

    #[test]
    fn parsing_distinguishes_garbage_from_non_positive() {
        assert_eq!(
            "abc".parse::<StudentId>(),
            Err(IdError::NotNumeric { kind: "StudentId" })
        );
        assert_eq!(
            "0".parse::<StudentId>(),
            Err(IdError::NotPositive { kind: "StudentId" })
        );
        assert_eq!(" 17 ".parse::<StudentId>().unwrap().get(), 17);
    }

    #[test]
    fn tenant_id_serializes_as_number_or_string() {
        assert_eq!(serde_json::to_string(&TenantId::Id(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&TenantId::Opaque("ext-9".into())).unwrap(),
            "\"ext-9\""
        );
        let back: TenantId = serde_json::from_str("12").unwrap();
        assert_eq!(back.internal(), Some(12));
    }
}
