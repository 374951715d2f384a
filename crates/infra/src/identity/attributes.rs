//! Best-effort extraction of identity attributes from loosely typed claim bags.
//!
//! Both the authorization server (`ext` on introspection) and the legacy
//! provider (`traits` on whoami) hand us a JSON object whose shape varies by
//! deployment. Nothing here errors: absent or oddly typed fields are empty.

use serde_json::{Map, Value};

use campus_auth::{AuthResult, ResolvedIdentity, Role};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityAttributes {
    pub email: String,
    pub role: String,
    pub tenant_ref: String,
    pub given_name: String,
    pub family_name: String,
    pub roll_number: Option<String>,
}

impl IdentityAttributes {
    pub fn from_value(bag: Option<&Value>) -> Self {
        match bag {
            Some(Value::Object(map)) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let nested_name = map.get("name").and_then(Value::as_object);

        let given_name = first_string(map, &["first_name", "given_name"])
            .or_else(|| nested_name.and_then(|n| first_string(n, &["first", "given"])))
            .unwrap_or_default();
        let family_name = first_string(map, &["last_name", "family_name"])
            .or_else(|| nested_name.and_then(|n| first_string(n, &["last", "family"])))
            .unwrap_or_default();

        Self {
            email: first_string(map, &["email"]).unwrap_or_default(),
            role: first_string(map, &["role"]).unwrap_or_default(),
            tenant_ref: first_string(map, &["college_id", "tenant_id", "tenant"])
                .unwrap_or_default(),
            given_name,
            family_name,
            roll_number: first_string(map, &["roll_number"]),
        }
    }

    /// Attach these attributes to the subject the remote vouched for.
    pub fn into_identity(self, subject: &str) -> AuthResult<ResolvedIdentity> {
        Ok(ResolvedIdentity::new(subject, Role::parse_or_default(&self.role))?
            .with_email(self.email)
            .with_names(self.given_name, self.family_name)
            .with_tenant_ref(self.tenant_ref)
            .with_roll_number(self.roll_number))
    }
}

/// First key holding a non-empty string or a number (numbers are rendered).
fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_bag() {
        let bag = json!({
            "email": "ada@college.edu",
            "role": "faculty",
            "college_id": 12,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "roll_number": "R-17"
        });
        let attrs = IdentityAttributes::from_value(Some(&bag));
        assert_eq!(attrs.tenant_ref, "12");
        assert_eq!(attrs.roll_number.as_deref(), Some("R-17"));

        let identity = attrs.into_identity("ext-1").unwrap();
        assert_eq!(identity.role, Role::Faculty);
        assert_eq!(identity.display_name(), "Ada Lovelace");
    }

    #[test]
    fn nested_name_and_opaque_tenant() {
        let bag = json!({
            "name": { "first": "Grace", "last": "Hopper" },
            "tenant_id": "org_abc"
        });
        let attrs = IdentityAttributes::from_value(Some(&bag));
        assert_eq!(attrs.given_name, "Grace");
        assert_eq!(attrs.family_name, "Hopper");
        assert_eq!(attrs.tenant_ref, "org_abc");
    }

    #[test]
    fn missing_or_mistyped_fields_are_empty() {
        let bag = json!({ "email": 42.5, "role": ["admin"], "roll_number": "" });
        let attrs = IdentityAttributes::from_value(Some(&bag));
        assert_eq!(attrs.email, "42.5");
        assert!(attrs.role.is_empty());
        assert!(attrs.roll_number.is_none());

        assert_eq!(IdentityAttributes::from_value(None), IdentityAttributes::default());
        assert_eq!(
            IdentityAttributes::from_value(Some(&json!("not an object"))),
            IdentityAttributes::default()
        );
    }

    #[test]
    fn unknown_role_defaults_to_student() {
        let identity = IdentityAttributes {
            role: "janitor".to_string(),
            ..Default::default()
        }
        .into_identity("ext-9")
        .unwrap();
        assert_eq!(identity.role, Role::Student);
    }
}
