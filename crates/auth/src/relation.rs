use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Namespace holding every tuple this gateway reads or writes.
pub const APP_NAMESPACE: &str = "app";

/// Relation every role-membership tuple uses.
pub const MEMBER_RELATION: &str = "member";

/// A `(namespace, object, relation, subject)` fact held by the relationship
/// authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationTuple {
    pub namespace: String,
    pub object: String,
    pub relation: String,
    pub subject_id: String,
}

impl RelationTuple {
    /// `subject` is a member of `role`.
    pub fn role_membership(role: Role, subject: impl Into<String>) -> Self {
        Self {
            namespace: APP_NAMESPACE.to_string(),
            object: format!("role:{}", role.as_str()),
            relation: MEMBER_RELATION.to_string(),
            subject_id: subject.into(),
        }
    }

    /// `subject` may perform `action` on `resource`.
    pub fn permission(
        resource: impl Into<String>,
        action: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            namespace: APP_NAMESPACE.to_string(),
            object: resource.into(),
            relation: action.into(),
            subject_id: subject.into(),
        }
    }
}

impl core::fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.namespace, self.object, self.relation, self.subject_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_membership_tuple_shape() {
        let t = RelationTuple::role_membership(Role::SuperAdmin, "ext-1");
        assert_eq!(t.to_string(), "app:role:super_admin#member@ext-1");
    }

    #[test]
    fn permission_tuple_shape() {
        let t = RelationTuple::permission("course:12", "grade", "ext-2");
        assert_eq!(t.namespace, APP_NAMESPACE);
        assert_eq!(t.object, "course:12");
        assert_eq!(t.relation, "grade");
    }
}
