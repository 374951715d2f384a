use serde::{Deserialize, Serialize};

use campus_core::UserId;

use crate::error::{AuthError, reason};
use crate::roles::Role;

/// The canonical principal produced by any identity source.
///
/// One of these exists per validated request. `external_id` is never empty;
/// `local_user_id` stays `None` until provisioning (or a local token) fills it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub external_id: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: Role,
    pub external_tenant_ref: String,
    pub roll_number: Option<String>,
    pub local_user_id: Option<UserId>,
}

impl ResolvedIdentity {
    pub fn new(external_id: impl Into<String>, role: Role) -> Result<Self, AuthError> {
        let external_id = external_id.into();
        if external_id.trim().is_empty() {
            return Err(AuthError::Unauthenticated(reason::MISSING_SUBJECT));
        }
        Ok(Self {
            external_id,
            email: String::new(),
            given_name: String::new(),
            family_name: String::new(),
            role,
            external_tenant_ref: String::new(),
            roll_number: None,
            local_user_id: None,
        })
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_names(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.given_name = given.into();
        self.family_name = family.into();
        self
    }

    pub fn with_tenant_ref(mut self, tenant_ref: impl Into<String>) -> Self {
        self.external_tenant_ref = tenant_ref.into();
        self
    }

    pub fn with_roll_number(mut self, roll_number: Option<String>) -> Self {
        self.roll_number = roll_number.filter(|r| !r.is_empty());
        self
    }

    pub fn with_local_user_id(mut self, id: Option<UserId>) -> Self {
        self.local_user_id = id;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Name shown for a freshly provisioned user.
    ///
    /// Prefers "first last", then the email, then the external id.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.given_name.trim(), self.family_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        if !self.email.trim().is_empty() {
            return self.email.trim().to_string();
        }
        self.external_id.clone()
    }
}
