//! Publishes the local student id for student principals.

use std::sync::Arc;

use campus_auth::{AuthError, AuthResult, ResolvedIdentity, Role, reason};
use campus_core::StudentId;

use crate::store::StudentStore;

#[derive(Clone)]
pub struct StudentProfileLoader {
    students: Arc<dyn StudentStore>,
}

impl StudentProfileLoader {
    pub fn new(students: Arc<dyn StudentStore>) -> Self {
        Self { students }
    }

    /// `Ok(None)` for anyone who is not a student, whatever records exist.
    pub async fn load_if_student(&self, resolved: &ResolvedIdentity) -> AuthResult<Option<StudentId>> {
        if resolved.role != Role::Student {
            return Ok(None);
        }

        let record = self
            .students
            .get_by_external_id(&resolved.external_id)
            .await?
            .ok_or_else(|| {
                tracing::info!(subject = %resolved.external_id, "student principal without enrollment");
                AuthError::Forbidden(reason::STUDENT_NOT_REGISTERED)
            })?;

        if !record.is_active {
            tracing::info!(student_id = %record.id, "inactive student rejected");
            return Err(AuthError::Forbidden(reason::STUDENT_INACTIVE));
        }
        Ok(Some(record.id))
    }
}
