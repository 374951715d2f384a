//! Self-service ownership decision.
//!
//! Endpoints like `/students/{student_id}/requests` address one student's
//! sub-resources. Students may only reach their own; staff may reach anyone's.

use campus_core::{IdError, StudentId};

use crate::error::{AuthError, reason};
use crate::roles::Role;

/// Decide whether `role` may act on the student addressed by `path_value`.
///
/// `published` is the student id the profile loader attached to the request,
/// if it ran. Its absence for a student principal means the pipeline was
/// assembled without the loader, which is reported as 401 rather than 403.
pub fn check_ownership(
    role: Role,
    published: Option<StudentId>,
    path_value: Option<&str>,
) -> Result<StudentId, AuthError> {
    let raw = path_value
        .filter(|v| !v.trim().is_empty())
        .ok_or(AuthError::MalformedInput(reason::MISSING_STUDENT_ID))?;

    let addressed = raw.parse::<StudentId>().map_err(|e: IdError| {
        tracing::debug!(error = %e, "rejecting student path parameter");
        AuthError::MalformedInput(reason::INVALID_STUDENT_ID)
    })?;

    match role {
        Role::Student => {
            let own = published.ok_or(AuthError::Unauthenticated(reason::STUDENT_CONTEXT_MISSING))?;
            if own == addressed {
                Ok(addressed)
            } else {
                Err(AuthError::Forbidden(reason::OWNERSHIP_MISMATCH))
            }
        }
        Role::Admin | Role::Faculty => Ok(addressed),
        Role::SuperAdmin | Role::Parent => Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sid(raw: i64) -> StudentId {
        StudentId::new(raw).unwrap()
    }

    #[test]
    fn missing_and_invalid_parameters_are_distinguishable() {
        assert_eq!(
            check_ownership(Role::Admin, None, None),
            Err(AuthError::MalformedInput(reason::MISSING_STUDENT_ID))
        );
        assert_eq!(
            check_ownership(Role::Admin, None, Some("abc")),
            Err(AuthError::MalformedInput(reason::INVALID_STUDENT_ID))
        );
        assert_eq!(
            check_ownership(Role::Admin, None, Some("-3")),
            Err(AuthError::MalformedInput(reason::INVALID_STUDENT_ID))
        );
        assert_eq!(
            check_ownership(Role::Admin, None, Some("0")),
            Err(AuthError::MalformedInput(reason::INVALID_STUDENT_ID))
        );
    }

    #[test]
    fn student_without_published_id_is_unauthenticated() {
        assert_eq!(
            check_ownership(Role::Student, None, Some("5")),
            Err(AuthError::Unauthenticated(reason::STUDENT_CONTEXT_MISSING))
        );
    }

    proptest! {
        #[test]
        fn student_may_only_reach_own_records(own in 1i64..10_000, addressed in 1i64..10_000) {
            let outcome = check_ownership(Role::Student, Some(sid(own)), Some(&addressed.to_string()));
            if own == addressed {
                prop_assert_eq!(outcome, Ok(sid(addressed)));
            } else {
                prop_assert_eq!(outcome, Err(AuthError::Forbidden(reason::OWNERSHIP_MISMATCH)));
            }
        }

        #[test]
        fn staff_always_pass(addressed in 1i64..10_000, staff in prop::sample::select(vec![Role::Admin, Role::Faculty])) {
            prop_assert_eq!(check_ownership(staff, None, Some(&addressed.to_string())), Ok(sid(addressed)));
        }

        #[test]
        fn other_roles_never_pass(addressed in 1i64..10_000, other in prop::sample::select(vec![Role::Parent, Role::SuperAdmin])) {
            prop_assert_eq!(
                check_ownership(other, Some(sid(addressed)), Some(&addressed.to_string())),
                Err(AuthError::Forbidden(reason::ROLE_NOT_ALLOWED))
            );
        }
    }
}
