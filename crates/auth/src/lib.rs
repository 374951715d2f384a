//! `campus-auth`: pure identity and authorization model (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows what a
//! resolved principal looks like and how to decide on roles and ownership, but
//! never performs IO. Remote adapters and stores live in `campus-infra`.

pub mod authorize;
pub mod claims;
pub mod credential;
pub mod error;
pub mod identity;
pub mod ownership;
pub mod relation;
pub mod roles;

pub use authorize::{permission_verdict, require_any_role};
pub use claims::{IssuedToken, LocalClaims, LocalJwt, TokenValidationError, validate_claims};
pub use credential::{CredentialScheme, SESSION_TOKEN_HEADER, parse_bearer};
pub use error::{AuthError, AuthResult, reason};
pub use identity::ResolvedIdentity;
pub use ownership::check_ownership;
pub use relation::{APP_NAMESPACE, RelationTuple};
pub use roles::Role;
