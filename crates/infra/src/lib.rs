//! Infrastructure layer: stores, remote identity authorities and the stateful
//! parts of the identity pipeline.

pub mod identity;
pub mod provisioning;
pub mod relations;
pub mod store;
pub mod student_loader;
pub mod tenant_guard;
pub mod tokens;

pub use identity::{IdentitySource, LocalJwtSource, OAuth2Client, OAuth2Config, SessionClient};
pub use provisioning::{IdentityProvisioner, ReactivationPolicy, ReactivationPolicyError};
pub use relations::{HttpRelationshipAuthority, InMemoryRelationshipAuthority, RelationshipAuthority};
pub use student_loader::StudentProfileLoader;
pub use tenant_guard::TenantGuard;
pub use tokens::{InMemoryTokenStore, TokenPair, TokenService, TokenStore};
