//! `campus-core`: identifiers shared by every layer of the campus gateway.
//!
//! This crate contains no IO and no policy; it only fixes the shape of the ids
//! that flow between the identity pipeline and the business handlers.

pub mod error;
pub mod id;

pub use error::IdError;
pub use id::{StudentId, TenantId, UserId};
