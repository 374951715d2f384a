//! Relationship authority: the remote relation-tuple store holding role
//! memberships and fine-grained permission facts.
//!
//! Nothing is cached locally; every check is a round trip.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use campus_auth::{AuthError, AuthResult, RelationTuple, ResolvedIdentity, Role, reason};

#[async_trait]
pub trait RelationshipAuthority: Send + Sync {
    async fn check(&self, tuple: &RelationTuple) -> AuthResult<bool>;

    /// Idempotent: an already existing tuple is success.
    async fn create(&self, tuple: &RelationTuple) -> AuthResult<()>;

    /// Idempotent: a missing tuple is success.
    async fn delete(&self, tuple: &RelationTuple) -> AuthResult<()>;

    async fn check_permission(
        &self,
        identity: &ResolvedIdentity,
        action: &str,
        resource: &str,
    ) -> AuthResult<bool> {
        self.check(&RelationTuple::permission(resource, action, &identity.external_id))
            .await
    }

    async fn check_role_membership(&self, subject: &str, role: Role) -> AuthResult<bool> {
        self.check(&RelationTuple::role_membership(role, subject)).await
    }

    async fn grant_role(&self, subject: &str, role: Role) -> AuthResult<()> {
        self.create(&RelationTuple::role_membership(role, subject)).await
    }

    async fn revoke_role(&self, subject: &str, role: Role) -> AuthResult<()> {
        self.delete(&RelationTuple::role_membership(role, subject)).await
    }

    async fn grant_permission(&self, subject: &str, action: &str, resource: &str) -> AuthResult<()> {
        self.create(&RelationTuple::permission(resource, action, subject)).await
    }

    async fn revoke_permission(&self, subject: &str, action: &str, resource: &str) -> AuthResult<()> {
        self.delete(&RelationTuple::permission(resource, action, subject)).await
    }
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

fn unavailable(operation: &'static str, detail: impl std::fmt::Display) -> AuthError {
    tracing::error!(operation, error = %detail, "relationship authority call failed");
    AuthError::Upstream(reason::RELATIONSHIP_AUTHORITY_UNAVAILABLE)
}

fn tuple_query(tuple: &RelationTuple) -> [(&'static str, &str); 4] {
    [
        ("namespace", tuple.namespace.as_str()),
        ("object", tuple.object.as_str()),
        ("relation", tuple.relation.as_str()),
        ("subject_id", tuple.subject_id.as_str()),
    ]
}

/// HTTP client for a read/write split relation-tuple service.
#[derive(Debug, Clone)]
pub struct HttpRelationshipAuthority {
    http: reqwest::Client,
    check_url: Url,
    tuples_url: Url,
}

impl HttpRelationshipAuthority {
    /// `read_base` serves checks, `write_base` serves tuple administration.
    pub fn new(read_base: &Url, write_base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: reqwest::Client::new(),
            check_url: read_base.join("relation-tuples/check")?,
            tuples_url: write_base.join("admin/relation-tuples")?,
        })
    }
}

#[async_trait]
impl RelationshipAuthority for HttpRelationshipAuthority {
    async fn check(&self, tuple: &RelationTuple) -> AuthResult<bool> {
        let response = self
            .http
            .get(self.check_url.clone())
            .query(&tuple_query(tuple))
            .send()
            .await
            .map_err(|e| unavailable("check", e))?;

        let status = response.status();
        // A denied check may come back as 403 with {"allowed": false}.
        if !status.is_success() && status != StatusCode::FORBIDDEN {
            return Err(unavailable("check", status));
        }
        let body: CheckResponse = response.json().await.map_err(|e| unavailable("check", e))?;

        tracing::debug!(%tuple, allowed = body.allowed, "relation check");
        Ok(body.allowed)
    }

    async fn create(&self, tuple: &RelationTuple) -> AuthResult<()> {
        let response = self
            .http
            .put(self.tuples_url.clone())
            .json(tuple)
            .send()
            .await
            .map_err(|e| unavailable("create", e))?;

        match response.status() {
            s if s.is_success() || s == StatusCode::CONFLICT => {
                tracing::info!(%tuple, "relation tuple written");
                Ok(())
            }
            s => Err(unavailable("create", s)),
        }
    }

    async fn delete(&self, tuple: &RelationTuple) -> AuthResult<()> {
        let response = self
            .http
            .delete(self.tuples_url.clone())
            .query(&tuple_query(tuple))
            .send()
            .await
            .map_err(|e| unavailable("delete", e))?;

        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => {
                tracing::info!(%tuple, "relation tuple deleted");
                Ok(())
            }
            s => Err(unavailable("delete", s)),
        }
    }
}

/// Relationship authority held in process memory (dev/tests).
#[derive(Debug, Default)]
pub struct InMemoryRelationshipAuthority {
    tuples: RwLock<HashSet<RelationTuple>>,
}

impl InMemoryRelationshipAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tuples.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AuthError {
    unavailable("lock", "poisoned")
}

#[async_trait]
impl RelationshipAuthority for InMemoryRelationshipAuthority {
    async fn check(&self, tuple: &RelationTuple) -> AuthResult<bool> {
        Ok(self.tuples.read().map_err(|_| poisoned())?.contains(tuple))
    }

    async fn create(&self, tuple: &RelationTuple) -> AuthResult<()> {
        self.tuples.write().map_err(|_| poisoned())?.insert(tuple.clone());
        Ok(())
    }

    async fn delete(&self, tuple: &RelationTuple) -> AuthResult<()> {
        self.tuples.write().map_err(|_| poisoned())?.remove(tuple);
        Ok(())
    }
}
