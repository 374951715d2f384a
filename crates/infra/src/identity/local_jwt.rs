use std::sync::Arc;

use async_trait::async_trait;

use campus_auth::{
    AuthError, AuthResult, CredentialScheme, LocalClaims, LocalJwt, ResolvedIdentity, reason,
};

use super::IdentitySource;
use crate::tokens::TokenStore;

/// Verifies tokens this gateway signed itself.
#[derive(Clone)]
pub struct LocalJwtSource {
    jwt: Arc<LocalJwt>,
    revocations: Option<Arc<dyn TokenStore>>,
}

impl LocalJwtSource {
    pub fn new(jwt: Arc<LocalJwt>) -> Self {
        Self {
            jwt,
            revocations: None,
        }
    }

    /// Also reject tokens whose id has been revoked (logout).
    pub fn with_revocations(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.revocations = Some(store);
        self
    }

    /// Verify and return the raw claims, including the revocation check.
    pub async fn verify_claims(&self, token: &str) -> AuthResult<LocalClaims> {
        let claims = self.jwt.verify(token).inspect_err(|e| {
            tracing::debug!(reason = e.reason(), "local token rejected");
        })?;

        if let Some(store) = &self.revocations {
            if store.is_revoked(&claims.jti).await? {
                tracing::info!(jti = %claims.jti, "revoked local token presented");
                return Err(AuthError::Unauthenticated(reason::TOKEN_REVOKED));
            }
        }
        Ok(claims)
    }
}

#[async_trait]
impl IdentitySource for LocalJwtSource {
    fn name(&self) -> &'static str {
        "local_jwt"
    }

    fn scheme(&self) -> CredentialScheme {
        CredentialScheme::Bearer
    }

    async fn resolve(&self, credential: &str) -> AuthResult<ResolvedIdentity> {
        self.verify_claims(credential).await?.into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::InMemoryTokenStore;
    use campus_auth::Role;
    use campus_core::UserId;
    use chrono::{Duration, Utc};

    fn jwt() -> Arc<LocalJwt> {
        Arc::new(LocalJwt::new(b"local-src", "campus", Duration::minutes(10)))
    }

    #[tokio::test]
    async fn embedded_claims_are_trusted() {
        let jwt = jwt();
        let identity = ResolvedIdentity::new("ext-5", Role::Faculty)
            .unwrap()
            .with_tenant_ref("3")
            .with_local_user_id(Some(UserId::new(44).unwrap()));
        let token = jwt.generate(&identity).unwrap().token;

        let resolved = LocalJwtSource::new(jwt).resolve(&token).await.unwrap();
        assert_eq!(resolved, identity);
    }

    #[tokio::test]
    async fn foreign_or_garbage_tokens_are_unauthenticated() {
        let other = LocalJwt::new(b"someone-else", "campus", Duration::minutes(10));
        let token = other
            .generate(&ResolvedIdentity::new("ext-1", Role::Admin).unwrap())
            .unwrap()
            .token;

        let source = LocalJwtSource::new(jwt());
        assert_eq!(
            source.resolve(&token).await,
            Err(AuthError::Unauthenticated(reason::INVALID_TOKEN))
        );
        assert_eq!(
            source.resolve("not-a-jwt").await,
            Err(AuthError::Unauthenticated(reason::INVALID_TOKEN))
        );
    }

    #[tokio::test]
    async fn revoked_tokens_are_rejected() {
        let jwt = jwt();
        let store = Arc::new(InMemoryTokenStore::new());
        let issued = jwt
            .generate(&ResolvedIdentity::new("ext-1", Role::Admin).unwrap())
            .unwrap();
        store
            .revoke(&issued.jti, Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        let source = LocalJwtSource::new(jwt).with_revocations(store);
        assert_eq!(
            source.resolve(&issued.token).await,
            Err(AuthError::Unauthenticated(reason::TOKEN_REVOKED))
        );
    }
}
