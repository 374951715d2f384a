//! Tenant isolation: every authenticated request is bound to exactly one
//! college before any handler runs.

use std::sync::Arc;

use campus_auth::{AuthError, AuthResult, ResolvedIdentity, reason};
use campus_core::TenantId;

use crate::store::TenantStore;

#[derive(Clone)]
pub enum TenantGuard {
    /// Accept the identity's tenant reference as-is: numeric references become
    /// internal ids, anything else passes through opaque.
    Trusting,
    /// Verify the reference against the tenant directory on every request.
    Strict(Arc<dyn TenantStore>),
}

impl core::fmt::Debug for TenantGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TenantGuard::Trusting => f.write_str("TenantGuard::Trusting"),
            TenantGuard::Strict(_) => f.write_str("TenantGuard::Strict"),
        }
    }
}

impl TenantGuard {
    pub async fn require_tenant(&self, resolved: &ResolvedIdentity) -> AuthResult<TenantId> {
        let external_ref = resolved.external_tenant_ref.trim();
        if external_ref.is_empty() {
            tracing::info!(subject = %resolved.external_id, "identity carries no tenant reference");
            return Err(AuthError::MalformedInput(reason::MISSING_TENANT));
        }

        match self {
            TenantGuard::Trusting => Ok(match external_ref.parse::<i64>() {
                Ok(id) => TenantId::Id(id),
                Err(_) => TenantId::Opaque(external_ref.to_string()),
            }),
            TenantGuard::Strict(tenants) => verify(tenants.as_ref(), external_ref)
                .await
                .map(TenantId::Id),
        }
    }
}

async fn verify(tenants: &dyn TenantStore, external_ref: &str) -> AuthResult<i64> {
    let unverifiable = |detail: &str| {
        tracing::warn!(tenant_ref = %external_ref, detail, "tenant could not be verified");
        AuthError::Forbidden(reason::TENANT_UNVERIFIABLE)
    };

    match tenants.get_by_external_ref(external_ref).await {
        Ok(Some(tenant)) => return Ok(tenant.id),
        Ok(None) => {}
        Err(e) => return Err(unverifiable(&e.to_string())),
    }

    let id = external_ref
        .parse::<i64>()
        .map_err(|_| unverifiable("unknown reference"))?;
    match tenants.get_by_id(id).await {
        Ok(Some(tenant)) => Ok(tenant.id),
        Ok(None) => Err(unverifiable("unknown id")),
        Err(e) => Err(unverifiable(&e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTenantStore, Tenant};
    use campus_auth::Role;

    fn identity(tenant_ref: &str) -> ResolvedIdentity {
        ResolvedIdentity::new("ext-1", Role::Admin)
            .unwrap()
            .with_tenant_ref(tenant_ref)
    }

    fn strict() -> TenantGuard {
        TenantGuard::Strict(Arc::new(InMemoryTenantStore::with_tenants([
            Tenant {
                id: 42,
                external_ref: Some("org_abc".into()),
                name: "North".into(),
            },
            Tenant {
                id: 7,
                external_ref: None,
                name: "South".into(),
            },
        ])))
    }

    #[tokio::test]
    async fn empty_reference_is_malformed_in_both_modes() {
        for guard in [TenantGuard::Trusting, strict()] {
            assert_eq!(
                guard.require_tenant(&identity("  ")).await,
                Err(AuthError::MalformedInput(reason::MISSING_TENANT))
            );
        }
    }

    #[tokio::test]
    async fn trusting_mode_parses_or_passes_through() {
        let guard = TenantGuard::Trusting;
        assert_eq!(guard.require_tenant(&identity("12")).await, Ok(TenantId::Id(12)));
        assert_eq!(
            guard.require_tenant(&identity("org_abc")).await,
            Ok(TenantId::Opaque("org_abc".into()))
        );
    }

    #[tokio::test]
    async fn strict_mode_maps_references_and_verifies_ids() {
        let guard = strict();
        assert_eq!(guard.require_tenant(&identity("org_abc")).await, Ok(TenantId::Id(42)));
        assert_eq!(guard.require_tenant(&identity("7")).await, Ok(TenantId::Id(7)));
        assert_eq!(
            guard.require_tenant(&identity("8")).await,
            Err(AuthError::Forbidden(reason::TENANT_UNVERIFIABLE))
        );
        assert_eq!(
            guard.require_tenant(&identity("org_zzz")).await,
            Err(AuthError::Forbidden(reason::TENANT_UNVERIFIABLE))
        );
    }
}
