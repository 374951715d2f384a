//! Token lifecycle and the OAuth2 authorization-code login.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};

use campus_auth::{AuthError, CredentialScheme, reason};
use campus_infra::{IdentitySource, OAuth2Client, TokenPair};

use crate::app::dto::{CallbackQuery, LogoutRequest, RefreshRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::middleware::extract_credential;

pub fn router(oauth2_enabled: bool) -> Router {
    let router = Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout));

    if oauth2_enabled {
        router
            .route("/oauth2/login", get(oauth2_login))
            .route("/oauth2/callback", get(oauth2_callback))
    } else {
        router
    }
}

/// POST /auth/refresh
///
/// Refresh tokens from an OAuth2 login also renew the upstream grant, so a
/// session the authorization server has ended cannot be extended locally.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    if body.refresh_token.trim().is_empty() {
        return Err(AuthError::MalformedInput(reason::MISSING_PARAMETER).into());
    }
    let record = services.tokens.redeem(&body.refresh_token).await?;

    let upstream = match (record.upstream_refresh_token, services.oauth2.as_ref()) {
        (Some(upstream), Some(client)) => {
            let renewed = client.refresh(&upstream).await.map_err(AuthError::from)?;
            // Servers that do not rotate keep the old refresh token valid.
            Some(renewed.refresh_token.unwrap_or(upstream))
        }
        (upstream, _) => upstream,
    };

    let pair = services
        .tokens
        .issue_linked_pair(&record.identity, upstream)
        .await?;
    Ok(Json(pair))
}

/// POST /auth/logout
///
/// Needs the access token being retired as a bearer credential; the body may
/// name a refresh token to drop along with it. A dropped refresh token from
/// an OAuth2 login is also revoked at the authorization server.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<axum::http::StatusCode, ApiError> {
    let token = extract_credential(&headers, CredentialScheme::Bearer)?;
    let claims = services.local_source.verify_claims(&token).await?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let dropped = services
        .tokens
        .logout(&claims, body.refresh_token.as_deref())
        .await?;

    let upstream = dropped.and_then(|record| record.upstream_refresh_token);
    if let (Some(upstream), Some(client)) = (upstream, services.oauth2.as_ref()) {
        // The local session is already gone; an upstream failure only leaves
        // the grant to expire on its own.
        if let Err(e) = client.revoke(&upstream).await {
            tracing::warn!(subject = %claims.sub, error = %e, "upstream revocation failed");
        }
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

fn oauth2_client(services: &AppServices) -> Result<&Arc<OAuth2Client>, AuthError> {
    services.oauth2.as_ref().ok_or_else(|| {
        tracing::error!("oauth2 route reached without a configured client");
        AuthError::Upstream(reason::AUTHORIZATION_SERVER_UNAVAILABLE)
    })
}

/// GET /auth/oauth2/login
pub async fn oauth2_login(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Redirect, ApiError> {
    let client = oauth2_client(&services)?;
    let (state, nonce) = services.pending_logins.begin();
    Ok(Redirect::to(client.authorization_url(&state, &nonce).as_str()))
}

/// GET /auth/oauth2/callback
///
/// Exchanges the code, introspects the resulting access token the same way
/// the `/oauth` route group does (topped up from userinfo), provisions, and
/// hands back a local pair linked to the upstream refresh token.
pub async fn oauth2_callback(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<TokenPair>, ApiError> {
    let client = oauth2_client(&services)?;

    if let Some(error) = query.error.as_deref() {
        tracing::info!(%error, "authorization server refused the login");
        return Err(AuthError::Unauthenticated(reason::CREDENTIAL_REJECTED).into());
    }
    let (Some(code), Some(state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return Err(AuthError::MalformedInput(reason::MISSING_PARAMETER).into());
    };
    if services.pending_logins.complete(state).is_none() {
        return Err(AuthError::MalformedInput(reason::INVALID_STATE).into());
    }

    let tokens = client.exchange_code(code).await.map_err(AuthError::from)?;
    let mut identity = client.resolve(&tokens.access_token).await?;
    client
        .complete_from_userinfo(&mut identity, &tokens.access_token)
        .await;
    if let Some(local_id) = services.provisioner.ensure_local_identity(&identity).await? {
        identity.local_user_id = Some(local_id);
    }

    tracing::info!(subject = %identity.external_id, "oauth2 login completed");
    let pair = services
        .tokens
        .issue_linked_pair(&identity, tokens.refresh_token)
        .await?;
    Ok(Json(pair))
}
