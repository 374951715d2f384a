//! Runtime configuration, read from the environment.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use campus_infra::ReactivationPolicy;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ISSUER: &str = "campus-gateway";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required when {reason}")]
    Missing { key: &'static str, reason: &'static str },

    #[error("{key} has an invalid value: {detail}")]
    Invalid { key: &'static str, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantMode {
    #[default]
    Trusting,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Settings {
    pub public_url: Url,
    pub admin_url: Url,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub oauth2: Option<OAuth2Settings>,
    pub session_whoami_url: Option<Url>,
    pub relations_read_url: Option<Url>,
    pub relations_write_url: Option<Url>,
    pub tenant_mode: TenantMode,
    pub reactivation_policy: ReactivationPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_addr = parse("BIND_ADDR", get("BIND_ADDR").as_deref().unwrap_or(DEFAULT_BIND_ADDR))?;
        let access_ttl_minutes = get("ACCESS_TOKEN_TTL_MINUTES")
            .map(|v| parse_positive("ACCESS_TOKEN_TTL_MINUTES", &v))
            .transpose()?
            .unwrap_or(15);
        let refresh_ttl_hours = get("REFRESH_TOKEN_TTL_HOURS")
            .map(|v| parse_positive("REFRESH_TOKEN_TTL_HOURS", &v))
            .transpose()?
            .unwrap_or(24 * 7);

        let use_persistent_stores = get("USE_PERSISTENT_STORES")
            .map(|v| parse_flag("USE_PERSISTENT_STORES", &v))
            .transpose()?
            .unwrap_or(false);
        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES=true",
            });
        }

        let tenant_mode = match get("TENANT_MODE").as_deref() {
            None => TenantMode::default(),
            Some(v) if v.eq_ignore_ascii_case("trusting") => TenantMode::Trusting,
            Some(v) if v.eq_ignore_ascii_case("strict") => TenantMode::Strict,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TENANT_MODE",
                    detail: format!("expected trusting|strict, got '{other}'"),
                });
            }
        };

        let reactivation_policy = get("REACTIVATION_POLICY")
            .map(|v| parse::<ReactivationPolicy>("REACTIVATION_POLICY", &v))
            .transpose()?
            .unwrap_or_default();

        let oauth2 = match get("OAUTH2_PUBLIC_URL") {
            None => None,
            Some(public) => Some(OAuth2Settings {
                public_url: parse_base_url("OAUTH2_PUBLIC_URL", &public)?,
                admin_url: parse_base_url(
                    "OAUTH2_ADMIN_URL",
                    &get("OAUTH2_ADMIN_URL").ok_or(ConfigError::Missing {
                        key: "OAUTH2_ADMIN_URL",
                        reason: "OAUTH2_PUBLIC_URL is set",
                    })?,
                )?,
                client_id: get("OAUTH2_CLIENT_ID").ok_or(ConfigError::Missing {
                    key: "OAUTH2_CLIENT_ID",
                    reason: "OAUTH2_PUBLIC_URL is set",
                })?,
                client_secret: get("OAUTH2_CLIENT_SECRET"),
                redirect_uri: get("OAUTH2_REDIRECT_URI").ok_or(ConfigError::Missing {
                    key: "OAUTH2_REDIRECT_URI",
                    reason: "OAUTH2_PUBLIC_URL is set",
                })?,
            }),
        };

        let session_whoami_url = get("SESSION_WHOAMI_URL")
            .map(|v| parse::<Url>("SESSION_WHOAMI_URL", &v))
            .transpose()?;
        let relations_read_url = get("RELATIONS_READ_URL")
            .map(|v| parse_base_url("RELATIONS_READ_URL", &v))
            .transpose()?;
        let relations_write_url = get("RELATIONS_WRITE_URL")
            .map(|v| parse_base_url("RELATIONS_WRITE_URL", &v))
            .transpose()?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            access_ttl_minutes,
            refresh_ttl_hours,
            use_persistent_stores,
            database_url,
            redis_url: get("REDIS_URL"),
            oauth2,
            session_whoami_url,
            relations_read_url,
            relations_write_url,
            tenant_mode,
            reactivation_policy,
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        detail: e.to_string(),
    })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<i64, ConfigError> {
    match parse::<i64>(key, raw)? {
        n if n > 0 => Ok(n),
        n => Err(ConfigError::Invalid {
            key,
            detail: format!("must be positive, got {n}"),
        }),
    }
}

/// Accepts the usual spellings of a boolean switch; anything else is an error
/// rather than a silent `false`.
fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            detail: format!("expected true|false, got '{other}'"),
        }),
    }
}

/// Base URLs are joined with relative paths, so they must end in `/`.
fn parse_base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    if raw.ends_with('/') {
        parse(key, raw)
    } else {
        parse(key, &format!("{raw}/"))
    }
}
