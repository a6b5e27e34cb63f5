/// Configuration management for Community Service
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// by the binary first). Unparseable values are errors rather than silently
/// defaulted.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::middleware::{ModerationPolicy, OrganizerScope};
use crate::services::ServiceSettings;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    /// Absent when running on the in-memory store
    pub database: Option<DatabaseConfig>,
    pub store: StoreConfig,
    pub feed: FeedConfig,
    pub profiles: ProfileConfig,
    pub moderation: ModerationConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Per-operation storage deadline
    pub timeout_ms: u64,
    pub like_toggle_max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Unset means full scan
    pub default_page_size: Option<usize>,
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// 0 disables caching
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    pub organizer_scope: OrganizerScope,
    pub mask_forbidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// PEM-encoded RSA public key for RS256 verification
    #[serde(skip_serializing)]
    pub jwt_public_key_pem: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let app_env = var("APP_ENV").unwrap_or_else(|| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let app = AppConfig {
            env: app_env,
            host: var("COMMUNITY_SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("COMMUNITY_SERVICE_PORT", var("COMMUNITY_SERVICE_PORT"), 8085)?,
        };

        let cors = {
            let allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
                Some(value) => value,
                None if production => {
                    return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                }
                None => "http://localhost:3000".to_string(),
            };

            if production && allowed_origins.trim() == "*" {
                return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
            }

            CorsConfig { allowed_origins }
        };

        let database = match var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    var("DATABASE_MAX_CONNECTIONS"),
                    10,
                )?,
            }),
            None => None,
        };

        let store = StoreConfig {
            timeout_ms: parse_or("STORE_TIMEOUT_MS", var("STORE_TIMEOUT_MS"), 2_000)?,
            like_toggle_max_attempts: parse_or(
                "LIKE_TOGGLE_MAX_ATTEMPTS",
                var("LIKE_TOGGLE_MAX_ATTEMPTS"),
                5,
            )?,
        };
        if store.like_toggle_max_attempts == 0 {
            return Err("LIKE_TOGGLE_MAX_ATTEMPTS must be at least 1".to_string());
        }

        let feed = FeedConfig {
            default_page_size: var("FEED_DEFAULT_PAGE_SIZE")
                .map(|v| parse("FEED_DEFAULT_PAGE_SIZE", &v))
                .transpose()?,
            max_page_size: parse_or("FEED_MAX_PAGE_SIZE", var("FEED_MAX_PAGE_SIZE"), 500)?,
        };
        if feed.max_page_size == 0 {
            return Err("FEED_MAX_PAGE_SIZE must be at least 1".to_string());
        }

        let profiles = ProfileConfig {
            cache_ttl_secs: parse_or(
                "PROFILE_CACHE_TTL_SECS",
                var("PROFILE_CACHE_TTL_SECS"),
                60,
            )?,
            cache_max_entries: parse_or(
                "PROFILE_CACHE_MAX_ENTRIES",
                var("PROFILE_CACHE_MAX_ENTRIES"),
                10_000,
            )?,
        };
        if profiles.cache_max_entries == 0 {
            return Err("PROFILE_CACHE_MAX_ENTRIES must be at least 1".to_string());
        }

        let moderation = ModerationConfig {
            organizer_scope: var("MODERATION_ORGANIZER_SCOPE")
                .map(|v| v.parse::<OrganizerScope>())
                .transpose()?
                .unwrap_or_default(),
            mask_forbidden: parse_or(
                "MODERATION_MASK_FORBIDDEN",
                var("MODERATION_MASK_FORBIDDEN"),
                false,
            )?,
        };

        let auth = AuthConfig {
            jwt_public_key_pem: var(crypto_core::jwt::PUBLIC_KEY_ENV),
        };
        if production && auth.jwt_public_key_pem.is_none() {
            return Err(format!(
                "{} must be set in production",
                crypto_core::jwt::PUBLIC_KEY_ENV
            ));
        }

        let realtime = RealtimeConfig {
            channel_capacity: parse_or(
                "REALTIME_CHANNEL_CAPACITY",
                var("REALTIME_CHANNEL_CAPACITY"),
                256,
            )?,
        };

        Ok(Config {
            app,
            cors,
            database,
            store,
            feed,
            profiles,
            moderation,
            auth,
            realtime,
        })
    }

    pub fn moderation_policy(&self) -> ModerationPolicy {
        ModerationPolicy {
            organizer_scope: self.moderation.organizer_scope,
            mask_forbidden_as_not_found: self.moderation.mask_forbidden,
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            like_toggle_max_attempts: self.store.like_toggle_max_attempts,
            feed_default_page_size: self.feed.default_page_size,
            feed_max_page_size: self.feed.max_page_size,
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("Failed to parse {}='{}': {}", key, value, e))
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => parse(key, &value),
        None => Ok(default),
    }
}
