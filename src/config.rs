/// Configuration management for Repair Desk
use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub challenge: ChallengeConfig,
    pub email: EmailConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    pub bootstrap: BootstrapConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Whether cookies are marked `Secure`
    pub secure_cookies: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of an established session in seconds
    pub session_ttl: u64,
}

/// One-time code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Code validity in seconds
    pub code_ttl: u64,
    /// Number of digits in a code
    pub code_digits: u32,
    /// How long the pending-state holder survives between start and verify
    pub pending_ttl: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            code_ttl: 300,
            code_digits: 6,
            pending_ttl: 1800,
        }
    }
}

/// Email configuration
///
/// Fields are optional; a missing host, credential or sender is reported as
/// `DeliveryError::Misconfigured` when a code is sent, see [`crate::mailer::Mailer`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

/// Expiring store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL; the in-process store is used when absent
    pub redis_url: Option<String>,
    /// Key prefix for all entries
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "desk:".to_string(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Challenge starts (each sends an email) per minute
    pub challenge_requests_per_minute: u32,
    /// Everything else per second
    pub general_requests_per_second: u32,
    /// Peers whose `X-Forwarded-For` header is believed
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            challenge_requests_per_minute: 30,
            general_requests_per_second: 100,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Out-of-band provisioning of the first staff account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// (identifier, display_name)
    pub admin: Option<(String, String)>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_ip_list(value: &str) -> DeskResult<Vec<IpAddr>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| DeskError::Validation(format!("Invalid proxy address: {}", s)))
        })
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DeskResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("DESK_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DESK_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| DeskError::Validation("Invalid port number".to_string()))?;
        let version = env::var("DESK_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let secure_cookies = env_or("DESK_SECURE_COOKIES", false);

        let data_directory: PathBuf = env::var("DESK_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("DESK_ACCOUNT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("desk.sqlite"));

        let jwt_secret = env::var("DESK_JWT_SECRET")
            .map_err(|_| DeskError::Validation("JWT secret required".to_string()))?;
        let session_ttl = env_or("DESK_SESSION_TTL", 14 * 24 * 3600);

        let defaults = ChallengeConfig::default();
        let challenge = ChallengeConfig {
            code_ttl: env_or("DESK_CODE_TTL", defaults.code_ttl),
            code_digits: env_or("DESK_CODE_DIGITS", defaults.code_digits),
            pending_ttl: env_or("DESK_PENDING_TTL", defaults.pending_ttl),
        };

        let email = EmailConfig {
            host: env_opt("DESK_EMAIL_HOST"),
            port: env::var("DESK_EMAIL_PORT").ok().and_then(|p| p.parse().ok()),
            username: env_opt("DESK_EMAIL_HOST_USER"),
            password: env_opt("DESK_EMAIL_HOST_PASSWORD"),
            from_address: env_opt("DESK_EMAIL_FROM_ADDRESS")
                .or_else(|| env_opt("DESK_EMAIL_HOST_USER")),
        };

        let cache = CacheConfig {
            redis_url: env_opt("DESK_REDIS_URL"),
            key_prefix: env::var("DESK_CACHE_KEY_PREFIX").unwrap_or_else(|_| "desk:".to_string()),
        };

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            enabled: env_or("DESK_RATE_LIMITS_ENABLED", rate_defaults.enabled),
            challenge_requests_per_minute: env_or(
                "DESK_RATE_LIMIT_CHALLENGES_PER_MINUTE",
                rate_defaults.challenge_requests_per_minute,
            ),
            general_requests_per_second: env_or(
                "DESK_RATE_LIMIT_REQUESTS_PER_SECOND",
                rate_defaults.general_requests_per_second,
            ),
            // DESK_TRUSTED_PROXIES=10.0.0.1,10.0.0.2
            trusted_proxies: env_opt("DESK_TRUSTED_PROXIES")
                .map(|v| parse_ip_list(&v))
                .transpose()?
                .unwrap_or_default(),
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "repair_desk=debug,tower_http=debug".to_string());
        let log_json = env_or("DESK_LOG_FORMAT", "text".to_string()) == "json";

        // DESK_BOOTSTRAP_ADMIN=admin@example.com,Admin
        let bootstrap = BootstrapConfig {
            admin: env_opt("DESK_BOOTSTRAP_ADMIN").and_then(|v| {
                v.split_once(',')
                    .map(|(email, name)| (email.trim().to_string(), name.trim().to_string()))
            }),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                secure_cookies,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl,
            },
            challenge,
            email,
            cache,
            rate_limit,
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
            bootstrap,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> DeskResult<()> {
        if self.service.hostname.is_empty() {
            return Err(DeskError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(DeskError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.challenge.code_ttl == 0 {
            return Err(DeskError::Validation("Code TTL must be positive".to_string()));
        }

        if !(4..=9).contains(&self.challenge.code_digits) {
            return Err(DeskError::Validation(
                "Code width must be between 4 and 9 digits".to_string(),
            ));
        }

        // A code must stay redeemable for its whole TTL
        if self.challenge.pending_ttl < self.challenge.code_ttl {
            return Err(DeskError::Validation(
                "Pending TTL must not be shorter than the code TTL".to_string(),
            ));
        }

        Ok(())
    }

    /// Minimal configuration for tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8000,
                version: "0.1.0".to_string(),
                secure_cookies: false,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                account_db: PathBuf::from(":memory:"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only".to_string(),
                session_ttl: 3600,
            },
            challenge: ChallengeConfig::default(),
            email: EmailConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            bootstrap: BootstrapConfig::default(),
        }
    }
}
