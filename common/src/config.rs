// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};
use thiserror::Error;

use crate::network::Network;

/// Minimum length of the secret used to seal session cookies
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Central configuration for the auth server and the onboarding gate
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub onboarding: OnboardingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Server-held secret sealing the client-held session record
    pub session_secret: Option<String>,
    /// The single chain id accepted in SIWE messages
    pub chain_id: Option<u64>,
    /// Expected SIWE domain (host[:port])
    pub domain: Option<String>,
    /// JSON-RPC endpoint used for contract-wallet validation
    pub rpc_url: Option<String>,
    pub cookie_name: String,
    pub session_max_age_secs: i64,
    pub nonce_ttl_secs: i64,
    pub nonce_cache_max_age_secs: u32,
    /// How often expired nonces and lapsed revocations are swept
    pub nonce_cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub paths: Vec<String>,
    pub max_requests: usize,
    pub window_secs: u64,
    /// Key on `X-Forwarded-For`/`Forwarded` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_for: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingConfig {
    /// Pause between detecting readiness and firing the completion callback
    pub settle_delay_ms: u64,
    pub retry: RetryConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Deployment problem that must be fixed by an operator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("SESSION_SECRET is not set")]
    MissingSessionSecret,

    #[error("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes long")]
    WeakSessionSecret,

    #[error("CHAIN_ID is not set")]
    MissingChainId,

    #[error("SIWE_DOMAIN is not set")]
    MissingDomain,

    #[error("invalid RPC url: {0}")]
    InvalidRpcUrl(String),
}

/// Auth settings after validation. Only produced by [`AuthConfig::validate`].
#[derive(Clone, Debug)]
pub struct ValidatedAuthConfig {
    pub session_secret: Vec<u8>,
    pub chain_id: u64,
    pub domain: String,
    pub rpc_url: Option<String>,
    pub cookie_name: String,
    pub session_max_age_secs: i64,
    pub nonce_ttl_secs: i64,
    pub nonce_cache_max_age_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            onboarding: OnboardingConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            chain_id: None,
            domain: None,
            rpc_url: None,
            cookie_name: "siwe_session".to_string(),
            session_max_age_secs: 86400,
            nonce_ttl_secs: 600,
            nonce_cache_max_age_secs: 0,
            nonce_cleanup_interval_secs: 60,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            paths: vec!["/auth/".to_string()],
            max_requests: 20,
            window_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl AuthConfig {
    /// Check that everything needed to issue and verify challenges is present.
    pub fn validate(&self) -> Result<ValidatedAuthConfig, ConfigurationError> {
        let secret = self
            .session_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigurationError::MissingSessionSecret)?;
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigurationError::WeakSessionSecret);
        }

        let chain_id = self.chain_id.ok_or(ConfigurationError::MissingChainId)?;

        let domain = self
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ConfigurationError::MissingDomain)?;

        // Fall back to the public RPC of a known network
        let rpc_url = match &self.rpc_url {
            Some(raw) => {
                url::Url::parse(raw).map_err(|e| ConfigurationError::InvalidRpcUrl(e.to_string()))?;
                Some(raw.clone())
            }
            None => Network::from_chain_id(chain_id).map(|n| n.default_rpc_url().to_string()),
        };

        Ok(ValidatedAuthConfig {
            session_secret: secret.as_bytes().to_vec(),
            chain_id,
            domain: domain.to_string(),
            rpc_url,
            cookie_name: self.cookie_name.clone(),
            session_max_age_secs: self.session_max_age_secs,
            nonce_ttl_secs: self.nonce_ttl_secs,
            nonce_cache_max_age_secs: self.nonce_cache_max_age_secs,
        })
    }
}

impl OnboardingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // e.g. APP_AUTH__CHAIN_ID=2741
            .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to flat environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }

                config.auth.session_secret = env::var("SESSION_SECRET").ok();
                config.auth.chain_id = env::var("CHAIN_ID")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok());
                config.auth.domain = env::var("SIWE_DOMAIN").ok();
                config.auth.rpc_url = env::var("RPC_URL").ok();

                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_auth() -> AuthConfig {
        AuthConfig {
            session_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
            chain_id: Some(2741),
            domain: Some("app.example.com".to_string()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_validate_complete_config() {
        let validated = complete_auth().validate().unwrap();
        assert_eq!(validated.chain_id, 2741);
        assert_eq!(validated.domain, "app.example.com");
        // Known network fills in its public RPC
        assert_eq!(validated.rpc_url.as_deref(), Some("https://api.mainnet.abs.xyz"));
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let mut auth = complete_auth();
        auth.session_secret = None;
        assert_eq!(auth.validate().unwrap_err(), ConfigurationError::MissingSessionSecret);
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let mut auth = complete_auth();
        auth.session_secret = Some("too-short".to_string());
        assert_eq!(auth.validate().unwrap_err(), ConfigurationError::WeakSessionSecret);
    }

    #[test]
    fn test_missing_chain_and_domain() {
        let mut auth = complete_auth();
        auth.chain_id = None;
        assert_eq!(auth.validate().unwrap_err(), ConfigurationError::MissingChainId);

        let mut auth = complete_auth();
        auth.domain = Some("  ".to_string());
        assert_eq!(auth.validate().unwrap_err(), ConfigurationError::MissingDomain);
    }

    #[test]
    fn test_unknown_chain_without_rpc() {
        let mut auth = complete_auth();
        auth.chain_id = Some(31337);
        assert!(auth.validate().unwrap().rpc_url.is_none());

        auth.rpc_url = Some("not a url".to_string());
        assert!(matches!(auth.validate(), Err(ConfigurationError::InvalidRpcUrl(_))));
    }

    #[test]
    fn test_rate_limit_keys_on_peer_by_default() {
        let config = Config::default();
        assert!(!config.rate_limit.trust_forwarded_for);
        assert_eq!(config.auth.nonce_cleanup_interval_secs, 60);
    }
}
