//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The consumer secret may come from CONSUMER_SECRET, a secret_file, or the
//! TOML itself (in that order). The session cookie key comes from
//! SESSION_KEY or key_file; without one an ephemeral key is generated at
//! startup and sessions do not survive a restart.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use force_auth::OAuthConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Minimum session key length accepted by the cookie encryption.
pub const MIN_SESSION_KEY_BYTES: usize = 64;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// External base URL used to build the OAuth callback. When absent the
    /// callback is derived from each request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Connected-app credentials (`consumer.key` / `consumer.secret`)
#[derive(Debug, Deserialize)]
pub struct ConsumerConfig {
    pub key: String,
    #[serde(default)]
    pub secret: Option<Secret<String>>,
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

/// CRM endpoints and outbound call settings
#[derive(Debug, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session cookie settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub max_age_secs: Option<u64>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Decoded key bytes, resolved from SESSION_KEY or key_file at load time.
    #[serde(skip)]
    pub key: Option<Secret<Vec<u8>>>,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure: false,
            max_age_secs: None,
            key_file: None,
            key: None,
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_login_url() -> String {
    force_auth::SANDBOX_LOGIN_URL.to_string()
}

fn default_api_version() -> String {
    force_api::DEFAULT_API_VERSION.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_cookie_name() -> String {
    "PORTAL_SESSION".to_string()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Consumer secret resolution order:
    /// 1. CONSUMER_SECRET env var
    /// 2. consumer.secret_file
    /// 3. consumer.secret
    ///
    /// Session key resolution order:
    /// 1. SESSION_KEY env var
    /// 2. session.key_file
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.validate()?;

        if let Ok(secret) = std::env::var("CONSUMER_SECRET") {
            config.consumer.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.consumer.secret_file {
            let secret = read_trimmed(secret_file, "consumer.secret_file")?;
            if !secret.is_empty() {
                config.consumer.secret = Some(Secret::new(secret));
            }
        }
        if config
            .consumer
            .secret
            .as_ref()
            .is_none_or(|s| s.expose().is_empty())
        {
            return Err(common::Error::Config(
                "consumer secret missing: set CONSUMER_SECRET, consumer.secret_file or consumer.secret"
                    .into(),
            ));
        }

        let encoded_key = match std::env::var("SESSION_KEY") {
            Ok(key) => Some(key.trim().to_owned()),
            Err(_) => match config.session.key_file {
                Some(ref key_file) => Some(read_trimmed(key_file, "session.key_file")?),
                None => None,
            },
        };
        if let Some(encoded) = encoded_key {
            config.session.key = Some(Secret::new(decode_session_key(&encoded)?));
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.consumer.key.trim().is_empty() {
            return Err(common::Error::Config(
                "consumer.key must not be empty".into(),
            ));
        }

        if !is_http_url(&self.crm.login_url) {
            return Err(common::Error::Config(format!(
                "crm.login_url must start with http:// or https://, got: {}",
                self.crm.login_url
            )));
        }

        if let Some(ref public_url) = self.server.public_url {
            if !is_http_url(public_url) {
                return Err(common::Error::Config(format!(
                    "server.public_url must start with http:// or https://, got: {public_url}"
                )));
            }
        }

        if self.crm.timeout_secs == 0 {
            return Err(common::Error::Config(
                "crm.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Build the OAuth client configuration from the consumer credentials.
    pub fn oauth(&self) -> common::Result<OAuthConfig> {
        let secret = self
            .consumer
            .secret
            .clone()
            .ok_or_else(|| common::Error::Config("consumer secret not resolved".into()))?;
        Ok(OAuthConfig::new(self.consumer.key.trim(), secret).with_login_url(&self.crm.login_url))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("account-portal.toml")
    }
}

fn read_trimmed(path: &Path, field: &str) -> common::Result<String> {
    let value = std::fs::read_to_string(path).map_err(|e| {
        common::Error::Config(format!("failed to read {field} {}: {e}", path.display()))
    })?;
    Ok(value.trim().to_owned())
}

fn decode_session_key(encoded: &str) -> common::Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| common::Error::Config(format!("session key is not valid base64: {e}")))?;
    if bytes.len() < MIN_SESSION_KEY_BYTES {
        return Err(common::Error::Config(format!(
            "session key must be at least {MIN_SESSION_KEY_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
