//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use huddle_shared::constants::{
    DEFAULT_HTTP_PORT, MAX_ASSET_SIZE, VIDEO_MAX_PARTICIPANTS, VIDEO_ROOM_TTL_SECS,
    VIDEO_TIMEOUT_SECS,
};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: unset, meaning the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Directory where uploaded assets are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./assets`
    pub blob_storage_path: PathBuf,

    /// Maximum asset size in bytes.
    /// Env: `MAX_BLOB_SIZE`
    pub max_blob_size: usize,

    /// Base URL clients reach this server at; upload and download URLs are
    /// built from it.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    // -- Video provider --

    /// Env: `VIDEO_API_URL`
    /// Default: `https://api.daily.co/v1`
    pub video_api_url: String,

    /// Bearer token for the provider.  Without it every video room gets a
    /// fallback URL.
    /// Env: `VIDEO_API_KEY`
    pub video_api_key: Option<String>,

    /// Host used to build fallback room URLs.
    /// Env: `VIDEO_FALLBACK_DOMAIN`
    /// Default: `your-domain.daily.co`
    pub video_fallback_domain: String,

    /// Env: `VIDEO_TIMEOUT_SECS`
    pub video_timeout: Duration,

    /// Env: `VIDEO_MAX_PARTICIPANTS`
    pub video_max_participants: u32,

    /// Lifetime of a provider room in seconds.
    /// Env: `VIDEO_ROOM_TTL_SECS`
    pub video_room_ttl_secs: i64,

    /// Expose the demo-user seeding endpoint.
    /// Env: `SEED_TEST_USERS` (true/false)
    /// Default: `false`
    pub seed_test_users: bool,

    /// Let `/auth/signin` open a session for an existing email without any
    /// credential.  Only for local development; when off, that endpoint can
    /// only register new emails.
    /// Env: `DEV_EMAIL_SIGNIN` (true/false)
    /// Default: `false`
    pub dev_email_signin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            blob_storage_path: PathBuf::from("./assets"),
            max_blob_size: MAX_ASSET_SIZE,
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            video_api_url: "https://api.daily.co/v1".to_string(),
            video_api_key: None,
            video_fallback_domain: "your-domain.daily.co".to_string(),
            video_timeout: Duration::from_secs(VIDEO_TIMEOUT_SECS),
            video_max_participants: VIDEO_MAX_PARTICIPANTS,
            video_room_ttl_secs: VIDEO_ROOM_TTL_SECS,
            seed_test_users: false,
            dev_email_signin: false,
        }
    }
}

// The API key stays out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("blob_storage_path", &self.blob_storage_path)
            .field("max_blob_size", &self.max_blob_size)
            .field("public_base_url", &self.public_base_url)
            .field("video_api_url", &self.video_api_url)
            .field("video_api_key", &self.video_api_key.as_ref().map(|_| "<redacted>"))
            .field("video_fallback_domain", &self.video_fallback_domain)
            .field("video_timeout", &self.video_timeout)
            .field("video_max_participants", &self.video_max_participants)
            .field("video_room_ttl_secs", &self.video_room_ttl_secs)
            .field("seed_test_users", &self.seed_test_users)
            .field("dev_email_signin", &self.dev_email_signin)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        parse_into(&lookup, "HTTP_ADDR", &mut config.http_addr);

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        parse_into(&lookup, "MAX_BLOB_SIZE", &mut config.max_blob_size);

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        // -- Video provider --

        if let Some(url) = lookup("VIDEO_API_URL") {
            config.video_api_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = lookup("VIDEO_API_KEY") {
            if !key.is_empty() {
                config.video_api_key = Some(key);
            }
        }

        if let Some(domain) = lookup("VIDEO_FALLBACK_DOMAIN") {
            config.video_fallback_domain = domain;
        }

        let mut timeout_secs = config.video_timeout.as_secs();
        parse_into(&lookup, "VIDEO_TIMEOUT_SECS", &mut timeout_secs);
        config.video_timeout = Duration::from_secs(timeout_secs.max(1));

        parse_into(
            &lookup,
            "VIDEO_MAX_PARTICIPANTS",
            &mut config.video_max_participants,
        );
        parse_into(&lookup, "VIDEO_ROOM_TTL_SECS", &mut config.video_room_ttl_secs);

        if let Some(val) = lookup("SEED_TEST_USERS") {
            config.seed_test_users = val == "true" || val == "1";
        }

        if let Some(val) = lookup("DEV_EMAIL_SIGNIN") {
            config.dev_email_signin = val == "true" || val == "1";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Overwrite `target` with the parsed value of `key`, keeping the default
/// (and warning) when the value does not parse.
fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "invalid value, using default"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.database_path.is_none());
        assert!(config.video_api_key.is_none());
        assert!(!config.seed_test_users);
        assert!(!config.dev_email_signin);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/h.db"),
            ("PUBLIC_BASE_URL", "https://chat.example.com/"),
            ("VIDEO_API_KEY", "secret"),
            ("VIDEO_TIMEOUT_SECS", "3"),
            ("SEED_TEST_USERS", "true"),
            ("DEV_EMAIL_SIGNIN", "1"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/h.db")));
        assert_eq!(config.public_base_url, "https://chat.example.com");
        assert_eq!(config.video_api_key.as_deref(), Some("secret"));
        assert_eq!(config.video_timeout, Duration::from_secs(3));
        assert!(config.seed_test_users);
        assert!(config.dev_email_signin);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[("HTTP_ADDR", "nope"), ("MAX_BLOB_SIZE", "-1")]);
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.max_blob_size, MAX_ASSET_SIZE);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config_from(&[("VIDEO_API_KEY", "hunter2")]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
