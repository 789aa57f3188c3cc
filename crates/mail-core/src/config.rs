//! Configuration management for the mail admin API.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub auth: AuthSettings,
}

/// Settings consumed by the authentication subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Read-write API key for full administrative access.
    pub api_key: String,
    /// Optional read-only API key.
    pub api_key_read_only: Option<String>,
    /// Optional IP allow-list applied to both keys (exact addresses or
    /// IPv4 CIDR patterns, e.g. "10.0.0.0/8").
    pub allowed_ips: Vec<String>,
    /// Session lifetime in seconds.
    pub session_timeout_secs: u64,
    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
    /// Requests allowed per rate-limit window.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window size in seconds.
    pub rate_limit_window_secs: u64,
    /// Interval between expired-session sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_read_only: None,
            allowed_ips: Vec::new(),
            session_timeout_secs: 900,
            max_sessions: 100,
            rate_limit_max_requests: 60,
            rate_limit_window_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = AuthSettings::default();

        Ok(Self {
            auth: AuthSettings {
                api_key: env::var("MAIL_API_KEY").map_err(|_| Error::Config {
                    message: "MAIL_API_KEY environment variable not set".to_string(),
                })?,
                api_key_read_only: env::var("MAIL_API_KEY_READ_ONLY").ok(),
                allowed_ips: env::var("MAIL_API_ALLOWED_IPS")
                    .map(|s| {
                        s.split(',')
                            .map(|p| p.trim().to_string())
                            .filter(|p| !p.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                session_timeout_secs: env_parse(
                    "AUTH_SESSION_TIMEOUT_SECS",
                    defaults.session_timeout_secs,
                ),
                max_sessions: env_parse("AUTH_MAX_SESSIONS", defaults.max_sessions),
                rate_limit_max_requests: env_parse(
                    "AUTH_RATE_LIMIT_MAX_REQUESTS",
                    defaults.rate_limit_max_requests,
                ),
                rate_limit_window_secs: env_parse(
                    "AUTH_RATE_LIMIT_WINDOW_SECS",
                    defaults.rate_limit_window_secs,
                ),
                sweep_interval_secs: env_parse(
                    "AUTH_SWEEP_INTERVAL_SECS",
                    defaults.sweep_interval_secs,
                ),
            },
        })
    }

    /// Load configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            auth: AuthSettings {
                api_key: "test-read-write-api-key-0123456789".to_string(),
                api_key_read_only: Some("test-read-only-api-key-0123456789".to_string()),
                ..AuthSettings::default()
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
