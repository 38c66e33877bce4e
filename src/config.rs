//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Mailbox selected right after login.
    pub mailbox: String,
    /// Probe the session with NOOP before each use and reopen it when the
    /// probe fails.
    pub ping_session: bool,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `1143`)
    /// - `IMAP_MAILBOX` (default: `INBOX`)
    /// - `IMAP_PING` (default: `false`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .unwrap_or_else(|_| "1143".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            mailbox: env::var("IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string()),
            ping_session: env::var("IMAP_PING")
                .map_or(Ok(false), |v| parse_bool(&v))
                .map_err(|e| Error::Config(format!("Invalid IMAP_PING: {e}")))?,
        })
    }

    /// Configuration with default host, port and mailbox.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1143,
            username: username.into(),
            password: password.into(),
            mailbox: "INBOX".to_string(),
            ping_session: false,
        }
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}
