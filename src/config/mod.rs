// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the session protocol client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_SDK_URL: &str = "https://auth.web3auth.io/v9";
pub const DEFAULT_BROADCAST_URL: &str = "https://broadcast-server.tor.us";

/// Configuration for the session protocol client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hosted login page base URL
    pub sdk_url: String,
    /// Broadcast (session record) server base URL
    pub broadcast_url: String,
    /// Dapp client id sent with login requests
    pub client_id: String,
    /// Network name sent with login requests
    pub network: String,
    /// Where the login page sends the browser back to
    pub redirect_url: Option<String>,
    /// Verifier whose cached dapp share is attached to new logins
    pub verifier: Option<String>,
    /// Expose the Core Kit keys instead of the default ones
    pub use_core_kit_key: bool,
    /// Requested lifetime of an authorized session, in seconds
    pub session_timeout_secs: u64,
    /// Lifetime of a login request record, in seconds
    pub login_timeout_secs: u64,
    /// HTTP request timeout, in seconds
    pub request_timeout_secs: u64,
    /// Encrypted local storage file; in-memory storage when unset
    pub storage_path: Option<PathBuf>,
    /// Passphrase for the local storage file
    pub storage_passphrase: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sdk_url: DEFAULT_SDK_URL.to_string(),
            broadcast_url: DEFAULT_BROADCAST_URL.to_string(),
            client_id: String::new(),
            network: "sapphire_mainnet".to_string(),
            redirect_url: None,
            verifier: None,
            use_core_kit_key: false,
            session_timeout_secs: 86_400,
            login_timeout_secs: 600,
            request_timeout_secs: 30,
            storage_path: None,
            storage_passphrase: None,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl SessionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sdk_url: env::var("SESSION_SDK_URL").unwrap_or(defaults.sdk_url),
            broadcast_url: env::var("SESSION_BROADCAST_URL").unwrap_or(defaults.broadcast_url),
            client_id: env::var("SESSION_CLIENT_ID").unwrap_or(defaults.client_id),
            network: env::var("SESSION_NETWORK").unwrap_or(defaults.network),
            redirect_url: env::var("SESSION_REDIRECT_URL").ok(),
            verifier: env::var("SESSION_VERIFIER").ok(),
            use_core_kit_key: env::var("SESSION_USE_CORE_KIT_KEY")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            session_timeout_secs: env_u64("SESSION_TIMEOUT_SECS", defaults.session_timeout_secs),
            login_timeout_secs: env_u64("SESSION_LOGIN_TIMEOUT_SECS", defaults.login_timeout_secs),
            request_timeout_secs: env_u64(
                "SESSION_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            storage_path: env::var("SESSION_STORAGE_PATH").ok().map(PathBuf::from),
            storage_passphrase: env::var("SESSION_STORAGE_PASSPHRASE").ok(),
        }
    }

    /// Load configuration from a TOML file; missing fields take defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("sdk_url", &self.sdk_url), ("broadcast_url", &self.broadcast_url)] {
            let url = Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(format!("{} must be http(s), got {}", name, url.scheme()));
            }
        }
        if let Some(redirect) = &self.redirect_url {
            Url::parse(redirect).map_err(|e| format!("redirect_url is not a valid URL: {}", e))?;
        }
        if self.session_timeout_secs == 0 {
            return Err("Session timeout must be greater than 0".to_string());
        }
        if self.login_timeout_secs == 0 {
            return Err("Login timeout must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if self.storage_path.is_some() && self.storage_passphrase.is_none() {
            return Err("storage_path requires storage_passphrase".to_string());
        }
        Ok(())
    }
}
