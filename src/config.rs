//! Server configuration.
//!
//! Layers, lowest precedence first: built-in defaults, TOML file,
//! `HOST`/`PORT` environment variables, command-line flags.

use crate::gateway::{DEFAULT_OUTLET_CAPACITY, DisconnectPolicy};
use crate::session::SessionSettings;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Configuration for the room server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// How disconnects find their session.
    #[serde(default)]
    disconnect_policy: DisconnectPolicy,

    /// Longest display name kept, in characters. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_name_len: Option<usize>,

    /// Longest chat message relayed, in characters. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_chat_len: Option<usize>,

    /// Drop moves and resignations after a game has ended.
    #[serde(default)]
    lock_after_game_end: bool,

    /// Events queued per connection before further events are dropped.
    #[serde(default = "default_outlet_capacity")]
    outlet_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_outlet_capacity() -> usize {
    DEFAULT_OUTLET_CAPACITY
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            disconnect_policy: DisconnectPolicy::default(),
            max_name_len: None,
            max_chat_len: None,
            lock_after_game_end: false,
            outlet_capacity: default_outlet_capacity(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if given, otherwise starts from defaults.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Applies `HOST` and `PORT` from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Applies `HOST` and `PORT` from an arbitrary lookup.
    #[instrument(skip(self, lookup))]
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            debug!(host = %host, "HOST from environment");
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid PORT {:?}: {}", port, e)))?;
            debug!(port = self.port, "PORT from environment");
        }
        Ok(self)
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        disconnect_policy: Option<DisconnectPolicy>,
    ) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(policy) = disconnect_policy {
            self.disconnect_policy = policy;
        }
        self
    }

    /// Enables or disables the post-game lock.
    pub fn with_lock_after_game_end(mut self, lock: bool) -> Self {
        self.lock_after_game_end = lock;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_name_len == Some(0) {
            return Err(ConfigError::new("max_name_len must be at least 1"));
        }
        if self.max_chat_len == Some(0) {
            return Err(ConfigError::new("max_chat_len must be at least 1"));
        }
        if self.outlet_capacity == 0 {
            return Err(ConfigError::new("outlet_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Session limits derived from this config.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new(self.max_name_len, self.max_chat_len, self.lock_after_game_end)
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
