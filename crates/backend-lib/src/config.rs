// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Interval between server-initiated heartbeat pings, in seconds
    pub heartbeat_interval_secs: u64,
    /// Consecutive unanswered pings before a connection is declared
    /// dead and forced through the leave path
    pub missed_pings_allowed: u32,
    /// Upper bound on one AI answer generation, in seconds
    pub ai_timeout_secs: u64,
    /// Bounded retry cap for join-code reservation
    pub join_code_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            log_level: "info".to_string(),
            heartbeat_interval_secs: 30,
            missed_pings_allowed: 2,
            ai_timeout_secs: 30,
            join_code_attempts: 10,
        }
    }
}

impl Settings {
    /// Load settings from `config/default.toml` (optional) merged
    /// with `LIVEDECK_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default")
    }

    /// Load settings from an explicit config file path.
    pub fn load_from(path: &str) -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("bind_addr", defaults.bind_addr.to_string())?
            .set_default("log_level", defaults.log_level)?
            .set_default("heartbeat_interval_secs", defaults.heartbeat_interval_secs)?
            .set_default(
                "missed_pings_allowed",
                u64::from(defaults.missed_pings_allowed),
            )?
            .set_default("ai_timeout_secs", defaults.ai_timeout_secs)?
            .set_default("join_code_attempts", u64::from(defaults.join_code_attempts))?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("LIVEDECK"))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}
