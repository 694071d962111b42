//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The wallet seed is referenced by env-var name in the config and
//! resolved at startup into a [`SecretString`] so it never reaches a log line.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::{xrp_to_drops, SniperError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub ledger: LedgerConfig,
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    /// Build and log payments without signing or submitting them.
    #[serde(default)]
    pub dry_run: bool,
    /// Permits shared by every candidate pipeline, across overlapping cycles.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_evaluations: usize,
    /// Skip a tick while the previous cycle is still running.
    #[serde(default)]
    pub single_flight: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of a rippled node.
    pub endpoint: String,
    /// Name of the environment variable holding the wallet seed.
    pub seed_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Page size for the `ledger_data` scan.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "default_poll_interval")]
    pub submit_poll_interval_ms: u64,
    /// Highest network fee, in drops, autofill will accept.
    #[serde(default = "default_max_fee_drops")]
    pub max_fee_drops: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Fixed spend per acquisition, in XRP.
    pub fee_xrp: Decimal,
    /// Tokens whose estimated cap reaches this value are skipped.
    pub market_cap_threshold: Decimal,
}

fn default_max_concurrent() -> usize {
    16
}

fn default_request_timeout() -> u64 {
    30
}

fn default_scan_limit() -> u32 {
    200
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_fee_drops() -> u64 {
    2_000_000
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or executor cannot run with.
    pub fn validate(&self) -> std::result::Result<(), SniperError> {
        if self.agent.scan_interval_secs == 0 {
            return Err(SniperError::Config("agent.scan_interval_secs must be > 0".into()));
        }
        if self.agent.max_concurrent_evaluations == 0 {
            return Err(SniperError::Config(
                "agent.max_concurrent_evaluations must be > 0".into(),
            ));
        }
        if self.ledger.max_fee_drops == 0 {
            return Err(SniperError::Config("ledger.max_fee_drops must be > 0".into()));
        }
        if self.acquisition.fee_xrp <= Decimal::ZERO {
            return Err(SniperError::Config("acquisition.fee_xrp must be positive".into()));
        }
        xrp_to_drops(self.acquisition.fee_xrp).map_err(|_| {
            SniperError::Config(format!(
                "acquisition.fee_xrp {} is not a whole number of drops",
                self.acquisition.fee_xrp
            ))
        })?;
        if self.acquisition.market_cap_threshold <= Decimal::ZERO {
            return Err(SniperError::Config(
                "acquisition.market_cap_threshold must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.agent.scan_interval_secs)
    }

    /// Resolve an environment variable name to a secret value.
    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        let value = std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))?;
        Ok(SecretString::new(value))
    }
}
