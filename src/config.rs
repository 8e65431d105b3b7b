//! Configuration module
//!
//! Loads the TOML configuration, applies `.env` / environment overrides and
//! turns the result into executor settings. Every section is optional; a
//! missing section takes the defaults below.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;
use thiserror::Error;

use crate::executor::{
    ExecutorError, ExecutorSettings, PollSettings, StrategyKind, DEFAULT_BLOCK_ENGINES,
    DEFAULT_TIP_ACCOUNTS, DEFAULT_TIP_LAMPORTS,
};

/// Environment variable overriding `[rpc].url`
pub const RPC_ENDPOINT_ENV: &str = "RPC_ENDPOINT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ExecutorError> for ConfigError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Configuration(reason) => Self::Invalid(reason),
            other => Self::Invalid(other.to_string()),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub bundle: BundleConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Primary RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Commitment at which a transaction counts as landed
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to a solana-keygen keypair file; `PRIVATE_KEY` takes precedence
    #[serde(default)]
    pub keypair_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    /// Fresh-window attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Simulate instead of submitting
    #[serde(default)]
    pub simulate_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Block-engine `sendBundle` URLs
    #[serde(default = "default_bundle_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default = "default_tip_lamports")]
    pub tip_lamports: u64,

    /// Eligible tip recipients
    #[serde(default = "default_tip_accounts")]
    pub tip_accounts: Vec<String>,

    /// Per-endpoint request timeout
    #[serde(default = "default_bundle_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_max_poll_iterations")]
    pub max_poll_iterations: u32,

    #[serde(default = "default_max_confirmation_wait_ms")]
    pub max_confirmation_wait_ms: u64,

    #[serde(default = "default_max_consecutive_poll_errors")]
    pub max_consecutive_poll_errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_strategy() -> StrategyKind { StrategyKind::PriorityBundle }
fn default_max_retries() -> u32 { 20 }
fn default_bundle_endpoints() -> Vec<String> { DEFAULT_BLOCK_ENGINES.iter().map(|s| s.to_string()).collect() }
fn default_tip_lamports() -> u64 { DEFAULT_TIP_LAMPORTS }
fn default_tip_accounts() -> Vec<String> { DEFAULT_TIP_ACCOUNTS.iter().map(|s| s.to_string()).collect() }
fn default_bundle_timeout_ms() -> u64 { 5_000 }
fn default_poll_interval_ms() -> u64 { 400 }
fn default_poll_timeout_ms() -> u64 { 5_000 }
fn default_max_poll_iterations() -> u32 { 150 }
fn default_max_confirmation_wait_ms() -> u64 { 90_000 }
fn default_max_consecutive_poll_errors() -> u32 { 3 }
fn default_metrics_port() -> u16 { 9090 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_retries: default_max_retries(),
            simulate_only: false,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            endpoints: default_bundle_endpoints(),
            tip_lamports: default_tip_lamports(),
            tip_accounts: default_tip_accounts(),
            request_timeout_ms: default_bundle_timeout_ms(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            max_poll_iterations: default_max_poll_iterations(),
            max_confirmation_wait_ms: default_max_confirmation_wait_ms(),
            max_consecutive_poll_errors: default_max_consecutive_poll_errors(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            json_logs: false,
        }
    }
}

/// Parse a commitment level name
pub fn parse_commitment(level: &str) -> Result<CommitmentConfig, ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ConfigError::Invalid(format!("unknown commitment '{other}'"))),
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment wins over the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(RPC_ENDPOINT_ENV) {
            if !url.trim().is_empty() {
                self.rpc.url = url.trim().to_string();
            }
        }
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        parse_commitment(&self.rpc.commitment)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn poll_settings(&self) -> PollSettings {
        let c = &self.confirmation;
        PollSettings {
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            poll_timeout: Duration::from_millis(c.poll_timeout_ms),
            max_poll_iterations: c.max_poll_iterations,
            max_wait: Duration::from_millis(c.max_confirmation_wait_ms),
            max_consecutive_errors: c.max_consecutive_poll_errors,
        }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            strategy: self.execution.strategy,
            endpoints: self.bundle.endpoints.clone(),
            tip_lamports: self.bundle.tip_lamports,
            tip_accounts: self.bundle.tip_accounts.clone(),
            endpoint_timeout: Duration::from_millis(self.bundle.request_timeout_ms),
            submit_timeout: self.rpc_timeout(),
            poll: self.poll_settings(),
        }
    }

    /// Check every section; the first problem wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.url.starts_with("http") {
            return Err(ConfigError::Invalid(format!("invalid rpc url '{}'", self.rpc.url)));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::Invalid("rpc timeout_secs must be positive".into()));
        }
        self.commitment()?;
        self.executor_settings().validate()?;
        if self.monitoring.enable_metrics && self.monitoring.metrics_port == 0 {
            return Err(ConfigError::Invalid("metrics_port must be set when metrics are enabled".into()));
        }
        Ok(())
    }
}
