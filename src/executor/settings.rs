//! Construction-time settings for an [`Executor`](super::Executor)

use std::time::Duration;

use super::broadcast::DEFAULT_ENDPOINT_TIMEOUT;
use super::confirm::PollSettings;
use super::errors::ExecutorError;
use super::tip::{parse_tip_recipients, DEFAULT_TIP_ACCOUNTS};
use super::types::StrategyKind;

/// Public Jito block-engine regions
pub const DEFAULT_BLOCK_ENGINES: [&str; 5] = [
    "https://mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
];

/// Default tip, in lamports
pub const DEFAULT_TIP_LAMPORTS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub strategy: StrategyKind,
    pub endpoints: Vec<String>,
    pub tip_lamports: u64,
    pub tip_accounts: Vec<String>,
    /// Deadline for one block-engine request
    pub endpoint_timeout: Duration,
    /// Deadline for one RPC submission
    pub submit_timeout: Duration,
    pub poll: PollSettings,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Direct,
            endpoints: DEFAULT_BLOCK_ENGINES.iter().map(|s| s.to_string()).collect(),
            tip_lamports: DEFAULT_TIP_LAMPORTS,
            tip_accounts: DEFAULT_TIP_ACCOUNTS.iter().map(|s| s.to_string()).collect(),
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
            submit_timeout: Duration::from_secs(10),
            poll: PollSettings::default(),
        }
    }
}

impl ExecutorSettings {
    /// Reject settings the selected strategy cannot run with.
    ///
    /// Bundle-only settings are checked only for the bundle strategy.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        self.poll.validate()?;
        if self.submit_timeout.is_zero() {
            return Err(ExecutorError::config("submit timeout must be positive"));
        }

        if self.strategy == StrategyKind::PriorityBundle {
            if self.endpoints.is_empty() {
                return Err(ExecutorError::config("no bundle endpoints configured"));
            }
            if let Some(bad) = self.endpoints.iter().find(|e| !e.starts_with("http")) {
                return Err(ExecutorError::config(format!("invalid bundle endpoint '{bad}'")));
            }
            if self.tip_lamports == 0 {
                return Err(ExecutorError::config("tip_lamports must be positive"));
            }
            if self.endpoint_timeout.is_zero() {
                return Err(ExecutorError::config("request_timeout_ms must be positive"));
            }
            parse_tip_recipients(&self.tip_accounts)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_for_both_strategies() {
        let direct = ExecutorSettings::default();
        assert!(direct.validate().is_ok());

        let bundle = ExecutorSettings {
            strategy: StrategyKind::PriorityBundle,
            ..ExecutorSettings::default()
        };
        assert!(bundle.validate().is_ok());
        assert_eq!(bundle.endpoints.len(), 5);
    }

    #[test]
    fn test_bundle_checks_only_apply_to_bundle_strategy() {
        let mut settings = ExecutorSettings {
            endpoints: vec![],
            tip_lamports: 0,
            ..ExecutorSettings::default()
        };
        assert!(settings.validate().is_ok());

        settings.strategy = StrategyKind::PriorityBundle;
        assert!(matches!(settings.validate(), Err(ExecutorError::Configuration(_))));
    }

    #[test]
    fn test_bad_tip_account_rejected() {
        let settings = ExecutorSettings {
            strategy: StrategyKind::PriorityBundle,
            tip_accounts: vec!["zzz".into()],
            ..ExecutorSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("invalid tip account"));
    }
}
