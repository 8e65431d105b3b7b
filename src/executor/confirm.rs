//! Confirmation polling within a validity window
//!
//! Polls run one at a time with a fixed delay. The loop ends on the first
//! decisive observation (landed, failed on chain, window expired) or when its
//! own budget runs out: iteration cap, wall-clock cap, or too many consecutive
//! transport errors. Expiry is judged by block height, never by wall clock.

use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

use super::errors::ExecutorError;
use super::types::{ExecutionOutcome, ValidityWindow};
use crate::metrics::metrics;
use crate::rpc_manager::LedgerClient;

/// Bounds for one confirmation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two polls
    pub poll_interval: Duration,
    /// Deadline for a single poll
    pub poll_timeout: Duration,
    /// Hard cap on polls
    pub max_poll_iterations: u32,
    /// Hard cap on total time spent confirming
    pub max_wait: Duration,
    /// Transport errors in a row before giving up
    pub max_consecutive_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(400),
            poll_timeout: Duration::from_secs(5),
            max_poll_iterations: 150,
            max_wait: Duration::from_secs(90),
            max_consecutive_errors: 3,
        }
    }
}

impl PollSettings {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.max_poll_iterations == 0 {
            return Err(ExecutorError::config("max_poll_iterations must be positive"));
        }
        if self.max_wait.is_zero() {
            return Err(ExecutorError::config("max_confirmation_wait_ms must be positive"));
        }
        if self.poll_timeout.is_zero() {
            return Err(ExecutorError::config("poll_timeout_ms must be positive"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ExecutorError::config("max_consecutive_poll_errors must be positive"));
        }
        Ok(())
    }
}

/// Sequential status poller
#[derive(Debug, Clone)]
pub struct ConfirmationPoller {
    ledger: Arc<dyn LedgerClient>,
    settings: PollSettings,
}

impl ConfirmationPoller {
    pub fn new(ledger: Arc<dyn LedgerClient>, settings: PollSettings) -> Self {
        Self { ledger, settings }
    }

    /// Wait for `signature` to land inside `window`
    #[instrument(
        skip(self, window),
        fields(reference_hash = %window.reference_hash, expiry_height = window.expiry_height)
    )]
    pub async fn confirm(&self, signature: &Signature, window: &ValidityWindow) -> ExecutionOutcome {
        let started = Instant::now();
        let outcome = self.poll_until_settled(signature, window, started).await;

        let m = metrics();
        m.confirmation_latency
            .observe(started.elapsed().as_secs_f64());
        match outcome.error() {
            None => info!(
                signature = %signature,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Transaction confirmed"
            ),
            Some(err) => warn!(signature = %signature, error = %err, "Transaction not confirmed"),
        }
        outcome
    }

    async fn poll_until_settled(
        &self,
        signature: &Signature,
        window: &ValidityWindow,
        started: Instant,
    ) -> ExecutionOutcome {
        let settings = &self.settings;
        let deadline = started + settings.max_wait;
        let poll_timeout_ms = settings.poll_timeout.as_millis() as u64;
        let mut consecutive_errors = 0u32;
        let mut polls = 0u32;

        while polls < settings.max_poll_iterations {
            polls += 1;
            metrics().confirmation_polls.inc();

            let observed = match timeout(
                settings.poll_timeout,
                self.ledger.poll_status(signature, window),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout {
                    endpoint: "ledger".to_string(),
                    timeout_ms: poll_timeout_ms,
                }),
            };

            match observed {
                Ok(status) => {
                    consecutive_errors = 0;

                    if let Some(reason) = status.execution_error {
                        return ExecutionOutcome::failed(
                            Some(*signature),
                            ExecutorError::LedgerRejection {
                                signature: *signature,
                                reason,
                            },
                        );
                    }
                    if status.included {
                        return ExecutionOutcome::confirmed(*signature);
                    }
                    if window.is_expired_at(status.block_height) {
                        return ExecutionOutcome::failed(
                            Some(*signature),
                            ExecutorError::Expired {
                                signature: *signature,
                                block_height: status.block_height,
                                expiry_height: window.expiry_height,
                            },
                        );
                    }
                    debug!(
                        poll = polls,
                        block_height = status.block_height,
                        "Not landed yet"
                    );
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(
                        poll = polls,
                        consecutive_errors,
                        error = %err,
                        "Status poll failed"
                    );
                    if consecutive_errors >= settings.max_consecutive_errors {
                        return ExecutionOutcome::failed(Some(*signature), err);
                    }
                }
            }

            if polls >= settings.max_poll_iterations
                || Instant::now() + settings.poll_interval > deadline
            {
                break;
            }
            sleep(settings.poll_interval).await;
        }

        ExecutionOutcome::failed(
            Some(*signature),
            ExecutorError::ConfirmationTimeout {
                signature: *signature,
                polls,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_manager::LedgerStatus;
    use crate::test_utils::{test_window, MockLedger, PollScript};

    fn poller(ledger: Arc<MockLedger>, settings: PollSettings) -> ConfirmationPoller {
        ConfirmationPoller::new(ledger, settings)
    }

    fn fast_settings() -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(500),
            max_poll_iterations: 20,
            max_wait: Duration::from_secs(30),
            max_consecutive_errors: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_pending_polls() {
        let window = test_window(100);
        let ledger = Arc::new(MockLedger::new(window).with_polls(vec![
            PollScript::Status(LedgerStatus::pending(90)),
            PollScript::Status(LedgerStatus::pending(91)),
            PollScript::Status(LedgerStatus::landed(92)),
        ]));
        let sig = Signature::from([3u8; 64]);

        let outcome = poller(ledger.clone(), fast_settings()).confirm(&sig, &window).await;

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.signature(), Some(&sig));
        assert_eq!(ledger.polled().len(), 3);
        assert!(ledger.polled().iter().all(|s| *s == sig));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_error_is_never_confirmed() {
        let window = test_window(100);
        let ledger = Arc::new(MockLedger::new(window).with_polls(vec![PollScript::Status(
            LedgerStatus::failed(95, "InstructionError(2, Custom(30))"),
        )]));
        let sig = Signature::from([4u8; 64]);

        let outcome = poller(ledger, fast_settings()).confirm(&sig, &window).await;

        assert!(!outcome.is_confirmed());
        match outcome.error() {
            Some(ExecutorError::LedgerRejection { reason, signature }) => {
                assert!(reason.contains("Custom(30)"));
                assert_eq!(*signature, sig);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_once_height_passes_expiry() {
        let window = test_window(100);
        let ledger = Arc::new(MockLedger::new(window).with_polls(vec![
            PollScript::Status(LedgerStatus::pending(99)),
            PollScript::Status(LedgerStatus::pending(100)),
            PollScript::Status(LedgerStatus::pending(101)),
        ]));
        let sig = Signature::from([5u8; 64]);

        let outcome = poller(ledger.clone(), fast_settings()).confirm(&sig, &window).await;

        assert!(matches!(
            outcome.error(),
            Some(ExecutorError::Expired { block_height: 101, expiry_height: 100, .. })
        ));
        assert_eq!(ledger.polled().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_cap_is_hard() {
        let window = test_window(1_000);
        let ledger = Arc::new(
            MockLedger::new(window).with_polls(vec![PollScript::Status(LedgerStatus::pending(10))]),
        );
        let settings = PollSettings {
            max_poll_iterations: 4,
            ..fast_settings()
        };
        let sig = Signature::from([6u8; 64]);

        let outcome = poller(ledger.clone(), settings).confirm(&sig, &window).await;

        assert!(matches!(
            outcome.error(),
            Some(ExecutorError::ConfirmationTimeout { polls: 4, .. })
        ));
        assert_eq!(ledger.polled().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_cap_is_hard() {
        let window = test_window(1_000);
        let ledger = Arc::new(
            MockLedger::new(window).with_polls(vec![PollScript::Status(LedgerStatus::pending(10))]),
        );
        let settings = PollSettings {
            max_poll_iterations: 1_000,
            max_wait: Duration::from_millis(350),
            ..fast_settings()
        };
        let sig = Signature::from([7u8; 64]);

        let outcome = poller(ledger.clone(), settings).confirm(&sig, &window).await;

        assert!(matches!(outcome.error(), Some(ExecutorError::ConfirmationTimeout { .. })));
        assert!(ledger.polled().len() <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_bounded() {
        let window = test_window(100);
        let ledger = Arc::new(MockLedger::new(window).with_polls(vec![PollScript::Error(
            ExecutorError::transport("ledger", "connection reset"),
        )]));
        let sig = Signature::from([8u8; 64]);

        let outcome = poller(ledger.clone(), fast_settings()).confirm(&sig, &window).await;

        assert!(matches!(outcome.error(), Some(ExecutorError::Transport { .. })));
        assert_eq!(ledger.polled().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_then_landed() {
        let window = test_window(100);
        let ledger = Arc::new(MockLedger::new(window).with_polls(vec![
            PollScript::Error(ExecutorError::transport("ledger", "connection reset")),
            PollScript::Hang,
            PollScript::Status(LedgerStatus::landed(50)),
        ]));
        let sig = Signature::from([9u8; 64]);

        let outcome = poller(ledger, fast_settings()).confirm(&sig, &window).await;

        assert!(outcome.is_confirmed());
    }

    #[test]
    fn test_settings_validation() {
        assert!(PollSettings::default().validate().is_ok());
        let zero = PollSettings {
            max_poll_iterations: 0,
            ..PollSettings::default()
        };
        assert!(matches!(zero.validate(), Err(ExecutorError::Configuration(_))));
    }
}
