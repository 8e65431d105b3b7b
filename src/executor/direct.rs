//! Direct strategy: one submission to the configured RPC, then confirmation

use async_trait::async_trait;
use solana_sdk::{
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::confirm::ConfirmationPoller;
use super::errors::ExecutorError;
use super::types::{ExecutionOutcome, StrategyKind, ValidityWindow};
use super::TransactionExecutor;
use crate::compat::ensure_signed_by;
use crate::rpc_manager::LedgerClient;

#[derive(Debug, Clone)]
pub struct DirectExecutor {
    ledger: Arc<dyn LedgerClient>,
    poller: ConfirmationPoller,
    submit_timeout: Duration,
}

impl DirectExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, poller: ConfirmationPoller, submit_timeout: Duration) -> Self {
        Self {
            ledger,
            poller,
            submit_timeout,
        }
    }

    pub fn poller(&self) -> &ConfirmationPoller {
        &self.poller
    }
}

#[async_trait]
impl TransactionExecutor for DirectExecutor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        signer: &Keypair,
        window: &ValidityWindow,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        ensure_signed_by(transaction, &signer.pubkey())?;

        let submitted = match tokio::time::timeout(self.submit_timeout, self.ledger.submit(transaction)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout {
                endpoint: "ledger".to_string(),
                timeout_ms: self.submit_timeout.as_millis() as u64,
            }),
        };

        let signature = match submitted {
            Ok(signature) => signature,
            Err(err) => {
                warn!(error = %err, "Submission failed");
                return Ok(ExecutionOutcome::failed(None, err));
            }
        };

        debug!(signature = %signature, "Submitted, confirming");
        Ok(self.poller.confirm(&signature, window).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PollSettings;
    use crate::rpc_manager::LedgerStatus;
    use crate::test_utils::{signed_transfer, test_window, MockLedger, PollScript};

    fn executor(ledger: Arc<MockLedger>) -> DirectExecutor {
        let poller = ConfirmationPoller::new(ledger.clone(), PollSettings::default());
        DirectExecutor::new(ledger, poller, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_own_signature() {
        let window = test_window(500);
        let ledger = Arc::new(
            MockLedger::new(window).with_polls(vec![PollScript::Status(LedgerStatus::landed(400))]),
        );
        let signer = Keypair::new();
        let tx = signed_transfer(&signer, &window);

        let outcome = executor(ledger.clone())
            .execute_and_confirm(&tx, &signer, &window)
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.signature(), Some(&tx.signatures[0]));
        assert_eq!(ledger.submitted(), vec![tx.signatures[0]]);
        assert_eq!(ledger.polled(), vec![tx.signatures[0]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_skips_polling() {
        let window = test_window(500);
        let ledger = Arc::new(
            MockLedger::new(window)
                .with_submit_error(ExecutorError::BlockhashNotFound { endpoint: "rpc".into() }),
        );
        let signer = Keypair::new();
        let tx = signed_transfer(&signer, &window);

        let outcome = executor(ledger.clone())
            .execute_and_confirm(&tx, &signer, &window)
            .await
            .unwrap();

        assert!(!outcome.is_confirmed());
        assert!(outcome.signature().is_none());
        assert!(matches!(outcome.error(), Some(ExecutorError::BlockhashNotFound { .. })));
        assert!(ledger.polled().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_signer_is_contract_violation() {
        let window = test_window(500);
        let ledger = Arc::new(MockLedger::new(window));
        let payer = Keypair::new();
        let tx = signed_transfer(&payer, &window);

        let err = executor(ledger.clone())
            .execute_and_confirm(&tx, &Keypair::new(), &window)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::InvalidTransaction(_)));
        assert!(ledger.submitted().is_empty());
    }
}
