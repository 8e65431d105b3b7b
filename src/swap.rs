//! Swap orchestration
//!
//! One swap = fetch a validity window, have the factory compile the message
//! against it, sign, then either simulate or hand it to the executor.
//!
//! A new transaction is built only once the previous one provably cannot
//! land: its window expired, or every receiver refused it. While the previous
//! one is undecided (confirmation timed out, the ledger went quiet, a submit
//! timed out) its signature is polled again instead. Both kinds of round draw
//! on the same `max_retries` budget.

use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
#[allow(deprecated)]
use solana_sdk::{compute_budget::ComputeBudgetInstruction, system_instruction};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, Instrument};

use crate::executor::{
    ExecutionOutcome, Executor, ExecutorError, TransactionExecutor, ValidityWindow,
};
use crate::metrics::metrics;
use crate::rpc_manager::{LedgerClient, RetryPolicy, SimulationReport};
use crate::structured_logging::PipelineContext;

/// Builds the unsigned swap message for a payer and a window.
///
/// Quote math and pool discovery live behind this boundary.
pub trait SwapTransactionFactory: Send + Sync {
    /// Human-readable summary for logs
    fn label(&self) -> String;

    fn build_message(
        &self,
        payer: &Pubkey,
        window: &ValidityWindow,
    ) -> Result<VersionedMessage, ExecutorError>;
}

/// Plain SOL transfer, optionally with a compute-unit price
#[derive(Debug, Clone)]
pub struct TransferFactory {
    recipient: Pubkey,
    lamports: u64,
    compute_unit_price: Option<u64>,
}

impl TransferFactory {
    pub fn new(recipient: Pubkey, lamports: u64) -> Self {
        Self {
            recipient,
            lamports,
            compute_unit_price: None,
        }
    }

    /// Priority fee in micro-lamports per compute unit
    pub fn with_compute_unit_price(mut self, micro_lamports: u64) -> Self {
        self.compute_unit_price = Some(micro_lamports);
        self
    }
}

impl SwapTransactionFactory for TransferFactory {
    fn label(&self) -> String {
        format!("transfer {} lamports to {}", self.lamports, self.recipient)
    }

    fn build_message(
        &self,
        payer: &Pubkey,
        window: &ValidityWindow,
    ) -> Result<VersionedMessage, ExecutorError> {
        if self.lamports == 0 {
            return Err(ExecutorError::config("transfer amount must be positive"));
        }

        let mut instructions = Vec::with_capacity(2);
        if let Some(price) = self.compute_unit_price {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(price));
        }
        instructions.push(system_instruction::transfer(payer, &self.recipient, self.lamports));

        let message = v0::Message::try_compile(payer, &instructions, &[], window.reference_hash)
            .map_err(|e| ExecutorError::Serialization(format!("swap message: {e}")))?;
        Ok(VersionedMessage::V0(message))
    }
}

/// Final report of one swap
#[derive(Debug, Clone)]
pub enum SwapReport {
    Simulated(SimulationReport),
    Executed {
        outcome: ExecutionOutcome,
        attempts: u32,
    },
}

impl SwapReport {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Simulated(report) => report.succeeded(),
            Self::Executed { outcome, .. } => outcome.is_confirmed(),
        }
    }
}

/// A transaction that reached the network and may still land
#[derive(Debug, Clone, Copy)]
struct InFlight {
    signature: Signature,
    window: ValidityWindow,
}

#[derive(Debug, Clone)]
pub struct SwapOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    executor: Executor,
    retry: RetryPolicy,
    window_commitment: CommitmentConfig,
}

impl SwapOrchestrator {
    /// Windows are fetched at `processed` so the blockhash is as fresh as
    /// possible; confirmation depth is the ledger client's business.
    pub fn new(ledger: Arc<dyn LedgerClient>, executor: Executor, max_retries: u32) -> Self {
        Self {
            ledger,
            executor,
            retry: RetryPolicy::with_max_retries(max_retries),
            window_commitment: CommitmentConfig::processed(),
        }
    }

    pub async fn run(
        &self,
        factory: &dyn SwapTransactionFactory,
        signer: &Keypair,
        simulate_only: bool,
    ) -> Result<SwapReport, ExecutorError> {
        if simulate_only {
            self.simulate(factory, signer).await.map(SwapReport::Simulated)
        } else {
            self.execute(factory, signer).await
        }
    }

    /// Build, sign and dry-run once; nothing is submitted
    pub async fn simulate(
        &self,
        factory: &dyn SwapTransactionFactory,
        signer: &Keypair,
    ) -> Result<SimulationReport, ExecutorError> {
        let ctx = PipelineContext::new("simulate");
        let span = ctx.span();
        async {
            let window = self.ledger.get_validity_window(self.window_commitment).await?;
            let transaction = sign(factory.build_message(&signer.pubkey(), &window)?, signer)?;

            let report = self.ledger.simulate(&transaction).await?;
            metrics().simulations_total.inc();
            for line in &report.logs {
                debug!(log = %line, "simulation log");
            }
            ctx.logger
                .log_simulation(report.succeeded(), report.units_consumed, report.logs.len());
            if let Some(err) = &report.error {
                ctx.logger.warn(&format!("simulation error: {err}"));
            }
            Ok::<_, ExecutorError>(report)
        }
        .instrument(span)
        .await
    }

    /// Execute, rebuilding on a fresh window only after the previous
    /// transaction is known to be dead.
    ///
    /// `Err` only for configuration and contract errors.
    pub async fn execute(
        &self,
        factory: &dyn SwapTransactionFactory,
        signer: &Keypair,
    ) -> Result<SwapReport, ExecutorError> {
        let mut ctx = PipelineContext::new("swap");
        tracing::info!(
            correlation_id = %ctx.correlation_id,
            swap = %factory.label(),
            strategy = %self.executor.kind(),
            "Starting swap"
        );

        let (mut outcome, mut in_flight) =
            self.attempt(&ctx, factory, signer).instrument(ctx.span()).await?;
        let mut round = 0u32;

        loop {
            if outcome.is_confirmed() || !outcome.is_retryable() {
                break;
            }
            let Some(delay) = self.retry.calculate_delay(round) else {
                match &in_flight {
                    Some(pending) => ctx.logger.error(&format!(
                        "retry budget exhausted while {} may still land",
                        pending.signature
                    )),
                    None => ctx.logger.warn("retry budget exhausted"),
                }
                break;
            };
            round += 1;
            let delay_ms = delay.as_millis() as u64;

            match in_flight {
                Some(pending) => {
                    ctx.logger.log_watch(
                        &pending.signature.to_string(),
                        pending.window.expiry_height,
                        delay_ms,
                    );
                    tokio::time::sleep(delay).await;
                    outcome = self.watch(&pending).instrument(ctx.span()).await;
                    if !may_still_land(&outcome) {
                        in_flight = None;
                    }
                }
                None => {
                    ctx = ctx.next_attempt();
                    ctx.logger.log_retry(ctx.attempt, delay_ms);
                    tokio::time::sleep(delay).await;
                    (outcome, in_flight) =
                        self.attempt(&ctx, factory, signer).instrument(ctx.span()).await?;
                }
            }
        }

        Ok(SwapReport::Executed {
            outcome,
            attempts: ctx.attempt,
        })
    }

    /// Build, sign and execute one transaction. Also returns it when it
    /// reached the network without a final verdict.
    async fn attempt(
        &self,
        ctx: &PipelineContext,
        factory: &dyn SwapTransactionFactory,
        signer: &Keypair,
    ) -> Result<(ExecutionOutcome, Option<InFlight>), ExecutorError> {
        let started = Instant::now();

        let window = match self.ledger.get_validity_window(self.window_commitment).await {
            Ok(window) => window,
            Err(err) => return settle_local(err).map(|outcome| (outcome, None)),
        };
        let transaction = match factory
            .build_message(&signer.pubkey(), &window)
            .and_then(|message| sign(message, signer))
        {
            Ok(tx) => tx,
            Err(err) => return settle_local(err).map(|outcome| (outcome, None)),
        };

        ctx.logger
            .log_execution_attempt(self.executor.kind(), ctx.attempt, window.expiry_height);
        let outcome = self
            .executor
            .execute_and_confirm(&transaction, signer, &window)
            .await?;

        ctx.logger
            .log_execution_outcome(&outcome, started.elapsed().as_millis() as u64);

        // A bundle lands all-or-nothing, so the main signature tracks it too
        let in_flight = may_still_land(&outcome).then(|| InFlight {
            signature: transaction.signatures[0],
            window,
        });
        Ok((outcome, in_flight))
    }

    /// Poll an earlier transaction again within its own window
    async fn watch(&self, pending: &InFlight) -> ExecutionOutcome {
        let started = Instant::now();
        let outcome = self
            .executor
            .poller()
            .confirm(&pending.signature, &pending.window)
            .await;
        debug!(
            signature = %pending.signature,
            confirmed = outcome.is_confirmed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Watch round finished"
        );
        outcome
    }
}

fn may_still_land(outcome: &ExecutionOutcome) -> bool {
    outcome
        .error()
        .is_some_and(|err| !err.rules_out_landing())
}

fn sign(message: VersionedMessage, signer: &Keypair) -> Result<VersionedTransaction, ExecutorError> {
    VersionedTransaction::try_new(message, &[signer])
        .map_err(|e| ExecutorError::Signing(e.to_string()))
}

/// Fatal errors escape; everything else becomes an unconfirmed attempt
fn settle_local(err: ExecutorError) -> Result<ExecutionOutcome, ExecutorError> {
    if err.is_fatal() {
        Err(err)
    } else {
        Ok(ExecutionOutcome::failed(None, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorSettings, PollSettings, StrategyKind};
    use crate::rpc_manager::LedgerStatus;
    use crate::test_utils::{test_window, MockBundleTransport, MockLedger, PollScript};

    fn orchestrator(ledger: Arc<MockLedger>, max_retries: u32) -> SwapOrchestrator {
        orchestrator_with_polls(ledger, max_retries, PollSettings::default())
    }

    fn orchestrator_with_polls(
        ledger: Arc<MockLedger>,
        max_retries: u32,
        poll: PollSettings,
    ) -> SwapOrchestrator {
        let transport = Arc::new(MockBundleTransport::new(vec![]));
        let settings = ExecutorSettings {
            strategy: StrategyKind::Direct,
            poll,
            ..ExecutorSettings::default()
        };
        let executor = Executor::with_transport(&settings, ledger.clone(), transport).unwrap();
        SwapOrchestrator::new(ledger, executor, max_retries)
    }

    fn two_polls() -> PollSettings {
        PollSettings {
            max_poll_iterations: 2,
            ..PollSettings::default()
        }
    }

    fn factory() -> TransferFactory {
        TransferFactory::new(Pubkey::new_unique(), 1_000).with_compute_unit_price(1_500)
    }

    #[test]
    fn test_transfer_factory_compiles_against_window() {
        let payer = Pubkey::new_unique();
        let window = test_window(10);
        let message = factory().build_message(&payer, &window).unwrap();

        assert_eq!(*message.recent_blockhash(), window.reference_hash);
        assert_eq!(message.static_account_keys()[0], payer);
        assert_eq!(message.instructions().len(), 2);

        let zero = TransferFactory::new(Pubkey::new_unique(), 0);
        assert!(matches!(
            zero.build_message(&payer, &window),
            Err(ExecutorError::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_confirms() {
        let ledger = Arc::new(
            MockLedger::new(test_window(100))
                .with_polls(vec![PollScript::Status(LedgerStatus::landed(50))]),
        );
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 5)
            .run(&factory(), &signer, false)
            .await
            .unwrap();

        match report {
            SwapReport::Executed { outcome, attempts } => {
                assert!(outcome.is_confirmed());
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected report: {other:?}"),
        }
        assert_eq!(ledger.windows_served(), 1);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_attempts_retry_with_fresh_windows() {
        let ledger = Arc::new(
            MockLedger::new(test_window(100))
                .with_polls(vec![PollScript::Status(LedgerStatus::pending(101))]),
        );
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 2)
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        assert_eq!(attempts, 3);
        assert!(matches!(outcome.error(), Some(ExecutorError::Expired { .. })));
        assert_eq!(ledger.windows_served(), 3);
        assert_eq!(ledger.submitted().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_not_retried() {
        let ledger = Arc::new(MockLedger::new(test_window(100)).with_polls(vec![
            PollScript::Status(LedgerStatus::failed(60, "InstructionError(0, Custom(1))")),
        ]));
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 20)
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        assert_eq!(attempts, 1);
        assert!(matches!(outcome.error(), Some(ExecutorError::LedgerRejection { .. })));
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_never_submits() {
        let ledger = Arc::new(MockLedger::new(test_window(100)).with_simulation(
            SimulationReport {
                error: None,
                logs: vec!["Program 11111111111111111111111111111111 success".into()],
                units_consumed: Some(450),
            },
        ));
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 3)
            .run(&factory(), &signer, true)
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(ledger.submitted().is_empty());
        assert!(ledger.polled().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_factory_input_is_fatal() {
        let ledger = Arc::new(MockLedger::new(test_window(100)));
        let signer = Keypair::new();

        let err = orchestrator(ledger.clone(), 3)
            .execute(&TransferFactory::new(Pubkey::new_unique(), 0), &signer)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecided_transaction_is_watched_not_resubmitted() {
        // Every window request hands out a new hash; the ledger never moves
        // past height 10, far below the expiry
        let ledger = Arc::new(
            MockLedger::new(test_window(1_000))
                .with_rotating_windows()
                .with_polls(vec![PollScript::Status(LedgerStatus::pending(10))]),
        );
        let signer = Keypair::new();

        let report = orchestrator_with_polls(ledger.clone(), 2, two_polls())
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        assert!(!outcome.is_confirmed());
        assert!(matches!(
            outcome.error(),
            Some(ExecutorError::ConfirmationTimeout { .. })
        ));
        assert_eq!(attempts, 1);
        assert_eq!(ledger.windows_served(), 1);
        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        // First run plus two watch rounds, all on the one signature
        assert_eq!(ledger.polled().len(), 6);
        assert!(ledger.polled().iter().all(|sig| *sig == submitted[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebuilds_only_after_watched_window_expires() {
        let ledger = Arc::new(
            MockLedger::new(test_window(1_000))
                .with_rotating_windows()
                .with_polls(vec![
                    PollScript::Status(LedgerStatus::pending(10)),
                    PollScript::Status(LedgerStatus::pending(10)),
                    PollScript::Status(LedgerStatus::pending(1_001)),
                    PollScript::Status(LedgerStatus::landed(20)),
                ]),
        );
        let signer = Keypair::new();

        let report = orchestrator_with_polls(ledger.clone(), 5, two_polls())
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        let submitted = ledger.submitted();
        assert!(outcome.is_confirmed());
        assert_eq!(attempts, 2);
        assert_eq!(ledger.windows_served(), 2);
        assert_eq!(submitted.len(), 2);
        assert_ne!(submitted[0], submitted[1]);
        assert_eq!(outcome.signature(), Some(&submitted[1]));

        // The expiry was observed on the first signature before the rebuild
        let polled = ledger.polled();
        assert_eq!(polled[..3], [submitted[0]; 3]);
        assert_eq!(polled[3], submitted[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_can_confirm_the_earlier_transaction() {
        let ledger = Arc::new(
            MockLedger::new(test_window(1_000))
                .with_rotating_windows()
                .with_polls(vec![
                    PollScript::Status(LedgerStatus::pending(10)),
                    PollScript::Status(LedgerStatus::pending(10)),
                    PollScript::Status(LedgerStatus::landed(12)),
                ]),
        );
        let signer = Keypair::new();

        let report = orchestrator_with_polls(ledger.clone(), 5, two_polls())
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        assert!(outcome.is_confirmed());
        assert_eq!(attempts, 1);
        assert_eq!(outcome.signature(), Some(&ledger.submitted()[0]));
        assert_eq!(ledger.windows_served(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_submission_rebuilds_without_watching() {
        let ledger = Arc::new(
            MockLedger::new(test_window(1_000))
                .with_rotating_windows()
                .with_submit_error(ExecutorError::BlockhashNotFound {
                    endpoint: "rpc".into(),
                }),
        );
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 1)
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        assert!(matches!(
            outcome.error(),
            Some(ExecutorError::BlockhashNotFound { .. })
        ));
        assert_eq!(attempts, 2);
        assert_eq!(ledger.windows_served(), 2);
        assert!(ledger.polled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_timeout_is_watched_until_expiry() {
        let ledger = Arc::new(
            MockLedger::new(test_window(100))
                .with_submit_error(ExecutorError::Timeout {
                    endpoint: "ledger".into(),
                    timeout_ms: 10_000,
                })
                .with_polls(vec![PollScript::Status(LedgerStatus::pending(101))]),
        );
        let signer = Keypair::new();

        let report = orchestrator(ledger.clone(), 1)
            .execute(&factory(), &signer)
            .await
            .unwrap();

        let SwapReport::Executed { outcome, attempts } = report else {
            panic!("expected execution report");
        };
        // The only retry went to watching; the budget ran out after expiry
        assert!(matches!(outcome.error(), Some(ExecutorError::Expired { .. })));
        assert_eq!(attempts, 1);
        assert_eq!(ledger.windows_served(), 1);
        assert_eq!(ledger.polled().len(), 1);
    }
}
