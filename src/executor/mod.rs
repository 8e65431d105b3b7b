//! Transaction execution and confirmation
//!
//! An [`Executor`] takes a signed transaction and the validity window it was
//! compiled against, delivers it through one strategy, and reports a single
//! [`ExecutionOutcome`]:
//!
//! - [`DirectExecutor`] submits once to the RPC node and confirms the
//!   transaction's own signature.
//! - [`PriorityBundleExecutor`] pairs it with a tip transfer, fans the bundle
//!   out to every block engine and confirms the tip transfer's signature.
//!
//! Only configuration and contract errors come back as `Err`. Every network,
//! rejection and expiry failure is an unconfirmed outcome.

use async_trait::async_trait;
use solana_sdk::{signature::Keypair, transaction::VersionedTransaction};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

pub mod broadcast;
pub mod bundle;
pub mod confirm;
pub mod direct;
pub mod errors;
pub mod settings;
pub mod tip;
pub mod types;

pub use broadcast::{
    encode_transaction, BroadcastReport, BundleBroadcaster, BundlePayload, BundleReceipt,
    BundleTransport, HttpBundleTransport, DEFAULT_ENDPOINT_TIMEOUT,
};
pub use bundle::PriorityBundleExecutor;
pub use confirm::{ConfirmationPoller, PollSettings};
pub use direct::DirectExecutor;
pub use errors::ExecutorError;
pub use settings::{ExecutorSettings, DEFAULT_BLOCK_ENGINES, DEFAULT_TIP_LAMPORTS};
pub use tip::{build_fee_transaction, parse_tip_recipients, pick_recipient, DEFAULT_TIP_ACCOUNTS};
pub use types::{ExecutionOutcome, StrategyKind, ValidityWindow};

use crate::metrics::metrics;
use crate::rpc_manager::LedgerClient;

/// One delivery strategy
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Deliver `transaction` and wait for a verdict within `window`.
    ///
    /// `transaction` must be fully signed with `signer` as fee payer.
    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        signer: &Keypair,
        window: &ValidityWindow,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Strategy selected once at construction
#[derive(Debug, Clone)]
pub enum Executor {
    Direct(DirectExecutor),
    PriorityBundle(PriorityBundleExecutor),
}

impl Executor {
    /// Build the configured strategy on top of `ledger`, using HTTP for
    /// block-engine requests.
    pub fn from_settings(
        settings: &ExecutorSettings,
        ledger: Arc<dyn LedgerClient>,
    ) -> Result<Self, ExecutorError> {
        let transport = Arc::new(HttpBundleTransport::new(settings.endpoint_timeout)?);
        Self::with_transport(settings, ledger, transport)
    }

    /// Same as [`Executor::from_settings`] with a caller-supplied bundle
    /// transport
    pub fn with_transport(
        settings: &ExecutorSettings,
        ledger: Arc<dyn LedgerClient>,
        transport: Arc<dyn BundleTransport>,
    ) -> Result<Self, ExecutorError> {
        settings.validate()?;
        let poller = ConfirmationPoller::new(ledger.clone(), settings.poll.clone());

        match settings.strategy {
            StrategyKind::Direct => Ok(Self::Direct(DirectExecutor::new(
                ledger,
                poller,
                settings.submit_timeout,
            ))),
            StrategyKind::PriorityBundle => {
                let broadcaster = BundleBroadcaster::new(
                    transport,
                    settings.endpoints.clone(),
                    settings.endpoint_timeout,
                );
                let recipients = parse_tip_recipients(&settings.tip_accounts)?;
                Ok(Self::PriorityBundle(PriorityBundleExecutor::new(
                    broadcaster,
                    poller,
                    recipients,
                    settings.tip_lamports,
                )?))
            }
        }
    }

    /// Poller shared by both strategies
    pub fn poller(&self) -> &ConfirmationPoller {
        match self {
            Self::Direct(inner) => inner.poller(),
            Self::PriorityBundle(inner) => inner.poller(),
        }
    }
}

#[async_trait]
impl TransactionExecutor for Executor {
    fn kind(&self) -> StrategyKind {
        match self {
            Self::Direct(inner) => inner.kind(),
            Self::PriorityBundle(inner) => inner.kind(),
        }
    }

    #[instrument(skip_all, fields(strategy = %self.kind(), expiry_height = window.expiry_height))]
    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        signer: &Keypair,
        window: &ValidityWindow,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let m = metrics();
        m.executions_total.inc();
        m.executions_in_flight.inc();
        let started = Instant::now();

        let result = match self {
            Self::Direct(inner) => inner.execute_and_confirm(transaction, signer, window).await,
            Self::PriorityBundle(inner) => {
                inner.execute_and_confirm(transaction, signer, window).await
            }
        };

        m.executions_in_flight.dec();
        m.execution_latency.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => match outcome.error() {
                None => m.executions_confirmed.inc(),
                Some(err) => m.record_failure(err.category()),
            },
            Err(err) => m.record_failure(err.category()),
        }
        result
    }
}
