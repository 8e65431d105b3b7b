//! RPC Manager Module
//!
//! Ledger access for the executor: validity windows, single-endpoint
//! submission, signature status polling and simulation.

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature, transaction::VersionedTransaction,
};

use crate::executor::{ExecutorError, ValidityWindow};

// Submodules
pub mod rpc_errors;
pub mod rpc_ledger;

// Re-exports for convenience
pub use rpc_errors::{classify_client_error, RetryPolicy};
pub use rpc_ledger::RpcLedgerClient;

/// One observation of a signature on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Included at (or above) the client's confirmation commitment
    pub included: bool,
    /// On-chain execution error recorded for the signature, if any
    pub execution_error: Option<String>,
    /// Current block height at the client's commitment
    pub block_height: u64,
}

impl LedgerStatus {
    /// Signature not seen yet
    pub fn pending(block_height: u64) -> Self {
        Self {
            included: false,
            execution_error: None,
            block_height,
        }
    }

    /// Signature included without error
    pub fn landed(block_height: u64) -> Self {
        Self {
            included: true,
            execution_error: None,
            block_height,
        }
    }

    /// Signature included with an execution error
    pub fn failed(block_height: u64, error: impl Into<String>) -> Self {
        Self {
            included: true,
            execution_error: Some(error.into()),
            block_height,
        }
    }
}

/// Result of a `simulateTransaction` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Ledger operations the executor depends on.
///
/// All methods are safe to call repeatedly; re-submitting an included
/// transaction is a harmless duplicate on Solana.
#[async_trait]
pub trait LedgerClient: Send + Sync + std::fmt::Debug {
    /// Latest blockhash and its last valid block height at `commitment`
    async fn get_validity_window(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<ValidityWindow, ExecutorError>;

    /// Submit a signed transaction once
    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, ExecutorError>;

    /// Observe `signature` against the window it was compiled for
    async fn poll_status(
        &self,
        signature: &Signature,
        window: &ValidityWindow,
    ) -> Result<LedgerStatus, ExecutorError>;

    /// Dry-run a signed transaction
    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationReport, ExecutorError>;
}
