//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Mutex;
use std::time::Duration;

use swap_executor::executor::{ExecutorSettings, PollSettings, StrategyKind};
use swap_executor::rpc_manager::{LedgerClient, LedgerStatus, SimulationReport};
use swap_executor::{ExecutorError, SwapTransactionFactory, TransferFactory, ValidityWindow};

/// Ledger that answers polls from a fixed script; the last answer repeats
#[derive(Debug)]
pub struct ScriptedLedger {
    window: ValidityWindow,
    polls: Mutex<Vec<LedgerStatus>>,
    submitted: Mutex<Vec<Signature>>,
    polled: Mutex<Vec<Signature>>,
}

impl ScriptedLedger {
    pub fn new(expiry_height: u64, polls: Vec<LedgerStatus>) -> Self {
        Self {
            window: ValidityWindow::new(Hash::new_unique(), expiry_height),
            polls: Mutex::new(polls),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
        }
    }

    pub fn window(&self) -> ValidityWindow {
        self.window
    }

    pub fn submitted(&self) -> Vec<Signature> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<Signature> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn get_validity_window(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<ValidityWindow, ExecutorError> {
        Ok(self.window)
    }

    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, ExecutorError> {
        let signature = transaction.signatures[0];
        self.submitted.lock().unwrap().push(signature);
        Ok(signature)
    }

    async fn poll_status(
        &self,
        signature: &Signature,
        _window: &ValidityWindow,
    ) -> Result<LedgerStatus, ExecutorError> {
        self.polled.lock().unwrap().push(*signature);
        let mut polls = self.polls.lock().unwrap();
        let status = if polls.len() > 1 {
            polls.remove(0)
        } else {
            polls
                .first()
                .cloned()
                .unwrap_or_else(|| LedgerStatus::pending(0))
        };
        Ok(status)
    }

    async fn simulate(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<SimulationReport, ExecutorError> {
        Ok(SimulationReport::default())
    }
}

/// Fast polling so real-time tests stay short
pub fn fast_poll() -> PollSettings {
    PollSettings {
        poll_interval: Duration::from_millis(20),
        poll_timeout: Duration::from_millis(500),
        max_poll_iterations: 50,
        max_wait: Duration::from_secs(5),
        max_consecutive_errors: 3,
    }
}

pub fn direct_settings() -> ExecutorSettings {
    ExecutorSettings {
        strategy: StrategyKind::Direct,
        poll: fast_poll(),
        ..ExecutorSettings::default()
    }
}

pub fn bundle_settings(endpoints: Vec<String>, endpoint_timeout: Duration) -> ExecutorSettings {
    ExecutorSettings {
        strategy: StrategyKind::PriorityBundle,
        endpoints,
        endpoint_timeout,
        poll: fast_poll(),
        ..ExecutorSettings::default()
    }
}

/// Signed transfer from `signer` compiled against `window`
pub fn signed_transfer(signer: &Keypair, window: &ValidityWindow) -> VersionedTransaction {
    let message = TransferFactory::new(solana_sdk::pubkey::Pubkey::new_unique(), 5_000)
        .build_message(&signer.pubkey(), window)
        .unwrap();
    VersionedTransaction::try_new(message, &[signer]).unwrap()
}

/// Endpoint that accepts TCP connections into its backlog but never answers
pub async fn silent_endpoint() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/v1/bundles", listener.local_addr().unwrap());
    (listener, url)
}

/// Decode one base58 wire transaction from a bundle request
pub fn decode(encoded: &str) -> VersionedTransaction {
    bincode::deserialize(&bs58::decode(encoded).into_vec().unwrap()).unwrap()
}
