//! Test Utilities Module
//!
//! Scripted ledger and bundle transport doubles for deterministic tests of the
//! executor. Nothing here touches the network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
#[allow(deprecated)]
use solana_sdk::system_instruction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::executor::{BundlePayload, BundleReceipt, BundleTransport, ExecutorError, ValidityWindow};
use crate::rpc_manager::{LedgerClient, LedgerStatus, SimulationReport};

/// What one endpoint does with a bundle
#[derive(Debug, Clone)]
pub enum TransportBehavior {
    /// Answer with a bundle id
    Accept,
    /// Answer with a transport error
    Fail,
    /// Never answer
    Hang,
    /// Answer with a bundle id after a delay
    Delay(Duration),
}

/// Bundle transport whose N-th call follows the N-th behavior.
///
/// Calls beyond the script accept.
#[derive(Debug)]
pub struct MockBundleTransport {
    behaviors: Vec<TransportBehavior>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<Vec<String>>>,
}

impl MockBundleTransport {
    pub fn new(behaviors: Vec<TransportBehavior>) -> Self {
        Self {
            behaviors,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Encoded transactions of every bundle received, in call order
    pub fn payloads(&self) -> Vec<Vec<String>> {
        self.payloads.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BundleTransport for MockBundleTransport {
    async fn send_bundle(
        &self,
        endpoint: &str,
        payload: &BundlePayload,
    ) -> Result<BundleReceipt, ExecutorError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.encoded().to_vec());
        }

        let behavior = self
            .behaviors
            .get(index)
            .cloned()
            .unwrap_or(TransportBehavior::Accept);

        let receipt = BundleReceipt {
            endpoint: endpoint.to_string(),
            bundle_id: Some(format!("bundle-{index}")),
        };
        match behavior {
            TransportBehavior::Accept => Ok(receipt),
            TransportBehavior::Fail => Err(ExecutorError::transport(endpoint, "connection refused")),
            TransportBehavior::Hang => std::future::pending().await,
            TransportBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(receipt)
            }
        }
    }
}

/// One scripted answer to `poll_status`
#[derive(Debug, Clone)]
pub enum PollScript {
    Status(LedgerStatus),
    Error(ExecutorError),
    Hang,
}

/// Ledger whose answers are scripted up front.
///
/// Poll answers are consumed in order; the last one repeats forever.
#[derive(Debug)]
pub struct MockLedger {
    window: ValidityWindow,
    rotate_windows: bool,
    submit_error: Option<ExecutorError>,
    polls: Mutex<VecDeque<PollScript>>,
    simulation: SimulationReport,
    submitted: Mutex<Vec<Signature>>,
    polled: Mutex<Vec<Signature>>,
    windows_served: AtomicUsize,
}

impl MockLedger {
    pub fn new(window: ValidityWindow) -> Self {
        Self {
            window,
            rotate_windows: false,
            submit_error: None,
            polls: Mutex::new(VecDeque::new()),
            simulation: SimulationReport::default(),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
            windows_served: AtomicUsize::new(0),
        }
    }

    pub fn with_polls(self, polls: Vec<PollScript>) -> Self {
        if let Ok(mut queue) = self.polls.lock() {
            *queue = polls.into();
        }
        self
    }

    /// Serve a new reference hash (same expiry) on every window request
    pub fn with_rotating_windows(mut self) -> Self {
        self.rotate_windows = true;
        self
    }

    pub fn with_submit_error(mut self, error: ExecutorError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub fn with_simulation(mut self, report: SimulationReport) -> Self {
        self.simulation = report;
        self
    }

    pub fn submitted(&self) -> Vec<Signature> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn polled(&self) -> Vec<Signature> {
        self.polled.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn windows_served(&self) -> usize {
        self.windows_served.load(Ordering::SeqCst)
    }

    fn next_poll(&self) -> PollScript {
        let Ok(mut queue) = self.polls.lock() else {
            return PollScript::Error(ExecutorError::transport("mock", "poisoned"));
        };
        match queue.len() {
            0 => PollScript::Status(LedgerStatus::pending(0)),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap_or(PollScript::Hang),
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_validity_window(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<ValidityWindow, ExecutorError> {
        self.windows_served.fetch_add(1, Ordering::SeqCst);
        if self.rotate_windows {
            return Ok(ValidityWindow::new(Hash::new_unique(), self.window.expiry_height));
        }
        Ok(self.window)
    }

    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, ExecutorError> {
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        let signature = transaction.signatures[0];
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(signature);
        }
        Ok(signature)
    }

    async fn poll_status(
        &self,
        signature: &Signature,
        _window: &ValidityWindow,
    ) -> Result<LedgerStatus, ExecutorError> {
        if let Ok(mut polled) = self.polled.lock() {
            polled.push(*signature);
        }
        match self.next_poll() {
            PollScript::Status(status) => Ok(status),
            PollScript::Error(err) => Err(err),
            PollScript::Hang => std::future::pending().await,
        }
    }

    async fn simulate(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<SimulationReport, ExecutorError> {
        Ok(self.simulation.clone())
    }
}

/// Signed single-transfer transaction against `window`
pub fn signed_transfer(payer: &Keypair, window: &ValidityWindow) -> VersionedTransaction {
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 5_000);
    let msg = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], window.reference_hash)
        .expect("compile transfer");
    VersionedTransaction::try_new(VersionedMessage::V0(msg), &[payer]).expect("sign transfer")
}

/// Window anchored to a fresh random hash
pub fn test_window(expiry_height: u64) -> ValidityWindow {
    ValidityWindow::new(Hash::new_unique(), expiry_height)
}
