//! `LedgerClient` over the nonblocking Solana `RpcClient`

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature, transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{classify_client_error, LedgerClient, LedgerStatus, SimulationReport};
use crate::executor::{ExecutorError, ValidityWindow};

/// Primary-RPC ledger access. Every call inherits the client's request timeout.
pub struct RpcLedgerClient {
    client: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for RpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerClient")
            .field("url", &self.url)
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl RpcLedgerClient {
    /// `commitment` is the level at which a transaction counts as final
    pub fn new(url: impl Into<String>, timeout: Duration, commitment: CommitmentConfig) -> Self {
        let url = url.into();
        Self {
            client: Arc::new(RpcClient::new_with_timeout_and_commitment(
                url.clone(),
                timeout,
                commitment,
            )),
            url,
            commitment,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn get_validity_window(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<ValidityWindow, ExecutorError> {
        let (hash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| classify_client_error(&e, &self.url))?;

        debug!(
            blockhash = %hash,
            last_valid_block_height,
            "Fetched validity window"
        );
        Ok(ValidityWindow::new(hash, last_valid_block_height))
    }

    #[instrument(skip(self, transaction), fields(url = %self.url))]
    async fn submit(&self, transaction: &VersionedTransaction) -> Result<Signature, ExecutorError> {
        // The executor owns confirmation and retry; keep the node from
        // rebroadcasting on its own.
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| {
                let err = classify_client_error(&e, &self.url);
                warn!(error = %err, "sendTransaction failed");
                err
            })
    }

    async fn poll_status(
        &self,
        signature: &Signature,
        window: &ValidityWindow,
    ) -> Result<LedgerStatus, ExecutorError> {
        let statuses = self
            .client
            .get_signature_statuses(std::slice::from_ref(signature))
            .await
            .map_err(|e| classify_client_error(&e, &self.url))?;

        let block_height = self
            .client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| classify_client_error(&e, &self.url))?;

        let status = statuses.value.into_iter().next().flatten();
        let observed = match status {
            None => LedgerStatus::pending(block_height),
            Some(status) => match status.err {
                Some(err) => LedgerStatus::failed(block_height, err.to_string()),
                None if status.satisfies_commitment(self.commitment) => {
                    LedgerStatus::landed(block_height)
                }
                None => LedgerStatus::pending(block_height),
            },
        };

        debug!(
            signature = %signature,
            reference_hash = %window.reference_hash,
            block_height,
            expiry_height = window.expiry_height,
            included = observed.included,
            "Polled signature status"
        );
        Ok(observed)
    }

    #[instrument(skip(self, transaction), fields(url = %self.url))]
    async fn simulate(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<SimulationReport, ExecutorError> {
        let response = self
            .client
            .simulate_transaction(transaction)
            .await
            .map_err(|e| classify_client_error(&e, &self.url))?;

        let result = response.value;
        Ok(SimulationReport {
            error: result.err.map(|e| format!("{e:?}")),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }
}
