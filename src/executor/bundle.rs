//! Priority-bundle strategy
//!
//! The main transaction travels together with a freshly signed tip transfer as
//! one atomic bundle. Bundles land all-or-nothing, so the tip transfer's
//! signature stands in for the whole bundle during confirmation.

use async_trait::async_trait;
use nonempty::NonEmpty;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use tracing::{debug, info, warn};

use super::broadcast::{BundleBroadcaster, BundlePayload};
use super::confirm::ConfirmationPoller;
use super::errors::ExecutorError;
use super::tip::{build_fee_transaction, pick_recipient};
use super::types::{ExecutionOutcome, StrategyKind, ValidityWindow};
use super::TransactionExecutor;
use crate::compat::{ensure_signed_by, primary_signature};
use crate::observability::jito_bundle_url;

#[derive(Debug, Clone)]
pub struct PriorityBundleExecutor {
    broadcaster: BundleBroadcaster,
    poller: ConfirmationPoller,
    tip_recipients: NonEmpty<Pubkey>,
    tip_lamports: u64,
}

impl PriorityBundleExecutor {
    pub fn new(
        broadcaster: BundleBroadcaster,
        poller: ConfirmationPoller,
        tip_recipients: NonEmpty<Pubkey>,
        tip_lamports: u64,
    ) -> Result<Self, ExecutorError> {
        if broadcaster.endpoints().is_empty() {
            return Err(ExecutorError::config("no bundle endpoints configured"));
        }
        if tip_lamports == 0 {
            return Err(ExecutorError::config("tip_lamports must be positive"));
        }
        Ok(Self {
            broadcaster,
            poller,
            tip_recipients,
            tip_lamports,
        })
    }

    pub fn poller(&self) -> &ConfirmationPoller {
        &self.poller
    }
}

#[async_trait]
impl TransactionExecutor for PriorityBundleExecutor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PriorityBundle
    }

    async fn execute_and_confirm(
        &self,
        transaction: &VersionedTransaction,
        signer: &Keypair,
        window: &ValidityWindow,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        ensure_signed_by(transaction, &signer.pubkey())?;

        // ThreadRng is !Send; keep it out of the future's state
        let recipient = {
            let mut rng = rand::thread_rng();
            pick_recipient(&self.tip_recipients, &mut rng)
        };
        let fee_tx = match build_fee_transaction(signer, &recipient, self.tip_lamports, window) {
            Ok(tx) => tx,
            Err(err) => return Ok(ExecutionOutcome::failed(None, err)),
        };
        let Some(fee_signature) = primary_signature(&fee_tx).copied() else {
            return Ok(ExecutionOutcome::failed(
                None,
                ExecutorError::Signing("fee transaction carries no signature".into()),
            ));
        };
        debug!(
            recipient = %recipient,
            lamports = self.tip_lamports,
            fee_signature = %fee_signature,
            "Fee transaction signed"
        );

        let payload = match BundlePayload::from_transactions(&[transaction, &fee_tx]) {
            Ok(payload) => payload,
            Err(err) => return Ok(ExecutionOutcome::failed(None, err)),
        };

        let report = self.broadcaster.broadcast(&payload).await?;
        if let Some(bundle_id) = report.bundle_id() {
            info!(
                bundle_id = %bundle_id,
                explorer = %jito_bundle_url(bundle_id),
                "Bundle submitted"
            );
        }
        if let Err(err) = report.into_result() {
            warn!(error = %err, "Bundle rejected by every endpoint");
            return Ok(ExecutionOutcome::failed(None, err));
        }

        Ok(self.poller.confirm(&fee_signature, window).await)
    }
}
