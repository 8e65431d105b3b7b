//! Tip recipient selection and the fee side-transaction
//!
//! A priority bundle only lands if it pays a block-engine tip account. The
//! recipient is re-drawn on every attempt so load spreads over the whole set.

use nonempty::NonEmpty;
use rand::Rng;
use solana_sdk::{
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
// TODO(migrate-system-instruction): switch to solana-system-interface with the 3.x bump
#[allow(deprecated)]
use solana_sdk::system_instruction;
use std::str::FromStr;

use super::errors::ExecutorError;
use super::types::ValidityWindow;

/// Public Jito tip accounts (`getTipAccounts`)
pub const DEFAULT_TIP_ACCOUNTS: [&str; 8] = [
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
];

/// Parse a configured tip account list into a non-empty set
pub fn parse_tip_recipients<S: AsRef<str>>(accounts: &[S]) -> Result<NonEmpty<Pubkey>, ExecutorError> {
    let parsed = accounts
        .iter()
        .map(|account| {
            let account = account.as_ref();
            Pubkey::from_str(account)
                .map_err(|e| ExecutorError::config(format!("invalid tip account '{account}': {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    NonEmpty::from_vec(parsed).ok_or_else(|| ExecutorError::config("tip account set is empty"))
}

/// Pick one recipient uniformly at random
pub fn pick_recipient<R: Rng + ?Sized>(eligible: &NonEmpty<Pubkey>, rng: &mut R) -> Pubkey {
    let index = rng.gen_range(0..eligible.len());
    eligible.get(index).copied().unwrap_or(eligible.head)
}

/// Build and sign the tip transfer against the main transaction's window.
///
/// Both transactions share `window.reference_hash`, so they expire together.
pub fn build_fee_transaction(
    signer: &Keypair,
    recipient: &Pubkey,
    lamports: u64,
    window: &ValidityWindow,
) -> Result<VersionedTransaction, ExecutorError> {
    let payer = signer.pubkey();
    let instruction = system_instruction::transfer(&payer, recipient, lamports);
    let message = v0::Message::try_compile(&payer, &[instruction], &[], window.reference_hash)
        .map_err(|e| ExecutorError::Serialization(format!("fee message: {e}")))?;

    VersionedTransaction::try_new(VersionedMessage::V0(message), &[signer])
        .map_err(|e| ExecutorError::Signing(format!("fee transaction: {e}")))
}
