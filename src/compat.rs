//! Compatibility layer for Solana SDK types
//!
//! Uniform access to message headers and account keys for both Legacy and V0
//! messages, plus the pre-submission checks every executor runs on the
//! transaction it is handed.

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

use crate::executor::ExecutorError;

/// Get the message header from a `VersionedMessage`.
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Get the static account keys from a `VersionedMessage`.
///
/// For V0 messages this excludes addresses loaded from lookup tables.
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Accounts that must sign; always the first N static keys.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// Fee payer of a message, if it has any account at all
#[inline]
#[must_use]
pub fn fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_static_account_keys(message).first()
}

/// The signature the ledger indexes the transaction under
#[inline]
#[must_use]
pub fn primary_signature(tx: &VersionedTransaction) -> Option<&Signature> {
    tx.signatures
        .first()
        .filter(|sig| **sig != Signature::default())
}

/// Reject a transaction that is not fully signed or whose fee payer is not
/// `expected_payer`.
pub fn ensure_signed_by(tx: &VersionedTransaction, expected_payer: &Pubkey) -> Result<(), ExecutorError> {
    let payer = fee_payer(&tx.message)
        .ok_or_else(|| ExecutorError::InvalidTransaction("message has no accounts".into()))?;
    if payer != expected_payer {
        return Err(ExecutorError::InvalidTransaction(format!(
            "fee payer {payer} is not the signer {expected_payer}"
        )));
    }

    let required = get_required_signers(&tx.message).len();
    if tx.signatures.len() < required || primary_signature(tx).is_none() {
        return Err(ExecutorError::InvalidTransaction("transaction is not signed".into()));
    }
    if !tx.verify_with_results().iter().all(|ok| *ok) {
        return Err(ExecutorError::InvalidTransaction(
            "signature verification failed".into(),
        ));
    }
    Ok(())
}
