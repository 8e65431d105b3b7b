//! Shared types for execution attempts

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, signature::Signature};
use std::fmt;

use super::errors::ExecutorError;

/// Blockhash reference plus the last block height at which a transaction
/// compiled against it can still land.
///
/// Fetched once per execution attempt; never refreshed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub reference_hash: Hash,
    pub expiry_height: u64,
}

impl ValidityWindow {
    pub fn new(reference_hash: Hash, expiry_height: u64) -> Self {
        Self {
            reference_hash,
            expiry_height,
        }
    }

    /// True once the ledger has moved past the window
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.expiry_height
    }
}

/// Delivery strategy selected at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Submit once to the primary RPC, then confirm
    Direct,
    /// Co-submit a tip transfer as a Jito bundle to every block engine, then
    /// confirm the tip transfer
    PriorityBundle,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::PriorityBundle => write!(f, "priority_bundle"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "send" => Ok(Self::Direct),
            "priority_bundle" | "priority-bundle" | "bundle" | "jito" => Ok(Self::PriorityBundle),
            other => Err(ExecutorError::config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Terminal result of one execution attempt.
///
/// Built only through [`ExecutionOutcome::confirmed`] and
/// [`ExecutionOutcome::failed`], so a confirmed outcome always carries its
/// signature and never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    confirmed: bool,
    signature: Option<Signature>,
    error: Option<ExecutorError>,
}

impl ExecutionOutcome {
    pub fn confirmed(signature: Signature) -> Self {
        Self {
            confirmed: true,
            signature: Some(signature),
            error: None,
        }
    }

    pub fn failed(signature: Option<Signature>, error: ExecutorError) -> Self {
        Self {
            confirmed: false,
            signature,
            error: Some(error),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn error(&self) -> Option<&ExecutorError> {
        self.error.as_ref()
    }

    /// Whether a new attempt with a fresh window is worth making
    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(ExecutorError::is_retryable)
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.signature, &self.error) {
            (Some(sig), None) => write!(f, "confirmed {sig}"),
            (sig, Some(err)) => match sig {
                Some(sig) => write!(f, "not confirmed {sig}: {err}"),
                None => write!(f, "not confirmed: {err}"),
            },
            (None, None) => write!(f, "not confirmed"),
        }
    }
}
