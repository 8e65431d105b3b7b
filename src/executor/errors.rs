//! Error types for the execution and confirmation subsystem
//!
//! One taxonomy covers every failure an execution attempt can hit:
//! - Configuration: fatal, surfaced to the caller as `Err`
//! - Transport / Timeout / RpcResponse / RateLimited: per-endpoint or per-call
//!   network failures, recovered locally by the fan-out engine and the poller
//! - NoEndpointAccepted: every bundle endpoint failed
//! - LedgerRejection: landed with an on-chain execution error
//! - Expired: the validity window closed before finality was observed
//! - ConfirmationTimeout: the poll budget ran out while the window was open

use solana_sdk::signature::Signature;
use thiserror::Error;

/// Comprehensive error type for transaction execution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// Invalid or missing configuration (no endpoints, empty tip set, zero tip)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller handed over a transaction that breaks the executor contract
    ///
    /// This includes:
    /// - Unsigned transaction (no primary signature)
    /// - Fee payer differs from the supplied signer
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Transport-level errors (network, connection refused, bad status)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// A single call exceeded its own deadline
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The remote service answered with an error object
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    /// The reference blockhash is unknown to the node or too old
    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    /// Every bundle endpoint failed or timed out
    #[error("no endpoint accepted bundle ({attempted} attempted, {refused} refused)")]
    NoEndpointAccepted {
        attempted: usize,
        /// Endpoints that answered with an outright refusal
        refused: usize,
        first_error: Option<Box<ExecutorError>>,
    },

    /// Transaction landed but its execution failed on chain
    #[error("Transaction {signature} rejected on chain: {reason}")]
    LedgerRejection { signature: Signature, reason: String },

    /// The validity window closed before the transaction was observed
    #[error("Transaction {signature} expired: block height {block_height} exceeds {expiry_height}")]
    Expired {
        signature: Signature,
        block_height: u64,
        expiry_height: u64,
    },

    /// The poller used its whole budget without a verdict
    #[error("Confirmation of {signature} timed out after {polls} polls")]
    ConfirmationTimeout { signature: Signature, polls: u32 },

    /// Failed to sign the fee transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Failed to compile or serialize a transaction
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl ExecutorError {
    /// Check if a fresh attempt (new window, new signature) might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Timeout { .. } => true,
            Self::RateLimited { .. } => true,
            Self::BlockhashNotFound { .. } => true,
            Self::NoEndpointAccepted { .. } => true,
            Self::Expired { .. } => true,
            Self::ConfirmationTimeout { .. } => true,

            Self::Configuration(_) => false,
            Self::InvalidTransaction(_) => false,
            Self::LedgerRejection { .. } => false,
            Self::Signing(_) => false,
            Self::Serialization(_) => false,

            // Retry on server errors (5xx)
            Self::RpcResponse { code, .. } => matches!(code, Some(c) if (500..600).contains(c)),
        }
    }

    /// True when the error proves the transaction can never land, so a new
    /// one may be built without risking a double execution.
    ///
    /// Timeouts and dropped connections are ambiguous: the request may have
    /// reached the remote side before our end gave up.
    pub fn rules_out_landing(&self) -> bool {
        match self {
            Self::Expired { .. } => true,
            Self::LedgerRejection { .. } => true,
            Self::NoEndpointAccepted {
                attempted, refused, ..
            } => refused == attempted,

            // Never left the process
            Self::Configuration(_) => true,
            Self::InvalidTransaction(_) => true,
            Self::Signing(_) => true,
            Self::Serialization(_) => true,

            _ => self.is_refusal(),
        }
    }

    /// The remote side answered and declined the request
    pub fn is_refusal(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::BlockhashNotFound { .. } => true,
            // A 5xx from a gateway may come after the request was forwarded
            Self::RpcResponse { code, .. } => !matches!(code, Some(c) if (500..600).contains(c)),
            _ => false,
        }
    }

    /// Only contract and configuration errors escape `execute_and_confirm` as `Err`
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidTransaction(_))
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config",
            Self::InvalidTransaction(_) => "contract",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::RpcResponse { .. } => "rpc",
            Self::RateLimited { .. } => "rate_limit",
            Self::BlockhashNotFound { .. } => "blockhash",
            Self::NoEndpointAccepted { .. } => "bundle",
            Self::LedgerRejection { .. } => "rejected",
            Self::Expired { .. } => "expired",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Signing(_) => "signing",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Transport { endpoint, .. } => Some(endpoint),
            Self::Timeout { endpoint, .. } => Some(endpoint),
            Self::RpcResponse { endpoint, .. } => Some(endpoint),
            Self::RateLimited { endpoint } => Some(endpoint),
            Self::BlockhashNotFound { endpoint } => Some(endpoint),
            _ => None,
        }
    }
}

// Convenience constructors for common error scenarios
impl ExecutorError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn no_endpoint_accepted(
        attempted: usize,
        refused: usize,
        first_error: Option<ExecutorError>,
    ) -> Self {
        Self::NoEndpointAccepted {
            attempted,
            refused,
            first_error: first_error.map(Box::new),
        }
    }
}
