//! Structured logging and pipeline context

use crate::executor::{ExecutionOutcome, StrategyKind};
use crate::observability::{solscan_tx_url, CorrelationId};

/// Structured logger for execution pipeline events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: CorrelationId,
}

impl StructuredLogger {
    pub fn new(context_id: CorrelationId) -> Self {
        Self { context_id }
    }

    pub fn log_execution_attempt(&self, strategy: StrategyKind, attempt: u32, expiry_height: u64) {
        tracing::info!(
            context_id = %self.context_id,
            strategy = %strategy,
            attempt = %attempt,
            expiry_height = %expiry_height,
            "Attempting transaction execution"
        );
    }

    pub fn log_execution_outcome(&self, outcome: &ExecutionOutcome, latency_ms: u64) {
        let signature = outcome.signature().map(|s| s.to_string()).unwrap_or_default();
        match outcome.error() {
            None => tracing::info!(
                context_id = %self.context_id,
                signature = %signature,
                explorer = %solscan_tx_url(&signature),
                latency_ms = %latency_ms,
                "Transaction confirmed"
            ),
            Some(err) => tracing::warn!(
                context_id = %self.context_id,
                signature = %signature,
                error = %err,
                category = %err.category(),
                retryable = %err.is_retryable(),
                latency_ms = %latency_ms,
                "Transaction execution failed"
            ),
        }
    }

    pub fn log_retry(&self, attempt: u32, delay_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            attempt = %attempt,
            delay_ms = %delay_ms,
            "Retrying with a fresh validity window"
        );
    }

    pub fn log_watch(&self, signature: &str, expiry_height: u64, delay_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            expiry_height = %expiry_height,
            delay_ms = %delay_ms,
            "Previous transaction may still land; watching it instead of resubmitting"
        );
    }

    pub fn log_simulation(&self, succeeded: bool, units_consumed: Option<u64>, log_lines: usize) {
        tracing::info!(
            context_id = %self.context_id,
            succeeded = %succeeded,
            units_consumed = ?units_consumed,
            log_lines = %log_lines,
            "Simulation finished"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            message = %message,
            "Warning"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            context_id = %self.context_id,
            message = %message,
            "Error"
        );
    }
}

/// Per-swap execution context shared by every attempt
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Correlates every log line of one swap
    pub correlation_id: CorrelationId,

    /// Operation name
    pub operation: String,

    /// Attempt number, starting at 1
    pub attempt: u32,

    /// Structured logger instance
    pub logger: StructuredLogger,
}

impl PipelineContext {
    /// Create a new pipeline context
    pub fn new(operation: &str) -> Self {
        let correlation_id = CorrelationId::new();
        Self {
            logger: StructuredLogger::new(correlation_id.clone()),
            correlation_id,
            operation: operation.to_string(),
            attempt: 1,
        }
    }

    /// Same swap, next attempt
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Span carrying the correlation fields for everything run inside it
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "execution",
            correlation_id = %self.correlation_id.short(),
            operation = %self.operation,
            attempt = self.attempt
        )
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new("default")
    }
}
