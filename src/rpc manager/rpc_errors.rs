use solana_client::client_error::ClientError;

use crate::executor::ExecutorError;

/// Map a Solana `ClientError` onto the executor taxonomy, classifying by
/// message the way node errors actually arrive.
pub fn classify_client_error(err: &ClientError, endpoint: &str) -> ExecutorError {
    classify_error_message(&err.to_string(), endpoint, None)
}

/// Message-based classification shared by RPC and block-engine responses
pub fn classify_error_message(message: &str, endpoint: &str, timeout_ms: Option<u64>) -> ExecutorError {
    let err_str = message.to_lowercase();

    if err_str.contains("blockhash not found") || err_str.contains("block height exceeded") {
        ExecutorError::BlockhashNotFound {
            endpoint: endpoint.to_string(),
        }
    } else if err_str.contains("rate limit")
        || err_str.contains("too many requests")
        || err_str.contains("429")
    {
        ExecutorError::RateLimited {
            endpoint: endpoint.to_string(),
        }
    } else if err_str.contains("timeout") || err_str.contains("timed out") {
        ExecutorError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout_ms.unwrap_or(0),
        }
    } else if err_str.contains("connection") || err_str.contains("dns") || err_str.contains("io error") {
        ExecutorError::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    } else {
        // Extract error code if available
        let code = err_str
            .split("code:")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.trim_matches(|c: char| !c.is_ascii_digit() && c != '-').parse::<i64>().ok());

        ExecutorError::RpcResponse {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
            code,
        }
    }
}

/// Retry policy for whole execution attempts (caller side of the executor)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,

    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Calculate delay before retry number `attempt` (0-based).
    /// `None` once the retry budget is spent.
    pub fn calculate_delay(&self, attempt: u32) -> Option<std::time::Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        // Exponential backoff
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        // Add jitter to prevent thundering herd
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(std::time::Duration::from_millis(jittered_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_messages() {
        let err = classify_error_message("Blockhash not found", "rpc", None);
        assert!(matches!(err, ExecutorError::BlockhashNotFound { .. }));

        let err = classify_error_message("HTTP status client error (429 Too Many Requests)", "rpc", None);
        assert!(matches!(err, ExecutorError::RateLimited { .. }));

        let err = classify_error_message("operation timed out", "rpc", Some(1500));
        assert_eq!(
            err,
            ExecutorError::Timeout {
                endpoint: "rpc".into(),
                timeout_ms: 1500
            }
        );

        let err = classify_error_message("error sending request: connection refused", "rpc", None);
        assert!(matches!(err, ExecutorError::Transport { .. }));
    }

    #[test]
    fn test_classify_extracts_code() {
        let err = classify_error_message("RPC response error code: -32002 Transaction simulation failed", "rpc", None);
        match err {
            ExecutorError::RpcResponse { code, endpoint, .. } => {
                assert_eq!(code, Some(-32002));
                assert_eq!(endpoint, "rpc");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy::default();

        let delay1 = policy.calculate_delay(0);
        assert!(delay1.is_some());

        // Jitter is ±10%, doubling keeps the second delay above the first
        let delay2 = policy.calculate_delay(1);
        assert!(delay2.unwrap() >= delay1.unwrap());

        assert!(policy.calculate_delay(3).is_none());
        assert!(policy.calculate_delay(10).is_none());
    }

    #[test]
    fn test_retry_policy_zero_retries() {
        let policy = RetryPolicy::with_max_retries(0);
        assert!(policy.calculate_delay(0).is_none());
    }
}
