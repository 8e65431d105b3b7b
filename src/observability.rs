//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for tracking one swap across retries and components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for compact log lines
    pub fn short(&self) -> &str {
        let id = self.as_str();
        id.get(..8).unwrap_or(id)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Link to a landed transaction on Solscan
pub fn solscan_tx_url(signature: &str) -> String {
    format!("https://solscan.io/tx/{signature}")
}

/// Link to a submitted bundle on the Jito explorer
pub fn jito_bundle_url(bundle_id: &str) -> String {
    format!("https://explorer.jito.wtf/bundle/{bundle_id}")
}
