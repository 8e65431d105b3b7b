//! Bundle fan-out to every configured block engine
//!
//! One serialized bundle goes to N independent endpoints concurrently. Each
//! attempt runs under its own timeout and owns its result slot; the call
//! returns once every attempt has settled, then applies any-success-wins.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::errors::ExecutorError;
use crate::metrics::{metrics, Timer};

/// Default per-endpoint deadline for a `sendBundle` request
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serialize a signed transaction to wire bytes and base58-encode it
pub fn encode_transaction(transaction: &VersionedTransaction) -> Result<String, ExecutorError> {
    let bytes = bincode::serialize(transaction)
        .map_err(|e| ExecutorError::Serialization(e.to_string()))?;
    Ok(bs58::encode(bytes).into_string())
}

/// Ordered, already-encoded bundle. Built once, shared read-only by every
/// endpoint attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePayload {
    transactions: Vec<String>,
}

impl BundlePayload {
    pub fn from_transactions(transactions: &[&VersionedTransaction]) -> Result<Self, ExecutorError> {
        let transactions = transactions
            .iter()
            .map(|tx| encode_transaction(tx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { transactions })
    }

    pub fn encoded(&self) -> &[String] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// JSON-RPC `sendBundle` request body
    pub fn request(&self) -> SendBundleRequest<'_> {
        SendBundleRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "sendBundle",
            params: [&self.transactions],
        }
    }
}

/// `{"jsonrpc":"2.0","id":1,"method":"sendBundle","params":[[tx, ...]]}`
#[derive(Debug, Serialize)]
pub struct SendBundleRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: [&'a Vec<String>; 1],
}

/// JSON-RPC envelope returned by a block engine
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// One endpoint's acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReceipt {
    pub endpoint: String,
    pub bundle_id: Option<String>,
}

/// Single-endpoint bundle submission
#[async_trait]
pub trait BundleTransport: Send + Sync + std::fmt::Debug {
    async fn send_bundle(
        &self,
        endpoint: &str,
        payload: &BundlePayload,
    ) -> Result<BundleReceipt, ExecutorError>;
}

/// `sendBundle` over HTTP JSON-RPC
#[derive(Debug, Clone)]
pub struct HttpBundleTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBundleTransport {
    pub fn new(timeout: Duration) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::config(format!("http client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn map_request_error(&self, endpoint: &str, err: reqwest::Error) -> ExecutorError {
        if err.is_timeout() {
            ExecutorError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ExecutorError::transport(endpoint, err.to_string())
        }
    }
}

#[async_trait]
impl BundleTransport for HttpBundleTransport {
    async fn send_bundle(
        &self,
        endpoint: &str,
        payload: &BundlePayload,
    ) -> Result<BundleReceipt, ExecutorError> {
        let response = self
            .client
            .post(endpoint)
            .json(&payload.request())
            .send()
            .await
            .map_err(|e| self.map_request_error(endpoint, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExecutorError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {status}: {body}"),
                code: Some(i64::from(status.as_u16())),
            });
        }

        // A 2xx answer is an acceptance; the body only adds the bundle id
        let body = response.text().await.unwrap_or_default();
        let parsed = match serde_json::from_str::<JsonRpcResponse>(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Unparseable sendBundle response");
                return Ok(BundleReceipt {
                    endpoint: endpoint.to_string(),
                    bundle_id: None,
                });
            }
        };

        if let Some(error) = parsed.error {
            return Err(ExecutorError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: error.message,
                code: Some(error.code),
            });
        }

        Ok(BundleReceipt {
            endpoint: endpoint.to_string(),
            bundle_id: parsed.result,
        })
    }
}

/// Settled fan-out, partitioned
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub accepted: Vec<BundleReceipt>,
    pub failures: Vec<ExecutorError>,
    /// First failure in endpoint order, kept for diagnostics
    pub first_error: Option<ExecutorError>,
}

impl BroadcastReport {
    /// Partition settled attempts; order follows the endpoint list
    pub fn from_settled<I>(settled: I) -> Self
    where
        I: IntoIterator<Item = Result<BundleReceipt, ExecutorError>>,
    {
        let mut report = Self::default();
        for result in settled {
            match result {
                Ok(receipt) => report.accepted.push(receipt),
                Err(err) => {
                    if report.first_error.is_none() {
                        report.first_error = Some(err.clone());
                    }
                    report.failures.push(err);
                }
            }
        }
        report
    }

    pub fn any_accepted(&self) -> bool {
        !self.accepted.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.accepted.len() + self.failures.len()
    }

    /// First endpoint that handed back a bundle id
    pub fn bundle_id(&self) -> Option<&str> {
        self.accepted.iter().find_map(|r| r.bundle_id.as_deref())
    }

    /// Collapse into the any-success-wins verdict
    pub fn into_result(self) -> Result<Vec<BundleReceipt>, ExecutorError> {
        if self.any_accepted() {
            Ok(self.accepted)
        } else {
            let refused = self.failures.iter().filter(|e| e.is_refusal()).count();
            Err(ExecutorError::no_endpoint_accepted(
                self.failures.len(),
                refused,
                self.first_error,
            ))
        }
    }
}

/// Concurrent submission of one bundle to every configured endpoint
#[derive(Debug, Clone)]
pub struct BundleBroadcaster {
    transport: Arc<dyn BundleTransport>,
    endpoints: Vec<String>,
    per_endpoint_timeout: Duration,
}

impl BundleBroadcaster {
    pub fn new(
        transport: Arc<dyn BundleTransport>,
        endpoints: Vec<String>,
        per_endpoint_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoints,
            per_endpoint_timeout,
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Submit `payload` to every endpoint and wait for all of them to settle.
    ///
    /// Fails only when no endpoint is configured; per-endpoint failures are
    /// reported inside the [`BroadcastReport`].
    #[instrument(skip_all, fields(endpoints = self.endpoints.len(), txs = payload.len()))]
    pub async fn broadcast(&self, payload: &BundlePayload) -> Result<BroadcastReport, ExecutorError> {
        if self.endpoints.is_empty() {
            return Err(ExecutorError::config("no bundle endpoints configured"));
        }

        let timeout_ms = self.per_endpoint_timeout.as_millis() as u64;
        let timer = Timer::new();

        let attempts = self.endpoints.iter().map(|endpoint| async move {
            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(
                self.per_endpoint_timeout,
                self.transport.send_bundle(endpoint, payload),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout {
                    endpoint: endpoint.clone(),
                    timeout_ms,
                }),
            };

            let m = metrics();
            match &result {
                Ok(receipt) => {
                    m.bundle_endpoint_accepted.inc();
                    debug!(
                        endpoint = %endpoint,
                        bundle_id = ?receipt.bundle_id,
                        latency_ms = attempt_started.elapsed().as_millis() as u64,
                        "Bundle accepted by endpoint"
                    );
                }
                Err(err) => {
                    m.bundle_endpoint_failed.inc();
                    warn!(
                        endpoint = %endpoint,
                        error = %err,
                        latency_ms = attempt_started.elapsed().as_millis() as u64,
                        "Bundle endpoint failed"
                    );
                }
            }
            result
        });

        let report = BroadcastReport::from_settled(join_all(attempts).await);
        timer.observe_duration(&metrics().broadcast_latency);

        info!(
            accepted = report.accepted.len(),
            failed = report.failures.len(),
            bundle_id = ?report.bundle_id(),
            "Bundle fan-out settled"
        );
        Ok(report)
    }
}
