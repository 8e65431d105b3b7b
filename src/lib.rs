//! Swap Executor - Solana transaction execution and confirmation
//!
//! Delivers a signed transaction either directly to an RPC node or as a tipped
//! Jito bundle fanned out to every block engine, then polls the ledger until
//! the transaction lands, fails on chain, or its validity window runs out.

pub mod compat;
pub mod config;
pub mod endpoints;
pub mod executor;
pub mod metrics;
pub mod observability;
pub mod structured_logging;
pub mod swap;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

// Re-export commonly used types
pub use executor::{
    ExecutionOutcome, Executor, ExecutorError, ExecutorSettings, StrategyKind, TransactionExecutor,
    ValidityWindow,
};
pub use rpc_manager::{LedgerClient, RpcLedgerClient};
pub use swap::{SwapOrchestrator, SwapReport, SwapTransactionFactory, TransferFactory};
