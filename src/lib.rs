//! Transaction admission processor for a mempool subsystem.
//!
//! Accepts unverified transaction payloads, deduplicates and pre-filters
//! them, dispatches cryptographic verification to a worker pool, merges the
//! result with wallet/fee/forged-id checks against shared state, and hands
//! survivors to the mempool and peer broadcast. Every submission produces a
//! ticket id that callers poll for its outcome.
//!
//! The mempool store, wallet manager, chain database, peer broadcast
//! monitor, per-type transaction handlers and fee policy are external
//! collaborators, represented here as traits ([`collaborators`]) the host
//! application implements.

mod collaborators;
mod config;
mod dedup;
mod error;
mod pipeline;
mod prefilter;
mod processor;
mod stats;
mod tickets;
mod transaction;
mod types;
mod worker;

pub use collaborators::{
    ChainDatabase, FeeMatcher, HandlerRegistry, Mempool, MempoolRejection, PeerMonitor,
    TransactionHandler, WalletManager,
};
pub use config::ProcessorConfig;
pub use error::ProcessorError;
pub use processor::Processor;
pub use transaction::Transaction;
pub use types::{
    AccountState, DynamicFeeDecision, ErrorKind, FinishedJobResult, SenderPublicKey, TicketId,
    TxError, TxId,
};
pub use worker::{EligibleTx, WorkerBatchOutcome, WorkerVerifier};

#[cfg(any(test, feature = "testing"))]
pub mod test_support;
