//! Core data types shared by every stage of the admission pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content-derived, stable identity of a transaction.
pub type TxId = String;

/// Opaque handle for one `create_job` submission. The only way callers
/// retrieve outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sender's public key, as seen by the wallet manager and mempool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderPublicKey(pub String);

impl fmt::Display for SenderPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a sender's account as known by the wallet manager at
/// submission time. Threaded through to the worker; the live state used for
/// `throw_if_cannot_be_applied` is held internally by the wallet manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub sender: SenderPublicKey,
    pub nonce: u64,
}

/// Closed set of per-transaction rejection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Duplicate,
    Unknown,
    LowFee,
    Apply,
    Forged,
    PoolFull,
    /// Any other `ERR_POOL_*` kind surfaced verbatim from the mempool.
    PoolOther,
}

impl ErrorKind {
    /// Wire representation, exactly the `ERR_*` strings from the external
    /// interface contract.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ErrorKind::Duplicate => "ERR_DUPLICATE",
            ErrorKind::Unknown => "ERR_UNKNOWN",
            ErrorKind::LowFee => "ERR_LOW_FEE",
            ErrorKind::Apply => "ERR_APPLY",
            ErrorKind::Forged => "ERR_FORGED",
            ErrorKind::PoolFull => "ERR_POOL_FULL",
            ErrorKind::PoolOther => "ERR_POOL_OTHER",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_wire_str())
    }
}

/// A per-transaction rejection record: `{kind, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct TxError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TxError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Independent `enter_pool` / `broadcast` verdict from the fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicFeeDecision {
    pub enter_pool: bool,
    pub broadcast: bool,
}

/// Mutable per-ticket accumulator, held from submission through completion.
///
/// Invariant: once the post-worker pipeline has run to completion, the five
/// keysets (`invalid`, `excess`, `errors`, `accept`, `broadcast`) are
/// pairwise disjoint.
pub struct PendingJobResult<T> {
    pub ticket_id: TicketId,
    pub invalid: HashMap<TxId, TxError>,
    pub excess: HashMap<TxId, TxError>,
    pub errors: HashMap<TxId, TxError>,
    pub accept: HashMap<TxId, Arc<T>>,
    pub broadcast: HashMap<TxId, Arc<T>>,
    /// Filled by the worker: signature-verified transactions, in submission
    /// order, as `(raw_bytes, id)` pairs.
    pub valid_transactions: Vec<(Vec<u8>, TxId)>,
}

impl<T> PendingJobResult<T> {
    pub fn new(ticket_id: TicketId) -> Self {
        Self {
            ticket_id,
            invalid: HashMap::new(),
            excess: HashMap::new(),
            errors: HashMap::new(),
            accept: HashMap::new(),
            broadcast: HashMap::new(),
            valid_transactions: Vec::new(),
        }
    }

    /// Records a per-transaction rejection. Last writer wins for a repeated id.
    pub fn push_error(&mut self, tx_id: TxId, error: TxError) {
        self.errors.insert(tx_id, error);
    }

    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() || !self.excess.is_empty()
    }
}

/// Immutable, callers-observable result stored per ticket id. Contains only
/// id lists, never full transactions.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedJobResult {
    pub ticket_id: TicketId,
    pub accept: Vec<TxId>,
    pub broadcast: Vec<TxId>,
    pub invalid: Vec<TxId>,
    pub excess: Vec<TxId>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<TxId, TxError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_error_last_writer_wins() {
        let mut job: PendingJobResult<()> = PendingJobResult::new(TicketId::new());
        job.push_error("a".into(), TxError::new(ErrorKind::Unknown, "first"));
        job.push_error("a".into(), TxError::new(ErrorKind::Apply, "second"));
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors["a"].message, "second");
        assert!(matches!(job.errors["a"].kind, ErrorKind::Apply));
    }

    #[test]
    fn errors_field_omitted_when_empty() {
        let finished = FinishedJobResult {
            ticket_id: TicketId::new(),
            accept: vec![],
            broadcast: vec![],
            invalid: vec![],
            excess: vec![],
            errors: HashMap::new(),
        };
        let json = serde_json::to_string(&finished).unwrap();
        assert!(!json.contains("errors"));
    }

    #[test]
    fn error_kind_wire_strings() {
        assert_eq!(ErrorKind::Duplicate.as_wire_str(), "ERR_DUPLICATE");
        assert_eq!(ErrorKind::LowFee.as_wire_str(), "ERR_LOW_FEE");
        assert_eq!(ErrorKind::PoolFull.as_wire_str(), "ERR_POOL_FULL");
    }
}
