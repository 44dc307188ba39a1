//! External collaborator contracts. Out of scope for this crate; production
//! code supplies real implementations, tests supply fakes (`test_support`).

use async_trait::async_trait;

use crate::transaction::Transaction;
use crate::types::{AccountState, DynamicFeeDecision, ErrorKind, SenderPublicKey, TxId};

/// One rejected transaction as reported back by [`Mempool::add_transactions`].
///
/// `kind` is expected to be `PoolFull` or `PoolOther`, but the mempool is
/// free to surface any `ERR_POOL_*` kind verbatim.
#[derive(Debug, Clone)]
pub struct MempoolRejection {
    pub tx_id: TxId,
    pub kind: ErrorKind,
    pub message: String,
}

/// The mempool store: insertion, capacity, duplicate lookup.
#[async_trait]
pub trait Mempool: Send + Sync {
    /// Whether a transaction with this id is already held. `Err` carries a
    /// collaborator failure message; callers classify it as `UNKNOWN`.
    async fn has(&self, id: &TxId) -> Result<bool, String>;

    /// Attempt to add the given transactions. Returns the subset that could
    /// not be added, with a rejection kind and message for each.
    async fn add_transactions(
        &self,
        txs: Vec<std::sync::Arc<dyn Transaction>>,
    ) -> Vec<MempoolRejection>;
}

/// The wallet manager: nonce/balance application against live state.
#[async_trait]
pub trait WalletManager: Send + Sync {
    /// Snapshot of a sender's account, taken on the submit path.
    async fn find_by_public_key(&self, sender: &SenderPublicKey) -> AccountState;

    /// Tests nonce ordering, balance sufficiency and sender-specific
    /// invariants against the live wallet state. `Err` carries the failure
    /// message.
    async fn throw_if_cannot_be_applied(&self, tx: &dyn Transaction) -> Result<(), String>;
}

/// The chain database: forged-id lookup.
#[async_trait]
pub trait ChainDatabase: Send + Sync {
    /// Returns the subset of `ids` that are already included in a block.
    async fn get_forged_transaction_ids(&self, ids: &[TxId]) -> Vec<TxId>;
}

/// Per-type admission predicate, resolved by `(tx_type, type_group)`.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    /// Whether `tx` may proceed into the worker. A `false` return is a
    /// silent rejection: the handler is responsible for its own
    /// classification and the pre-filter records nothing. `Err` carries a
    /// collaborator failure message; callers classify it as `UNKNOWN`.
    async fn can_enter_pool(&self, tx: &dyn Transaction, mempool: &dyn Mempool) -> Result<bool, String>;
}

/// Resolves a [`TransactionHandler`] for a `(tx_type, type_group)` pair.
pub trait HandlerRegistry: Send + Sync {
    /// Returns `None` if no handler is registered for this pair; the caller
    /// treats an unresolved handler as a collaborator failure (`UNKNOWN`).
    fn get(&self, tx_type: u32, type_group: u32) -> Option<std::sync::Arc<dyn TransactionHandler>>;
}

/// The dynamic-fee policy engine.
pub trait FeeMatcher: Send + Sync {
    fn match_fee(&self, tx: &dyn Transaction) -> DynamicFeeDecision;
}

/// The peer broadcast monitor. Fire-and-forget.
#[async_trait]
pub trait PeerMonitor: Send + Sync {
    async fn broadcast_transactions(&self, txs: Vec<std::sync::Arc<dyn Transaction>>);
}
