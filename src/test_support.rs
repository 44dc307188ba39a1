//! In-memory collaborators for exercising a [`Processor`] without a real
//! network, storage or cryptographic backend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::collaborators::{
    ChainDatabase, FeeMatcher, HandlerRegistry, Mempool, MempoolRejection, PeerMonitor,
    TransactionHandler, WalletManager,
};
use crate::config::ProcessorConfig;
use crate::processor::Processor;
use crate::transaction::Transaction;
use crate::types::{AccountState, DynamicFeeDecision, ErrorKind, SenderPublicKey, TicketId, TxError, TxId};
use crate::worker::{EligibleTx, WorkerBatchOutcome, WorkerVerifier};

const FIELD_SEP: char = '\u{1}';

/// A minimal in-memory transaction: four fields, round-tripped through a
/// delimiter-joined byte encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTransaction {
    pub id: TxId,
    pub sender: SenderPublicKey,
    pub tx_type: u32,
    pub type_group: u32,
}

impl MockTransaction {
    pub fn new(id: impl Into<TxId>, sender: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: SenderPublicKey(sender.into()),
            tx_type: 0,
            type_group: 0,
        }
    }
}

impl Transaction for MockTransaction {
    fn id(&self) -> TxId {
        self.id.clone()
    }

    fn sender(&self) -> SenderPublicKey {
        self.sender.clone()
    }

    fn tx_type(&self) -> u32 {
        self.tx_type
    }

    fn type_group(&self) -> u32 {
        self.type_group
    }

    fn raw_bytes(&self) -> Vec<u8> {
        format!(
            "{}{FIELD_SEP}{}{FIELD_SEP}{}{FIELD_SEP}{}",
            self.id, self.sender.0, self.tx_type, self.type_group
        )
        .into_bytes()
    }

    fn decode_unchecked(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let mut parts = text.split(FIELD_SEP);
        let id = parts.next().ok_or("missing id field")?.to_string();
        let sender = parts.next().ok_or("missing sender field")?.to_string();
        let tx_type: u32 = parts
            .next()
            .ok_or("missing tx_type field")?
            .parse()
            .map_err(|_| "malformed tx_type field".to_string())?;
        let type_group: u32 = parts
            .next()
            .ok_or("missing type_group field")?
            .parse()
            .map_err(|_| "malformed type_group field".to_string())?;
        Ok(Self {
            id,
            sender: SenderPublicKey(sender),
            tx_type,
            type_group,
        })
    }
}

/// In-memory mempool: a set of already-held ids, plus a queue of canned
/// rejections keyed by id for `add_transactions`.
#[derive(Default)]
pub struct MockMempool {
    existing: Mutex<HashSet<TxId>>,
    reject: Mutex<HashMap<TxId, MempoolRejection>>,
    added: Mutex<Vec<TxId>>,
}

impl MockMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_existing(&self, id: impl Into<TxId>) {
        self.existing.lock().insert(id.into());
    }

    pub fn reject_with(&self, id: impl Into<TxId>, kind: ErrorKind, message: impl Into<String>) {
        let id = id.into();
        self.reject.lock().insert(
            id.clone(),
            MempoolRejection {
                tx_id: id,
                kind,
                message: message.into(),
            },
        );
    }

    pub fn added_ids(&self) -> Vec<TxId> {
        self.added.lock().clone()
    }
}

#[async_trait]
impl Mempool for MockMempool {
    async fn has(&self, id: &TxId) -> Result<bool, String> {
        Ok(self.existing.lock().contains(id))
    }

    async fn add_transactions(
        &self,
        txs: Vec<Arc<dyn Transaction>>,
    ) -> Vec<MempoolRejection> {
        let mut rejections = Vec::new();
        let mut reject = self.reject.lock();
        let mut added = self.added.lock();
        for tx in txs {
            let id = tx.id();
            match reject.remove(&id) {
                Some(rejection) => rejections.push(rejection),
                None => added.push(id),
            }
        }
        rejections
    }
}

/// In-memory wallet manager: canned accounts, canned per-id apply failures.
#[derive(Default)]
pub struct MockWalletManager {
    accounts: Mutex<HashMap<SenderPublicKey, AccountState>>,
    apply_failures: Mutex<HashMap<TxId, String>>,
}

impl MockWalletManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_apply(&self, id: impl Into<TxId>, message: impl Into<String>) {
        self.apply_failures.lock().insert(id.into(), message.into());
    }
}

#[async_trait]
impl WalletManager for MockWalletManager {
    async fn find_by_public_key(&self, sender: &SenderPublicKey) -> AccountState {
        self.accounts
            .lock()
            .get(sender)
            .cloned()
            .unwrap_or_else(|| AccountState {
                sender: sender.clone(),
                nonce: 0,
            })
    }

    async fn throw_if_cannot_be_applied(&self, tx: &dyn Transaction) -> Result<(), String> {
        match self.apply_failures.lock().get(&tx.id()) {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory chain database: a set of ids considered already forged.
#[derive(Default)]
pub struct MockChainDatabase {
    forged: Mutex<HashSet<TxId>>,
}

impl MockChainDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_forged(&self, id: impl Into<TxId>) {
        self.forged.lock().insert(id.into());
    }
}

#[async_trait]
impl ChainDatabase for MockChainDatabase {
    async fn get_forged_transaction_ids(&self, ids: &[TxId]) -> Vec<TxId> {
        let forged = self.forged.lock();
        ids.iter().filter(|id| forged.contains(*id)).cloned().collect()
    }
}

pub struct AlwaysAdmitHandler;

#[async_trait]
impl TransactionHandler for AlwaysAdmitHandler {
    async fn can_enter_pool(&self, _tx: &dyn Transaction, _mempool: &dyn Mempool) -> Result<bool, String> {
        Ok(true)
    }
}

pub struct RejectingHandler;

#[async_trait]
impl TransactionHandler for RejectingHandler {
    async fn can_enter_pool(&self, _tx: &dyn Transaction, _mempool: &dyn Mempool) -> Result<bool, String> {
        Ok(false)
    }
}

/// Resolves by `(tx_type, type_group)`, falling back to a configurable
/// default handler (admits everything, by default).
pub struct MockHandlerRegistry {
    handlers: Mutex<HashMap<(u32, u32), Arc<dyn TransactionHandler>>>,
    default_handler: Arc<dyn TransactionHandler>,
}

impl MockHandlerRegistry {
    pub fn always_admit() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            default_handler: Arc::new(AlwaysAdmitHandler),
        }
    }

    pub fn reject_type(&self, tx_type: u32, type_group: u32) {
        self.handlers
            .lock()
            .insert((tx_type, type_group), Arc::new(RejectingHandler));
    }
}

impl HandlerRegistry for MockHandlerRegistry {
    fn get(&self, tx_type: u32, type_group: u32) -> Option<Arc<dyn TransactionHandler>> {
        Some(
            self.handlers
                .lock()
                .get(&(tx_type, type_group))
                .cloned()
                .unwrap_or_else(|| Arc::clone(&self.default_handler)),
        )
    }
}

/// Always `{enter_pool: true, broadcast: true}` unless overridden per id.
pub struct MockFeeMatcher {
    decisions: Mutex<HashMap<TxId, DynamicFeeDecision>>,
    default_decision: DynamicFeeDecision,
}

impl MockFeeMatcher {
    pub fn always_accept() -> Self {
        Self {
            decisions: Mutex::new(HashMap::new()),
            default_decision: DynamicFeeDecision {
                enter_pool: true,
                broadcast: true,
            },
        }
    }

    pub fn set_decision(&self, id: impl Into<TxId>, decision: DynamicFeeDecision) {
        self.decisions.lock().insert(id.into(), decision);
    }
}

impl FeeMatcher for MockFeeMatcher {
    fn match_fee(&self, tx: &dyn Transaction) -> DynamicFeeDecision {
        self.decisions
            .lock()
            .get(&tx.id())
            .copied()
            .unwrap_or(self.default_decision)
    }
}

/// Records broadcasted ids for assertions.
#[derive(Default)]
pub struct MockPeerMonitor {
    broadcasted: Mutex<Vec<TxId>>,
}

impl MockPeerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcasted_ids(&self) -> Vec<TxId> {
        self.broadcasted.lock().clone()
    }
}

#[async_trait]
impl PeerMonitor for MockPeerMonitor {
    async fn broadcast_transactions(&self, txs: Vec<Arc<dyn Transaction>>) {
        let mut broadcasted = self.broadcasted.lock();
        for tx in txs {
            broadcasted.push(tx.id());
        }
    }
}

/// Verifies every eligible transaction by default; canned per-id
/// invalid/excess outcomes can be configured.
#[derive(Default)]
pub struct MockWorkerVerifier {
    invalid: Mutex<HashMap<TxId, String>>,
    excess: Mutex<HashSet<TxId>>,
}

impl MockWorkerVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_invalid(&self, id: impl Into<TxId>, message: impl Into<String>) {
        self.invalid.lock().insert(id.into(), message.into());
    }

    pub fn mark_excess(&self, id: impl Into<TxId>) {
        self.excess.lock().insert(id.into());
    }
}

impl WorkerVerifier for MockWorkerVerifier {
    fn verify_batch(
        &self,
        _ticket_id: TicketId,
        eligible: &[EligibleTx],
        _sender_wallets: &HashMap<SenderPublicKey, AccountState>,
    ) -> WorkerBatchOutcome {
        let mut outcome = WorkerBatchOutcome::default();
        let invalid = self.invalid.lock();
        let excess = self.excess.lock();
        for tx in eligible {
            if let Some(message) = invalid.get(&tx.id) {
                outcome
                    .invalid
                    .insert(tx.id.clone(), TxError::new(ErrorKind::Unknown, message.clone()));
            } else if excess.contains(&tx.id) {
                outcome.excess.insert(
                    tx.id.clone(),
                    TxError::new(ErrorKind::PoolOther, "per-sender limit exceeded"),
                );
            } else {
                outcome
                    .valid_transactions
                    .push((tx.raw_bytes.clone(), tx.id.clone()));
            }
        }
        outcome
    }
}

/// Handles to every mock collaborator backing a freshly wired processor, so
/// tests can configure behavior after construction.
pub struct TestHarness {
    pub processor: Processor<MockTransaction>,
    pub mempool: Arc<MockMempool>,
    pub wallet_manager: Arc<MockWalletManager>,
    pub chain_database: Arc<MockChainDatabase>,
    pub handlers: Arc<MockHandlerRegistry>,
    pub fee_matcher: Arc<MockFeeMatcher>,
    pub peer_monitor: Arc<MockPeerMonitor>,
    pub verifier: Arc<MockWorkerVerifier>,
}

/// Wires a fully in-memory [`Processor`] with every collaborator defaulted
/// to "admit everything" so individual tests only configure the rejection
/// paths they care about.
pub fn build_processor() -> TestHarness {
    let mempool = Arc::new(MockMempool::new());
    let wallet_manager = Arc::new(MockWalletManager::new());
    let chain_database = Arc::new(MockChainDatabase::new());
    let handlers = Arc::new(MockHandlerRegistry::always_admit());
    let fee_matcher = Arc::new(MockFeeMatcher::always_accept());
    let peer_monitor = Arc::new(MockPeerMonitor::new());
    let verifier = Arc::new(MockWorkerVerifier::new());

    let config = ProcessorConfig {
        worker_threads: 1,
        completion_yield: Duration::from_millis(1),
        ..ProcessorConfig::default()
    };

    let processor = Processor::new(
        config,
        Arc::clone(&verifier) as Arc<dyn WorkerVerifier>,
        Arc::clone(&mempool) as Arc<dyn Mempool>,
        Arc::clone(&wallet_manager) as Arc<dyn WalletManager>,
        Arc::clone(&chain_database) as Arc<dyn ChainDatabase>,
        Arc::clone(&handlers) as Arc<dyn HandlerRegistry>,
        Arc::clone(&fee_matcher) as Arc<dyn FeeMatcher>,
        Arc::clone(&peer_monitor) as Arc<dyn PeerMonitor>,
    );

    TestHarness {
        processor,
        mempool,
        wallet_manager,
        chain_database,
        handlers,
        fee_matcher,
        peer_monitor,
        verifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transaction_round_trips_through_raw_bytes() {
        let tx = MockTransaction::new("tx-1", "alice");
        let bytes = tx.raw_bytes();
        let decoded = MockTransaction::decode_unchecked(&bytes).unwrap();
        assert_eq!(tx, decoded);
    }
}
