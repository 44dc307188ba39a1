//! The Processor itself: wires the pre-worker filter, worker broker,
//! completion queue and post-worker pipeline together behind the public API.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::collaborators::{ChainDatabase, FeeMatcher, HandlerRegistry, Mempool, PeerMonitor, WalletManager};
use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::pipeline::{self, PipelineCollaborators};
use crate::prefilter::pre_check;
use crate::stats;
use crate::tickets::{TicketCleanupGuard, TicketStore};
use crate::transaction::Transaction;
use crate::types::{AccountState, FinishedJobResult, PendingJobResult, SenderPublicKey, TicketId};
use crate::worker::{EligibleTx, WorkerBroker, WorkerVerifier};

/// Transaction admission processor, generic over a host-supplied transaction
/// representation. Holds no domain logic of its own beyond routing: every
/// fallible or stateful concern is delegated to a collaborator.
pub struct Processor<T: Transaction> {
    store: Arc<TicketStore<T>>,
    broker: WorkerBroker<T>,
    mempool: Arc<dyn Mempool>,
    wallet_manager: Arc<dyn WalletManager>,
    handlers: Arc<dyn HandlerRegistry>,
    completion_task: JoinHandle<()>,
    // Serializes the submit path's dedup-check-then-insert and its
    // subsequent ticket-store mutations across concurrent `create_job`
    // callers. Held across the `.await` points in `pre_check` and the
    // wallet-snapshot lookup, so two overlapping submissions can never both
    // observe an id as unclaimed before either claims it.
    submit_lock: Mutex<()>,
}

impl<T: Transaction> Processor<T> {
    /// Wires a fresh processor: starts the worker thread pool and spawns the
    /// single completion-queue consumer task.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ProcessorConfig,
        verifier: Arc<dyn WorkerVerifier>,
        mempool: Arc<dyn Mempool>,
        wallet_manager: Arc<dyn WalletManager>,
        chain_database: Arc<dyn ChainDatabase>,
        handlers: Arc<dyn HandlerRegistry>,
        fee_matcher: Arc<dyn FeeMatcher>,
        peer_monitor: Arc<dyn PeerMonitor>,
    ) -> Self {
        let store = Arc::new(TicketStore::new());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let broker = WorkerBroker::new(Arc::clone(&verifier), config.worker_threads, completion_tx);

        let completion_task = tokio::spawn(completion_loop(
            completion_rx,
            Arc::clone(&store),
            Arc::clone(&wallet_manager),
            Arc::clone(&chain_database),
            Arc::clone(&mempool),
            Arc::clone(&peer_monitor),
            Arc::clone(&fee_matcher),
            config.completion_yield,
        ));

        info!(
            "worker broker started with {} threads",
            config.worker_threads
        );

        Self {
            store,
            broker,
            mempool,
            wallet_manager,
            handlers,
            completion_task,
            submit_lock: Mutex::new(()),
        }
    }

    /// Never fails: returns a ticket even if every submitted transaction is
    /// rejected.
    pub async fn create_job(&self, transactions: Vec<T>) -> TicketId {
        let ticket_id = TicketId::new();
        let mut job: PendingJobResult<T> = PendingJobResult::new(ticket_id);
        let mut eligible: Vec<EligibleTx> = Vec::new();
        let mut sender_wallets: HashMap<SenderPublicKey, AccountState> = HashMap::new();

        {
            let _submit_guard = self.submit_lock.lock().await;
            for tx in transactions {
                let tx_id = tx.id();
                if self.store.cached_ids.has(&tx_id) {
                    // Already claimed by some other ticket: silently skipped.
                    continue;
                }
                self.store.cached_ids.insert(tx_id.clone());

                let kept =
                    pre_check(&tx, &mut job, self.mempool.as_ref(), self.handlers.as_ref()).await;
                if !kept {
                    continue;
                }

                let sender = tx.sender();
                if let std::collections::hash_map::Entry::Vacant(entry) =
                    sender_wallets.entry(sender.clone())
                {
                    let account = self.wallet_manager.find_by_public_key(&sender).await;
                    entry.insert(account);
                }

                eligible.push(EligibleTx {
                    id: tx_id,
                    raw_bytes: tx.raw_bytes(),
                    sender,
                });
            }
        }

        if eligible.is_empty() {
            self.finish_synchronously(job);
        } else {
            self.store.mark_pending(ticket_id, job);
            self.broker.submit(ticket_id, eligible, sender_wallets);
        }

        ticket_id
    }

    pub fn has_pending(&self, id: &TicketId) -> bool {
        self.store.has_pending(id)
    }

    pub fn pending_tickets(&self) -> Vec<TicketId> {
        self.store.pending_tickets()
    }

    pub fn processed_ticket(&self, id: &TicketId) -> Option<FinishedJobResult> {
        self.store.processed_ticket(id)
    }

    pub fn processed_tickets(&self) -> Vec<FinishedJobResult> {
        self.store.processed_tickets()
    }

    /// Submission produced zero eligible transactions: no worker roundtrip,
    /// the ticket is `processed` before `create_job` returns.
    fn finish_synchronously(&self, job: PendingJobResult<T>) {
        let ticket_id = job.ticket_id;
        let finished = FinishedJobResult {
            ticket_id,
            accept: Vec::new(),
            broadcast: Vec::new(),
            invalid: Vec::new(),
            excess: Vec::new(),
            errors: job.errors,
        };
        self.store.finalize(ticket_id, finished);
        stats::emit_summary(0, 0, 0, 0, 0);
    }
}

impl<T: Transaction> Drop for Processor<T> {
    fn drop(&mut self) {
        self.completion_task.abort();
    }
}

#[allow(clippy::too_many_arguments)]
async fn completion_loop<T: Transaction>(
    mut completion_rx: mpsc::UnboundedReceiver<PendingJobResult<T>>,
    store: Arc<TicketStore<T>>,
    wallet_manager: Arc<dyn WalletManager>,
    chain_database: Arc<dyn ChainDatabase>,
    mempool: Arc<dyn Mempool>,
    peer_monitor: Arc<dyn PeerMonitor>,
    fee_matcher: Arc<dyn FeeMatcher>,
    completion_yield: Duration,
) {
    info!("completion queue consumer started");
    while let Some(job) = completion_rx.recv().await {
        let ticket_id = job.ticket_id;
        let guard = TicketCleanupGuard::new(&store, ticket_id);

        let collaborators = PipelineCollaborators {
            wallet_manager: wallet_manager.as_ref(),
            chain_database: chain_database.as_ref(),
            mempool: mempool.as_ref(),
            peer_monitor: peer_monitor.as_ref(),
            fee_matcher: fee_matcher.as_ref(),
        };

        let outcome = AssertUnwindSafe(pipeline::run_pipeline(job, &collaborators, &store))
            .catch_unwind()
            .await;

        match outcome {
            Ok(()) => guard.disarm(),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    "{}",
                    ProcessorError::PipelinePanicked {
                        ticket_id: ticket_id.to_string(),
                        message,
                    }
                );
                // guard still armed: dropping it now cleans up pending/partial.
            }
        }

        // Brief scheduling yield so the submit path is not starved when many
        // tickets complete in a burst.
        tokio::time::sleep(completion_yield).await;
    }
    info!("completion queue consumer stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
