//! Hands batches to an out-of-thread cryptographic verifier and forwards
//! each verified batch, exactly once per ticket, into the completion queue.
//!
//! The verifier implementation itself is supplied by the host; only the
//! contract ([`WorkerVerifier`]) lives here. The broker owns a small
//! dedicated thread pool, kept separate from the tokio runtime's blocking
//! pool so its size is explicit.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use log::error;
use tokio::sync::mpsc;

use crate::error::ProcessorError;
use crate::transaction::Transaction;
use crate::types::{AccountState, PendingJobResult, SenderPublicKey, TicketId, TxError, TxId};

/// A transaction that survived the pre-worker filter, reduced to what the
/// verifier needs: its id, raw bytes and sender.
#[derive(Debug, Clone)]
pub struct EligibleTx {
    pub id: TxId,
    pub raw_bytes: Vec<u8>,
    pub sender: SenderPublicKey,
}

/// Everything a [`WorkerVerifier`] produces for one batch.
#[derive(Debug, Default)]
pub struct WorkerBatchOutcome {
    /// Subset whose signatures verified, in submission order, duplicates
    /// dropped.
    pub valid_transactions: Vec<(Vec<u8>, TxId)>,
    /// Cryptographically rejected ids.
    pub invalid: HashMap<TxId, TxError>,
    /// Worker-side unknown failures.
    pub errors: HashMap<TxId, TxError>,
    /// Ids rejected for per-sender count/weight limits the worker enforces.
    pub excess: HashMap<TxId, TxError>,
}

/// The out-of-thread cryptographic verifier contract. Runs on a dedicated
/// worker thread; implementations should not block on async I/O.
pub trait WorkerVerifier: Send + Sync {
    fn verify_batch(
        &self,
        ticket_id: TicketId,
        eligible: &[EligibleTx],
        sender_wallets: &HashMap<SenderPublicKey, AccountState>,
    ) -> WorkerBatchOutcome;
}

struct WorkerJob {
    ticket_id: TicketId,
    eligible: Vec<EligibleTx>,
    sender_wallets: HashMap<SenderPublicKey, AccountState>,
}

/// Owns the verifier thread pool and the job channel feeding it. Submits are
/// non-blocking; completions are delivered exactly once per ticket onto the
/// completion channel passed at construction.
pub struct WorkerBroker<T: Transaction> {
    // `Option` so `drop` can release the sender before joining the worker
    // threads: they exit their `recv()` loop only once every `Sender` is
    // gone, and Rust drops a struct's own `Drop::drop` body before it drops
    // the struct's fields, so a plain field would still be alive (and the
    // threads still blocked) for the whole body below.
    job_tx: Option<crossbeam_channel::Sender<WorkerJob>>,
    threads: Vec<thread::JoinHandle<()>>,
    _marker: PhantomData<T>,
}

impl<T: Transaction> WorkerBroker<T> {
    pub fn new(
        verifier: Arc<dyn WorkerVerifier>,
        worker_threads: usize,
        completion_tx: mpsc::UnboundedSender<PendingJobResult<T>>,
    ) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<WorkerJob>();
        let threads = (0..worker_threads.max(1))
            .map(|idx| {
                let job_rx = job_rx.clone();
                let verifier = Arc::clone(&verifier);
                let completion_tx = completion_tx.clone();
                thread::Builder::new()
                    .name(format!("tx-verify-{idx}"))
                    .spawn(move || worker_loop(job_rx, verifier, completion_tx))
                    .expect("failed to spawn verifier thread")
            })
            .collect();
        Self {
            job_tx: Some(job_tx),
            threads,
            _marker: PhantomData,
        }
    }

    /// Hands a batch to the worker pool. Never blocks: the job channel is
    /// unbounded, mirroring the completion queue's own no-backpressure rule
    /// so worker parallelism stays the broker's concern, not the submit
    /// path's.
    pub fn submit(
        &self,
        ticket_id: TicketId,
        eligible: Vec<EligibleTx>,
        sender_wallets: HashMap<SenderPublicKey, AccountState>,
    ) {
        let sent = match &self.job_tx {
            Some(job_tx) => job_tx
                .send(WorkerJob {
                    ticket_id,
                    eligible,
                    sender_wallets,
                })
                .is_ok(),
            None => false,
        };
        if !sent {
            error!("{}: dropping ticket {ticket_id}", ProcessorError::BrokerShutDown);
        }
    }
}

impl<T: Transaction> Drop for WorkerBroker<T> {
    fn drop(&mut self) {
        // Drop the sender first so the worker threads' `job_rx.recv()` loop
        // observes the channel disconnecting and returns.
        self.job_tx.take();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<T: Transaction>(
    job_rx: crossbeam_channel::Receiver<WorkerJob>,
    verifier: Arc<dyn WorkerVerifier>,
    completion_tx: mpsc::UnboundedSender<PendingJobResult<T>>,
) {
    while let Ok(job) = job_rx.recv() {
        let outcome = verifier.verify_batch(job.ticket_id, &job.eligible, &job.sender_wallets);
        let mut result = PendingJobResult::new(job.ticket_id);
        result.valid_transactions = outcome.valid_transactions;
        result.invalid = outcome.invalid;
        result.errors = outcome.errors;
        result.excess = outcome.excess;
        if completion_tx.send(result).is_err() {
            error!(
                "{}: dropping ticket {}",
                ProcessorError::CompletionChannelClosed,
                job.ticket_id
            );
            break;
        }
    }
}
