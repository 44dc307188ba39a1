//! The single-consumer sequence of steps that turns a worker-delivered
//! [`PendingJobResult`] into a stored [`FinishedJobResult`]. Invoked at most
//! once at a time, process-wide, from the completion queue.

use std::collections::HashSet;
use std::sync::Arc;

use crate::collaborators::{ChainDatabase, FeeMatcher, Mempool, PeerMonitor, WalletManager};
use crate::stats;
use crate::tickets::TicketStore;
use crate::transaction::Transaction;
use crate::types::{ErrorKind, FinishedJobResult, PendingJobResult, TxError, TxId};

pub struct PipelineCollaborators<'a> {
    pub wallet_manager: &'a dyn WalletManager,
    pub chain_database: &'a dyn ChainDatabase,
    pub mempool: &'a dyn Mempool,
    pub peer_monitor: &'a dyn PeerMonitor,
    pub fee_matcher: &'a dyn FeeMatcher,
}

/// Runs steps (a)-(f) for one ticket and stores the result. `job` is the
/// worker's delivery: `valid_transactions`/`invalid`/`errors`/`excess` as
/// produced by the verifier; `accept`/`broadcast` are discarded here per
/// step (a).
pub async fn run_pipeline<T: Transaction>(
    mut job: PendingJobResult<T>,
    collaborators: &PipelineCollaborators<'_>,
    store: &TicketStore<T>,
) {
    let ticket_id = job.ticket_id;

    // (a) Reset: only this pipeline decides the final accept/broadcast sets.
    job.accept.clear();
    job.broadcast.clear();

    let valid_count = job.valid_transactions.len();

    // (b) Wallet checks, per tx, in arrival order.
    for (raw_bytes, tx_id) in std::mem::take(&mut job.valid_transactions) {
        let tx = match T::decode_unchecked(&raw_bytes) {
            Ok(tx) => tx,
            Err(message) => {
                job.push_error(tx_id, TxError::new(ErrorKind::Unknown, message));
                continue;
            }
        };

        if let Err(message) = collaborators
            .wallet_manager
            .throw_if_cannot_be_applied(&tx)
            .await
        {
            job.push_error(tx_id, TxError::new(ErrorKind::Apply, message));
            continue;
        }

        let decision = collaborators.fee_matcher.match_fee(&tx);
        if !decision.enter_pool && !decision.broadcast {
            job.push_error(
                tx_id,
                TxError::new(
                    ErrorKind::LowFee,
                    "The fee is too low to broadcast and accept the transaction",
                ),
            );
            continue;
        }

        let tx = Arc::new(tx);
        if decision.enter_pool {
            job.accept.insert(tx_id.clone(), Arc::clone(&tx));
        }
        if decision.broadcast {
            job.broadcast.insert(tx_id, tx);
        }
    }

    // (c) Forged removal.
    let candidate_ids: Vec<TxId> = job
        .accept
        .keys()
        .chain(job.broadcast.keys())
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if !candidate_ids.is_empty() {
        let forged = collaborators
            .chain_database
            .get_forged_transaction_ids(&candidate_ids)
            .await;
        for id in forged {
            job.accept.remove(&id);
            job.broadcast.remove(&id);
            job.push_error(id, TxError::new(ErrorKind::Forged, "Already forged."));
        }
    }

    // (d) Mempool insertion.
    if !job.accept.is_empty() {
        let to_submit: Vec<Arc<dyn Transaction>> = job
            .accept
            .values()
            .map(|tx| Arc::clone(tx) as Arc<dyn Transaction>)
            .collect();
        let rejections = collaborators.mempool.add_transactions(to_submit).await;
        for rejection in rejections {
            job.accept.remove(&rejection.tx_id);
            if rejection.kind != ErrorKind::PoolFull {
                job.broadcast.remove(&rejection.tx_id);
            }
            job.push_error(
                rejection.tx_id,
                TxError::new(rejection.kind, rejection.message),
            );
        }
    }

    // (e) Broadcast: fire-and-forget, never recorded against the ticket.
    if !job.broadcast.is_empty() {
        let to_broadcast: Vec<Arc<dyn Transaction>> = job
            .broadcast
            .values()
            .map(|tx| Arc::clone(tx) as Arc<dyn Transaction>)
            .collect();
        collaborators
            .peer_monitor
            .broadcast_transactions(to_broadcast)
            .await;
    }

    // (f) Finalise.
    let partial = store.take_partial(&ticket_id);

    let mut invalid_ids: Vec<TxId> = job.invalid.keys().cloned().collect();
    let mut excess_ids: Vec<TxId> = job.excess.keys().cloned().collect();

    if let Some(partial) = &partial {
        invalid_ids.extend(partial.invalid.keys().cloned());
        // Partial `excess` overwrites rather than unions (source behavior,
        // preserved; see the design notes on partial-merge asymmetry).
        excess_ids = partial.excess.keys().cloned().collect();
        // Pre-worker `errors` are intentionally left unmerged here (the
        // source's open TODO around the errors-merge gap, preserved).
    }

    let accept_ids: Vec<TxId> = job.accept.keys().cloned().collect();
    let broadcast_ids: Vec<TxId> = job.broadcast.keys().cloned().collect();

    let finished = FinishedJobResult {
        ticket_id,
        accept: accept_ids.clone(),
        broadcast: broadcast_ids.clone(),
        invalid: invalid_ids.clone(),
        excess: excess_ids.clone(),
        errors: job.errors,
    };

    store.finalize(ticket_id, finished);

    for id in accept_ids
        .iter()
        .chain(broadcast_ids.iter())
        .chain(invalid_ids.iter())
        .chain(excess_ids.iter())
    {
        store.cached_ids.remove(id);
    }

    stats::emit_summary(
        valid_count,
        excess_ids.len(),
        invalid_ids.len(),
        accept_ids.len(),
        broadcast_ids.len(),
    );
}
