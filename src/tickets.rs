//! Lifecycle of pending/partial/processed tickets, the only surface callers
//! poll.

use std::collections::{HashMap, HashSet};

use log::error;
use parking_lot::Mutex;

use crate::dedup::DedupCache;
use crate::transaction::Transaction;
use crate::types::{FinishedJobResult, PendingJobResult, TicketId};

/// Four maps, all keyed by ticket id, plus the dedup cache.
pub struct TicketStore<T: Transaction> {
    pending: Mutex<HashSet<TicketId>>,
    partial: Mutex<HashMap<TicketId, PendingJobResult<T>>>,
    processed: Mutex<HashMap<TicketId, FinishedJobResult>>,
    pub cached_ids: DedupCache,
}

impl<T: Transaction> TicketStore<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashSet::new()),
            partial: Mutex::new(HashMap::new()),
            processed: Mutex::new(HashMap::new()),
            cached_ids: DedupCache::new(),
        }
    }

    pub fn has_pending(&self, id: &TicketId) -> bool {
        self.pending.lock().contains(id)
    }

    pub fn pending_tickets(&self) -> Vec<TicketId> {
        self.pending.lock().iter().copied().collect()
    }

    pub fn processed_ticket(&self, id: &TicketId) -> Option<FinishedJobResult> {
        self.processed.lock().get(id).cloned()
    }

    pub fn processed_tickets(&self) -> Vec<FinishedJobResult> {
        self.processed.lock().values().cloned().collect()
    }

    /// Marks `ticket_id` as owed to the worker. If `partial` carries any
    /// pre-worker `errors`/`excess`, it is stashed so it survives the
    /// asynchronous gap to completion.
    pub fn mark_pending(&self, ticket_id: TicketId, partial: PendingJobResult<T>) {
        self.pending.lock().insert(ticket_id);
        if partial.is_partial() {
            self.partial.lock().insert(ticket_id, partial);
        }
    }

    pub fn take_partial(&self, ticket_id: &TicketId) -> Option<PendingJobResult<T>> {
        self.partial.lock().remove(ticket_id)
    }

    /// Removes `pending`/`partial` bookkeeping and stores the terminal
    /// result. Never removed afterwards by the Processor.
    pub fn finalize(&self, ticket_id: TicketId, result: FinishedJobResult) {
        self.pending.lock().remove(&ticket_id);
        self.partial.lock().remove(&ticket_id);
        self.processed.lock().insert(ticket_id, result);
    }

    /// Removes only the bookkeeping entries for a ticket whose pipeline
    /// faulted, without fabricating a `processed` entry and without
    /// touching the dedup cache.
    fn cleanup_after_panic(&self, ticket_id: &TicketId) {
        self.pending.lock().remove(ticket_id);
        self.partial.lock().remove(ticket_id);
    }
}

impl<T: Transaction> Default for TicketStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped-acquisition guard wrapped around one pipeline execution. If the
/// pipeline panics, dropping this guard while still armed removes the
/// ticket's `pending`/`partial` bookkeeping so it cannot wedge the store
/// forever; it never fabricates a `processed` entry and never touches the
/// dedup cache, preserving the errors-bucket non-eviction behavior of a
/// ticket that never reaches the four id-list buckets.
pub struct TicketCleanupGuard<'a, T: Transaction> {
    store: &'a TicketStore<T>,
    ticket_id: TicketId,
    armed: bool,
}

impl<'a, T: Transaction> TicketCleanupGuard<'a, T> {
    pub fn new(store: &'a TicketStore<T>, ticket_id: TicketId) -> Self {
        Self {
            store,
            ticket_id,
            armed: true,
        }
    }

    /// Call once the pipeline has run to completion (successfully or with a
    /// per-transaction error already recorded as data): disarms the cleanup
    /// since `finalize` has already done its job.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl<'a, T: Transaction> Drop for TicketCleanupGuard<'a, T> {
    fn drop(&mut self) {
        if self.armed {
            error!(
                "post-worker pipeline panicked for ticket {}; ticket abandoned without a processed entry",
                self.ticket_id
            );
            self.store.cleanup_after_panic(&self.ticket_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTransaction;

    #[test]
    fn finalize_moves_ticket_from_pending_to_processed() {
        let store: TicketStore<MockTransaction> = TicketStore::new();
        let ticket_id = TicketId::new();
        store.mark_pending(ticket_id, PendingJobResult::new(ticket_id));
        assert!(store.has_pending(&ticket_id));

        store.finalize(
            ticket_id,
            FinishedJobResult {
                ticket_id,
                accept: vec![],
                broadcast: vec![],
                invalid: vec![],
                excess: vec![],
                errors: HashMap::new(),
            },
        );

        assert!(!store.has_pending(&ticket_id));
        assert!(store.processed_ticket(&ticket_id).is_some());
    }

    #[test]
    fn guard_cleans_up_pending_and_partial_on_panic_only() {
        let store: TicketStore<MockTransaction> = TicketStore::new();
        let ticket_id = TicketId::new();
        let mut partial = PendingJobResult::new(ticket_id);
        partial.push_error(
            "x".into(),
            crate::types::TxError::new(crate::types::ErrorKind::Unknown, "boom"),
        );
        store.mark_pending(ticket_id, partial);
        assert!(store.has_pending(&ticket_id));

        {
            let _guard = TicketCleanupGuard::new(&store, ticket_id);
            // guard dropped while still armed, simulating a pipeline panic
        }

        assert!(!store.has_pending(&ticket_id));
        assert!(store.take_partial(&ticket_id).is_none());
        assert!(store.processed_ticket(&ticket_id).is_none());
    }

    #[test]
    fn disarmed_guard_does_not_clean_up() {
        let store: TicketStore<MockTransaction> = TicketStore::new();
        let ticket_id = TicketId::new();
        store.mark_pending(ticket_id, PendingJobResult::new(ticket_id));

        let guard = TicketCleanupGuard::new(&store, ticket_id);
        guard.disarm();

        assert!(store.has_pending(&ticket_id));
    }
}
