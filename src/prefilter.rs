//! Synchronous checks performed before a payload crosses into the worker.

use log::debug;

use crate::collaborators::{HandlerRegistry, Mempool};
use crate::transaction::Transaction;
use crate::types::{ErrorKind, PendingJobResult, TxError};

/// `pre_check(tx, job) -> bool`: "keep this tx for the worker?"
///
/// Ordered checks; first failure short-circuits with `false`. A `false`
/// return from the handler's `can_enter_pool` predicate pushes no error: the
/// handler owns its own classification.
pub async fn pre_check<T: Transaction>(
    tx: &T,
    job: &mut PendingJobResult<T>,
    mempool: &dyn Mempool,
    handlers: &dyn HandlerRegistry,
) -> bool {
    let tx_id = tx.id();
    debug!("pre-check: {}", tx_id);

    match mempool.has(&tx_id).await {
        Ok(true) => {
            job.push_error(
                tx_id.clone(),
                TxError::new(ErrorKind::Duplicate, format!("Duplicate transaction {tx_id}")),
            );
            debug!("pre-check rejected (duplicate): {}", tx_id);
            return false;
        }
        Ok(false) => {}
        Err(message) => {
            job.push_error(tx_id.clone(), TxError::new(ErrorKind::Unknown, message));
            debug!("pre-check rejected (mempool failure): {}", tx_id);
            return false;
        }
    }

    let handler = match handlers.get(tx.tx_type(), tx.type_group()) {
        Some(handler) => handler,
        None => {
            job.push_error(
                tx_id.clone(),
                TxError::new(ErrorKind::Unknown, format!("no handler for tx {tx_id}")),
            );
            debug!("pre-check rejected (no handler): {}", tx_id);
            return false;
        }
    };

    match handler.can_enter_pool(tx, mempool).await {
        Ok(true) => true,
        Ok(false) => {
            debug!("pre-check rejected by handler (silent): {}", tx_id);
            false
        }
        Err(message) => {
            job.push_error(tx_id.clone(), TxError::new(ErrorKind::Unknown, message));
            debug!("pre-check rejected (handler failure): {}", tx_id);
            false
        }
    }
}
