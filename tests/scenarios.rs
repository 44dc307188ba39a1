//! Six literal end-to-end scenarios run against a fully wired in-memory
//! `Processor` (`test_support::build_processor`), plus empty-submission and
//! dedup-release checks.

use std::time::Duration;

use pretty_assertions::assert_eq as pretty_assert_eq;
use tx_admission_processor::test_support::{build_processor, MockTransaction};
use tx_admission_processor::{ErrorKind, FinishedJobResult, TicketId};

fn init_logging() {
    let _ = env_logger::try_init();
}

/// Polls `processed_ticket` until the pipeline has finished with it, or
/// panics after a generous timeout. Completion is driven by the
/// single-consumer queue, never by the test itself.
async fn wait_for_processed(
    processor: &tx_admission_processor::Processor<MockTransaction>,
    ticket_id: TicketId,
) -> FinishedJobResult {
    for _ in 0..200 {
        if let Some(result) = processor.processed_ticket(&ticket_id) {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("ticket {ticket_id} never reached processed");
}

#[tokio::test]
async fn all_duplicates_within_one_submission_are_processed_once() {
    init_logging();
    let harness = build_processor();
    let tx = MockTransaction::new("A", "alice");
    let ticket = harness.processor.create_job(vec![tx.clone(), tx]).await;

    let result = wait_for_processed(&harness.processor, ticket).await;
    pretty_assert_eq!(result.accept, vec!["A".to_string()]);
    pretty_assert_eq!(result.broadcast, vec!["A".to_string()]);
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn duplicate_in_mempool_is_rejected_synchronously() {
    init_logging();
    let harness = build_processor();
    harness.mempool.mark_existing("B");

    let ticket = harness
        .processor
        .create_job(vec![MockTransaction::new("B", "bob")])
        .await;

    // Zero eligible transactions: the ticket is already processed, no
    // worker roundtrip needed.
    assert!(!harness.processor.has_pending(&ticket));
    let result = harness
        .processor
        .processed_ticket(&ticket)
        .expect("synchronous result");

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    let error = &result.errors["B"];
    assert_eq!(error.kind, ErrorKind::Duplicate);
    assert_eq!(error.message, "Duplicate transaction B");
}

#[tokio::test]
async fn low_fee_blocks_both_accept_and_broadcast() {
    init_logging();
    let harness = build_processor();
    harness.fee_matcher.set_decision(
        "C",
        tx_admission_processor::DynamicFeeDecision {
            enter_pool: false,
            broadcast: false,
        },
    );

    let ticket = harness
        .processor
        .create_job(vec![MockTransaction::new("C", "carol")])
        .await;
    let result = wait_for_processed(&harness.processor, ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let error = &result.errors["C"];
    assert_eq!(error.kind, ErrorKind::LowFee);
    assert_eq!(
        error.message,
        "The fee is too low to broadcast and accept the transaction"
    );
}

#[tokio::test]
async fn forged_id_is_removed_after_accept() {
    init_logging();
    let harness = build_processor();
    harness.chain_database.mark_forged("D");

    let ticket = harness
        .processor
        .create_job(vec![MockTransaction::new("D", "dave")])
        .await;
    let result = wait_for_processed(&harness.processor, ticket).await;

    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    let error = &result.errors["D"];
    assert_eq!(error.kind, ErrorKind::Forged);
    assert_eq!(error.message, "Already forged.");
}

#[tokio::test]
async fn pool_full_keeps_broadcast_other_pool_errors_do_not() {
    init_logging();
    let harness = build_processor();
    harness
        .mempool
        .reject_with("E", ErrorKind::PoolFull, "mempool is full");

    let ticket = harness
        .processor
        .create_job(vec![MockTransaction::new("E", "erin")])
        .await;
    let result = wait_for_processed(&harness.processor, ticket).await;

    assert!(result.accept.is_empty());
    pretty_assert_eq!(result.broadcast, vec!["E".to_string()]);
    assert_eq!(result.errors["E"].kind, ErrorKind::PoolFull);
}

#[tokio::test]
async fn handler_silent_rejection_leaves_no_trace_while_sibling_succeeds() {
    init_logging();
    let harness = build_processor();
    harness.handlers.reject_type(1, 1);

    let mut f = MockTransaction::new("F", "frank");
    f.tx_type = 1;
    f.type_group = 1;
    let g = MockTransaction::new("G", "grace");

    let ticket = harness.processor.create_job(vec![f, g]).await;
    let result = wait_for_processed(&harness.processor, ticket).await;

    pretty_assert_eq!(result.accept, vec!["G".to_string()]);
    pretty_assert_eq!(result.broadcast, vec!["G".to_string()]);
    assert!(result.invalid.is_empty());
    // F was rejected by the handler, silently: it appears in no bucket,
    // including `errors` — handlers classify silently and the pre-filter
    // records nothing on their behalf.
    assert!(!result.errors.contains_key("F"));
    assert!(!result.accept.contains(&"F".to_string()));
    assert!(!result.broadcast.contains(&"F".to_string()));
}

#[tokio::test]
async fn empty_submission_yields_an_empty_processed_result() {
    init_logging();
    let harness = build_processor();
    let ticket = harness.processor.create_job(Vec::new()).await;

    let result = harness
        .processor
        .processed_ticket(&ticket)
        .expect("empty submission resolves synchronously");
    assert!(result.accept.is_empty());
    assert!(result.broadcast.is_empty());
    assert!(result.invalid.is_empty());
    assert!(result.excess.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn dedup_cache_is_released_for_every_bucketed_outcome() {
    init_logging();
    let harness = build_processor();
    let ticket = harness
        .processor
        .create_job(vec![MockTransaction::new("H", "heidi")])
        .await;
    let result = wait_for_processed(&harness.processor, ticket).await;
    pretty_assert_eq!(result.accept, vec!["H".to_string()]);

    // A fresh submission of the same id is accepted again: the dedup entry
    // was released when the first ticket finalised.
    let ticket2 = harness
        .processor
        .create_job(vec![MockTransaction::new("H", "heidi")])
        .await;
    let result2 = wait_for_processed(&harness.processor, ticket2).await;
    pretty_assert_eq!(result2.accept, vec!["H".to_string()]);
}
