//! Internal/plumbing failures. Never surfaced per-transaction; these
//! represent the Processor's own wiring breaking, not a transaction being
//! rejected.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("worker broker is no longer accepting jobs")]
    BrokerShutDown,

    #[error("completion queue channel closed unexpectedly")]
    CompletionChannelClosed,

    #[error("post-worker pipeline panicked for ticket {ticket_id}: {message}")]
    PipelinePanicked { ticket_id: String, message: String },

    #[error("failed to load processor configuration: {0}")]
    Config(String),
}
