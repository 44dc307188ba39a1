//! The opaque transaction payload the Processor routes but never constructs.

use crate::types::{SenderPublicKey, TxId};

/// A transaction as seen by the admission pipeline.
///
/// The Processor is generic over this trait rather than over a concrete
/// transaction type: it decodes, routes and forwards payloads supplied by the
/// host application, which owns the actual transaction formats.
pub trait Transaction: Send + Sync + 'static {
    /// Content-derived, stable identity.
    fn id(&self) -> TxId;

    /// The sender's public key.
    fn sender(&self) -> SenderPublicKey;

    /// Small integer selecting a handler, together with `type_group`.
    fn tx_type(&self) -> u32;

    /// Small integer selecting a handler, together with `tx_type`.
    fn type_group(&self) -> u32;

    /// Raw serialised form, recoverable back into a typed transaction via
    /// [`Transaction::decode_unchecked`].
    fn raw_bytes(&self) -> Vec<u8>;

    /// Decode `bytes` into a typed transaction without re-verifying the
    /// signature the worker has already checked. Returns an error message on
    /// malformed bytes.
    fn decode_unchecked(bytes: &[u8]) -> Result<Self, String>
    where
        Self: Sized;
}
