//! Trait boundaries toward the remote ledger.
//!
//! The contract, wallet, and RPC transport live behind these traits; the
//! crate never talks to a network directly. Implementations decide what
//! "finalized" means for their chain.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::model::{Address, ChainEvent, EventKind, PacketId, PacketSnapshot, TxHash, WriteIntent};

/// Scope of an event watch: the whole contract or a single packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    All,
    Packet(PacketId),
}

/// Error from a read or poll against the ledger boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("undecodable log entry: {0}")]
    Decode(String),
}

/// Error from a write submission or confirmation wait.
///
/// The contained text is the raw provider message; it is surfaced to the
/// user verbatim.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("reverted: {0}")]
    Reverted(String),

    #[error("confirmation timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport: {0}")]
    Transport(String),
}

/// One poll against a contract event stream.
pub trait EventSource {
    fn poll(
        &mut self,
        kind: EventKind,
        scope: &WatchScope,
    ) -> impl Future<Output = Result<Vec<ChainEvent>, SourceError>> + Send;
}

/// Read operations against current contract state.
pub trait LedgerReader {
    fn get_packet_info(
        &self,
        id: PacketId,
    ) -> impl Future<Output = Result<Option<PacketSnapshot>, SourceError>> + Send;

    fn has_claimed(
        &self,
        id: PacketId,
        who: &Address,
    ) -> impl Future<Output = Result<bool, SourceError>> + Send;
}

/// Fire-and-forget write operations; results are observed asynchronously.
pub trait LedgerWriter {
    /// Dispatch the write to the wallet/ledger boundary, returning the
    /// accepted transaction hash.
    fn submit(
        &mut self,
        intent: &WriteIntent,
    ) -> impl Future<Output = Result<TxHash, WriteError>> + Send;

    /// Resolve once the transaction has reached finality.
    fn wait_finalized(
        &mut self,
        hash: &TxHash,
    ) -> impl Future<Output = Result<(), WriteError>> + Send;
}
