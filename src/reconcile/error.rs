//! Error types for event reconciliation.

use thiserror::Error;

use crate::Amount;
use crate::model::{Address, EventId, PacketId};

/// Top-level error returned by [`Reconciler::apply`](super::Reconciler::apply).
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The transport redelivered an event identity we already handled.
    #[error("duplicate event {0}")]
    DuplicateEvent(EventId),

    #[error("created event skipped: {0}")]
    Created(#[from] CreatedError),

    #[error("claim event skipped: {0}")]
    Claimed(#[from] ClaimedError),
}

/// Error while registering a packet-creation event.
#[derive(Debug, Error)]
pub enum CreatedError {
    #[error("packet {0} is already tracked")]
    AlreadyTracked(PacketId),

    #[error("packet {0} declares zero shares")]
    ZeroShares(PacketId),
}

/// Error while folding a claim event into packet state.
#[derive(Debug, Error)]
pub enum ClaimedError {
    #[error("claim references untracked packet {0}")]
    UnknownPacket(PacketId),

    #[error("packet {0} has no shares remaining")]
    Exhausted(PacketId),

    #[error("{1} already claimed from packet {0}")]
    AlreadyClaimed(PacketId, Address),

    #[error("remaining share count for packet {0} rose from {1} to {2}")]
    CountRegression(PacketId, u32, u32),

    #[error("remaining amount for packet {0} rose from {1} to {2}")]
    AmountRegression(PacketId, Amount, Amount),
}
