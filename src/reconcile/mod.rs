//! Event reconciliation.
//!
//! The reconciler consumes the deduplicated contract event streams and
//! maintains a local, non-authoritative view of every observed packet.
//! It enforces the monotonicity invariants the remote ledger promises
//! (remaining counters never rise, one claim per address per packet) and
//! accumulates immutable claim records. Also supports an async stream of
//! events.

use std::collections::HashMap;

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Amount;
use crate::dedup::EventLedger;
use crate::model::{Address, ChainEvent, ClaimRecord, Distribution, EventId, PacketId};

mod state;
pub use state::PacketView;

mod error;
pub use error::{ClaimedError, CreatedError, ReconcileError};

/// Aggregate totals over the observed event sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub packets: usize,
    pub claims: usize,
    pub volume_created: Amount,
    pub volume_distributed: Amount,
}

/// The event reconciliation engine.
///
/// Owns its dedup ledger: replayed events are refused here as well, so a
/// recorded feed can be driven through `apply` directly.
pub struct Reconciler {
    packets: HashMap<PacketId, PacketView>,
    seen: EventLedger,
}

/// Public API
impl Reconciler {
    pub fn new() -> Self {
        Self {
            packets: HashMap::new(),
            seen: EventLedger::new(),
        }
    }

    /// Run the reconciler over the given event stream.
    pub async fn run(&mut self, mut stream: impl Stream<Item = ChainEvent> + Unpin) {
        while let Some(event) = stream.next().await {
            // a bad event should not stop the stream, so the result is dropped
            let _ = self.apply(event);
        }
    }

    /// Return the state of all observed packets.
    pub fn packets(&self) -> impl Iterator<Item = &PacketView> + '_ {
        self.packets.values()
    }

    /// Return the state of one packet.
    pub fn get(&self, id: PacketId) -> Option<&PacketView> {
        self.packets.get(&id)
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            packets: self.packets.len(),
            ..Stats::default()
        };
        for view in self.packets.values() {
            stats.claims += view.claims().len();
            stats.volume_created += view.total_amount;
            stats.volume_distributed += view.claimed_amount();
        }
        stats
    }

    /// Apply a single event on top of the current state.
    pub fn apply(&mut self, event: ChainEvent) -> Result<(), ReconcileError> {
        let id = event.id().clone();
        if !self.seen.admit(id.clone()) {
            info!(event = %id, "duplicate event suppressed");
            return Err(ReconcileError::DuplicateEvent(id));
        }

        match event {
            ChainEvent::Created {
                packet,
                creator,
                total_amount,
                count,
                distribution,
                message,
                timestamp,
                ..
            } => {
                let result = self.apply_created(
                    packet,
                    creator,
                    total_amount,
                    count,
                    distribution,
                    message,
                    timestamp,
                );
                Self::log_result("created", &id, packet, Some(total_amount), &result);
                result?;
            }
            ChainEvent::Claimed {
                packet,
                claimer,
                amount,
                remaining_count,
                remaining_amount,
                timestamp,
                ..
            } => {
                let result = self.apply_claimed(
                    &id,
                    packet,
                    claimer,
                    amount,
                    remaining_count,
                    remaining_amount,
                    timestamp,
                );
                Self::log_result("claimed", &id, packet, Some(amount), &result);
                result?;
            }
        }
        Ok(())
    }
}

/// Private API
impl Reconciler {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display>(
        kind: &str,
        event: &EventId,
        packet: PacketId,
        amount: Option<Amount>,
        result: &Result<(), E>,
    ) {
        match (result, amount) {
            (Ok(()), Some(amt)) => {
                info!(event = %event, packet = %packet, amount = %amt, "{kind} applied");
            }
            (Ok(()), None) => {
                info!(event = %event, packet = %packet, "{kind} applied");
            }
            (Err(e), _) => {
                info!(event = %event, packet = %packet, reason = %e, "{kind} skipped");
            }
        }
    }

    fn apply_created(
        &mut self,
        packet: PacketId,
        creator: Address,
        total_amount: Amount,
        count: u32,
        distribution: Distribution,
        message: String,
        create_time: u64,
    ) -> Result<(), CreatedError> {
        if self.packets.contains_key(&packet) {
            return Err(CreatedError::AlreadyTracked(packet));
        }
        if count == 0 {
            return Err(CreatedError::ZeroShares(packet));
        }

        self.packets.insert(
            packet,
            PacketView::new(
                packet,
                creator,
                total_amount,
                count,
                distribution,
                message,
                create_time,
            ),
        );

        Ok(())
    }

    /// Fold a claim event into its packet view:
    /// - the packet must be tracked and have shares left
    /// - an address claims at most once
    /// - the remaining counters carried by the event must not rise
    ///   (gaps are tolerated: polling from the chain tip can miss events)
    fn apply_claimed(
        &mut self,
        event: &EventId,
        packet: PacketId,
        claimer: Address,
        amount: Amount,
        remaining_count: u32,
        remaining_amount: Amount,
        timestamp: u64,
    ) -> Result<(), ClaimedError> {
        let view = self
            .packets
            .get_mut(&packet)
            .ok_or(ClaimedError::UnknownPacket(packet))?;

        if view.remaining_count == 0 {
            return Err(ClaimedError::Exhausted(packet));
        }
        if view.has_claimed(&claimer) {
            return Err(ClaimedError::AlreadyClaimed(packet, claimer));
        }
        if remaining_count >= view.remaining_count {
            return Err(ClaimedError::CountRegression(
                packet,
                view.remaining_count,
                remaining_count,
            ));
        }
        if remaining_amount > view.remaining_amount {
            return Err(ClaimedError::AmountRegression(
                packet,
                view.remaining_amount,
                remaining_amount,
            ));
        }

        view.record_claim(
            ClaimRecord {
                packet,
                claimer,
                amount,
                timestamp,
                tx: event.tx.clone(),
            },
            remaining_count,
            remaining_amount,
        );

        Ok(())
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
