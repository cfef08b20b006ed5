//! Transaction lifecycle tracking.
//!
//! One [`Tracker`] shepherds exactly one outbound write through
//! `Idle → Submitted → Confirming → Confirmed`, with `Failed` reachable
//! from either in-flight state. Phase changes go out on a channel so the
//! owning surface can render feedback without polling; `run` consumes
//! the tracker, so re-submission always means a new instance.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::Amount;
use crate::cache::ReadModel;
use crate::config::Limits;
use crate::indexer::Indexer;
use crate::ledger::{LedgerReader, LedgerWriter};
use crate::model::{Address, PacketId, PacketSnapshot, TxHash, WriteIntent};

/// Lifecycle phase of one outbound write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
}

/// Terminal result of [`Tracker::run`]. A completed write ends in
/// exactly one of `Confirmed` or `Failed`; `Rejected` means validation
/// refused it before anything reached the network.
#[derive(Debug)]
pub enum Outcome {
    Rejected(ValidationError),
    Confirmed { hash: TxHash },
    Failed { hash: Option<TxHash>, reason: String },
}

/// Pre-submission validation failure, surfaced inline to the user and
/// never propagated further.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount {given} is below the {min} minimum")]
    AmountBelowMinimum { given: Amount, min: Amount },

    #[error("share count must be at least 1")]
    ZeroShares,

    #[error("share count {given} exceeds the maximum of {max}")]
    TooManyShares { given: u32, max: u32 },

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is {len} characters, the maximum is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("packet {0} not found")]
    UnknownPacket(PacketId),

    #[error("packet {0} is no longer active")]
    PacketInactive(PacketId),

    #[error("packet {0} has no shares left")]
    PacketExhausted(PacketId),

    #[error("{1} already claimed from packet {0}")]
    AlreadyClaimed(PacketId, Address),
}

/// Validate create parameters against the configured limits.
pub fn validate_create(
    amount: Amount,
    count: u32,
    message: &str,
    limits: &Limits,
) -> Result<(), ValidationError> {
    if amount < limits.min_create_amount {
        return Err(ValidationError::AmountBelowMinimum {
            given: amount,
            min: limits.min_create_amount,
        });
    }
    if count == 0 {
        return Err(ValidationError::ZeroShares);
    }
    if count > limits.max_shares {
        return Err(ValidationError::TooManyShares {
            given: count,
            max: limits.max_shares,
        });
    }
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = message.chars().count();
    if len > limits.max_message_chars {
        return Err(ValidationError::MessageTooLong {
            len,
            max: limits.max_message_chars,
        });
    }
    Ok(())
}

/// Validate a claim against the best snapshot available. Best-effort:
/// the ledger performs the authoritative check and can still reject.
pub fn validate_claim(
    snapshot: &PacketSnapshot,
    already_claimed: bool,
    from: &Address,
) -> Result<(), ValidationError> {
    if !snapshot.active {
        return Err(ValidationError::PacketInactive(snapshot.id));
    }
    if snapshot.remaining_count == 0 {
        return Err(ValidationError::PacketExhausted(snapshot.id));
    }
    if already_claimed {
        return Err(ValidationError::AlreadyClaimed(snapshot.id, from.clone()));
    }
    Ok(())
}

/// Drives one write through its lifecycle.
pub struct Tracker {
    intent: WriteIntent,
    limits: Limits,
    phase: Phase,
    updates: mpsc::Sender<Phase>,
    on_confirmed: Option<Box<dyn FnOnce(&TxHash) + Send>>,
}

impl Tracker {
    /// Build a tracker for one intent. The returned receiver yields every
    /// phase transition in order.
    pub fn new(intent: WriteIntent, limits: Limits) -> (Self, mpsc::Receiver<Phase>) {
        let (updates, receiver) = mpsc::channel(8);
        (
            Self {
                intent,
                limits,
                phase: Phase::Idle,
                updates,
                on_confirmed: None,
            },
            receiver,
        )
    }

    /// Register a completion callback, invoked exactly once on `Confirmed`.
    pub fn on_confirmed(mut self, callback: impl FnOnce(&TxHash) + Send + 'static) -> Self {
        self.on_confirmed = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Validate, submit, and wait for finality.
    ///
    /// A confirmed write invalidates the affected read-model keys before
    /// the completion callback fires, so the callback observes fresh data.
    pub async fn run<W, R, I>(
        mut self,
        writer: &mut W,
        reader: &R,
        cache: &mut ReadModel<I>,
    ) -> Outcome
    where
        W: LedgerWriter,
        R: LedgerReader,
        I: Indexer,
    {
        if let Err(e) = self.validate(reader, cache).await {
            info!(intent = self.intent.kind(), reason = %e, "write rejected before submission");
            return Outcome::Rejected(e);
        }

        self.enter(Phase::Submitted).await;
        let hash = match writer.submit(&self.intent).await {
            Ok(hash) => hash,
            Err(e) => {
                self.enter(Phase::Failed).await;
                return Outcome::Failed {
                    hash: None,
                    reason: e.to_string(),
                };
            }
        };

        self.enter(Phase::Confirming).await;
        if let Err(e) = writer.wait_finalized(&hash).await {
            self.enter(Phase::Failed).await;
            return Outcome::Failed {
                hash: Some(hash),
                reason: e.to_string(),
            };
        }

        self.enter(Phase::Confirmed).await;
        cache.invalidate_for(&self.intent).await;
        info!(intent = self.intent.kind(), hash = %hash, "write confirmed");

        if let Some(callback) = self.on_confirmed.take() {
            callback(&hash);
        }

        Outcome::Confirmed { hash }
    }

    async fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        // a dropped receiver means the surface unmounted; keep going
        let _ = self.updates.send(phase).await;
    }

    async fn validate<R, I>(
        &self,
        reader: &R,
        cache: &mut ReadModel<I>,
    ) -> Result<(), ValidationError>
    where
        R: LedgerReader,
        I: Indexer,
    {
        match &self.intent {
            WriteIntent::Create {
                amount,
                count,
                message,
                ..
            } => validate_create(*amount, *count, message, &self.limits),
            WriteIntent::Claim { from, packet } => {
                let (snapshot, already_claimed) =
                    claim_context(reader, cache, *packet, from).await?;
                validate_claim(&snapshot, already_claimed, from)
            }
        }
    }
}

/// Best snapshot and claim-set membership for a claim validation: fresh
/// ledger reads when possible, degrading to the cached detail view.
async fn claim_context<R, I>(
    reader: &R,
    cache: &mut ReadModel<I>,
    packet: PacketId,
    from: &Address,
) -> Result<(PacketSnapshot, bool), ValidationError>
where
    R: LedgerReader,
    I: Indexer,
{
    let (snapshot, claimed_from_cache) = match reader.get_packet_info(packet).await {
        Ok(Some(snapshot)) => (snapshot, None),
        Ok(None) => return Err(ValidationError::UnknownPacket(packet)),
        Err(e) => {
            warn!(packet, error = %e, "ledger read failed, validating against cached snapshot");
            match cache.packet_detail(packet).await {
                Some(detail) => {
                    let claimed = detail.has_claimed(from);
                    (detail.snapshot, Some(claimed))
                }
                None => return Err(ValidationError::UnknownPacket(packet)),
            }
        }
    };

    let already_claimed = match claimed_from_cache {
        Some(claimed) => claimed,
        None => match reader.has_claimed(packet, from).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(packet, error = %e, "claim-set read failed, falling back to cached claims");
                cache
                    .packet_detail(packet)
                    .await
                    .map(|detail| detail.has_claimed(from))
                    .unwrap_or(false)
            }
        },
    };

    Ok((snapshot, already_claimed))
}
