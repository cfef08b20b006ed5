//! Core domain types for the reconciliation layer.

use std::fmt;

use crate::Amount;

/// On-chain packet identifier.
pub type PacketId = u64;

/// Position of a log entry within its transaction.
pub type LogIndex = u32;

/// A ledger account address, held as lowercase hex text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn new(hex: impl Into<String>) -> Self {
        Address(hex.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated display form, `0x1234…cdef`.
    pub fn short(&self) -> String {
        if self.0.len() <= 10 || !self.0.is_ascii() {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction identifier as returned by the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hex: impl Into<String>) -> Self {
        TxHash(hex.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a packet splits its total amount across shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distribution {
    /// Every share receives the same amount.
    Equal,
    /// Share amounts are drawn randomly by the contract.
    #[default]
    Random,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Equal => "equal",
            Distribution::Random => "random",
        }
    }

    /// Parse the wire spelling; anything unrecognized is `None`.
    pub fn from_str_opt(text: &str) -> Option<Self> {
        match text {
            "equal" => Some(Distribution::Equal),
            "random" => Some(Distribution::Random),
            _ => None,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two event streams the contract emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Claimed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => f.write_str("created"),
            EventKind::Claimed => f.write_str("claimed"),
        }
    }
}

/// Globally unique identity of a remote event.
///
/// `(kind, tx, log_index)` is the deduplication key: the transport may
/// redeliver the same log entry across overlapping polling windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId {
    pub kind: EventKind,
    pub tx: TxHash,
    pub log_index: LogIndex,
}

impl EventId {
    pub fn new(kind: EventKind, tx: TxHash, log_index: LogIndex) -> Self {
        Self {
            kind,
            tx,
            log_index,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.tx, self.log_index)
    }
}

/// A notification surfaced by the subscription layer.
///
/// Timestamps are block timestamps as observed by the transport.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Created {
        id: EventId,
        packet: PacketId,
        creator: Address,
        total_amount: Amount,
        count: u32,
        distribution: Distribution,
        message: String,
        timestamp: u64,
    },
    Claimed {
        id: EventId,
        packet: PacketId,
        claimer: Address,
        amount: Amount,
        remaining_count: u32,
        remaining_amount: Amount,
        timestamp: u64,
    },
}

impl ChainEvent {
    pub fn id(&self) -> &EventId {
        match self {
            ChainEvent::Created { id, .. } => id,
            ChainEvent::Claimed { id, .. } => id,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.id().kind
    }

    pub fn packet(&self) -> PacketId {
        match self {
            ChainEvent::Created { packet, .. } => *packet,
            ChainEvent::Claimed { packet, .. } => *packet,
        }
    }

    /// User-facing one-liner for notification surfaces.
    pub fn describe(&self) -> String {
        match self {
            ChainEvent::Created {
                packet,
                creator,
                total_amount,
                count,
                ..
            } => format!(
                "red packet #{packet} created by {}: {total_amount} in {count} shares",
                creator.short()
            ),
            ChainEvent::Claimed {
                packet,
                claimer,
                amount,
                ..
            } => format!(
                "{} claimed {amount} from red packet #{packet}",
                claimer.short()
            ),
        }
    }
}

/// Point-in-time read of a packet's on-chain state.
///
/// Non-authoritative: the ledger owns this data, the client only caches it.
#[derive(Debug, Clone)]
pub struct PacketSnapshot {
    pub id: PacketId,
    pub creator: Address,
    pub total_amount: Amount,
    pub remaining_amount: Amount,
    pub total_count: u32,
    pub remaining_count: u32,
    pub distribution: Distribution,
    pub create_time: u64,
    pub active: bool,
    pub message: String,
}

impl PacketSnapshot {
    /// A packet with no shares left is not claimable even while the
    /// `active` flag lags behind (stale cache).
    pub fn is_claimable(&self) -> bool {
        self.active && self.remaining_count > 0
    }

    pub fn claimed_count(&self) -> u32 {
        self.total_count.saturating_sub(self.remaining_count)
    }

    pub fn claimed_amount(&self) -> Amount {
        self.total_amount.saturating_sub(self.remaining_amount)
    }

    /// Claim progress in whole percent, clamped to 0..=100.
    pub fn progress_percent(&self) -> u8 {
        if self.total_count == 0 {
            return 0;
        }
        let pct = u64::from(self.claimed_count()) * 100 / u64::from(self.total_count);
        pct.min(100) as u8
    }
}

/// One successful claim, immutable once observed.
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub packet: PacketId,
    pub claimer: Address,
    pub amount: Amount,
    pub timestamp: u64,
    pub tx: TxHash,
}

/// Snapshot plus its claim records, as the indexer's by-id query returns it.
#[derive(Debug, Clone)]
pub struct PacketDetail {
    pub snapshot: PacketSnapshot,
    pub claims: Vec<ClaimRecord>,
}

impl PacketDetail {
    pub fn has_claimed(&self, who: &Address) -> bool {
        self.claims.iter().any(|c| &c.claimer == who)
    }
}

/// A user-initiated write against the ledger boundary.
#[derive(Debug, Clone)]
pub enum WriteIntent {
    Create {
        from: Address,
        amount: Amount,
        count: u32,
        distribution: Distribution,
        message: String,
    },
    Claim {
        from: Address,
        packet: PacketId,
    },
}

impl WriteIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteIntent::Create { .. } => "create",
            WriteIntent::Claim { .. } => "claim",
        }
    }

    pub fn from(&self) -> &Address {
        match self {
            WriteIntent::Create { from, .. } => from,
            WriteIntent::Claim { from, .. } => from,
        }
    }
}
