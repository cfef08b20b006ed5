use crate::Amount;
use crate::model::{Address, ClaimRecord, Distribution, PacketId, PacketSnapshot};

/// Locally reconciled view of one packet: the creation payload folded
/// together with every admitted claim event.
#[derive(Debug, Clone)]
pub struct PacketView {
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
    claims: Vec<ClaimRecord>,
}

impl PacketView {
    pub(crate) fn new(
        id: PacketId,
        creator: Address,
        total_amount: Amount,
        count: u32,
        distribution: Distribution,
        message: String,
        create_time: u64,
    ) -> Self {
        Self {
            id,
            creator,
            total_amount,
            remaining_amount: total_amount,
            total_count: count,
            remaining_count: count,
            distribution,
            create_time,
            active: true,
            message,
            claims: Vec::new(),
        }
    }

    pub fn claims(&self) -> &[ClaimRecord] {
        &self.claims
    }

    pub fn has_claimed(&self, who: &Address) -> bool {
        self.claims.iter().any(|c| &c.claimer == who)
    }

    pub fn is_claimable(&self) -> bool {
        self.active && self.remaining_count > 0
    }

    pub fn claimed_count(&self) -> u32 {
        self.total_count.saturating_sub(self.remaining_count)
    }

    pub fn claimed_amount(&self) -> Amount {
        self.total_amount.saturating_sub(self.remaining_amount)
    }

    /// Point-in-time copy in the shared snapshot shape.
    pub fn snapshot(&self) -> PacketSnapshot {
        PacketSnapshot {
            id: self.id,
            creator: self.creator.clone(),
            total_amount: self.total_amount,
            remaining_amount: self.remaining_amount,
            total_count: self.total_count,
            remaining_count: self.remaining_count,
            distribution: self.distribution,
            create_time: self.create_time,
            active: self.active,
            message: self.message.clone(),
        }
    }

    /// Fold an admitted claim into the view. The event payload is
    /// authoritative for the remaining counters.
    pub(crate) fn record_claim(
        &mut self,
        record: ClaimRecord,
        remaining_count: u32,
        remaining_amount: Amount,
    ) {
        self.remaining_count = remaining_count;
        self.remaining_amount = remaining_amount;
        self.claims.push(record);
    }
}
