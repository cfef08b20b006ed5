//! Client-side read model over the external indexer.
//!
//! Keyed, paginated views with stale-while-revalidate semantics: the
//! previous result stays visible while a refetch runs, refetch errors
//! keep the last good result and record a retry affordance, and a
//! confirmed write forces the affected keys to refetch immediately.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::config::Settings;
use crate::indexer::{Indexer, IndexerError, Order, Page, PageRequest};
use crate::model::{Address, ClaimRecord, PacketDetail, PacketId, PacketSnapshot, WriteIntent};

/// Identity of one cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    AllPackets { page: u32 },
    ByCreator { creator: Address, page: u32 },
    ClaimsBy { claimer: Address, page: u32 },
    RecentActivity,
    Packet { id: PacketId },
}

/// The data shape behind a key.
#[derive(Debug, Clone)]
pub enum CachedView {
    Packets(Page<PacketSnapshot>),
    Claims(Page<ClaimRecord>),
    Detail(Option<PacketDetail>),
}

/// One cached result plus its freshness metadata.
#[derive(Debug)]
pub struct Entry {
    pub view: CachedView,
    refreshed_at: Instant,
    /// Set when the latest refetch failed; the view still holds the last
    /// good result. Cleared by the next successful refetch.
    pub stale_error: Option<String>,
}

impl Entry {
    fn fresh(view: CachedView) -> Self {
        Self {
            view,
            refreshed_at: Instant::now(),
            stale_error: None,
        }
    }

    fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }

    pub fn packets(&self) -> Option<&Page<PacketSnapshot>> {
        match &self.view {
            CachedView::Packets(page) => Some(page),
            _ => None,
        }
    }

    pub fn claims(&self) -> Option<&Page<ClaimRecord>> {
        match &self.view {
            CachedView::Claims(page) => Some(page),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&PacketDetail> {
        match &self.view {
            CachedView::Detail(detail) => detail.as_ref(),
            _ => None,
        }
    }
}

/// Cached views of indexed history, keyed by [`QueryKey`].
///
/// Mutated only through its own methods; callers hold it on the surface
/// that owns the data (one owner, no locking).
pub struct ReadModel<I> {
    indexer: I,
    settings: Settings,
    entries: HashMap<QueryKey, Entry>,
}

impl<I: Indexer> ReadModel<I> {
    pub fn new(indexer: I, settings: Settings) -> Self {
        Self {
            indexer,
            settings,
            entries: HashMap::new(),
        }
    }

    /// Look up a key, refetching when missing or older than the refresh
    /// interval. Always returns an entry; on failure it carries the last
    /// good view (or an empty one) plus the error text.
    pub async fn query(&mut self, key: &QueryKey) -> &Entry {
        let needs_fetch = self
            .entries
            .get(key)
            .is_none_or(|e| e.age() >= self.settings.refresh_interval);
        if needs_fetch {
            let prev = self.entries.remove(key);
            let next = self.load(key, prev).await;
            self.entries.insert(key.clone(), next);
        }
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Entry::fresh(Self::empty_view(key)))
    }

    /// Return the cached entry without touching the network.
    pub fn peek(&self, key: &QueryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Force an immediate refetch of a cached key, bypassing the
    /// interval. Uncached keys are left alone.
    pub async fn invalidate(&mut self, key: &QueryKey) {
        if let Some(prev) = self.entries.remove(key) {
            let next = self.load(key, Some(prev)).await;
            self.entries.insert(key.clone(), next);
        }
    }

    /// Invalidate every cached key a confirmed write affects.
    pub async fn invalidate_for(&mut self, intent: &WriteIntent) {
        let keys: Vec<QueryKey> = self
            .entries
            .keys()
            .filter(|key| Self::affected(key, intent))
            .cloned()
            .collect();
        for key in keys {
            self.invalidate(&key).await;
        }
    }

    /// Refetch every entry older than the refresh interval. The periodic
    /// background driver calls this on its fixed tick.
    pub async fn refresh_stale(&mut self) {
        let ttl = self.settings.refresh_interval;
        let stale: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.age() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.invalidate(&key).await;
        }
    }

    /// Convenience view of one packet plus its claim set.
    pub async fn packet_detail(&mut self, id: PacketId) -> Option<PacketDetail> {
        self.query(&QueryKey::Packet { id }).await.detail().cloned()
    }

    fn affected(key: &QueryKey, intent: &WriteIntent) -> bool {
        match intent {
            WriteIntent::Create { from, .. } => match key {
                QueryKey::AllPackets { .. } => true,
                QueryKey::ByCreator { creator, .. } => creator == from,
                _ => false,
            },
            WriteIntent::Claim { from, packet } => match key {
                QueryKey::Packet { id } => id == packet,
                QueryKey::ClaimsBy { claimer, .. } => claimer == from,
                QueryKey::RecentActivity => true,
                // remaining counters shown in lists changed too
                QueryKey::AllPackets { .. } => true,
                QueryKey::ByCreator { .. } => false,
            },
        }
    }

    async fn load(&self, key: &QueryKey, prev: Option<Entry>) -> Entry {
        match self.fetch(key).await {
            Ok(view) => Entry::fresh(view),
            Err(e) => {
                warn!(error = %e, "read-model refetch failed, keeping last good result");
                match prev {
                    Some(mut entry) => {
                        entry.stale_error = Some(e.to_string());
                        entry.refreshed_at = Instant::now();
                        entry
                    }
                    None => Entry {
                        view: Self::empty_view(key),
                        refreshed_at: Instant::now(),
                        stale_error: Some(e.to_string()),
                    },
                }
            }
        }
    }

    async fn fetch(&self, key: &QueryKey) -> Result<CachedView, IndexerError> {
        let first = self.settings.page_size;
        match key {
            QueryKey::AllPackets { page } => {
                let request = PageRequest {
                    first,
                    skip: page * first,
                    order: Order::CreateTimeDesc,
                };
                let items = self.indexer.packets(None, &request).await?;
                Ok(CachedView::Packets(Page::from_items(items, &request)))
            }
            QueryKey::ByCreator { creator, page } => {
                let request = PageRequest {
                    first,
                    skip: page * first,
                    order: Order::CreateTimeDesc,
                };
                let items = self.indexer.packets(Some(creator), &request).await?;
                Ok(CachedView::Packets(Page::from_items(items, &request)))
            }
            QueryKey::ClaimsBy { claimer, page } => {
                let request = PageRequest {
                    first,
                    skip: page * first,
                    order: Order::TimestampDesc,
                };
                let items = self.indexer.claims(Some(claimer), &request).await?;
                Ok(CachedView::Claims(Page::from_items(items, &request)))
            }
            QueryKey::RecentActivity => {
                let request = PageRequest {
                    first,
                    skip: 0,
                    order: Order::TimestampDesc,
                };
                let items = self.indexer.claims(None, &request).await?;
                Ok(CachedView::Claims(Page::from_items(items, &request)))
            }
            QueryKey::Packet { id } => Ok(CachedView::Detail(self.indexer.packet_detail(*id).await?)),
        }
    }

    fn empty_view(key: &QueryKey) -> CachedView {
        match key {
            QueryKey::AllPackets { .. } | QueryKey::ByCreator { .. } => {
                CachedView::Packets(Page::empty())
            }
            QueryKey::ClaimsBy { .. } | QueryKey::RecentActivity => CachedView::Claims(Page::empty()),
            QueryKey::Packet { .. } => CachedView::Detail(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::model::Distribution;
    use std::sync::{Arc, Mutex};
    use tokio::time::advance;

    #[derive(Default)]
    struct MockState {
        packets_calls: Vec<PageRequest>,
        claims_calls: Vec<PageRequest>,
        detail_calls: u32,
        fail: bool,
        packets: Vec<PacketSnapshot>,
        detail: Option<PacketDetail>,
    }

    #[derive(Clone, Default)]
    struct Mock {
        state: Arc<Mutex<MockState>>,
    }

    impl Mock {
        fn with_packets(packets: Vec<PacketSnapshot>) -> Self {
            let mock = Mock::default();
            mock.state.lock().unwrap().packets = packets;
            mock
        }

        fn set_fail(&self, fail: bool) {
            self.state.lock().unwrap().fail = fail;
        }

        fn packets_calls(&self) -> usize {
            self.state.lock().unwrap().packets_calls.len()
        }

        fn claims_calls(&self) -> usize {
            self.state.lock().unwrap().claims_calls.len()
        }

        fn detail_calls(&self) -> u32 {
            self.state.lock().unwrap().detail_calls
        }
    }

    impl Indexer for Mock {
        async fn packets(
            &self,
            _creator: Option<&Address>,
            page: &PageRequest,
        ) -> Result<Vec<PacketSnapshot>, IndexerError> {
            let mut state = self.state.lock().unwrap();
            state.packets_calls.push(*page);
            if state.fail {
                return Err(IndexerError::Transport("indexer offline".into()));
            }
            Ok(state.packets.clone())
        }

        async fn packet_detail(
            &self,
            _id: PacketId,
        ) -> Result<Option<PacketDetail>, IndexerError> {
            let mut state = self.state.lock().unwrap();
            state.detail_calls += 1;
            if state.fail {
                return Err(IndexerError::Transport("indexer offline".into()));
            }
            Ok(state.detail.clone())
        }

        async fn claims(
            &self,
            _claimer: Option<&Address>,
            page: &PageRequest,
        ) -> Result<Vec<ClaimRecord>, IndexerError> {
            let mut state = self.state.lock().unwrap();
            state.claims_calls.push(*page);
            if state.fail {
                return Err(IndexerError::Transport("indexer offline".into()));
            }
            Ok(Vec::new())
        }
    }

    fn snapshot(id: PacketId) -> PacketSnapshot {
        PacketSnapshot {
            id,
            creator: Address::new("0xa11ce"),
            total_amount: Amount::parse("1"),
            remaining_amount: Amount::parse("1"),
            total_count: 4,
            remaining_count: 4,
            distribution: Distribution::Random,
            create_time: 1_700_000_000,
            active: true,
            message: "hi".into(),
        }
    }

    fn model(mock: &Mock) -> ReadModel<Mock> {
        ReadModel::new(mock.clone(), Settings::default())
    }

    const ALL: QueryKey = QueryKey::AllPackets { page: 0 };

    #[tokio::test(start_paused = true)]
    async fn serves_cached_until_stale() {
        let mock = Mock::with_packets(vec![snapshot(1)]);
        let mut cache = model(&mock);

        let entry = cache.query(&ALL).await;
        assert_eq!(entry.packets().unwrap().items.len(), 1);
        assert_eq!(mock.packets_calls(), 1);

        // within the refresh interval: cached
        advance(Duration::from_secs(10)).await;
        cache.query(&ALL).await;
        assert_eq!(mock.packets_calls(), 1);

        // past it: refetched
        advance(Duration::from_secs(30)).await;
        cache.query(&ALL).await;
        assert_eq!(mock.packets_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn page_requests_use_fixed_page_size() {
        let mock = Mock::default();
        let mut cache = model(&mock);

        cache.query(&QueryKey::AllPackets { page: 2 }).await;
        let call = mock.state.lock().unwrap().packets_calls[0];
        assert_eq!(call.first, 10);
        assert_eq!(call.skip, 20);
        assert_eq!(call.order, Order::CreateTimeDesc);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_bypasses_interval() {
        let mock = Mock::with_packets(vec![snapshot(1)]);
        let mut cache = model(&mock);

        cache.query(&ALL).await;
        cache.invalidate(&ALL).await;
        assert_eq!(mock.packets_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_ignores_uncached_keys() {
        let mock = Mock::default();
        let mut cache = model(&mock);

        cache.invalidate(&ALL).await;
        assert_eq!(mock.packets_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_error_preserves_last_good_result() {
        let mock = Mock::with_packets(vec![snapshot(1)]);
        let mut cache = model(&mock);

        cache.query(&ALL).await;
        mock.set_fail(true);
        advance(Duration::from_secs(31)).await;

        let entry = cache.query(&ALL).await;
        assert_eq!(entry.packets().unwrap().items.len(), 1);
        assert!(entry.stale_error.as_deref().unwrap().contains("indexer offline"));

        // recovery clears the error
        mock.set_fail(false);
        cache.invalidate(&ALL).await;
        let entry = cache.peek(&ALL).unwrap();
        assert!(entry.stale_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_error_degrades_to_empty_view() {
        let mock = Mock::default();
        mock.set_fail(true);
        let mut cache = model(&mock);

        let entry = cache.query(&ALL).await;
        assert!(entry.packets().unwrap().items.is_empty());
        assert!(entry.stale_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_stale_skips_fresh_entries() {
        let mock = Mock::with_packets(vec![snapshot(1)]);
        let mut cache = model(&mock);

        cache.query(&ALL).await;
        advance(Duration::from_secs(20)).await;
        cache.query(&QueryKey::RecentActivity).await;
        advance(Duration::from_secs(15)).await;

        // ALL is 35s old, RecentActivity 15s
        cache.refresh_stale().await;
        assert_eq!(mock.packets_calls(), 2);
        assert_eq!(mock.claims_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_create_invalidates_packet_lists() {
        let alice = Address::new("0xa11ce");
        let bob = Address::new("0xb0b");
        let mock = Mock::with_packets(vec![snapshot(1)]);
        let mut cache = model(&mock);

        cache.query(&ALL).await;
        cache
            .query(&QueryKey::ByCreator { creator: alice.clone(), page: 0 })
            .await;
        cache
            .query(&QueryKey::ByCreator { creator: bob, page: 0 })
            .await;
        cache.query(&QueryKey::RecentActivity).await;
        assert_eq!(mock.packets_calls(), 3);

        cache
            .invalidate_for(&WriteIntent::Create {
                from: alice,
                amount: Amount::parse("0.01"),
                count: 10,
                distribution: Distribution::Random,
                message: "hi".into(),
            })
            .await;

        // all-packets and alice's list refetched, bob's and recent untouched
        assert_eq!(mock.packets_calls(), 5);
        assert_eq!(mock.claims_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_claim_invalidates_detail_and_claims() {
        let bob = Address::new("0xb0b");
        let mock = Mock::default();
        let mut cache = model(&mock);

        cache.query(&QueryKey::Packet { id: 7 }).await;
        cache
            .query(&QueryKey::ClaimsBy { claimer: bob.clone(), page: 0 })
            .await;
        cache.query(&QueryKey::RecentActivity).await;
        assert_eq!(mock.detail_calls(), 1);
        assert_eq!(mock.claims_calls(), 2);

        cache
            .invalidate_for(&WriteIntent::Claim { from: bob, packet: 7 })
            .await;

        assert_eq!(mock.detail_calls(), 2);
        assert_eq!(mock.claims_calls(), 4);
    }
}
