//! Indexer query interface and wire format.
//!
//! The GraphQL endpoint is an external collaborator; this module defines
//! the five queries the read model needs, builds their request bodies,
//! and decodes responses into domain types. Transport is behind the
//! [`Indexer`] trait — the crate never issues HTTP itself.
//!
//! Wire-side numerics arrive as decimal strings and pass through the
//! numeric safety layer; a malformed record is skipped with a warning
//! instead of poisoning the whole page.

use std::future::Future;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::Amount;
use crate::model::{
    Address, ClaimRecord, Distribution, PacketDetail, PacketId, PacketSnapshot, TxHash,
};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer transport: {0}")]
    Transport(String),

    #[error("indexer query failed: {0}")]
    Query(String),

    #[error("malformed indexer response: {0}")]
    Decode(String),
}

/// Sort key for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    CreateTimeDesc,
    TimestampDesc,
}

impl Order {
    fn order_by(&self) -> &'static str {
        match self {
            Order::CreateTimeDesc => "createTime",
            Order::TimestampDesc => "timestamp",
        }
    }
}

/// `first`/`skip` pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub first: u32,
    pub skip: u32,
    pub order: Order,
}

/// One page of results. The indexer returns no total count; `has_more`
/// is inferred from a full page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub skip: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn from_items(items: Vec<T>, request: &PageRequest) -> Self {
        let has_more = items.len() as u32 == request.first;
        Self {
            items,
            skip: request.skip,
            has_more,
        }
    }

    /// Cursor for the next page.
    pub fn next_skip(&self) -> u32 {
        self.skip + self.items.len() as u32
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            skip: 0,
            has_more: false,
        }
    }
}

/// Paginated queries against the external indexer.
pub trait Indexer {
    fn packets(
        &self,
        creator: Option<&Address>,
        page: &PageRequest,
    ) -> impl Future<Output = Result<Vec<PacketSnapshot>, IndexerError>> + Send;

    fn packet_detail(
        &self,
        id: PacketId,
    ) -> impl Future<Output = Result<Option<PacketDetail>, IndexerError>> + Send;

    fn claims(
        &self,
        claimer: Option<&Address>,
        page: &PageRequest,
    ) -> impl Future<Output = Result<Vec<ClaimRecord>, IndexerError>> + Send;
}

pub const PACKETS_QUERY: &str = "query Packets($first: Int!, $skip: Int!, $orderBy: String!) { \
     redPackets(first: $first, skip: $skip, orderBy: $orderBy, orderDirection: desc) { \
     id creator totalAmount remainingAmount totalCount remainingCount distribution createTime active message } }";

pub const PACKETS_BY_CREATOR_QUERY: &str =
    "query PacketsByCreator($creator: String!, $first: Int!, $skip: Int!, $orderBy: String!) { \
     redPackets(where: { creator: $creator }, first: $first, skip: $skip, orderBy: $orderBy, orderDirection: desc) { \
     id creator totalAmount remainingAmount totalCount remainingCount distribution createTime active message } }";

pub const PACKET_BY_ID_QUERY: &str = "query PacketById($id: ID!) { \
     redPacket(id: $id) { \
     id creator totalAmount remainingAmount totalCount remainingCount distribution createTime active message \
     claimRecords { claimer amount timestamp transactionHash } } }";

pub const CLAIMS_BY_CLAIMER_QUERY: &str =
    "query ClaimsByClaimer($claimer: String!, $first: Int!, $skip: Int!, $orderBy: String!) { \
     claimRecords(where: { claimer: $claimer }, first: $first, skip: $skip, orderBy: $orderBy, orderDirection: desc) { \
     redPacket { id } claimer amount timestamp transactionHash } }";

pub const RECENT_CLAIMS_QUERY: &str =
    "query RecentClaims($first: Int!, $skip: Int!, $orderBy: String!) { \
     claimRecords(first: $first, skip: $skip, orderBy: $orderBy, orderDirection: desc) { \
     redPacket { id } claimer amount timestamp transactionHash } }";

/// Request body for the packet-list queries.
pub fn packets_body(creator: Option<&Address>, page: &PageRequest) -> Value {
    match creator {
        Some(creator) => json!({
            "query": PACKETS_BY_CREATOR_QUERY,
            "variables": {
                "creator": creator.as_str(),
                "first": page.first,
                "skip": page.skip,
                "orderBy": page.order.order_by(),
            },
        }),
        None => json!({
            "query": PACKETS_QUERY,
            "variables": {
                "first": page.first,
                "skip": page.skip,
                "orderBy": page.order.order_by(),
            },
        }),
    }
}

/// Request body for the by-id detail query.
pub fn packet_detail_body(id: PacketId) -> Value {
    json!({
        "query": PACKET_BY_ID_QUERY,
        "variables": { "id": id.to_string() },
    })
}

/// Request body for the claim-list queries.
pub fn claims_body(claimer: Option<&Address>, page: &PageRequest) -> Value {
    match claimer {
        Some(claimer) => json!({
            "query": CLAIMS_BY_CLAIMER_QUERY,
            "variables": {
                "claimer": claimer.as_str(),
                "first": page.first,
                "skip": page.skip,
                "orderBy": page.order.order_by(),
            },
        }),
        None => json!({
            "query": RECENT_CLAIMS_QUERY,
            "variables": {
                "first": page.first,
                "skip": page.skip,
                "orderBy": page.order.order_by(),
            },
        }),
    }
}

// Wire shapes. The Graph serializes its BigInt scalars as JSON strings.

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PacketsData {
    red_packets: Vec<RawPacket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PacketDetailData {
    red_packet: Option<RawPacket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimsData {
    claim_records: Vec<RawClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPacket {
    id: String,
    creator: String,
    total_amount: String,
    remaining_amount: String,
    total_count: String,
    remaining_count: String,
    distribution: String,
    create_time: String,
    active: bool,
    message: String,
    #[serde(default)]
    claim_records: Vec<RawClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaim {
    #[serde(default)]
    red_packet: Option<RawPacketRef>,
    claimer: String,
    amount: String,
    timestamp: String,
    transaction_hash: String,
}

#[derive(Debug, Deserialize)]
struct RawPacketRef {
    id: String,
}

pub fn decode_packets(body: &str) -> Result<Vec<PacketSnapshot>, IndexerError> {
    let data: PacketsData = unwrap_envelope(body)?;
    Ok(data
        .red_packets
        .into_iter()
        .filter_map(|raw| snapshot_from_raw(&raw))
        .collect())
}

pub fn decode_packet_detail(body: &str) -> Result<Option<PacketDetail>, IndexerError> {
    let data: PacketDetailData = unwrap_envelope(body)?;
    let Some(raw) = data.red_packet else {
        return Ok(None);
    };
    let Some(snapshot) = snapshot_from_raw(&raw) else {
        return Ok(None);
    };
    let claims = raw
        .claim_records
        .iter()
        .filter_map(|c| claim_from_raw(c, Some(snapshot.id)))
        .collect();
    Ok(Some(PacketDetail { snapshot, claims }))
}

pub fn decode_claims(body: &str) -> Result<Vec<ClaimRecord>, IndexerError> {
    let data: ClaimsData = unwrap_envelope(body)?;
    Ok(data
        .claim_records
        .iter()
        .filter_map(|raw| claim_from_raw(raw, None))
        .collect())
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T, IndexerError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| IndexerError::Decode(e.to_string()))?;
    if !envelope.errors.is_empty() {
        let joined = envelope
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(IndexerError::Query(joined));
    }
    envelope
        .data
        .ok_or_else(|| IndexerError::Decode("response carries neither data nor errors".into()))
}

fn snapshot_from_raw(raw: &RawPacket) -> Option<PacketSnapshot> {
    let Ok(id) = raw.id.parse::<PacketId>() else {
        warn!(id = %raw.id, "skipping packet record with unusable id");
        return None;
    };
    Some(PacketSnapshot {
        id,
        creator: Address::new(raw.creator.as_str()),
        total_amount: Amount::from_wei_text(&raw.total_amount),
        remaining_amount: Amount::from_wei_text(&raw.remaining_amount),
        total_count: safe_int(&raw.total_count),
        remaining_count: safe_int(&raw.remaining_count),
        distribution: Distribution::from_str_opt(&raw.distribution).unwrap_or_else(|| {
            warn!(value = %raw.distribution, "unknown distribution mode");
            Distribution::default()
        }),
        create_time: safe_int(&raw.create_time),
        active: raw.active,
        message: raw.message.clone(),
    })
}

fn claim_from_raw(raw: &RawClaim, parent: Option<PacketId>) -> Option<ClaimRecord> {
    let packet = match parent {
        Some(id) => id,
        None => match raw.red_packet.as_ref().and_then(|p| p.id.parse().ok()) {
            Some(id) => id,
            None => {
                warn!(tx = %raw.transaction_hash, "skipping claim record with unusable packet ref");
                return None;
            }
        },
    };
    Some(ClaimRecord {
        packet,
        claimer: Address::new(raw.claimer.as_str()),
        amount: Amount::from_wei_text(&raw.amount),
        timestamp: safe_int(&raw.timestamp),
        tx: TxHash::new(raw.transaction_hash.as_str()),
    })
}

/// Lossy integer parse for wire counters; malformed input is zero.
fn safe_int<T: Default + std::str::FromStr>(text: &str) -> T {
    match text.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(input = text, "unparseable integer field, substituting zero");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(first: u32, skip: u32) -> PageRequest {
        PageRequest {
            first,
            skip,
            order: Order::CreateTimeDesc,
        }
    }

    #[test]
    fn packets_body_without_filter() {
        let body = packets_body(None, &page(10, 20));
        assert_eq!(body["query"], PACKETS_QUERY);
        assert_eq!(body["variables"]["first"], 10);
        assert_eq!(body["variables"]["skip"], 20);
        assert_eq!(body["variables"]["orderBy"], "createTime");
        assert!(body["variables"].get("creator").is_none());
    }

    #[test]
    fn packets_body_with_creator_filter() {
        let creator = Address::new("0xA11CE");
        let body = packets_body(Some(&creator), &page(10, 0));
        assert_eq!(body["query"], PACKETS_BY_CREATOR_QUERY);
        assert_eq!(body["variables"]["creator"], "0xa11ce");
    }

    #[test]
    fn claims_body_picks_query_by_filter() {
        let page = PageRequest {
            first: 10,
            skip: 0,
            order: Order::TimestampDesc,
        };
        let recent = claims_body(None, &page);
        assert_eq!(recent["query"], RECENT_CLAIMS_QUERY);
        assert_eq!(recent["variables"]["orderBy"], "timestamp");

        let claimer = Address::new("0xb0b");
        let by_claimer = claims_body(Some(&claimer), &page);
        assert_eq!(by_claimer["query"], CLAIMS_BY_CLAIMER_QUERY);
        assert_eq!(by_claimer["variables"]["claimer"], "0xb0b");
    }

    #[test]
    fn packet_detail_body_stringifies_id() {
        let body = packet_detail_body(42);
        assert_eq!(body["query"], PACKET_BY_ID_QUERY);
        assert_eq!(body["variables"]["id"], "42");
    }

    fn packet_json(id: &str, total: &str) -> String {
        format!(
            r#"{{"id":"{id}","creator":"0xA11CE","totalAmount":"{total}",
               "remainingAmount":"500000000000000000","totalCount":"4","remainingCount":"2",
               "distribution":"random","createTime":"1700000000","active":true,"message":"hi"}}"#
        )
    }

    #[test]
    fn decode_packets_happy_path() {
        let body = format!(
            r#"{{"data":{{"redPackets":[{}]}}}}"#,
            packet_json("7", "1000000000000000000")
        );
        let packets = decode_packets(&body).unwrap();
        assert_eq!(packets.len(), 1);
        let p = &packets[0];
        assert_eq!(p.id, 7);
        assert_eq!(p.creator.as_str(), "0xa11ce");
        assert_eq!(p.total_amount, Amount::parse("1"));
        assert_eq!(p.remaining_amount, Amount::parse("0.5"));
        assert_eq!(p.total_count, 4);
        assert_eq!(p.remaining_count, 2);
        assert!(p.active);
    }

    #[test]
    fn decode_packets_skips_unusable_ids_and_zeroes_bad_amounts() {
        let body = format!(
            r#"{{"data":{{"redPackets":[{},{}]}}}}"#,
            packet_json("not-a-number", "1"),
            packet_json("9", "zzz")
        );
        let packets = decode_packets(&body).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, 9);
        assert_eq!(packets[0].total_amount, Amount::ZERO);
    }

    #[test]
    fn decode_graphql_errors() {
        let body = r#"{"errors":[{"message":"rate limited"},{"message":"try later"}]}"#;
        let err = decode_packets(body).unwrap_err();
        assert!(matches!(err, IndexerError::Query(ref m) if m == "rate limited; try later"));
    }

    #[test]
    fn decode_malformed_json() {
        assert!(matches!(
            decode_packets("{not json"),
            Err(IndexerError::Decode(_))
        ));
    }

    #[test]
    fn decode_detail_with_nested_claims() {
        let body = r#"{"data":{"redPacket":{
            "id":"7","creator":"0xa11ce","totalAmount":"1000000000000000000",
            "remainingAmount":"750000000000000000","totalCount":"4","remainingCount":"3",
            "distribution":"equal","createTime":"1700000000","active":true,"message":"hi",
            "claimRecords":[{"claimer":"0xB0B","amount":"250000000000000000",
                             "timestamp":"1700000100","transactionHash":"0x02"}]}}}"#;
        let detail = decode_packet_detail(body).unwrap().unwrap();
        assert_eq!(detail.snapshot.id, 7);
        assert_eq!(detail.claims.len(), 1);
        // nested claims inherit the parent packet id
        assert_eq!(detail.claims[0].packet, 7);
        assert!(detail.has_claimed(&Address::new("0xb0b")));
        assert!(!detail.has_claimed(&Address::new("0xa11ce")));
    }

    #[test]
    fn decode_detail_missing_packet() {
        let body = r#"{"data":{"redPacket":null}}"#;
        assert_eq!(decode_packet_detail(body).unwrap().map(|d| d.snapshot.id), None);
    }

    #[test]
    fn decode_claims_resolves_packet_ref() {
        let body = r#"{"data":{"claimRecords":[
            {"redPacket":{"id":"3"},"claimer":"0xb0b","amount":"100",
             "timestamp":"1700000100","transactionHash":"0x02"},
            {"claimer":"0xcar","amount":"100","timestamp":"1700000100",
             "transactionHash":"0x03"}]}}"#;
        let claims = decode_claims(body).unwrap();
        // the record without a packet ref is skipped
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].packet, 3);
        assert_eq!(claims[0].amount, Amount::from_wei(100));
    }

    #[test]
    fn page_cursors() {
        let request = page(10, 20);
        let full = Page::from_items(vec![0u8; 10], &request);
        assert!(full.has_more);
        assert_eq!(full.next_skip(), 30);

        let partial = Page::from_items(vec![0u8; 3], &request);
        assert!(!partial.has_more);
        assert_eq!(partial.next_skip(), 23);
    }
}
