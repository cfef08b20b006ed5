use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::model::{
    Address, ChainEvent, Distribution, EventId, EventKind, LogIndex, PacketId, TxHash,
};
use crate::reconcile::PacketView;

/// Errors that can occur when parsing recorded event rows
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized event kind '{kind}'")]
    UnrecognizedKind { line: usize, kind: String },

    #[error("line {line}: unrecognized distribution mode '{mode}'")]
    UnrecognizedMode { line: usize, mode: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    kind: String,
    tx: String,
    log: LogIndex,
    packet: PacketId,
    account: String,
    /// Wei text; total amount for created rows, claim amount for claimed rows.
    amount: Option<String>,
    count: Option<u32>,
    remaining: Option<u32>,
    remaining_amount: Option<String>,
    mode: Option<String>,
    message: Option<String>,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    packet: PacketId,
    creator: String,
    total: String,
    remaining: String,
    claimed: u32,
    shares: u32,
    active: bool,
}

/// Read recorded contract events from a csv file
pub fn read_events(path: impl AsRef<Path>) -> impl Iterator<Item = Result<ChainEvent, FeedError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| FeedError::Parse { line, source })?;
            match row.kind.as_str() {
                "created" => created_from_row(line, row),
                "claimed" => claimed_from_row(line, row),
                other => Err(FeedError::UnrecognizedKind {
                    line,
                    kind: other.to_string(),
                }),
            }
        })
}

fn created_from_row(line: usize, row: InputRow) -> Result<ChainEvent, FeedError> {
    let missing = |field| FeedError::MissingField {
        line,
        kind: "created",
        field,
    };
    let amount = row.amount.ok_or_else(|| missing("amount"))?;
    let count = row.count.ok_or_else(|| missing("count"))?;
    let mode = row.mode.ok_or_else(|| missing("mode"))?;
    let distribution =
        Distribution::from_str_opt(&mode).ok_or(FeedError::UnrecognizedMode { line, mode })?;

    Ok(ChainEvent::Created {
        id: EventId::new(EventKind::Created, TxHash::new(row.tx), row.log),
        packet: row.packet,
        creator: Address::new(row.account),
        total_amount: Amount::from_wei_text(&amount),
        count,
        distribution,
        message: row.message.unwrap_or_default(),
        timestamp: row.timestamp,
    })
}

fn claimed_from_row(line: usize, row: InputRow) -> Result<ChainEvent, FeedError> {
    let missing = |field| FeedError::MissingField {
        line,
        kind: "claimed",
        field,
    };
    let amount = row.amount.ok_or_else(|| missing("amount"))?;
    let remaining = row.remaining.ok_or_else(|| missing("remaining"))?;
    let remaining_amount = row.remaining_amount.ok_or_else(|| missing("remaining_amount"))?;

    Ok(ChainEvent::Claimed {
        id: EventId::new(EventKind::Claimed, TxHash::new(row.tx), row.log),
        packet: row.packet,
        claimer: Address::new(row.account),
        amount: Amount::from_wei_text(&amount),
        remaining_count: remaining,
        remaining_amount: Amount::from_wei_text(&remaining_amount),
        timestamp: row.timestamp,
    })
}

/// write reconciled packet state to stdout in csv format
pub fn write_packets<'a>(packets: impl IntoIterator<Item = &'a PacketView>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for view in packets {
        let row = OutputRow {
            packet: view.id,
            creator: view.creator.to_string(),
            total: view.total_amount.to_string(),
            remaining: view.remaining_amount.to_string(),
            claimed: view.claimed_count(),
            shares: view.total_count,
            active: view.active,
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
