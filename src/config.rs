//! Startup configuration.
//!
//! Three values come from the environment and are required; the
//! application refuses to initialize without them. Tunables live in
//! [`Settings`] with fixed documented defaults instead of ad hoc
//! defaulting at call sites.

use std::time::Duration;

use thiserror::Error;

use crate::Amount;
use crate::model::Address;

/// `WALLETCONNECT_PROJECT_ID` — wallet-connect project identifier.
pub const ENV_PROJECT_ID: &str = "WALLETCONNECT_PROJECT_ID";
/// `SUBGRAPH_URL` — indexer query endpoint.
pub const ENV_INDEXER_URL: &str = "SUBGRAPH_URL";
/// `REDPACKET_CONTRACT_ADDRESS` — deployed contract address.
pub const ENV_CONTRACT_ADDRESS: &str = "REDPACKET_CONTRACT_ADDRESS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("WALLETCONNECT_PROJECT_ID is not set")]
    MissingProjectId,

    #[error("SUBGRAPH_URL is not set")]
    MissingIndexerUrl,

    #[error("REDPACKET_CONTRACT_ADDRESS is not set")]
    MissingContractAddress,
}

/// Validation bounds for create/claim intents.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Smallest accepted create amount (0.001 native units).
    pub min_create_amount: Amount,
    /// Largest accepted share count.
    pub max_shares: u32,
    /// Longest accepted message, in characters.
    pub max_message_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_create_amount: Amount::parse("0.001"),
            max_shares: 100,
            max_message_chars: 200,
        }
    }
}

/// Fixed operational tunables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Event polling interval for contract-wide watches.
    pub poll_interval: Duration,
    /// Event polling interval when scoped to a single packet.
    pub scoped_poll_interval: Duration,
    /// Read-model staleness threshold for background refresh.
    pub refresh_interval: Duration,
    /// Indexer query page size.
    pub page_size: u32,
    pub limits: Limits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(12),
            scoped_poll_interval: Duration::from_secs(15),
            refresh_interval: Duration::from_secs(30),
            page_size: 10,
            limits: Limits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub indexer_url: String,
    pub contract_address: Address,
    pub settings: Settings,
}

impl Config {
    /// Build from an arbitrary variable lookup. Missing or blank required
    /// values are fatal.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str, missing: ConfigError| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(missing)
        };

        Ok(Self {
            project_id: required(ENV_PROJECT_ID, ConfigError::MissingProjectId)?,
            indexer_url: required(ENV_INDEXER_URL, ConfigError::MissingIndexerUrl)?,
            contract_address: required(ENV_CONTRACT_ADDRESS, ConfigError::MissingContractAddress)
                .map(Address::new)?,
            settings: Settings::default(),
        })
    }

    /// Load from a `.env` file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }
}
