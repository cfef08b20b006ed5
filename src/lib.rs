pub mod amount;
pub mod cache;
pub mod config;
pub mod csv;
pub mod dedup;
pub mod indexer;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod tracker;
pub mod watch;

pub use amount::Amount;
pub use cache::ReadModel;
pub use config::Config;
pub use dedup::EventLedger;
pub use model::{ChainEvent, EventId, PacketId};
pub use reconcile::Reconciler;
pub use tracker::Tracker;
pub use watch::Watcher;
