//! Polling subscriptions over the contract event streams.
//!
//! A [`Watcher`] owns one background task that polls the creation and
//! claim streams on independent interval timers, deduplicates every
//! yielded event, and pushes survivors onto a channel. Consumers never
//! see the transport cadence, only typed events.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;

use crate::config::Settings;
use crate::dedup::EventLedger;
use crate::ledger::{EventSource, WatchScope};
use crate::model::{ChainEvent, EventKind};

/// A live pair of event watches. Dropping (or [`stop`](Watcher::stop)ping)
/// the watcher cancels polling; nothing is dispatched afterwards.
#[derive(Debug)]
pub struct Watcher {
    handle: JoinHandle<()>,
}

impl Watcher {
    /// Start polling `source` and forward deduplicated events to `events`.
    ///
    /// The polling period comes from `settings`: contract-wide watches use
    /// `poll_interval`, single-packet watches the longer
    /// `scoped_poll_interval`. The watcher also stops once the receiving
    /// side of `events` is dropped.
    pub fn spawn<S>(
        source: S,
        scope: WatchScope,
        settings: &Settings,
        events: mpsc::Sender<ChainEvent>,
    ) -> Self
    where
        S: EventSource + Send + 'static,
    {
        let period = match scope {
            WatchScope::All => settings.poll_interval,
            WatchScope::Packet(_) => settings.scoped_poll_interval,
        };
        let handle = tokio::spawn(watch_loop(source, scope, period, events));
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn watch_loop<S: EventSource>(
    mut source: S,
    scope: WatchScope,
    period: Duration,
    events: mpsc::Sender<ChainEvent>,
) {
    let mut ledger = EventLedger::new();
    let mut created = time::interval(period);
    let mut claimed = time::interval(period);
    created.set_missed_tick_behavior(MissedTickBehavior::Delay);
    claimed.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let kind = tokio::select! {
            _ = created.tick() => EventKind::Created,
            _ = claimed.tick() => EventKind::Claimed,
        };
        if poll_once(&mut source, kind, &scope, &mut ledger, &events)
            .await
            .is_err()
        {
            return;
        }
    }
}

/// One poll tick. `Err` means the receiver is gone and polling must stop;
/// transport errors are not fatal and resolve to `Ok`.
async fn poll_once<S: EventSource>(
    source: &mut S,
    kind: EventKind,
    scope: &WatchScope,
    ledger: &mut EventLedger,
    events: &mpsc::Sender<ChainEvent>,
) -> Result<(), ()> {
    let batch = match source.poll(kind, scope).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(stream = %kind, error = %e, "poll failed, retrying on next tick");
            return Ok(());
        }
    };

    for event in batch {
        if let WatchScope::Packet(id) = scope {
            if event.packet() != *id {
                continue;
            }
        }
        if !ledger.admit(event.id().clone()) {
            continue;
        }
        if events.send(event).await.is_err() {
            return Err(());
        }
    }

    Ok(())
}
