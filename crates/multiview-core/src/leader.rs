//! Leader election and time propagation
//!
//! Exactly one mounted stream is the leader. Which one is decided once, from
//! the catalog, by a [`LeaderPolicy`]; the choice is never revisited while the
//! dashboard is mounted, not even when the leader stalls or fails to attach.
//! The leader's position reports are published through the [`LeaderClock`].

use crate::config::LeaderChoice;
use crate::sync::LeaderUpdate;
use crate::StreamDescriptor;
use tokio::sync::watch;
use tracing::warn;

/// Chooses the leader among catalog entries
pub trait LeaderPolicy {
    /// Index into `catalog`, or `None` for an empty catalog
    fn select_leader(&self, catalog: &[StreamDescriptor]) -> Option<usize>;
}

/// First entry in catalog order
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstInCatalog;

impl LeaderPolicy for FirstInCatalog {
    fn select_leader(&self, catalog: &[StreamDescriptor]) -> Option<usize> {
        select_leader(catalog)
    }
}

/// Default election: the first stream in the catalog leads
pub fn select_leader(catalog: &[StreamDescriptor]) -> Option<usize> {
    if catalog.is_empty() {
        None
    } else {
        Some(0)
    }
}

impl LeaderPolicy for LeaderChoice {
    fn select_leader(&self, catalog: &[StreamDescriptor]) -> Option<usize> {
        let chosen = match *self {
            LeaderChoice::FirstInCatalog => return select_leader(catalog),
            LeaderChoice::Index(index) => (index < catalog.len()).then_some(index),
            LeaderChoice::StreamId(id) => catalog.iter().position(|d| d.id == id),
        };

        if chosen.is_none() {
            warn!(choice = ?self, streams = catalog.len(), "Configured leader not in catalog, using first stream");
            return select_leader(catalog);
        }
        chosen
    }
}

/// Shared leader position
///
/// Single writer (the dashboard, for reports from the leader session only),
/// any number of readers. Values travel through a `watch` channel, so readers
/// on other threads always see a whole `f64`.
#[derive(Debug)]
pub struct LeaderClock {
    tx: watch::Sender<f64>,
    latest: Option<LeaderUpdate>,
}

impl LeaderClock {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0.0);
        Self { tx, latest: None }
    }

    /// Most recent leader position, 0.0 before the first report
    pub fn position(&self) -> f64 {
        *self.tx.borrow()
    }

    /// Most recent update, including its sequence number
    pub fn latest(&self) -> Option<LeaderUpdate> {
        self.latest
    }

    /// Watch leader position changes
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }

    /// Record a leader report. Backward jumps are accepted as-is.
    pub(crate) fn publish(&mut self, position: f64) -> LeaderUpdate {
        let seq = self.latest.map(|u| u.seq + 1).unwrap_or(1);
        let update = LeaderUpdate { seq, position };
        self.latest = Some(update);
        self.tx.send_replace(position);
        update
    }

    /// Forget the leader position (catalog reload or unmount)
    pub(crate) fn reset(&mut self) {
        self.latest = None;
        self.tx.send_replace(0.0);
    }
}

impl Default for LeaderClock {
    fn default() -> Self {
        Self::new()
    }
}
