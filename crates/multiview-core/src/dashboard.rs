//! Dashboard - composes sessions, leader propagation and transport
//!
//! Data flow:
//!
//! ```text
//! catalog ──> PlaybackSession x N ──(position reports)──> event queue
//!                                                            │
//!                     leader report ──> LeaderClock ──> SyncController per follower
//!                                                            │
//!                                         seek(leader) <─────┘
//! ```
//!
//! Engines never call back into the dashboard directly. Their listeners push
//! [`SessionEvent`]s onto a queue that [`Dashboard::drain`] processes, so a
//! seek issued while handling one report can never re-enter the dashboard.
//! An optional waker is invoked after each push so event-loop hosts (the
//! browser) can schedule a drain.

use crate::{
    catalog::{validate_catalog, CatalogProvider},
    config::DashboardConfig,
    engine::{EngineFactory, PositionListener},
    leader::{LeaderClock, LeaderPolicy},
    session::{PlaybackSession, SessionSnapshot},
    sync::{LeaderUpdate, SyncDecision, SyncPolicy},
    transport::{DispatchReport, TransportDispatcher, TransportHandle},
    DashboardStatus, EngineSupport, Error, Result, Role, SessionId, StreamDescriptor, StreamId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// A position report from one engine attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    /// Attachment generation the report was produced under
    pub generation: u64,
    pub position: f64,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Report from a detached or replaced attachment, dropped
    Stale,
    /// Leader report published and fanned out to followers
    LeaderPublished { update: LeaderUpdate, corrections: usize },
    /// Follower report; `decision` is set when follower re-checks are enabled
    FollowerProgress { decision: Option<SyncDecision> },
}

/// Point-in-time view of the whole grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub captured_at: DateTime<Utc>,
    pub status: DashboardStatus,
    pub leader_position: f64,
    pub leader_stream: Option<StreamId>,
    pub tolerance: f64,
    pub sessions: Vec<SessionSnapshot>,
}

impl DashboardSnapshot {
    /// Total corrections issued across followers
    pub fn total_corrections(&self) -> u64 {
        self.sessions
            .iter()
            .filter_map(|s| s.stats.as_ref())
            .map(|s| s.corrections)
            .sum()
    }

    /// Largest current follower drift
    pub fn max_drift(&self) -> Option<f64> {
        self.sessions
            .iter()
            .filter_map(|s| s.drift)
            .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.max(d))))
    }
}

type WakeFn = Rc<dyn Fn()>;

/// Synchronized multi-stream dashboard
pub struct Dashboard {
    config: DashboardConfig,
    policy: SyncPolicy,
    leader_policy: Box<dyn LeaderPolicy>,
    factory: Box<dyn EngineFactory>,
    /// Base for root-relative locators
    base_url: Option<Url>,
    /// Mounted sessions in catalog order
    sessions: Vec<PlaybackSession>,
    leader: Option<usize>,
    clock: LeaderClock,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    waker: Option<WakeFn>,
    status: DashboardStatus,
}

impl Dashboard {
    /// Create an empty dashboard. The leader policy comes from
    /// `config.leader`; use [`Dashboard::with_leader_policy`] to replace it.
    pub fn new(config: DashboardConfig, factory: impl EngineFactory + 'static) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .catalog
            .base_url
            .as_deref()
            .map(|base| {
                Url::parse(base)
                    .map_err(|e| Error::InvalidConfig(format!("catalog base url '{base}': {e}")))
            })
            .transpose()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            policy: SyncPolicy::from(&config.sync),
            leader_policy: Box::new(config.leader),
            factory: Box::new(factory),
            base_url,
            sessions: Vec::new(),
            leader: None,
            clock: LeaderClock::new(),
            events_tx,
            events_rx,
            waker: None,
            status: DashboardStatus::Idle,
            config,
        })
    }

    /// Replace the leader election policy. Takes effect on the next mount.
    pub fn with_leader_policy(mut self, policy: impl LeaderPolicy + 'static) -> Self {
        self.leader_policy = Box::new(policy);
        self
    }

    /// Set the base for root-relative locators. Takes effect on the next mount.
    pub fn set_base_url(&mut self, base: Option<Url>) {
        self.base_url = base;
    }

    /// Called after every queued position report. Applies to attachments
    /// made after this call.
    pub fn set_waker(&mut self, waker: impl Fn() + 'static) {
        let waker: WakeFn = Rc::new(waker);
        self.waker = Some(waker);
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn status(&self) -> &DashboardStatus {
        &self.status
    }

    pub fn sessions(&self) -> &[PlaybackSession] {
        &self.sessions
    }

    /// Index of the leader session
    pub fn leader_index(&self) -> Option<usize> {
        self.leader
    }

    pub fn leader(&self) -> Option<&PlaybackSession> {
        self.leader.and_then(|i| self.sessions.get(i))
    }

    /// Latest leader position, 0.0 before the first report
    pub fn leader_position(&self) -> f64 {
        self.clock.position()
    }

    /// Watch the leader position
    pub fn subscribe_leader(&self) -> watch::Receiver<f64> {
        self.clock.subscribe()
    }

    pub fn session(&self, stream: StreamId) -> Option<&PlaybackSession> {
        self.sessions.iter().find(|s| s.descriptor().id == stream)
    }

    /// Transport handle of one tile, keyed by catalog id
    pub fn handle_mut(&mut self, stream: StreamId) -> Option<&mut dyn TransportHandle> {
        self.sessions
            .iter_mut()
            .find(|s| s.descriptor().id == stream)
            .map(|s| s as &mut dyn TransportHandle)
    }

    /// Fetch the catalog and mount it
    #[instrument(skip(self, provider))]
    pub async fn load(&mut self, provider: &dyn CatalogProvider) -> Result<usize> {
        let result = provider.fetch().await;
        self.apply_catalog(result)
    }

    /// Mount a catalog fetch result. A failed fetch unmounts everything and
    /// leaves the dashboard in [`DashboardStatus::CatalogUnavailable`].
    pub fn apply_catalog(&mut self, result: Result<Vec<StreamDescriptor>>) -> Result<usize> {
        let catalog = result.and_then(|streams| validate_catalog(&streams).map(|_| streams));
        match catalog {
            Ok(streams) => Ok(self.mount(streams)),
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Stream catalog unavailable");
                self.release_sessions();
                self.status = DashboardStatus::CatalogUnavailable(e.to_string());
                Err(e)
            }
        }
    }

    /// Replace all sessions with one per catalog entry and attach them.
    /// Returns the number of sessions that attached; failures stay local to
    /// their tile.
    pub fn mount(&mut self, catalog: Vec<StreamDescriptor>) -> usize {
        self.release_sessions();

        let leader = self.leader_policy.select_leader(&catalog);
        for (index, descriptor) in catalog.into_iter().enumerate() {
            let role = if Some(index) == leader {
                Role::Leader
            } else {
                Role::Follower
            };
            let engine = self.factory.create(&descriptor);
            self.sessions.push(PlaybackSession::new(
                descriptor,
                role,
                engine,
                self.policy,
                self.base_url.as_ref(),
            ));
        }
        self.leader = leader;

        let mut attached = 0;
        for index in 0..self.sessions.len() {
            let make_listener = listener_factory(self.events_tx.clone(), self.waker.clone());
            match self.sessions[index].attach(make_listener) {
                Ok(_) => attached += 1,
                Err(e) => {
                    let session = &self.sessions[index];
                    warn!(
                        stream = session.descriptor().id,
                        role = %session.role(),
                        error = %e,
                        "Tile unavailable"
                    );
                }
            }
        }

        self.status = DashboardStatus::Ready;
        info!(
            streams = self.sessions.len(),
            attached,
            leader = ?self.leader().map(|s| s.descriptor().id),
            tolerance = self.policy.tolerance,
            "Dashboard mounted"
        );
        attached
    }

    /// Detach and drop every session
    pub fn unmount(&mut self) {
        self.release_sessions();
        self.status = DashboardStatus::Unmounted;
        info!("Dashboard unmounted");
    }

    fn release_sessions(&mut self) {
        for session in &mut self.sessions {
            session.detach();
        }
        self.sessions.clear();
        self.leader = None;
        self.clock.reset();
        // Queued reports belong to released attachments
        while self.events_rx.try_recv().is_ok() {}
    }

    /// Point one tile at a new locator. The role is kept.
    pub fn set_source(&mut self, stream: StreamId, locator: &str) -> Result<EngineSupport> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.descriptor().id == stream)
            .ok_or_else(|| Error::UnknownSession(format!("stream {stream}")))?;

        let make_listener = listener_factory(self.events_tx.clone(), self.waker.clone());
        let base = self.base_url.clone();
        self.sessions[index].set_source(locator, base.as_ref(), make_listener)
    }

    /// Broadcast play to every tile
    pub fn play_all(&mut self) -> DispatchReport {
        TransportDispatcher::play_all(self.sessions.iter_mut())
    }

    /// Broadcast pause to every tile
    pub fn pause_all(&mut self) -> DispatchReport {
        TransportDispatcher::pause_all(self.sessions.iter_mut())
    }

    /// Seek one tile on behalf of the user
    pub fn seek_to(&mut self, stream: StreamId, position: f64) -> Result<()> {
        self.handle_mut(stream)
            .ok_or_else(|| Error::UnknownSession(format!("stream {stream}")))?
            .seek_to(position)
    }

    /// Process every queued position report. Returns the number handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle one position report
    pub fn handle_event(&mut self, event: SessionEvent) -> EventOutcome {
        let Some(index) = self.sessions.iter().position(|s| s.id() == event.session) else {
            debug!(session = %event.session, "Report from unmounted session dropped");
            return EventOutcome::Stale;
        };

        let session = &self.sessions[index];
        if session.generation() != event.generation || !session.state().is_attached() {
            debug!(
                session = %event.session,
                generation = event.generation,
                current = session.generation(),
                "Stale report dropped"
            );
            return EventOutcome::Stale;
        }

        if session.role().is_leader() {
            let update = self.clock.publish(event.position);
            let mut corrections = 0;
            for follower in self.sessions.iter_mut().filter(|s| !s.role().is_leader()) {
                if let Some(SyncDecision::Seek { .. }) = follower.synchronize(update) {
                    corrections += 1;
                }
            }
            debug!(seq = update.seq, position = update.position, corrections, "Leader position published");
            EventOutcome::LeaderPublished {
                update,
                corrections,
            }
        } else {
            let decision = if self.config.sync.resync_on_follower_progress {
                let latest = self.clock.latest();
                self.sessions[index].resynchronize(latest)
            } else {
                None
            };
            EventOutcome::FollowerProgress { decision }
        }
    }

    /// Point-in-time view for display and debugging
    pub fn snapshot(&self) -> DashboardSnapshot {
        let leader_position = self.clock.position();
        DashboardSnapshot {
            captured_at: Utc::now(),
            status: self.status.clone(),
            leader_position,
            leader_stream: self.leader().map(|s| s.descriptor().id),
            tolerance: self.policy.tolerance,
            sessions: self
                .sessions
                .iter()
                .map(|s| s.snapshot(leader_position))
                .collect(),
        }
    }
}

/// Build the listener factory handed to [`PlaybackSession::attach`]
fn listener_factory(
    tx: mpsc::UnboundedSender<SessionEvent>,
    waker: Option<WakeFn>,
) -> impl FnOnce(SessionId, u64) -> PositionListener {
    move |session: SessionId, generation: u64| -> PositionListener {
        Box::new(move |position: f64| {
            let event = SessionEvent {
                session,
                generation,
                position,
            };
            if tx.send(event).is_ok() {
                if let Some(wake) = &waker {
                    wake();
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PlaybackEngine, SimulatedEngine, SimulatedStream, SimulationProfile};
    use crate::StaticCatalog;
    use std::cell::RefCell;

    fn dashboard(config: DashboardConfig) -> (Dashboard, Rc<RefCell<Vec<SimulatedStream>>>) {
        let streams = Rc::new(RefCell::new(Vec::new()));
        let registry = Rc::clone(&streams);
        let factory = move |_: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
            let engine = SimulatedEngine::new(SimulationProfile::default());
            registry.borrow_mut().push(engine.stream());
            Box::new(engine)
        };
        (Dashboard::new(config, factory).unwrap(), streams)
    }

    #[test]
    fn test_mount_assigns_roles() {
        let (mut dash, _) = dashboard(DashboardConfig::default());
        let attached = dash.mount(StaticCatalog::local().streams().to_vec());

        assert_eq!(attached, 6);
        assert_eq!(dash.leader_index(), Some(0));
        assert_eq!(dash.sessions()[0].role(), Role::Leader);
        assert!(dash.sessions()[1..].iter().all(|s| s.role() == Role::Follower));
        assert_eq!(dash.status(), &DashboardStatus::Ready);
    }

    #[test]
    fn test_catalog_failure_surfaces() {
        let (mut dash, _) = dashboard(DashboardConfig::default());
        dash.mount(StaticCatalog::local().streams().to_vec());

        let err = dash
            .apply_catalog(Err(Error::CatalogFetch("connection refused".into())))
            .unwrap_err();
        assert_eq!(err.error_code(), "CATALOG_FETCH");
        assert!(dash.sessions().is_empty());
        assert!(matches!(dash.status(), DashboardStatus::CatalogUnavailable(_)));
    }

    #[test]
    fn test_stale_events_dropped_after_remount() {
        let (mut dash, streams) = dashboard(DashboardConfig::default());
        dash.mount(StaticCatalog::local().streams().to_vec());
        dash.play_all();

        streams.borrow()[0].report(10.0);
        dash.mount(StaticCatalog::local().streams().to_vec());

        assert_eq!(dash.drain(), 0);
        assert_eq!(dash.leader_position(), 0.0);
    }

    #[test]
    fn test_waker_called_per_report() {
        let (mut dash, streams) = dashboard(DashboardConfig::default());
        let wakes = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&wakes);
        dash.set_waker(move || *counter.borrow_mut() += 1);
        dash.mount(StaticCatalog::local().streams().to_vec());

        streams.borrow()[0].report(10.0);
        streams.borrow()[3].report(9.0);
        assert_eq!(*wakes.borrow(), 2);
        assert_eq!(dash.drain(), 2);
    }

    #[test]
    fn test_snapshot_reports_drift() {
        let (mut dash, streams) = dashboard(DashboardConfig::default());
        dash.mount(StaticCatalog::local().streams().to_vec());
        dash.play_all();
        streams.borrow()[2].set_position(54.5);
        streams.borrow()[0].report(55.0);
        dash.drain();

        let snapshot = dash.snapshot();
        assert_eq!(snapshot.leader_position, 55.0);
        assert_eq!(snapshot.leader_stream, Some(1));
        assert_eq!(snapshot.sessions.len(), 6);
        assert!(snapshot.sessions[0].drift.is_none());
        assert!((snapshot.sessions[2].drift.unwrap() - 0.5).abs() < 1e-9);
    }
}
