//! Integration tests for Multiview Core

use multiview_core::{
    CatalogProvider, Dashboard, DashboardConfig, DashboardStatus, Error, EventOutcome,
    HttpCatalog, LeaderChoice, PlaybackEngine, Role, SessionState, SimulatedEngine,
    SimulatedStream, SimulationProfile, StaticCatalog, StreamDescriptor, SyncDecision,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// =============================================================================
// Helpers
// =============================================================================

/// Simulated engines with the live edge at 12s, so positions around 10s are
/// inside the seekable window
fn near_start() -> SimulationProfile {
    SimulationProfile {
        initial_live_edge: 12.0,
        start_latency: 2.0,
        ..Default::default()
    }
}

struct Harness {
    dash: Dashboard,
    streams: Rc<RefCell<Vec<SimulatedStream>>>,
}

impl Harness {
    fn new(config: DashboardConfig) -> Self {
        Self::with_profiles(config, |_| near_start())
    }

    fn with_profiles(
        config: DashboardConfig,
        profile: impl Fn(&StreamDescriptor) -> SimulationProfile + 'static,
    ) -> Self {
        let streams = Rc::new(RefCell::new(Vec::new()));
        let registry = Rc::clone(&streams);
        let factory = move |descriptor: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
            let engine = SimulatedEngine::new(profile(descriptor));
            registry.borrow_mut().push(engine.stream());
            Box::new(engine)
        };
        Self {
            dash: Dashboard::new(config, factory).unwrap(),
            streams,
        }
    }

    /// Engine handle of the most recent mount, by catalog position
    fn stream(&self, index: usize) -> SimulatedStream {
        let streams = self.streams.borrow();
        let mounted = self.dash.sessions().len();
        streams[streams.len() - mounted + index].clone()
    }

    fn mount_local(&mut self) -> usize {
        self.dash.mount(StaticCatalog::local().streams().to_vec())
    }
}

struct FailingCatalog;

#[async_trait::async_trait(?Send)]
impl CatalogProvider for FailingCatalog {
    async fn fetch(&self) -> multiview_core::Result<Vec<StreamDescriptor>> {
        Err(Error::CatalogFetch("connection refused".into()))
    }
}

// =============================================================================
// Drift Correction Tests
// =============================================================================

#[test]
fn test_follower_beyond_tolerance_seeks_to_leader() {
    let mut h = Harness::new(DashboardConfig::default());
    assert_eq!(h.mount_local(), 6);
    h.dash.play_all();

    h.stream(1).set_position(7.9);
    h.stream(2).set_position(8.6);
    for i in 3..6 {
        h.stream(i).set_position(10.0);
    }

    h.stream(0).report(10.0);
    assert_eq!(h.dash.drain(), 1);

    assert_eq!(h.dash.leader_position(), 10.0);
    assert_eq!(h.stream(1).seeks(), vec![10.0]);
    assert!(h.stream(2).seeks().is_empty());
    assert!(h.stream(0).seeks().is_empty());
    assert!((3..6).all(|i| h.stream(i).seeks().is_empty()));
}

#[test]
fn test_paused_follower_resynced() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();

    // Paused and already in sync
    h.stream(4).set_position(10.0);
    h.stream(4).set_paused(true);

    h.stream(0).report(10.0);
    h.dash.drain();

    assert_eq!(h.stream(4).seeks(), vec![10.0]);
    let stats = h.dash.sessions()[4].stats().unwrap();
    assert_eq!(stats.paused_corrections, 1);
}

#[test]
fn test_no_correction_before_first_leader_report() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();

    // Everything is paused, but there is no leader signal yet
    h.stream(3).report(4.0);
    h.dash.drain();

    assert_eq!(h.dash.leader_position(), 0.0);
    assert!((0..6).all(|i| h.stream(i).seeks().is_empty()));
}

#[test]
fn test_follower_report_does_not_move_leader() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();

    h.stream(0).report(10.0);
    h.stream(2).report(99.0);
    h.stream(5).report(3.0);
    h.dash.drain();

    assert_eq!(h.dash.leader_position(), 10.0);
    assert_eq!(h.dash.sessions()[0].role(), Role::Leader);
}

#[test]
fn test_leader_backward_jump_accepted() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();
    for i in 1..6 {
        h.stream(i).set_position(11.0);
    }

    h.stream(0).report(11.0);
    h.dash.drain();
    h.stream(0).report(8.0);
    h.dash.drain();

    assert_eq!(h.dash.leader_position(), 8.0);
    assert!((1..6).all(|i| h.stream(i).seeks() == vec![8.0]));
}

#[test]
fn test_follower_progress_seeks_once_per_leader_update() {
    let mut config = DashboardConfig::default();
    config.sync.resync_on_follower_progress = true;
    let mut h = Harness::new(config);
    h.mount_local();
    h.dash.play_all();
    for i in 1..6 {
        h.stream(i).set_position(10.0);
    }

    h.stream(0).report(10.0);
    h.dash.drain();
    assert!(h.stream(1).seeks().is_empty());

    // Follower falls behind between leader reports
    h.stream(1).report(6.0);
    h.dash.drain();
    assert_eq!(h.stream(1).seeks(), vec![10.0]);

    // Still behind, same leader update: no second seek
    h.stream(1).report(6.0);
    h.dash.drain();
    assert_eq!(h.stream(1).seeks(), vec![10.0]);

    h.stream(0).report(10.5);
    h.dash.drain();
    assert_eq!(h.stream(1).seeks(), vec![10.0, 10.5]);
}

#[test]
fn test_follower_progress_ignored_by_default() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();
    h.stream(0).report(10.0);
    h.dash.drain();
    h.stream(1).clear_seeks();

    h.stream(1).set_stalled(true);
    h.stream(1).report(3.0);
    h.dash.drain();

    assert!(h.stream(1).seeks().is_empty());
}

#[test]
fn test_low_latency_tolerance() {
    let mut h = Harness::new(DashboardConfig::low_latency());
    h.mount_local();
    h.dash.play_all();
    for i in 1..6 {
        h.stream(i).set_position(10.0);
    }
    h.stream(2).set_position(9.3);

    h.stream(0).report(10.0);
    let snapshot_before = h.dash.snapshot();
    assert_eq!(snapshot_before.tolerance, 0.5);
    h.dash.drain();

    assert_eq!(h.stream(2).seeks(), vec![10.0]);
    assert!(h.stream(1).seeks().is_empty());
}

#[test]
fn test_simulated_drift_corrected_over_time() {
    let mut h = Harness::with_profiles(DashboardConfig::default(), |descriptor| SimulationProfile {
        rate: if descriptor.id == 3 { 0.8 } else { 1.0 },
        ..near_start()
    });
    h.mount_local();
    h.dash.play_all();

    for _ in 0..40 {
        for i in 0..6 {
            h.stream(i).tick(0.25);
        }
        h.dash.drain();
    }

    let snapshot = h.dash.snapshot();
    assert!(snapshot.leader_position > 10.0);
    assert!(!h.stream(2).seeks().is_empty());
    assert!(h.stream(1).seeks().is_empty());
    assert!(snapshot.max_drift().unwrap() <= 1.5);
}

// =============================================================================
// Leader Election Tests
// =============================================================================

#[test]
fn test_configured_leader() {
    let config = DashboardConfig {
        leader: LeaderChoice::StreamId(4),
        ..Default::default()
    };
    let mut h = Harness::new(config);
    h.mount_local();
    h.dash.play_all();

    assert_eq!(h.dash.leader_index(), Some(3));
    h.stream(3).report(10.0);
    h.stream(0).report(2.0);
    h.dash.drain();
    assert_eq!(h.dash.leader_position(), 10.0);
    assert_eq!(h.dash.snapshot().leader_stream, Some(4));
}

#[test]
fn test_leader_not_reelected_on_failure() {
    let mut h = Harness::with_profiles(DashboardConfig::default(), |descriptor| SimulationProfile {
        library_support: descriptor.id != 1,
        ..near_start()
    });
    assert_eq!(h.mount_local(), 5);

    assert_eq!(h.dash.leader_index(), Some(0));
    assert_eq!(h.dash.sessions()[0].state(), SessionState::Failed);

    // Followers never get a leader signal
    h.stream(1).report(10.0);
    h.dash.drain();
    assert_eq!(h.dash.leader_position(), 0.0);
}

#[test]
fn test_subscribe_leader() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    let rx = h.dash.subscribe_leader();

    h.stream(0).report(10.0);
    h.dash.drain();
    assert_eq!(*rx.borrow(), 10.0);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_no_reports_after_unmount() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();
    let streams: Vec<_> = (0..6).map(|i| h.stream(i)).collect();

    h.dash.unmount();
    assert_eq!(h.dash.status(), &DashboardStatus::Unmounted);

    for stream in &streams {
        assert!(!stream.is_attached());
        assert!(!stream.has_listener());
        stream.report(10.0);
        stream.tick(1.0);
        assert_eq!(stream.reports(), 0);
    }
    assert_eq!(h.dash.drain(), 0);
    assert_eq!(h.dash.leader_position(), 0.0);
}

#[test]
fn test_set_source_drops_queued_reports() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    h.dash.play_all();

    h.stream(0).report(10.0);
    h.dash
        .set_source(1, "/hls/stream7/index.m3u8")
        .unwrap();

    let event_count = h.dash.drain();
    assert_eq!(event_count, 1);
    assert_eq!(h.dash.leader_position(), 0.0);

    let leader = &h.dash.sessions()[0];
    assert_eq!(leader.role(), Role::Leader);
    assert_eq!(leader.generation(), 2);
    assert_eq!(h.stream(0).detach_count(), 1);

    h.stream(0).report(11.0);
    h.dash.drain();
    assert_eq!(h.dash.leader_position(), 11.0);
}

#[test]
fn test_set_source_unknown_stream() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    let err = h.dash.set_source(42, "/hls/stream1/index.m3u8").unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_SESSION");
}

#[test]
fn test_stale_event_outcome() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();
    let session = h.dash.sessions()[0].id();

    let outcome = h.dash.handle_event(multiview_core::SessionEvent {
        session,
        generation: 0,
        position: 10.0,
    });
    assert_eq!(outcome, EventOutcome::Stale);

    let outcome = h.dash.handle_event(multiview_core::SessionEvent {
        session,
        generation: 1,
        position: 10.0,
    });
    assert!(matches!(outcome, EventOutcome::LeaderPublished { corrections: 5, .. }));
}

#[test]
fn test_follower_progress_outcome() {
    let mut config = DashboardConfig::default();
    config.sync.resync_on_follower_progress = true;
    let mut h = Harness::new(config);
    h.mount_local();
    h.dash.play_all();
    let follower = h.dash.sessions()[1].id();

    let outcome = h.dash.handle_event(multiview_core::SessionEvent {
        session: follower,
        generation: 1,
        position: 10.0,
    });
    assert_eq!(
        outcome,
        EventOutcome::FollowerProgress {
            decision: Some(SyncDecision::NoSignal)
        }
    );
}

// =============================================================================
// Isolation Tests
// =============================================================================

#[test]
fn test_play_failure_isolated() {
    let mut h = Harness::with_profiles(DashboardConfig::default(), |descriptor| SimulationProfile {
        reject_play: descriptor.id == 2,
        ..near_start()
    });
    h.mount_local();

    let report = h.dash.play_all();

    assert_eq!(report.attempted, 6);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert!((0..6).all(|i| h.stream(i).play_calls() == 1));
    assert!(h.stream(1).is_paused());
    assert!(!h.stream(2).is_paused());

    let report = h.dash.pause_all();
    assert!(report.all_succeeded());
    assert!((0..6).all(|i| h.stream(i).is_paused()));
}

#[test]
fn test_unsupported_tile_isolated() {
    let catalog = vec![
        StreamDescriptor::new(1, "/hls/stream1/index.m3u8"),
        StreamDescriptor::new(2, "/media/clip.mp4"),
        StreamDescriptor::new(3, "not a locator"),
        StreamDescriptor::new(4, "/hls/stream4/index.m3u8"),
    ];
    let mut h = Harness::new(DashboardConfig::default());
    assert_eq!(h.dash.mount(catalog), 2);

    let states: Vec<_> = h.dash.sessions().iter().map(|s| s.state()).collect();
    assert_eq!(
        states,
        vec![
            SessionState::Attached,
            SessionState::Failed,
            SessionState::Failed,
            SessionState::Attached
        ]
    );

    let report = h.dash.play_all();
    assert_eq!(report.failures.len(), 2);

    h.stream(3).set_position(4.0);
    h.stream(0).report(10.0);
    h.dash.drain();
    assert_eq!(h.stream(3).seeks(), vec![10.0]);

    let snapshot = h.dash.snapshot();
    assert!(snapshot.sessions[1].error.is_some());
    assert!(snapshot.sessions[2].error.is_some());
}

#[test]
fn test_catalog_failure_status() {
    let mut h = Harness::new(DashboardConfig::default());
    h.mount_local();

    let err = tokio_test::block_on(h.dash.load(&FailingCatalog)).unwrap_err();

    assert!(err.is_recoverable());
    assert!(h.dash.sessions().is_empty());
    assert!(matches!(
        h.dash.status(),
        DashboardStatus::CatalogUnavailable(msg) if msg.contains("connection refused")
    ));
}

#[test]
fn test_duplicate_catalog_ids_rejected() {
    let mut h = Harness::new(DashboardConfig::default());
    let catalog = vec![
        StreamDescriptor::new(1, "/hls/stream1/index.m3u8"),
        StreamDescriptor::new(1, "/hls/stream2/index.m3u8"),
    ];
    let err = h.dash.apply_catalog(Ok(catalog)).unwrap_err();
    assert_eq!(err.error_code(), "CATALOG_DECODE");
}

// =============================================================================
// HTTP Catalog Tests
// =============================================================================

async fn serve_catalog(status: axum::http::StatusCode, body: &'static str) -> std::net::SocketAddr {
    use axum::{routing::get, Router};

    let router = Router::new().route("/api/streams", get(move || async move { (status, body) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

const CATALOG_JSON: &str = r#"[
    { "id": 1, "url": "/hls/stream1/index.m3u8" },
    { "id": 2, "url": "/hls/stream2/index.m3u8" },
    { "id": 3, "url": "/hls/stream3/index.m3u8" }
]"#;

#[tokio::test]
async fn test_http_catalog_fetch_and_mount() {
    let addr = serve_catalog(axum::http::StatusCode::OK, CATALOG_JSON).await;
    let catalog =
        HttpCatalog::new(&format!("http://{addr}/api/streams"), Duration::from_secs(5)).unwrap();

    let streams = catalog.fetch().await.unwrap();
    assert_eq!(streams.len(), 3);
    assert_eq!(streams[2], StreamDescriptor::new(3, "/hls/stream3/index.m3u8"));

    let mut h = Harness::new(DashboardConfig::default());
    h.dash.set_base_url(catalog.origin());
    assert_eq!(h.dash.load(&catalog).await.unwrap(), 3);

    let source = h.dash.sessions()[0].source().unwrap();
    assert_eq!(source.as_str(), format!("http://{addr}/hls/stream1/index.m3u8"));
    assert_eq!(h.dash.status(), &DashboardStatus::Ready);
}

#[tokio::test]
async fn test_http_catalog_error_status() {
    let addr = serve_catalog(axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    let catalog =
        HttpCatalog::new(&format!("http://{addr}/api/streams"), Duration::from_secs(5)).unwrap();

    let err = catalog.fetch().await.unwrap_err();
    assert_eq!(err.error_code(), "CATALOG_FETCH");
}

#[tokio::test]
async fn test_http_catalog_bad_body() {
    let addr = serve_catalog(axum::http::StatusCode::OK, "<html>not json</html>").await;
    let catalog =
        HttpCatalog::new(&format!("http://{addr}/api/streams"), Duration::from_secs(5)).unwrap();

    let err = catalog.fetch().await.unwrap_err();
    assert_eq!(err.error_code(), "CATALOG_DECODE");
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_config_from_json() {
    let config = DashboardConfig::from_json_str(
        r#"{
            "sync": { "tolerance_secs": 0.75 },
            "leader": { "kind": "index", "value": 2 },
            "catalog": { "endpoint": "http://localhost:3001/api/streams" }
        }"#,
    )
    .unwrap();

    assert_eq!(config.sync.tolerance_secs, 0.75);
    assert!(config.sync.resync_paused_followers);
    assert_eq!(config.leader, LeaderChoice::Index(2));
    assert_eq!(config.catalog.request_timeout_ms, 10_000);
    assert_eq!(config.engine.live_sync_duration_count, 3);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = DashboardConfig::default();
    config.sync.tolerance_secs = -1.0;
    let factory = |_: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
        Box::new(SimulatedEngine::new(SimulationProfile::default()))
    };
    assert!(matches!(
        Dashboard::new(config, factory),
        Err(Error::InvalidConfig(_))
    ));
}
