//! Multiview Core - Synchronized live HLS dashboard
//!
//! This crate provides the playback-agnostic core of a multi-stream grid:
//! - Stream catalog loading (static or HTTP)
//! - Leader election and leader position propagation
//! - Follower drift correction (seek-to-leader)
//! - Play/pause fan-out across every tile
//! - A uniform playback engine contract with a simulated engine for tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Multiview Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Catalog    │  │    Leader    │  │  Transport   │           │
//! │  │   Provider   │  │    Clock     │  │  Dispatcher  │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Dashboard  │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │     Sync     │  │  Playback   │  │   Playback   │            │
//! │  │  Controller  │──│   Session   │──│    Engine    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod leader;
pub mod session;
pub mod source;
pub mod sync;
pub mod transport;
pub mod types;

pub use catalog::{parse_catalog, validate_catalog, CatalogProvider, StaticCatalog};
#[cfg(feature = "http")]
pub use catalog::HttpCatalog;
pub use config::{CatalogConfig, DashboardConfig, EngineTuning, LeaderChoice, SyncConfig};
pub use dashboard::{Dashboard, DashboardSnapshot, EventOutcome, SessionEvent};
pub use engine::{EngineFactory, PlaybackEngine, PositionListener, SimulatedEngine, SimulatedStream, SimulationProfile};
pub use error::{Error, Result};
pub use leader::{select_leader, FirstInCatalog, LeaderClock, LeaderPolicy};
pub use session::{PlaybackSession, SessionSnapshot};
pub use source::{detect_manifest_type, ManifestType, StreamSource, HLS_MIME_TYPE};
pub use sync::{CorrectionReason, LeaderUpdate, SyncController, SyncDecision, SyncPolicy, SyncStats};
pub use transport::{DispatchReport, TransportCommand, TransportDispatcher, TransportHandle};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Multiview Core initialized");
}
