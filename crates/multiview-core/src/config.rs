//! Dashboard configuration

use crate::{Error, Result, StreamId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default drift tolerance in seconds
pub const DEFAULT_SYNC_TOLERANCE: f64 = 1.5;

/// Tolerance used by the low-latency preset
pub const LOW_LATENCY_SYNC_TOLERANCE: f64 = 0.5;

/// Top-level dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Drift correction policy
    pub sync: SyncConfig,
    /// Leader selection policy
    pub leader: LeaderChoice,
    /// Stream catalog source
    pub catalog: CatalogConfig,
    /// Tuning handed to the adaptive streaming client
    pub engine: EngineTuning,
}

impl DashboardConfig {
    /// Tighter sync for low-latency sources
    pub fn low_latency() -> Self {
        Self {
            sync: SyncConfig {
                tolerance_secs: LOW_LATENCY_SYNC_TOLERANCE,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        let tolerance = self.sync.tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sync tolerance must be a finite, non-negative number of seconds (got {tolerance})"
            )));
        }

        if let Some(endpoint) = &self.catalog.endpoint {
            if endpoint.trim().is_empty() {
                return Err(Error::InvalidConfig("catalog endpoint is empty".into()));
            }
        }

        if self.catalog.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("catalog request timeout must be > 0".into()));
        }

        Ok(())
    }
}

/// Drift correction policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drift (seconds) tolerated before a follower is repositioned
    pub tolerance_secs: f64,
    /// Also re-check a follower on its own position reports
    pub resync_on_follower_progress: bool,
    /// Reposition paused followers regardless of drift
    pub resync_paused_followers: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: DEFAULT_SYNC_TOLERANCE,
            resync_on_follower_progress: false,
            resync_paused_followers: true,
        }
    }
}

/// Which catalog entry drives the grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LeaderChoice {
    /// First stream in catalog order
    #[default]
    FirstInCatalog,
    /// Catalog position
    Index(usize),
    /// Catalog id
    StreamId(StreamId),
}

/// Stream catalog source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog endpoint, e.g. `http://localhost:3001/api/streams`
    pub endpoint: Option<String>,
    /// Base URL for root-relative stream locators
    pub base_url: Option<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            base_url: None,
            request_timeout_ms: 10_000,
        }
    }
}

/// Adaptive streaming client tuning, serialized in hls.js option names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineTuning {
    /// Forward buffer target (seconds)
    pub max_buffer_length: f64,
    /// Hard forward buffer cap (seconds)
    pub max_max_buffer_length: f64,
    /// Initial quality level
    pub start_level: i32,
    /// Start position, -1 for the live edge
    pub start_position: f64,
    /// Distance from the live edge, in target durations
    pub live_sync_duration_count: u32,
    /// Maximum tolerated live latency, in target durations
    pub live_max_latency_duration_count: u32,
    pub frag_loading_max_retry: u32,
    pub manifest_loading_max_retry: u32,
    pub level_loading_max_retry: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            max_buffer_length: 30.0,
            max_max_buffer_length: 600.0,
            start_level: 0,
            start_position: -1.0,
            live_sync_duration_count: 3,
            live_max_latency_duration_count: 5,
            frag_loading_max_retry: 6,
            manifest_loading_max_retry: 1,
            level_loading_max_retry: 4,
        }
    }
}
