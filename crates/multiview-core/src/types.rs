//! Core types for Multiview

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a mounted playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog identifier of a stream
pub type StreamId = u32;

/// One entry of the stream catalog, as served by `/api/streams`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stable catalog id
    pub id: StreamId,
    /// Absolute or root-relative locator of an HLS manifest
    pub url: String,
}

impl StreamDescriptor {
    pub fn new(id: StreamId, url: impl Into<String>) -> Self {
        Self { id, url: url.into() }
    }

    /// Short display name derived from the last two path components
    /// (`/hls/stream1/index.m3u8` -> `stream1/index.m3u8`)
    pub fn display_name(&self) -> String {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.rsplit('/').filter(|p| !p.is_empty()).take(2).collect();
        parts.into_iter().rev().collect::<Vec<_>>().join("/")
    }
}

/// Synchronization role of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authoritative clock for the grid
    Leader,
    /// Corrected toward the leader
    Follower,
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Mounted, engine not attached yet
    Uninitialized,
    /// Engine attached to the current source
    Attached,
    /// Engine released
    Detached,
    /// Attach failed; the tile shows an error
    Failed,
}

impl SessionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Uninitialized, Attached) | (Uninitialized, Failed) |
            (Attached, Detached) |
            (Detached, Attached) | (Detached, Failed) |
            (Failed, Detached) | (Failed, Attached) | (Failed, Failed)
        )
    }

    /// True while the engine holds decoder and network resources
    pub fn is_attached(&self) -> bool {
        matches!(self, SessionState::Attached)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Attached => write!(f, "attached"),
            SessionState::Detached => write!(f, "detached"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// How an engine can play a given source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSupport {
    /// Adaptive streaming library (e.g. hls.js over MSE)
    Library,
    /// Platform-native HLS playback
    Native,
    /// Neither path is available
    Unsupported,
}

impl EngineSupport {
    pub fn is_supported(&self) -> bool {
        !matches!(self, EngineSupport::Unsupported)
    }
}

/// Dashboard-wide status shown by the presentation shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum DashboardStatus {
    /// No catalog requested yet
    Idle,
    /// Catalog applied and sessions mounted
    Ready,
    /// Catalog could not be retrieved; nothing is rendered
    CatalogUnavailable(String),
    /// All sessions released
    Unmounted,
}
