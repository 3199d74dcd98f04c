//! Playback Session - one tile of the grid
//!
//! Owns:
//! - The playback engine bound to the tile's video sink
//! - The lifecycle state machine (Uninitialized -> Attached -> Detached)
//! - The tile's role and, for followers, its drift controller
//!
//! Every attach gets a fresh generation number. Position reports carry the
//! generation they were produced under so the dashboard can drop reports that
//! were queued by an attachment that no longer exists.

use crate::{
    engine::{PlaybackEngine, PositionListener},
    sync::{FollowerObservation, LeaderUpdate, SyncController, SyncDecision, SyncPolicy, SyncStats},
    transport::TransportHandle,
    EngineSupport, Error, Result, Role, SessionId, SessionState, StreamDescriptor, StreamSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Point-in-time view of a session for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub stream_id: u32,
    pub name: String,
    pub url: String,
    pub role: Role,
    pub state: SessionState,
    pub support: Option<EngineSupport>,
    pub position: f64,
    pub paused: bool,
    /// Distance to the leader position, followers only
    pub drift: Option<f64>,
    pub stats: Option<SyncStats>,
    pub error: Option<String>,
}

/// A mounted stream and its engine
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Catalog entry this session plays
    descriptor: StreamDescriptor,
    /// Parsed locator; `None` when the catalog locator was invalid
    source: Option<StreamSource>,
    /// Fixed for the session's lifetime
    role: Role,
    state: SessionState,
    engine: Box<dyn PlaybackEngine>,
    /// Current attachment generation
    generation: u64,
    support: Option<EngineSupport>,
    last_error: Option<String>,
    /// Drift controller, present for followers only
    controller: Option<SyncController>,
}

impl PlaybackSession {
    /// Create a session for `descriptor`. Root-relative locators are resolved
    /// against `base` when one is given.
    pub fn new(
        descriptor: StreamDescriptor,
        role: Role,
        engine: Box<dyn PlaybackEngine>,
        policy: SyncPolicy,
        base: Option<&Url>,
    ) -> Self {
        let (source, last_error) = match StreamSource::parse_with_base(&descriptor.url, base) {
            Ok(source) => (Some(source), None),
            Err(e) => {
                warn!(stream = descriptor.id, error = %e, "Invalid stream locator");
                (None, Some(e.to_string()))
            }
        };

        let controller = match role {
            Role::Leader => None,
            Role::Follower => Some(SyncController::new(policy)),
        };

        Self {
            id: SessionId::new(),
            descriptor,
            source,
            role,
            state: SessionState::Uninitialized,
            engine,
            generation: 0,
            support: None,
            last_error,
            controller,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> Option<&StreamSource> {
        self.source.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn support(&self) -> Option<EngineSupport> {
        self.support
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stats(&self) -> Option<&SyncStats> {
        self.controller.as_ref().map(SyncController::stats)
    }

    pub fn position(&self) -> f64 {
        self.engine.position()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    fn set_state(&mut self, new_state: SessionState) -> Result<()> {
        let current = self.state;
        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }
        self.state = new_state;
        debug!(session = %self.id, from = %current, to = %new_state, "Session state transition");
        Ok(())
    }

    /// Attach the engine to the current source
    ///
    /// `make_listener` receives the session id and the new generation and
    /// returns the callback the engine reports positions through.
    #[instrument(skip(self, make_listener), fields(session = %self.id, stream = self.descriptor.id))]
    pub fn attach<F>(&mut self, make_listener: F) -> Result<EngineSupport>
    where
        F: FnOnce(SessionId, u64) -> PositionListener,
    {
        if self.state.is_attached() {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: SessionState::Attached.to_string(),
            });
        }

        let Some(source) = self.source.clone() else {
            let reason = self
                .last_error
                .clone()
                .unwrap_or_else(|| "missing locator".to_string());
            self.set_state(SessionState::Failed)?;
            return Err(Error::InvalidLocator {
                locator: self.descriptor.url.clone(),
                reason,
            });
        };

        self.generation += 1;
        let listener = make_listener(self.id, self.generation);

        match self.engine.attach(&source, listener) {
            Ok(support) => {
                self.set_state(SessionState::Attached)?;
                self.support = Some(support);
                self.last_error = None;
                info!(url = %source, role = %self.role, ?support, "Session attached");
                Ok(support)
            }
            Err(e) => {
                self.set_state(SessionState::Failed)?;
                self.support = Some(EngineSupport::Unsupported);
                self.last_error = Some(e.to_string());
                warn!(url = %source, error = %e, "Session attach failed");
                Err(e)
            }
        }
    }

    /// Release the engine. Idempotent.
    pub fn detach(&mut self) {
        match self.state {
            SessionState::Attached => {
                self.engine.detach();
                self.state = SessionState::Detached;
                info!(session = %self.id, stream = self.descriptor.id, "Session detached");
            }
            SessionState::Failed => {
                self.engine.detach();
                self.state = SessionState::Detached;
            }
            SessionState::Uninitialized | SessionState::Detached => {}
        }
    }

    /// Switch to a new locator: detach completes before the new attach starts
    pub fn set_source<F>(&mut self, locator: &str, base: Option<&Url>, make_listener: F) -> Result<EngineSupport>
    where
        F: FnOnce(SessionId, u64) -> PositionListener,
    {
        self.detach();
        self.descriptor.url = locator.to_string();
        match StreamSource::parse_with_base(locator, base) {
            Ok(source) => {
                self.source = Some(source);
                self.last_error = None;
            }
            Err(e) => {
                self.source = None;
                self.last_error = Some(e.to_string());
            }
        }
        self.attach(make_listener)
    }

    /// Current follower state as read by the controller
    pub fn observe(&self) -> FollowerObservation {
        FollowerObservation {
            position: self.engine.position(),
            paused: self.engine.is_paused(),
        }
    }

    /// Run the drift controller for a leader update and apply its decision.
    /// Returns `None` for the leader and for sessions that are not attached.
    pub(crate) fn synchronize(&mut self, update: LeaderUpdate) -> Option<SyncDecision> {
        if !self.state.is_attached() {
            return None;
        }
        let observation = self.observe();
        let decision = self.controller.as_mut()?.on_leader_update(update, observation);
        self.apply(decision);
        Some(decision)
    }

    /// Re-check against the latest leader update after this follower's own
    /// position report
    pub(crate) fn resynchronize(&mut self, latest: Option<LeaderUpdate>) -> Option<SyncDecision> {
        if !self.state.is_attached() {
            return None;
        }
        let observation = self.observe();
        let decision = self.controller.as_mut()?.on_follower_progress(latest, observation);
        self.apply(decision);
        Some(decision)
    }

    fn apply(&mut self, decision: SyncDecision) {
        if let SyncDecision::Seek {
            target,
            drift,
            reason,
        } = decision
        {
            info!(
                session = %self.id,
                stream = self.descriptor.id,
                target,
                drift,
                ?reason,
                "Correcting follower"
            );
            self.engine.seek(target);
        }
    }

    /// Snapshot for display, with drift measured against `leader_position`
    pub fn snapshot(&self, leader_position: f64) -> SessionSnapshot {
        let position = self.engine.position();
        let drift = match self.role {
            Role::Follower if leader_position > 0.0 && self.state.is_attached() => {
                Some((position - leader_position).abs())
            }
            _ => None,
        };

        SessionSnapshot {
            session_id: self.id,
            stream_id: self.descriptor.id,
            name: self.descriptor.display_name(),
            url: self
                .source
                .as_ref()
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| self.descriptor.url.clone()),
            role: self.role,
            state: self.state,
            support: self.support,
            position,
            paused: self.engine.is_paused(),
            drift,
            stats: self.stats().cloned(),
            error: self.last_error.clone(),
        }
    }
}

impl TransportHandle for PlaybackSession {
    fn play(&mut self) -> Result<()> {
        if !self.state.is_attached() {
            return Err(Error::command("play", format!("session is {}", self.state)));
        }
        self.engine.play().inspect_err(|e| {
            warn!(session = %self.id, error = %e, "Play rejected, session stays paused");
        })
    }

    fn pause(&mut self) -> Result<()> {
        if !self.state.is_attached() {
            return Err(Error::command("pause", format!("session is {}", self.state)));
        }
        self.engine.pause();
        Ok(())
    }

    fn seek_to(&mut self, position: f64) -> Result<()> {
        if !self.state.is_attached() {
            return Err(Error::command("seek", format!("session is {}", self.state)));
        }
        self.engine.seek(position);
        Ok(())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SimulatedEngine, SimulatedStream, SimulationProfile};

    fn session(role: Role, url: &str) -> (PlaybackSession, SimulatedStream) {
        let engine = SimulatedEngine::new(SimulationProfile::default());
        let stream = engine.stream();
        let session = PlaybackSession::new(
            StreamDescriptor::new(1, url),
            role,
            Box::new(engine),
            SyncPolicy::new(1.5),
            None,
        );
        (session, stream)
    }

    fn noop(_: SessionId, _: u64) -> PositionListener {
        Box::new(|_| {})
    }

    #[test]
    fn test_session_creation() {
        let (session, _) = session(Role::Follower, "/hls/stream1/index.m3u8");
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.generation(), 0);
        assert!(session.stats().is_some());

        let (leader, _) = session_leader();
        assert!(leader.stats().is_none());
    }

    fn session_leader() -> (PlaybackSession, SimulatedStream) {
        session(Role::Leader, "/hls/stream1/index.m3u8")
    }

    #[test]
    fn test_attach_detach_lifecycle() {
        let (mut session, stream) = session(Role::Follower, "/hls/stream1/index.m3u8");

        assert_eq!(session.attach(noop).unwrap(), EngineSupport::Library);
        assert_eq!(session.state(), SessionState::Attached);
        assert_eq!(session.generation(), 1);
        assert!(stream.is_attached());

        // Attaching twice is rejected
        assert!(session.attach(noop).is_err());

        session.detach();
        session.detach();
        assert_eq!(session.state(), SessionState::Detached);
        assert_eq!(stream.detach_count(), 1);
    }

    #[test]
    fn test_invalid_locator_fails_tile() {
        let (mut session, _) = session(Role::Follower, "not a url");
        let err = session.attach(noop).unwrap_err();
        assert!(err.is_session_local());
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.last_error().is_some());
    }

    #[test]
    fn test_set_source_detaches_first() {
        let (mut session, stream) = session(Role::Follower, "/hls/stream1/index.m3u8");
        session.attach(noop).unwrap();

        session
            .set_source("/hls/stream9/index.m3u8", None, noop)
            .unwrap();

        assert_eq!(stream.detach_count(), 1);
        assert_eq!(stream.attach_count(), 2);
        assert_eq!(session.generation(), 2);
        assert_eq!(session.descriptor().url, "/hls/stream9/index.m3u8");
        assert_eq!(
            stream.source().map(|s| s.locator().to_string()),
            Some("/hls/stream9/index.m3u8".to_string())
        );
    }

    #[test]
    fn test_leader_never_synchronized() {
        let (mut leader, stream) = session_leader();
        leader.attach(noop).unwrap();
        let update = LeaderUpdate {
            seq: 1,
            position: 500.0,
        };
        assert!(leader.synchronize(update).is_none());
        assert!(stream.seeks().is_empty());
    }

    #[test]
    fn test_commands_require_attachment() {
        let (mut session, stream) = session(Role::Follower, "/hls/stream1/index.m3u8");
        assert!(session.play().is_err());
        assert_eq!(stream.play_calls(), 0);

        session.attach(noop).unwrap();
        session.play().unwrap();
        assert!(!session.is_paused());
        session.pause().unwrap();
        assert!(session.is_paused());
    }

    #[test]
    fn test_drop_releases_engine() {
        let (mut session, stream) = session(Role::Follower, "/hls/stream1/index.m3u8");
        session.attach(noop).unwrap();
        drop(session);
        assert!(!stream.is_attached());
    }
}
