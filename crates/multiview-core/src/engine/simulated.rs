//! Simulated live HLS engine
//!
//! Deterministic stand-in for a real streaming client: a live edge that
//! advances with simulated time, a seekable window behind it, and a playhead
//! that can run slightly fast or slow to produce drift. Used by the CLI
//! `simulate` command and throughout the tests.
//!
//! [`SimulatedEngine`] is what the dashboard owns; [`SimulatedStream`] is a
//! cheap handle onto the same state that drives time and inspects the
//! commands the engine received.

use super::{select_support, PlaybackEngine, PositionListener};
use crate::{EngineSupport, Error, Result, StreamSource};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Behaviour of one simulated stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationProfile {
    /// Streaming library available
    pub library_support: bool,
    /// Native HLS available
    pub native_support: bool,
    /// Live edge position when attached (seconds)
    pub initial_live_edge: f64,
    /// Distance behind the live edge where playback starts (seconds)
    pub start_latency: f64,
    /// Seekable history behind the live edge (seconds)
    pub buffer_window: f64,
    /// Playhead speed relative to wall time; != 1.0 produces drift
    pub rate: f64,
    /// Reject every `play()` like a blocked autoplay
    pub reject_play: bool,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            library_support: true,
            native_support: false,
            initial_live_edge: 60.0,
            start_latency: 6.0,
            buffer_window: 30.0,
            rate: 1.0,
            reject_play: false,
        }
    }
}

#[derive(Default)]
struct SimState {
    profile: SimulationProfile,
    source: Option<StreamSource>,
    listener: Option<PositionListener>,
    /// Bumped on every attach and detach; a listener taken out for a call is
    /// only put back if the epoch did not move meanwhile
    epoch: u64,
    live_edge: f64,
    position: f64,
    paused: bool,
    stalled: bool,
    seeks: Vec<f64>,
    play_calls: usize,
    pause_calls: usize,
    attach_count: usize,
    detach_count: usize,
    reports: usize,
}

impl SimState {
    fn seekable(&self) -> (f64, f64) {
        ((self.live_edge - self.profile.buffer_window).max(0.0), self.live_edge)
    }
}

/// Simulated engine owned by a playback session
pub struct SimulatedEngine {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedEngine {
    pub fn new(profile: SimulationProfile) -> Self {
        let state = SimState {
            live_edge: profile.initial_live_edge,
            paused: true,
            profile,
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Handle for driving and inspecting this engine
    pub fn stream(&self) -> SimulatedStream {
        SimulatedStream {
            state: Rc::clone(&self.state),
        }
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn probe(&self, source: &StreamSource) -> EngineSupport {
        if !source.is_hls() {
            return EngineSupport::Unsupported;
        }
        let state = self.state.borrow();
        select_support(state.profile.library_support, state.profile.native_support)
    }

    fn attach(&mut self, source: &StreamSource, on_position: PositionListener) -> Result<EngineSupport> {
        let support = self.probe(source);
        if !support.is_supported() {
            return Err(Error::UnsupportedSource {
                engine: self.name().to_string(),
                url: source.to_string(),
            });
        }

        let mut state = self.state.borrow_mut();
        state.epoch += 1;
        state.attach_count += 1;
        state.source = Some(source.clone());
        state.listener = Some(on_position);
        state.position = (state.live_edge - state.profile.start_latency).max(0.0);
        state.paused = true;
        debug!(url = %source, ?support, "Simulated engine attached");
        Ok(support)
    }

    fn detach(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.source.is_none() && state.listener.is_none() {
            return;
        }
        state.epoch += 1;
        state.detach_count += 1;
        state.listener = None;
        state.source = None;
        state.paused = true;
    }

    fn seek(&mut self, position: f64) {
        let mut state = self.state.borrow_mut();
        state.seeks.push(position);
        let (start, end) = state.seekable();
        state.position = position.clamp(start, end);
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.play_calls += 1;
        if state.profile.reject_play {
            return Err(Error::command("play", "autoplay blocked"));
        }
        if state.source.is_some() {
            state.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.pause_calls += 1;
        state.paused = true;
    }

    fn position(&self) -> f64 {
        self.state.borrow().position
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Driver handle onto a [`SimulatedEngine`]
#[derive(Clone)]
pub struct SimulatedStream {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedStream {
    /// Advance simulated time by `dt` seconds and report the new position
    /// if the stream is playing
    pub fn tick(&self, dt: f64) {
        let report = {
            let mut state = self.state.borrow_mut();
            if state.source.is_none() {
                return;
            }
            state.live_edge += dt;
            if state.paused || state.stalled {
                return;
            }
            let advanced = state.position + dt * state.profile.rate;
            state.position = advanced.min(state.live_edge);
            state.position
        };
        self.emit(report);
    }

    /// Deliver a position report through the registered listener, as a
    /// decoder time update would. No-op while detached.
    pub fn report(&self, position: f64) {
        {
            let mut state = self.state.borrow_mut();
            if state.source.is_none() {
                return;
            }
            state.position = position;
        }
        self.emit(position);
    }

    fn emit(&self, position: f64) {
        let (listener, epoch) = {
            let mut state = self.state.borrow_mut();
            (state.listener.take(), state.epoch)
        };
        let Some(mut listener) = listener else {
            return;
        };

        listener(position);

        let mut state = self.state.borrow_mut();
        state.reports += 1;
        if state.epoch == epoch {
            state.listener = Some(listener);
        }
    }

    /// Move the playhead without emitting a report
    pub fn set_position(&self, position: f64) {
        self.state.borrow_mut().position = position;
    }

    /// Force the paused flag without counting a command
    pub fn set_paused(&self, paused: bool) {
        self.state.borrow_mut().paused = paused;
    }

    /// A stalled stream stops advancing and stops reporting
    pub fn set_stalled(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    pub fn set_live_edge(&self, live_edge: f64) {
        self.state.borrow_mut().live_edge = live_edge;
    }

    pub fn live_edge(&self) -> f64 {
        self.state.borrow().live_edge
    }

    pub fn position(&self) -> f64 {
        self.state.borrow().position
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().source.is_some()
    }

    pub fn has_listener(&self) -> bool {
        self.state.borrow().listener.is_some()
    }

    /// Seek targets requested so far, before clamping
    pub fn seeks(&self) -> Vec<f64> {
        self.state.borrow().seeks.clone()
    }

    pub fn clear_seeks(&self) {
        self.state.borrow_mut().seeks.clear();
    }

    pub fn play_calls(&self) -> usize {
        self.state.borrow().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.borrow().pause_calls
    }

    pub fn attach_count(&self) -> usize {
        self.state.borrow().attach_count
    }

    pub fn detach_count(&self) -> usize {
        self.state.borrow().detach_count
    }

    /// Reports delivered to a listener
    pub fn reports(&self) -> usize {
        self.state.borrow().reports
    }

    pub fn source(&self) -> Option<StreamSource> {
        self.state.borrow().source.clone()
    }
}
