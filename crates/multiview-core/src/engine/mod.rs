//! Playback engine adapters
//!
//! A [`PlaybackEngine`] binds one adaptive streaming client (hls.js, a native
//! player, a simulation) to one video sink. The dashboard only ever talks to
//! engines through this trait, so native and library-based HLS look the same
//! from the synchronization side.
//!
//! Contract:
//! - `attach` registers the position listener together with the source; the
//!   listener lives exactly as long as the attachment
//! - `detach` is idempotent and drops the listener before releasing the client,
//!   so no report is delivered after it returns
//! - `seek` never fails; positions outside the buffered window are clamped or
//!   left to the client to buffer up to
//! - `play` may be rejected by the platform (autoplay policy); callers treat
//!   that as non-fatal

pub mod simulated;

pub use simulated::{SimulatedEngine, SimulatedStream, SimulationProfile};

use crate::{EngineSupport, Result, StreamDescriptor, StreamSource};

/// Callback receiving decoded playback positions in seconds
pub type PositionListener = Box<dyn FnMut(f64)>;

/// Uniform contract over one streaming client bound to one video sink
pub trait PlaybackEngine {
    /// Engine name used in logs and errors
    fn name(&self) -> &str;

    /// Report how (if at all) this engine can play `source`
    fn probe(&self, source: &StreamSource) -> EngineSupport;

    /// Bind the client to `source` and start loading
    ///
    /// Fails with [`crate::Error::UnsupportedSource`] when `probe` reports
    /// [`EngineSupport::Unsupported`]. Must only be called while detached.
    fn attach(&mut self, source: &StreamSource, on_position: PositionListener) -> Result<EngineSupport>;

    /// Release the client and deregister the listener
    fn detach(&mut self);

    /// Move the playhead
    fn seek(&mut self, position: f64);

    /// Request playback
    fn play(&mut self) -> Result<()>;

    /// Request pause
    fn pause(&mut self);

    /// Current decode position in seconds
    fn position(&self) -> f64;

    /// Whether the sink is paused
    fn is_paused(&self) -> bool;
}

/// Creates one engine per mounted stream
pub trait EngineFactory {
    fn create(&mut self, descriptor: &StreamDescriptor) -> Box<dyn PlaybackEngine>;
}

impl<F> EngineFactory for F
where
    F: FnMut(&StreamDescriptor) -> Box<dyn PlaybackEngine>,
{
    fn create(&mut self, descriptor: &StreamDescriptor) -> Box<dyn PlaybackEngine> {
        self(descriptor)
    }
}

/// Pick the playback path the way browsers are probed: the streaming
/// library first, native HLS second
pub fn select_support(library: bool, native: bool) -> EngineSupport {
    if library {
        EngineSupport::Library
    } else if native {
        EngineSupport::Native
    } else {
        EngineSupport::Unsupported
    }
}
