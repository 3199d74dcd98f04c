//! Transport commands - play/pause fan-out across the grid
//!
//! Every mounted session exposes a [`TransportHandle`]. The
//! [`TransportDispatcher`] sends one command to all of them, best effort:
//! a handle that fails is logged and skipped, the rest still get the command.
//! No ordering between sessions is promised.

use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Imperative capability exposed by each session to the presentation shell
pub trait TransportHandle {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek_to(&mut self, position: f64) -> Result<()>;
}

/// Commands broadcast to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportCommand {
    Play,
    Pause,
}

impl std::fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportCommand::Play => write!(f, "play"),
            TransportCommand::Pause => write!(f, "pause"),
        }
    }
}

/// A handle that rejected a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    /// Position of the handle in dispatch order
    pub index: usize,
    pub error: String,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub command: TransportCommand,
    /// Handles the command was sent to
    pub attempted: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Broadcasts transport commands
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportDispatcher;

impl TransportDispatcher {
    /// Send `command` to every handle, continuing past failures
    pub fn dispatch<'a, I, H>(command: TransportCommand, handles: I) -> DispatchReport
    where
        I: IntoIterator<Item = &'a mut H>,
        H: TransportHandle + ?Sized + 'a,
    {
        let mut report = DispatchReport {
            command,
            attempted: 0,
            failures: Vec::new(),
        };

        for (index, handle) in handles.into_iter().enumerate() {
            report.attempted += 1;
            let result = match command {
                TransportCommand::Play => handle.play(),
                TransportCommand::Pause => handle.pause(),
            };
            if let Err(e) = result {
                warn!(index, %command, error = %e, "Transport command failed, continuing");
                report.failures.push(DispatchFailure {
                    index,
                    error: e.to_string(),
                });
            }
        }

        debug!(
            %command,
            attempted = report.attempted,
            failed = report.failures.len(),
            "Transport command dispatched"
        );
        report
    }

    pub fn play_all<'a, I, H>(handles: I) -> DispatchReport
    where
        I: IntoIterator<Item = &'a mut H>,
        H: TransportHandle + ?Sized + 'a,
    {
        Self::dispatch(TransportCommand::Play, handles)
    }

    pub fn pause_all<'a, I, H>(handles: I) -> DispatchReport
    where
        I: IntoIterator<Item = &'a mut H>,
        H: TransportHandle + ?Sized + 'a,
    {
        Self::dispatch(TransportCommand::Pause, handles)
    }
}
