//! Synchronization controller - drift correction for follower sessions
//!
//! One [`SyncController`] runs per follower. On every leader position update
//! it compares the follower's playhead with the leader's and decides whether
//! to jump the follower to the leader position:
//!
//! ```text
//! leader <= 0                      -> no signal yet, do nothing
//! follower paused                  -> seek(leader)
//! |follower - leader| > tolerance  -> seek(leader)
//! otherwise                        -> hold
//! ```
//!
//! Corrections are direct seeks, never playback-rate nudges. Live HLS buffers
//! are short, so a jump is the whole correction.

use crate::config::SyncConfig;
use serde::{Deserialize, Serialize};

/// One published leader position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderUpdate {
    /// Monotonic update counter, starting at 1
    pub seq: u64,
    /// Leader decode position in seconds
    pub position: f64,
}

/// Follower state read at evaluation time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerObservation {
    pub position: f64,
    pub paused: bool,
}

/// Why a correction fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionReason {
    Paused,
    Drift,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncDecision {
    /// No valid leader position yet
    NoSignal,
    /// Within tolerance (or already corrected for this update)
    Hold { drift: f64 },
    /// Seek the follower to `target`
    Seek {
        target: f64,
        drift: f64,
        reason: CorrectionReason,
    },
}

impl SyncDecision {
    pub fn seek_target(&self) -> Option<f64> {
        match self {
            SyncDecision::Seek { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// Pure correction rule shared by all followers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPolicy {
    /// Drift tolerated before correcting (seconds)
    pub tolerance: f64,
    /// Correct paused followers regardless of drift
    pub resync_paused: bool,
}

impl SyncPolicy {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            resync_paused: true,
        }
    }

    /// Decide for a single leader position and follower observation
    pub fn decide(&self, leader_position: f64, follower: FollowerObservation) -> SyncDecision {
        // Also rejects NaN
        if !(leader_position > 0.0) {
            return SyncDecision::NoSignal;
        }

        let drift = (follower.position - leader_position).abs();

        if follower.paused && self.resync_paused {
            SyncDecision::Seek {
                target: leader_position,
                drift,
                reason: CorrectionReason::Paused,
            }
        } else if drift > self.tolerance {
            SyncDecision::Seek {
                target: leader_position,
                drift,
                reason: CorrectionReason::Drift,
            }
        } else {
            SyncDecision::Hold { drift }
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            tolerance: config.tolerance_secs,
            resync_paused: config.resync_paused_followers,
        }
    }
}

/// Per-follower correction statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Evaluations with a valid leader signal
    pub evaluations: u64,
    /// Seeks issued
    pub corrections: u64,
    /// Corrections caused by a paused follower
    pub paused_corrections: u64,
    /// Drift observed at the last evaluation
    pub last_drift: Option<f64>,
    /// Largest drift observed
    pub max_drift: f64,
}

/// Drift controller for one follower session
#[derive(Debug, Clone)]
pub struct SyncController {
    policy: SyncPolicy,
    stats: SyncStats,
    /// Leader update a seek was last issued for
    last_corrected: Option<u64>,
}

impl SyncController {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            stats: SyncStats::default(),
            last_corrected: None,
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Evaluate a fresh leader update
    pub fn on_leader_update(&mut self, update: LeaderUpdate, follower: FollowerObservation) -> SyncDecision {
        self.evaluate(update, follower)
    }

    /// Re-evaluate against the latest leader update after the follower
    /// reported progress of its own. Never issues a second seek for an update
    /// that was already corrected.
    pub fn on_follower_progress(
        &mut self,
        latest: Option<LeaderUpdate>,
        follower: FollowerObservation,
    ) -> SyncDecision {
        let Some(update) = latest else {
            return SyncDecision::NoSignal;
        };
        if self.last_corrected == Some(update.seq) {
            let drift = (follower.position - update.position).abs();
            return SyncDecision::Hold { drift };
        }
        self.evaluate(update, follower)
    }

    fn evaluate(&mut self, update: LeaderUpdate, follower: FollowerObservation) -> SyncDecision {
        let decision = self.policy.decide(update.position, follower);

        match decision {
            SyncDecision::NoSignal => {}
            SyncDecision::Hold { drift } => self.record(drift),
            SyncDecision::Seek { drift, reason, .. } => {
                self.record(drift);
                self.stats.corrections += 1;
                if reason == CorrectionReason::Paused {
                    self.stats.paused_corrections += 1;
                }
                self.last_corrected = Some(update.seq);
            }
        }

        decision
    }

    fn record(&mut self, drift: f64) {
        self.stats.evaluations += 1;
        self.stats.last_drift = Some(drift);
        if drift > self.stats.max_drift {
            self.stats.max_drift = drift;
        }
    }
}
