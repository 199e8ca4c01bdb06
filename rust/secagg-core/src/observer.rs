//! Observation of round progress.
//!
//! The intermediate states of a round are not observable through the round itself. An
//! [`RoundObserver`] is informed once a round starts, after every completed phase (together with
//! the time spent in it) and once the round ends.

use std::time::Duration;

use derive_more::Display;
use tracing::{info, warn};

use crate::{ParticipantSet, ProtocolError};

/// The externally reported phases of a round.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash)]
pub enum RoundPhase {
    #[display(fmt = "AwaitingSetup")]
    AwaitingSetup,
    /// Deriving the round key from the setup messages, including any bounded search.
    #[display(fmt = "RecoveringSetup")]
    RecoveringSetup,
    #[display(fmt = "AwaitingContributions")]
    AwaitingContributions,
    #[display(fmt = "Combining")]
    Combining,
    #[display(fmt = "RecoveringMask")]
    RecoveringMask,
    #[display(fmt = "Reconstructed")]
    Reconstructed,
}

/// A hook for reporting round progress.
///
/// All methods do nothing by default.
pub trait RoundObserver: Sync {
    /// Called once the collective key of the round is derived.
    fn round_started(&self, _round_id: u64, _participants: &ParticipantSet) {}

    /// Called after a phase completed.
    fn phase_completed(&self, _round_id: u64, _phase: RoundPhase, _elapsed: Duration) {}

    /// Called once the round is either reconstructed or failed.
    fn round_finished(&self, _round_id: u64, _outcome: Result<(), &ProtocolError>) {}
}

/// An observer which ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl RoundObserver for NoopObserver {}

/// An observer which reports through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl RoundObserver for TracingObserver {
    fn round_started(&self, round_id: u64, participants: &ParticipantSet) {
        info!(round_id, "round started with {} participants", participants.len());
    }

    fn phase_completed(&self, round_id: u64, phase: RoundPhase, elapsed: Duration) {
        info!(
            round_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "phase {} completed",
            phase
        );
    }

    fn round_finished(&self, round_id: u64, outcome: Result<(), &ProtocolError>) {
        match outcome {
            Ok(()) => info!(round_id, "round finished"),
            Err(err) => warn!(round_id, "round failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(RoundPhase::AwaitingSetup.to_string(), "AwaitingSetup");
        assert_eq!(RoundPhase::RecoveringSetup.to_string(), "RecoveringSetup");
        assert_eq!(RoundPhase::RecoveringMask.to_string(), "RecoveringMask");
    }
}
