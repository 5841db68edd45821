//! Deploy attempt state machine.
//!
//! Every attempt moves `Building` -> `Negotiating` -> `Uploading` -> `Ready`,
//! with `Failed` reachable from any non-terminal phase. `Ready` and `Failed`
//! are terminal; there is no transition from `Failed` back to `Uploading`,
//! so a retry is a fresh attempt starting at `Building`. Transitions are
//! published over a watch channel so callers can observe progress.

use std::fmt;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Phase of one deploy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPhase {
    /// Hashing the local directory into a manifest
    Building,

    /// Site resolution and deploy negotiation with the remote API
    Negotiating,

    /// Uploading required files; `remaining` counts down as uploads land
    Uploading { remaining: usize },

    /// Every required file uploaded; the deploy finalizes remotely
    Ready,

    /// The attempt ended in an error
    Failed(String),
}

impl DeployPhase {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// A new attempt may begin from either terminal phase, which is why
    /// `Ready`/`Failed` -> `Building` is allowed.
    pub fn can_advance_to(&self, next: &DeployPhase) -> bool {
        use DeployPhase::*;

        match (self, next) {
            (Building, Negotiating) => true,
            (Negotiating, Uploading { .. }) => true,
            (Uploading { remaining: from }, Uploading { remaining: to }) => to < from,
            (Uploading { .. }, Ready) => true,
            (Building | Negotiating | Uploading { .. }, Failed(_)) => true,
            (Ready | Failed(_), Building) => true,
            _ => false,
        }
    }

    /// Terminal phases end the attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Ready | DeployPhase::Failed(_))
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployPhase::Building => write!(f, "building manifest"),
            DeployPhase::Negotiating => write!(f, "negotiating deploy"),
            DeployPhase::Uploading { remaining } => {
                write!(f, "uploading ({} remaining)", remaining)
            }
            DeployPhase::Ready => write!(f, "ready"),
            DeployPhase::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Publishes the phase transitions of one deployer.
///
/// Illegal transitions are logged and dropped rather than published, so
/// observers never see an impossible sequence.
#[derive(Debug)]
pub struct PhaseTracker {
    tx: watch::Sender<DeployPhase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeployPhase::Building);
        Self { tx }
    }

    /// Current phase.
    pub fn current(&self) -> DeployPhase {
        self.tx.borrow().clone()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<DeployPhase> {
        self.tx.subscribe()
    }

    /// Advance to `next` and publish the change.
    pub fn advance(&self, next: DeployPhase) {
        let current = self.current();
        if current == next {
            return;
        }
        if !current.can_advance_to(&next) {
            warn!("Ignoring illegal phase transition: {} -> {}", current, next);
            return;
        }

        debug!("Deploy phase: {}", next);
        // send_replace updates the value even with no receivers subscribed
        self.tx.send_replace(next);
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let tracker = PhaseTracker::new();
        assert_eq!(tracker.current(), DeployPhase::Building);

        tracker.advance(DeployPhase::Negotiating);
        assert_eq!(tracker.current(), DeployPhase::Negotiating);

        tracker.advance(DeployPhase::Uploading { remaining: 3 });
        tracker.advance(DeployPhase::Uploading { remaining: 2 });
        tracker.advance(DeployPhase::Uploading { remaining: 0 });
        tracker.advance(DeployPhase::Ready);

        assert_eq!(tracker.current(), DeployPhase::Ready);
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn test_failure_reachable_from_any_active_phase() {
        let failed = DeployPhase::Failed("boom".to_string());
        assert!(DeployPhase::Building.can_advance_to(&failed));
        assert!(DeployPhase::Negotiating.can_advance_to(&failed));
        assert!(DeployPhase::Uploading { remaining: 5 }.can_advance_to(&failed));
    }

    #[test]
    fn test_no_recovery_from_failed() {
        let failed = DeployPhase::Failed("boom".to_string());
        assert!(!failed.can_advance_to(&DeployPhase::Uploading { remaining: 1 }));
        assert!(!failed.can_advance_to(&DeployPhase::Ready));
        // A retry is a fresh attempt
        assert!(failed.can_advance_to(&DeployPhase::Building));
    }

    #[test]
    fn test_remaining_count_only_decreases() {
        let uploading = DeployPhase::Uploading { remaining: 2 };
        assert!(!uploading.can_advance_to(&DeployPhase::Uploading { remaining: 2 }));
        assert!(!uploading.can_advance_to(&DeployPhase::Uploading { remaining: 3 }));
        assert!(uploading.can_advance_to(&DeployPhase::Uploading { remaining: 1 }));
    }

    #[test]
    fn test_cannot_skip_phases() {
        assert!(!DeployPhase::Building.can_advance_to(&DeployPhase::Ready));
        assert!(!DeployPhase::Building.can_advance_to(&DeployPhase::Uploading { remaining: 1 }));
        assert!(!DeployPhase::Negotiating.can_advance_to(&DeployPhase::Ready));
    }

    #[test]
    fn test_illegal_advance_ignored() {
        let tracker = PhaseTracker::new();
        tracker.advance(DeployPhase::Ready);
        assert_eq!(tracker.current(), DeployPhase::Building);
    }

    #[test]
    fn test_subscribers_observe_transitions() {
        let tracker = PhaseTracker::new();
        let rx = tracker.subscribe();

        tracker.advance(DeployPhase::Negotiating);
        assert_eq!(*rx.borrow(), DeployPhase::Negotiating);
    }

    #[test]
    fn test_new_attempt_after_terminal() {
        let tracker = PhaseTracker::new();
        tracker.advance(DeployPhase::Negotiating);
        tracker.advance(DeployPhase::Failed("boom".to_string()));
        tracker.advance(DeployPhase::Building);
        assert_eq!(tracker.current(), DeployPhase::Building);
    }
}
