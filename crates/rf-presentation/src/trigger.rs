//! Trigger policy and the win gate it drives
//!
//! The gate holds back win presentation until the configured milestone has
//! been reached. Once resolved it stays resolved for the flow.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Milestone that unlocks win presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerPolicy {
    /// As soon as the result arrives
    Result,
    /// After the step sequence has been presented
    #[default]
    SequenceEnd,
    /// After the flow's feature ends (immediately if none started)
    FeatureEnd,
    /// Sequence presented and no feature active
    ResultDataFinalized,
}

impl TriggerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Result => "RESULT",
            Self::SequenceEnd => "SEQUENCE_END",
            Self::FeatureEnd => "FEATURE_END",
            Self::ResultDataFinalized => "RESULT_DATA_FINALIZED",
        }
    }
}

impl std::fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    /// Milestone reached
    Unlocked,
    /// Released without the milestone (flow cancelled)
    ForceResolved,
}

/// One-shot async gate
#[derive(Debug)]
pub struct WinGate {
    state: watch::Sender<GateState>,
}

impl Default for WinGate {
    fn default() -> Self {
        Self::new()
    }
}

impl WinGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Locked);
        Self { state }
    }

    fn resolve(&self, to: GateState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::Locked {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Open the gate; false if it was already resolved
    pub fn unlock(&self) -> bool {
        self.resolve(GateState::Unlocked)
    }

    /// Release waiters without reaching the milestone
    pub fn force_resolve(&self) -> bool {
        self.resolve(GateState::ForceResolved)
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn is_resolved(&self) -> bool {
        self.state() != GateState::Locked
    }

    /// Wait until resolved; returns immediately if it already is
    pub async fn wait(&self) -> GateState {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state != GateState::Locked {
                return state;
            }
            if rx.changed().await.is_err() {
                return GateState::ForceResolved;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_policy_serializes_screaming_snake() {
        let json = serde_json::to_string(&TriggerPolicy::ResultDataFinalized).unwrap();
        assert_eq!(json, "\"RESULT_DATA_FINALIZED\"");
        let parsed: TriggerPolicy = serde_json::from_str("\"FEATURE_END\"").unwrap();
        assert_eq!(parsed, TriggerPolicy::FeatureEnd);
    }

    #[test]
    fn test_resolution_is_sticky() {
        let gate = WinGate::new();
        assert!(gate.unlock());
        assert!(!gate.force_resolve());
        assert_eq!(gate.state(), GateState::Unlocked);
    }

    #[tokio::test]
    async fn test_wait_returns_when_already_open() {
        let gate = WinGate::new();
        gate.unlock();
        assert_eq!(gate.wait().await, GateState::Unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_unlock() {
        let gate = Arc::new(WinGate::new());
        let waiter = Arc::clone(&gate);
        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        gate.force_resolve();
        assert_eq!(handle.await.unwrap(), GateState::ForceResolved);
    }
}
