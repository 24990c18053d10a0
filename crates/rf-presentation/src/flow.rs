//! Flow identity and per-flow guards
//!
//! A flow is one presentation run. Guards live on the [`FlowContext`], so a
//! superseded flow's guards are unreachable from the new one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rf_timeline::CancellationToken;
use serde::{Deserialize, Serialize};

use crate::trigger::{TriggerPolicy, WinGate};

static FLOW_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Result flow id: process-wide counter plus creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FlowId {
    /// Strictly increasing within the process
    pub sequence: u64,
    /// Unix time in milliseconds
    pub timestamp_ms: i64,
}

impl FlowId {
    /// Allocate the next id
    pub fn next() -> Self {
        Self {
            sequence: FLOW_COUNTER.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "flow-{}-{}", self.sequence, self.timestamp_ms)
    }
}

impl From<FlowId> for String {
    fn from(id: FlowId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for FlowId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let invalid = || format!("invalid flow id '{value}'");
        let rest = value.strip_prefix("flow-").ok_or_else(invalid)?;
        let (sequence, timestamp) = rest.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            sequence: sequence.parse().map_err(|_| invalid())?,
            timestamp_ms: timestamp.parse().map_err(|_| invalid())?,
        })
    }
}

/// State of one presentation flow
#[derive(Debug)]
pub struct FlowContext {
    pub spin_id: String,
    pub flow_id: FlowId,
    pub policy: TriggerPolicy,
    pub gate: WinGate,
    pub token: CancellationToken,
    win_presentation_played: AtomicBool,
    feature_started: AtomicBool,
    feature_active: AtomicBool,
    feature_completed: AtomicBool,
    sequence_completed: AtomicBool,
    presentation_completed: AtomicBool,
}

impl FlowContext {
    pub fn new(spin_id: impl Into<String>, policy: TriggerPolicy) -> Self {
        Self {
            spin_id: spin_id.into(),
            flow_id: FlowId::next(),
            policy,
            gate: WinGate::new(),
            token: CancellationToken::new(),
            win_presentation_played: AtomicBool::new(false),
            feature_started: AtomicBool::new(false),
            feature_active: AtomicBool::new(false),
            feature_completed: AtomicBool::new(false),
            sequence_completed: AtomicBool::new(false),
            presentation_completed: AtomicBool::new(false),
        }
    }

    /// Same `(flow_id, spin_id)` pair
    pub fn matches(&self, flow_id: FlowId, spin_id: &str) -> bool {
        self.flow_id == flow_id && self.spin_id == spin_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the flow token and release a pending gate wait
    pub fn cancel(&self) {
        self.token.cancel();
        self.gate.force_resolve();
    }

    /// Claim the single win presentation; false if already played
    pub fn claim_win_presentation(&self) -> bool {
        !self.win_presentation_played.swap(true, Ordering::SeqCst)
    }

    pub fn win_presentation_played(&self) -> bool {
        self.win_presentation_played.load(Ordering::SeqCst)
    }

    pub fn mark_feature_started(&self) {
        self.feature_started.store(true, Ordering::SeqCst);
        self.feature_active.store(true, Ordering::SeqCst);
    }

    /// Returns false if no feature was active
    pub fn mark_feature_ended(&self) -> bool {
        let was_active = self.feature_active.swap(false, Ordering::SeqCst);
        if was_active {
            self.feature_completed.store(true, Ordering::SeqCst);
        }
        was_active
    }

    pub fn feature_started(&self) -> bool {
        self.feature_started.load(Ordering::SeqCst)
    }

    pub fn feature_active(&self) -> bool {
        self.feature_active.load(Ordering::SeqCst)
    }

    pub fn feature_completed(&self) -> bool {
        self.feature_completed.load(Ordering::SeqCst)
    }

    pub fn mark_sequence_completed(&self) {
        self.sequence_completed.store(true, Ordering::SeqCst);
    }

    pub fn sequence_completed(&self) -> bool {
        self.sequence_completed.load(Ordering::SeqCst)
    }

    pub fn mark_presentation_completed(&self) {
        self.presentation_completed.store(true, Ordering::SeqCst);
    }

    pub fn presentation_completed(&self) -> bool {
        self.presentation_completed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            spin_id: self.spin_id.clone(),
            flow_id: self.flow_id,
            policy: self.policy,
            win_presentation_played: self.win_presentation_played(),
            feature_active: self.feature_active(),
            sequence_completed: self.sequence_completed(),
            gate_resolved: self.gate.is_resolved(),
            cancelled: self.is_cancelled(),
        }
    }
}

/// Read-only view of the active flow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub spin_id: String,
    pub flow_id: FlowId,
    pub policy: TriggerPolicy,
    pub win_presentation_played: bool,
    pub feature_active: bool,
    pub sequence_completed: bool,
    pub gate_resolved: bool,
    pub cancelled: bool,
}

/// Returned by `handle_spin_result`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOutcome {
    pub flow_id: FlowId,
    pub spin_id: String,
    /// False when the flow was cancelled or superseded
    pub completed: bool,
}
