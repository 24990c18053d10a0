//! Milestone facts - immutable past-tense events for observers
//!
//! Facts are published on a [`FactBus`] after the fact. Nothing inside the
//! pipeline waits on them; sequencing is done by the timeline.
//!
//! JSON shape: `{"fact": "step-presented", "payload": {...camelCase...}}`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rf_cascade::StepType;
use serde::{Deserialize, Serialize};

use crate::flow::FlowId;
use crate::tier::WinTier;

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOADS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPresented {
    pub result_flow_id: FlowId,
    pub spin_id: String,
    pub step_index: usize,
    pub step_type: StepType,
    pub cumulative_win: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCompleted {
    pub result_flow_id: FlowId,
    pub spin_id: String,
    pub step_count: usize,
    pub total_win: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinTierResolved {
    pub tier: WinTier,
    pub total_win: f64,
    pub total_bet: f64,
    pub multiplier: f64,
}

/// Payload of win-presentation started/completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinPresentation {
    pub tier: WinTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationCompleted {
    pub total_win: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFinalized {
    pub final_total_win: f64,
    pub feature_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepGridCommitted {
    pub step_index: usize,
    pub step_type: StepType,
    pub matrix_string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepWinHighlighted {
    pub step_index: usize,
    pub amount: f64,
    pub line_count: usize,
}

/// Feature boundary reported by the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureNotice {
    pub spin_id: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", content = "payload", rename_all = "kebab-case")]
pub enum Fact {
    StepPresented(StepPresented),
    SequenceCompleted(SequenceCompleted),
    WinTierResolved(WinTierResolved),
    WinPresentationStarted(WinPresentation),
    WinPresentationCompleted(WinPresentation),
    PresentationCompleted(PresentationCompleted),
    DataFinalized(DataFinalized),
    StepGridCommitted(StepGridCommitted),
    StepWinHighlighted(StepWinHighlighted),
    /// Inbound: a feature began for the spin
    FeatureStarted(FeatureNotice),
    /// Inbound: the spin's feature finished
    FeatureEnded(FeatureNotice),
}

impl Fact {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Self::StepPresented(_) => "step-presented",
            Self::SequenceCompleted(_) => "sequence-completed",
            Self::WinTierResolved(_) => "win-tier-resolved",
            Self::WinPresentationStarted(_) => "win-presentation-started",
            Self::WinPresentationCompleted(_) => "win-presentation-completed",
            Self::PresentationCompleted(_) => "presentation-completed",
            Self::DataFinalized(_) => "data-finalized",
            Self::StepGridCommitted(_) => "step-grid-committed",
            Self::StepWinHighlighted(_) => "step-win-highlighted",
            Self::FeatureStarted(_) => "feature-started",
            Self::FeatureEnded(_) => "feature-ended",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fact observer
pub type FactListener = Arc<dyn Fn(&Fact) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous fan-out of facts to subscribers
#[derive(Default)]
pub struct FactBus {
    listeners: RwLock<Vec<(SubscriptionId, FactListener)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for FactBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactBus")
            .field("listeners", &self.len())
            .finish()
    }
}

impl FactBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Fact) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false for an unknown id
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver to every current subscriber in subscription order
    ///
    /// Listeners run outside the lock and may subscribe or emit themselves.
    pub fn emit(&self, fact: Fact) {
        log::trace!("[Facts] {}", fact.name());
        let listeners: Vec<FactListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&fact);
        }
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Recording subscriber
#[derive(Debug, Clone, Default)]
pub struct FactLog {
    facts: Arc<Mutex<Vec<Fact>>>,
}

impl FactLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a recorder to `bus`
    pub fn attach(bus: &FactBus) -> (Self, SubscriptionId) {
        let log = Self::new();
        let sink = Arc::clone(&log.facts);
        let id = bus.subscribe(move |fact| sink.lock().push(fact.clone()));
        (log, id)
    }

    pub fn facts(&self) -> Vec<Fact> {
        self.facts.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.facts.lock().iter().map(Fact::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.facts.lock().iter().filter(|fact| fact.name() == name).count()
    }

    /// First recorded fact with `name`
    pub fn find(&self, name: &str) -> Option<Fact> {
        self.facts.lock().iter().find(|fact| fact.name() == name).cloned()
    }

    pub fn clear(&self) {
        self.facts.lock().clear();
    }
}
