//! ResultPresentationController - one timeline per spin result
//!
//! ## Flow
//!
//! ```text
//! handle_spin_result()
//!   │  new FlowContext (supersedes and cancels the previous flow)
//!   v
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ 1 present steps ─▶ 2 sequence end ─▶ 3 await trigger ─▶ 4 win        │
//! │   (presenter)        (gate: SEQUENCE_END)  (WinGate)       (tier+hold)│
//! │                                                                      │
//! │ ─▶ 5 rollup ─▶ 6 presentation-completed (+ data-finalized)           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every phase re-checks that its captured `(flow_id, spin_id)` is still the
//! active pair; a superseded flow's late phases return without side effects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rf_cascade::{
    GridView, PresenterEvent, SpinPayload, SpinStep, StepSequencePresenter, parse_matrix,
    validate_payload,
};
use rf_timeline::{
    ActionResult, ArcAction, SequenceBuilder, TimelineRunner, TimelineState, sleep_or_cancel,
};

use crate::config::PresentationConfig;
use crate::error::PresentationError;
use crate::facts::{
    DataFinalized, Fact, FactBus, PresentationCompleted, SequenceCompleted, StepGridCommitted,
    StepPresented, StepWinHighlighted, SubscriptionId, WinPresentation, WinTierResolved,
};
use crate::flow::{FlowContext, FlowId, FlowOutcome, FlowSnapshot};
use crate::tier::WinTier;
use crate::trigger::{GateState, TriggerPolicy};

/// Map presenter output onto step-level facts
fn presenter_fact(event: &PresenterEvent) -> Fact {
    match event {
        PresenterEvent::GridCommitted {
            step_index,
            step_type,
            matrix,
        } => Fact::StepGridCommitted(StepGridCommitted {
            step_index: *step_index,
            step_type: *step_type,
            matrix_string: matrix.clone(),
        }),
        PresenterEvent::WinHighlight {
            step_index,
            wins,
            amount,
        } => Fact::StepWinHighlighted(StepWinHighlighted {
            step_index: *step_index,
            amount: *amount,
            line_count: wins.len(),
        }),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED STATE
// ═══════════════════════════════════════════════════════════════════════════════

struct Shared {
    presenter: StepSequencePresenter,
    facts: Arc<FactBus>,
    config: PresentationConfig,
    active_flow: Mutex<Option<Arc<FlowContext>>>,
    runner: Mutex<Option<Arc<TimelineRunner>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    destroyed: AtomicBool,
}

impl Shared {
    fn current_flow(&self) -> Option<Arc<FlowContext>> {
        self.active_flow.lock().clone()
    }

    fn is_current(&self, flow_id: FlowId, spin_id: &str) -> bool {
        self.active_flow
            .lock()
            .as_ref()
            .is_some_and(|active| active.matches(flow_id, spin_id))
    }

    /// Install `flow` as the active flow and tear down the previous one
    fn supersede(&self, flow: Arc<FlowContext>) {
        let previous = self.active_flow.lock().replace(flow);
        let runner = self.runner.lock().take();

        if let Some(runner) = runner {
            runner.stop();
        }
        if let Some(previous) = previous {
            log::debug!(
                "[Presentation] Flow {} ({}) superseded",
                previous.flow_id,
                previous.spin_id
            );
            previous.cancel();
        }
        self.presenter.cancel();
    }

    fn teardown(&self) {
        let flow = self.active_flow.lock().take();
        let runner = self.runner.lock().take();

        if let Some(runner) = runner {
            runner.stop();
        }
        if let Some(flow) = flow {
            log::debug!("[Presentation] Flow {} cancelled", flow.flow_id);
            flow.cancel();
        }
        self.presenter.cancel();
    }

    /// Active flow, filtered to `spin_id` when given
    fn flow_for(&self, spin_id: Option<&str>) -> Option<Arc<FlowContext>> {
        let flow = self.current_flow()?;
        match spin_id {
            Some(id) if id != flow.spin_id => {
                log::debug!("[Presentation] Feature notice for stale spin {}, ignoring", id);
                None
            }
            _ => Some(flow),
        }
    }

    fn feature_started(&self, spin_id: Option<&str>) {
        let Some(flow) = self.flow_for(spin_id) else {
            return;
        };
        log::debug!("[Presentation] Feature started in flow {}", flow.flow_id);
        flow.mark_feature_started();
    }

    fn feature_ended(&self, spin_id: Option<&str>) {
        let Some(flow) = self.flow_for(spin_id) else {
            return;
        };
        if !flow.mark_feature_ended() {
            log::debug!("[Presentation] Feature ended with none active in flow {}", flow.flow_id);
        }
        match flow.policy {
            TriggerPolicy::FeatureEnd => {
                flow.gate.unlock();
            }
            TriggerPolicy::ResultDataFinalized if flow.sequence_completed() => {
                flow.gate.unlock();
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PHASES
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable spin data shared by every phase of a flow
struct SpinData {
    steps: Vec<SpinStep>,
    total_win: f64,
    total_bet: f64,
    final_matrix: String,
}

/// Captures of one flow's phases
#[derive(Clone)]
struct Phase {
    shared: Arc<Shared>,
    flow: Arc<FlowContext>,
    spin: Arc<SpinData>,
}

impl Phase {
    /// Flow not cancelled and still the active `(flow_id, spin_id)` pair
    fn is_live(&self) -> bool {
        !self.flow.is_cancelled() && self.shared.is_current(self.flow.flow_id, &self.flow.spin_id)
    }

    fn emit(&self, fact: Fact) {
        self.shared.facts.emit(fact);
    }

    /// Phase 1: cascade presentation, then per-step facts
    async fn present_steps(self) -> ActionResult {
        if !self.is_live() {
            return Ok(());
        }

        let spin = &self.spin;
        let summary = self
            .shared
            .presenter
            .execute(&spin.steps, spin.total_win, spin.total_bet)
            .await?;
        if summary.cancelled || !self.is_live() {
            return Ok(());
        }

        for (index, step) in spin.steps.iter().enumerate().take(summary.steps_presented) {
            self.emit(Fact::StepPresented(StepPresented {
                result_flow_id: self.flow.flow_id,
                spin_id: self.flow.spin_id.clone(),
                step_index: index,
                step_type: step.step_type(),
                cumulative_win: step.cumulative_win(),
            }));
        }

        let last_grid = spin.steps.last().map(|step| parse_matrix(step.committed_grid()));
        if last_grid.is_some_and(|grid| grid != parse_matrix(&spin.final_matrix)) {
            log::warn!(
                "[Presentation] Final matrix of {} differs from last step grid",
                self.flow.spin_id
            );
        }
        Ok(())
    }

    /// Phase 2: sequence end milestone
    fn complete_sequence(&self) {
        if !self.is_live() {
            return;
        }
        let flow = &self.flow;
        flow.mark_sequence_completed();
        self.emit(Fact::SequenceCompleted(SequenceCompleted {
            result_flow_id: flow.flow_id,
            spin_id: flow.spin_id.clone(),
            step_count: self.spin.steps.len(),
            total_win: self.spin.total_win,
        }));

        match flow.policy {
            TriggerPolicy::SequenceEnd => {
                flow.gate.unlock();
            }
            TriggerPolicy::ResultDataFinalized if !flow.feature_active() => {
                flow.gate.unlock();
            }
            _ => {}
        }
    }

    /// Phase 3: wait for the configured trigger
    async fn await_trigger(self) -> ActionResult {
        let flow = &self.flow;
        if flow.policy == TriggerPolicy::FeatureEnd && !flow.feature_started() {
            flow.gate.unlock();
        }

        let state = flow.gate.wait().await;
        if state == GateState::ForceResolved {
            log::debug!("[Presentation] Trigger wait of flow {} released", flow.flow_id);
        }
        Ok(())
    }

    /// Phase 4: tier resolution, single-fire guard, big-win hold
    async fn present_win(self) -> ActionResult {
        if !self.is_live() {
            return Ok(());
        }

        let (flow, spin) = (&self.flow, &self.spin);
        let tier = WinTier::from_win(spin.total_win, spin.total_bet);
        if tier == WinTier::None {
            log::debug!("[Presentation] No win for {}", flow.spin_id);
            return Ok(());
        }
        if !flow.claim_win_presentation() {
            log::debug!("[Presentation] Win presentation already played in flow {}", flow.flow_id);
            return Ok(());
        }

        self.emit(Fact::WinTierResolved(WinTierResolved {
            tier,
            total_win: spin.total_win,
            total_bet: spin.total_bet,
            multiplier: WinTier::multiplier(spin.total_win, spin.total_bet),
        }));
        self.emit(Fact::WinPresentationStarted(WinPresentation { tier }));

        sleep_or_cancel(self.shared.config.hold_ms(tier), &flow.token).await;
        if !self.is_live() {
            return Ok(());
        }

        self.emit(Fact::WinPresentationCompleted(WinPresentation { tier }));
        Ok(())
    }

    /// Phase 6: completion milestones
    fn complete_presentation(&self) {
        if !self.is_live() {
            return;
        }
        let flow = &self.flow;
        flow.mark_presentation_completed();
        self.emit(Fact::PresentationCompleted(PresentationCompleted {
            total_win: self.spin.total_win,
        }));

        if flow.policy == TriggerPolicy::ResultDataFinalized {
            self.emit(Fact::DataFinalized(DataFinalized {
                final_total_win: self.spin.total_win,
                feature_completed: flow.feature_completed(),
            }));
        }
        log::debug!("[Presentation] Flow {} completed", flow.flow_id);
    }

    fn build(self) -> Vec<ArcAction> {
        let config = &self.shared.config;
        let spin = &self.spin;
        let present_ms = self.shared.presenter.timing().estimate_ms(&spin.steps);
        let hold_ms = config.hold_ms(WinTier::from_win(spin.total_win, spin.total_bet));
        let rollup_ms = config.rollup_ms(spin.total_win, spin.total_bet);

        let phase = self.clone();
        let builder = SequenceBuilder::new().call_async(
            move || phase.clone().present_steps(),
            present_ms,
        );

        let phase = self.clone();
        let builder = builder.call(move || phase.complete_sequence());

        let phase = self.clone();
        let builder = builder.await_future(move || phase.clone().await_trigger());

        let phase = self.clone();
        let builder = builder.call_async(move || phase.clone().present_win(), hold_ms);

        let phase = self;
        builder
            .delay(rollup_ms)
            .call(move || phase.complete_presentation())
            .build()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level spin result orchestrator
#[derive(Clone)]
pub struct ResultPresentationController {
    shared: Arc<Shared>,
}

impl ResultPresentationController {
    /// Wire a controller around `presenter`
    ///
    /// The presenter's events are republished on `facts`, and inbound
    /// `feature-started` / `feature-ended` facts drive the active flow.
    pub fn new(
        presenter: StepSequencePresenter,
        facts: Arc<FactBus>,
        config: PresentationConfig,
    ) -> Result<Self, PresentationError> {
        config.validate()?;

        let bridge = Arc::clone(&facts);
        let presenter = presenter.with_sink(move |event| bridge.emit(presenter_fact(event)));

        let shared = Arc::new(Shared {
            presenter,
            facts: Arc::clone(&facts),
            config,
            active_flow: Mutex::new(None),
            runner: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&shared);
        let id = facts.subscribe(move |fact| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match fact {
                Fact::FeatureStarted(notice) => shared.feature_started(Some(&notice.spin_id)),
                Fact::FeatureEnded(notice) => shared.feature_ended(Some(&notice.spin_id)),
                _ => {}
            }
        });
        shared.subscriptions.lock().push(id);

        Ok(Self { shared })
    }

    /// Controller with a presenter over `view`, timed by `config.cascade`
    pub fn with_view(
        view: Arc<dyn GridView>,
        facts: Arc<FactBus>,
        config: PresentationConfig,
    ) -> Result<Self, PresentationError> {
        let presenter = StepSequencePresenter::new(view, config.cascade.clone());
        Self::new(presenter, facts, config)
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.shared.config
    }

    pub fn facts(&self) -> &Arc<FactBus> {
        &self.shared.facts
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Snapshot of the active flow, if any
    pub fn active_flow(&self) -> Option<FlowSnapshot> {
        self.shared.current_flow().map(|flow| flow.snapshot())
    }

    /// State of the most recent flow's timeline
    pub fn timeline_state(&self) -> Option<TimelineState> {
        self.shared.runner.lock().as_ref().map(|runner| runner.state())
    }

    /// Present one spin result
    ///
    /// Cancels any in-flight flow first. Resolves when this flow completes,
    /// is superseded, or is cancelled; `FlowOutcome::completed` tells which.
    pub async fn handle_spin_result(
        &self,
        spin_id: impl Into<String>,
        steps: Vec<SpinStep>,
        total_win: f64,
        total_bet: f64,
        final_matrix: impl Into<String>,
    ) -> Result<FlowOutcome, PresentationError> {
        if self.is_destroyed() {
            return Err(PresentationError::Destroyed);
        }

        let flow = Arc::new(FlowContext::new(spin_id, self.shared.config.trigger_policy));
        self.shared.supersede(Arc::clone(&flow));
        if flow.policy == TriggerPolicy::Result {
            flow.gate.unlock();
        }
        log::debug!(
            "[Presentation] Flow {} for {} ({} steps, win {:.2}, bet {:.2}, {})",
            flow.flow_id,
            flow.spin_id,
            steps.len(),
            total_win,
            total_bet,
            flow.policy
        );

        let phase = Phase {
            shared: Arc::clone(&self.shared),
            flow: Arc::clone(&flow),
            spin: Arc::new(SpinData {
                steps,
                total_win,
                total_bet,
                final_matrix: final_matrix.into(),
            }),
        };
        let runner = Arc::new(TimelineRunner::new(phase.build()));
        *self.shared.runner.lock() = Some(Arc::clone(&runner));

        let result = runner.start().await;

        let outcome = FlowOutcome {
            flow_id: flow.flow_id,
            spin_id: flow.spin_id.clone(),
            completed: flow.presentation_completed(),
        };
        match result {
            Ok(()) => Ok(outcome),
            Err(err) => {
                log::error!("[Presentation] Flow {} failed: {}", flow.flow_id, err);
                Err(err.into())
            }
        }
    }

    /// Validate a full payload and present it
    pub async fn handle_payload(
        &self,
        payload: SpinPayload,
    ) -> Result<FlowOutcome, PresentationError> {
        validate_payload(&payload)?;
        self.handle_spin_result(
            payload.spin_id,
            payload.steps,
            payload.total_win,
            payload.total_bet,
            payload.final_matrix,
        )
        .await
    }

    /// A feature began in the active flow
    pub fn notify_feature_started(&self) {
        self.shared.feature_started(None);
    }

    /// The active flow's feature finished
    pub fn notify_feature_ended(&self) {
        self.shared.feature_ended(None);
    }

    /// Abort the active flow; no completion fact is emitted
    pub fn cancel(&self) {
        self.shared.teardown();
    }

    /// Cancel and drop fact subscriptions; later calls fail with `Destroyed`
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.teardown();

        let subscriptions = std::mem::take(&mut *self.shared.subscriptions.lock());
        for id in subscriptions {
            self.shared.facts.unsubscribe(id);
        }
        log::debug!("[Presentation] Controller destroyed");
    }
}
