//! Timeline Actions - declared-duration units of cancellable work
//!
//! Every action carries a *declared* duration (ms). The runner uses it for
//! progress math only; it is never compared against the wall clock.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt, join_all};

use crate::cancel::{CancellationToken, sleep_or_cancel};
use crate::error::{ActionError, ActionResult, TimelineError};

/// Shared handle to any action
pub type ArcAction = Arc<dyn TimelineAction>;

/// Async body of a callback action
pub type CallbackFn = Arc<dyn Fn() -> BoxFuture<'static, ActionResult> + Send + Sync>;

/// Branch selector of a conditional action
pub type ConditionFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Per-iteration hook of a loop action
pub type IterationFn = Arc<dyn Fn(u32) + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Action type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Delay,
    Parallel,
    Loop,
    Conditional,
    Callback,
    Sequence,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Parallel => "parallel",
            Self::Loop => "loop",
            Self::Conditional => "conditional",
            Self::Callback => "callback",
            Self::Sequence => "sequence",
        }
    }
}

/// A unit of timeline work
pub trait TimelineAction: Send + Sync {
    /// Unique action id
    fn id(&self) -> &str;

    /// Type tag
    fn kind(&self) -> ActionKind;

    /// Declared duration in milliseconds
    fn duration(&self) -> f64;

    /// Informational priority; never affects execution order
    fn priority(&self) -> Option<i32> {
        None
    }

    /// Run the action, honouring `token` at suspension points
    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult>;
}

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_action_id(kind: ActionKind) -> String {
    let n = NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}", kind.as_str(), n)
}

/// Sum of declared durations
pub fn total_duration(actions: &[ArcAction]) -> f64 {
    actions.iter().map(|a| a.duration()).sum()
}

/// Run `actions` in order, stopping quietly once `token` is cancelled
async fn run_sequential(actions: &[ArcAction], token: &CancellationToken) -> ActionResult {
    for action in actions {
        if token.is_cancelled() {
            return Ok(());
        }
        action
            .execute(token)
            .await
            .map_err(|e| child_failure(action.as_ref(), e))?;
    }
    Ok(())
}

fn child_failure(action: &dyn TimelineAction, source: ActionError) -> ActionError {
    Box::new(TimelineError::action_failed(action.id(), source))
}

/// Common id/priority bookkeeping
#[derive(Debug, Clone)]
struct ActionMeta {
    id: String,
    priority: Option<i32>,
}

impl ActionMeta {
    fn new(kind: ActionKind) -> Self {
        Self {
            id: next_action_id(kind),
            priority: None,
        }
    }
}

macro_rules! impl_meta_builders {
    ($ty:ty) => {
        impl $ty {
            /// Override the generated id
            pub fn with_id(mut self, id: impl Into<String>) -> Self {
                self.meta.id = id.into();
                self
            }

            /// Attach an informational priority
            pub fn with_priority(mut self, priority: i32) -> Self {
                self.meta.priority = Some(priority);
                self
            }
        }
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// DELAY
// ═══════════════════════════════════════════════════════════════════════════════

/// Wait for a fixed time; resolves early (never fails) on cancellation
#[derive(Debug, Clone)]
pub struct DelayAction {
    meta: ActionMeta,
    duration_ms: f64,
}

impl DelayAction {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            meta: ActionMeta::new(ActionKind::Delay),
            duration_ms: duration_ms.max(0.0),
        }
    }
}

impl_meta_builders!(DelayAction);

impl TimelineAction for DelayAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Delay
    }

    fn duration(&self) -> f64 {
        self.duration_ms
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        async move {
            sleep_or_cancel(self.duration_ms, token).await;
            Ok(())
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARALLEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Run children concurrently; completes when every child has settled
///
/// Children must honour cancellation, otherwise this action can hang.
pub struct ParallelAction {
    meta: ActionMeta,
    actions: Vec<ArcAction>,
}

impl ParallelAction {
    pub fn new(actions: Vec<ArcAction>) -> Self {
        Self {
            meta: ActionMeta::new(ActionKind::Parallel),
            actions,
        }
    }

    pub fn actions(&self) -> &[ArcAction] {
        &self.actions
    }
}

impl_meta_builders!(ParallelAction);

impl TimelineAction for ParallelAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Parallel
    }

    fn duration(&self) -> f64 {
        self.actions
            .iter()
            .map(|a| a.duration())
            .fold(0.0, f64::max)
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        async move {
            let results = join_all(self.actions.iter().map(|a| a.execute(token))).await;

            // First failure in declaration order wins
            for (action, result) in self.actions.iter().zip(results) {
                if let Err(e) = result {
                    return Err(child_failure(action.as_ref(), e));
                }
            }
            Ok(())
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOOP
// ═══════════════════════════════════════════════════════════════════════════════

/// Repeat a child list `count` times
pub struct LoopAction {
    meta: ActionMeta,
    count: u32,
    actions: Vec<ArcAction>,
    on_iteration: Option<IterationFn>,
}

impl LoopAction {
    pub fn new(count: u32, actions: Vec<ArcAction>) -> Self {
        Self {
            meta: ActionMeta::new(ActionKind::Loop),
            count,
            actions,
            on_iteration: None,
        }
    }

    /// Hook invoked with the iteration index before each iteration
    pub fn on_iteration<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_iteration = Some(Arc::new(hook));
        self
    }

    fn iteration_duration(&self) -> f64 {
        total_duration(&self.actions)
    }
}

impl_meta_builders!(LoopAction);

impl TimelineAction for LoopAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Loop
    }

    fn duration(&self) -> f64 {
        self.iteration_duration() * f64::from(self.count)
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        async move {
            for iteration in 0..self.count {
                if token.is_cancelled() {
                    return Ok(());
                }
                if let Some(hook) = &self.on_iteration {
                    hook(iteration);
                }
                run_sequential(&self.actions, token).await?;
            }
            Ok(())
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONDITIONAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Pick a branch at execution time
///
/// The declared duration is the longer of the two branches, whichever one
/// actually runs.
pub struct ConditionalAction {
    meta: ActionMeta,
    condition: ConditionFn,
    on_true: Vec<ArcAction>,
    on_false: Vec<ArcAction>,
}

impl ConditionalAction {
    pub fn new<F>(condition: F, on_true: Vec<ArcAction>, on_false: Vec<ArcAction>) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            meta: ActionMeta::new(ActionKind::Conditional),
            condition: Arc::new(condition),
            on_true,
            on_false,
        }
    }
}

impl_meta_builders!(ConditionalAction);

impl TimelineAction for ConditionalAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Conditional
    }

    fn duration(&self) -> f64 {
        total_duration(&self.on_true).max(total_duration(&self.on_false))
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        async move {
            let branch = if (self.condition)() {
                &self.on_true
            } else {
                &self.on_false
            };
            run_sequential(branch, token).await
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLBACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Invoke a function (sync or async)
///
/// Cancellation is checked before the call only; an async body that has
/// started runs to its own completion.
pub struct CallbackAction {
    meta: ActionMeta,
    callback: CallbackFn,
    duration_ms: f64,
}

impl CallbackAction {
    /// Infallible synchronous callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_fn(move || {
            callback();
            async { Ok(()) }
        })
    }

    /// Async callback producing an [`ActionResult`]
    pub fn from_fn<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        Self {
            meta: ActionMeta::new(ActionKind::Callback),
            callback: Arc::new(move || callback().boxed()),
            duration_ms: 0.0,
        }
    }

    /// Declare a duration for progress accounting
    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms.max(0.0);
        self
    }
}

impl_meta_builders!(CallbackAction);

impl TimelineAction for CallbackAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Callback
    }

    fn duration(&self) -> f64 {
        self.duration_ms
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        async move {
            if token.is_cancelled() {
                return Ok(());
            }
            (self.callback)().await
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEQUENCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered list run as a single action
pub struct SequenceAction {
    meta: ActionMeta,
    actions: Vec<ArcAction>,
}

impl SequenceAction {
    pub fn new(actions: Vec<ArcAction>) -> Self {
        Self {
            meta: ActionMeta::new(ActionKind::Sequence),
            actions,
        }
    }

    pub fn actions(&self) -> &[ArcAction] {
        &self.actions
    }
}

impl_meta_builders!(SequenceAction);

impl TimelineAction for SequenceAction {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Sequence
    }

    fn duration(&self) -> f64 {
        total_duration(&self.actions)
    }

    fn priority(&self) -> Option<i32> {
        self.meta.priority
    }

    fn execute<'a>(&'a self, token: &'a CancellationToken) -> BoxFuture<'a, ActionResult> {
        run_sequential(&self.actions, token).boxed()
    }
}
