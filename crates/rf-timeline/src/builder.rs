//! SequenceBuilder - fluent assembly of ordered action lists

use std::future::Future;
use std::sync::Arc;

use crate::action::{
    ArcAction, CallbackAction, ConditionalAction, DelayAction, LoopAction, ParallelAction,
    SequenceAction, TimelineAction, total_duration,
};
use crate::error::ActionResult;

/// Fluent builder for timeline action lists
///
/// ```rust,ignore
/// let actions = SequenceBuilder::new()
///     .call(|| log::info!("spin start"))
///     .delay(200.0)
///     .parallel_calls(vec![highlight_a, highlight_b])
///     .when(|| has_feature, on_feature, Vec::new())
///     .build();
/// ```
#[derive(Default, Clone)]
pub struct SequenceBuilder {
    actions: Vec<ArcAction>,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an infallible synchronous callback
    pub fn call<F>(self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(CallbackAction::new(callback))
    }

    /// Append a synchronous callback with a declared duration
    pub fn call_timed<F>(self, callback: F, duration_ms: f64) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add(CallbackAction::new(callback).with_duration(duration_ms))
    }

    /// Append an async callback with a declared duration
    pub fn call_async<F, Fut>(self, callback: F, duration_ms: f64) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.add(CallbackAction::from_fn(callback).with_duration(duration_ms))
    }

    /// Append a step that awaits a future produced by `factory`
    ///
    /// The factory is invoked when the step runs, not when it is declared.
    pub fn await_future<F, Fut>(self, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.add(CallbackAction::from_fn(factory))
    }

    /// Append a cancellable wait
    pub fn delay(self, duration_ms: f64) -> Self {
        self.add(DelayAction::new(duration_ms))
    }

    /// Append actions that run concurrently
    pub fn parallel(self, actions: Vec<ArcAction>) -> Self {
        self.add(ParallelAction::new(actions))
    }

    /// Append synchronous callbacks that run as one parallel group
    pub fn parallel_calls<F>(self, callbacks: Vec<F>) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let actions = callbacks
            .into_iter()
            .map(|cb| Arc::new(CallbackAction::new(cb)) as ArcAction)
            .collect();
        self.parallel(actions)
    }

    /// Append a repeated group; `on_iteration` sees the iteration index
    pub fn repeat(
        self,
        count: u32,
        actions: Vec<ArcAction>,
        on_iteration: Option<Box<dyn Fn(u32) + Send + Sync>>,
    ) -> Self {
        let mut looped = LoopAction::new(count, actions);
        if let Some(hook) = on_iteration {
            looped = looped.on_iteration(hook);
        }
        self.add(looped)
    }

    /// Append a branch chosen when the step runs
    pub fn when<F>(self, condition: F, on_true: Vec<ArcAction>, on_false: Vec<ArcAction>) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.add(ConditionalAction::new(condition, on_true, on_false))
    }

    /// Append any action
    pub fn add<A>(mut self, action: A) -> Self
    where
        A: TimelineAction + 'static,
    {
        self.actions.push(Arc::new(action));
        self
    }

    /// Append already-shared actions
    pub fn add_all(mut self, actions: impl IntoIterator<Item = ArcAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of declared durations
    pub fn total_duration(&self) -> f64 {
        total_duration(&self.actions)
    }

    /// Snapshot of the accumulated list
    ///
    /// Later builder calls do not affect a snapshot already taken.
    pub fn build(&self) -> Vec<ArcAction> {
        self.actions.clone()
    }

    /// Wrap the whole list as a single sequence action
    pub fn to_action(&self) -> SequenceAction {
        SequenceAction::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::cancel::CancellationToken;
    use parking_lot::Mutex;

    #[test]
    fn test_builder_accumulates_in_order() {
        let actions = SequenceBuilder::new()
            .call(|| {})
            .delay(100.0)
            .parallel_calls(vec![(|| {}) as fn(), || {}])
            .when(|| true, Vec::new(), Vec::new())
            .repeat(2, vec![Arc::new(DelayAction::new(10.0)) as ArcAction], None)
            .build();

        let kinds: Vec<_> = actions.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Callback,
                ActionKind::Delay,
                ActionKind::Parallel,
                ActionKind::Conditional,
                ActionKind::Loop,
            ]
        );
    }

    #[test]
    fn test_build_returns_snapshot() {
        let builder = SequenceBuilder::new().delay(10.0);
        let snapshot = builder.build();
        let builder = builder.delay(20.0);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_to_action_sums_durations() {
        let builder = SequenceBuilder::new()
            .delay(100.0)
            .call_timed(|| {}, 50.0)
            .delay(25.0);

        let sequence = builder.to_action();
        assert_eq!(sequence.kind(), ActionKind::Sequence);
        assert_eq!(sequence.duration(), 175.0);
        assert_eq!(builder.total_duration(), 175.0);
    }

    #[tokio::test]
    async fn test_await_future_runs_factory_lazily() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let declared = Arc::clone(&log);

        let builder = SequenceBuilder::new().await_future(move || {
            let log = Arc::clone(&declared);
            async move {
                log.lock().push("awaited");
                Ok(())
            }
        });
        assert!(log.lock().is_empty());

        let token = CancellationToken::new();
        builder.to_action().execute(&token).await.unwrap();
        assert_eq!(*log.lock(), vec!["awaited"]);
    }
}
