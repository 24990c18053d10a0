//! TimelineRunner - drives one ordered action list
//!
//! ## State machine
//!
//! ```text
//!   Idle ──start()──▶ Running ◀──resume()── Paused
//!                        │  └────pause()────▶ │
//!                        │
//!          ┌─────────────┼──────────────┐
//!          v             v              v
//!      Completed      Stopped        Failed
//!   (on_complete)   (stop(), no   (on_error, error
//!                    callback)     returned by start)
//! ```
//!
//! `elapsed_time` only advances by the declared duration of completed
//! actions, so progress is deterministic regardless of scheduling jitter.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::action::{ArcAction, total_duration};
use crate::cancel::CancellationToken;
use crate::error::TimelineError;

/// Poll interval while paused (one 60 Hz frame)
pub const PAUSE_POLL_MS: u64 = 16;

/// Progress observer, receives 0.0..=1.0
pub type UpdateFn = Box<dyn Fn(f64) + Send + Sync>;
/// Completion observer
pub type CompleteFn = Box<dyn Fn() + Send + Sync>;
/// Failure observer
pub type ErrorFn = Box<dyn Fn(&TimelineError) + Send + Sync>;

/// Observable runner state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineState {
    pub is_running: bool,
    pub is_paused: bool,
    pub is_failed: bool,
    pub current_action_index: usize,
    /// Sum of declared durations of completed actions (ms)
    pub elapsed_time: f64,
    /// Sum of declared durations of all actions (ms)
    pub total_duration: f64,
    pub last_error: Option<String>,
}

impl TimelineState {
    /// `elapsed / total`, clamped to [0, 1]; 0 for an empty timeline
    pub fn progress(&self) -> f64 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.elapsed_time / self.total_duration).clamp(0.0, 1.0)
    }
}

#[derive(Default)]
struct RunnerCallbacks {
    on_update: Option<UpdateFn>,
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
}

/// Sequential timeline executor
pub struct TimelineRunner {
    actions: RwLock<Vec<ArcAction>>,
    state: Mutex<TimelineState>,
    token: Mutex<Option<CancellationToken>>,
    looping: bool,
    callbacks: RunnerCallbacks,
}

impl TimelineRunner {
    /// Create a runner over `actions`
    pub fn new(actions: Vec<ArcAction>) -> Self {
        let total = total_duration(&actions);
        Self {
            actions: RwLock::new(actions),
            state: Mutex::new(TimelineState {
                total_duration: total,
                ..Default::default()
            }),
            token: Mutex::new(None),
            looping: false,
            callbacks: RunnerCallbacks::default(),
        }
    }

    /// Repeat the whole list until stopped
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Observe progress after each completed action
    pub fn on_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.callbacks.on_update = Some(Box::new(callback));
        self
    }

    /// Observe a successful full pass (never fires after stop or failure)
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_complete = Some(Box::new(callback));
        self
    }

    /// Observe the fatal action error before it is returned from `start()`
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TimelineError) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Box::new(callback));
        self
    }

    /// Replace the action list; ignored while running
    pub fn set_actions(&self, actions: Vec<ArcAction>) -> bool {
        let mut state = self.state.lock();
        if state.is_running {
            log::warn!("[Timeline] set_actions ignored while running");
            return false;
        }
        state.total_duration = total_duration(&actions);
        state.current_action_index = 0;
        state.elapsed_time = 0.0;
        *self.actions.write() = actions;
        true
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }

    /// Run the timeline to completion, stop, or failure
    ///
    /// No-op when already running. A failing action marks the runner Failed,
    /// fires `on_error` and returns the error; callers own recovery.
    pub async fn start(&self) -> Result<(), TimelineError> {
        let token = {
            let mut state = self.state.lock();
            if state.is_running {
                log::debug!("[Timeline] start() ignored, already running");
                return Ok(());
            }
            *state = TimelineState {
                is_running: true,
                total_duration: total_duration(&self.actions.read()),
                ..Default::default()
            };

            let token = CancellationToken::new();
            *self.token.lock() = Some(token.clone());
            token
        };

        log::debug!("[Timeline] started ({} actions)", self.len());

        loop {
            self.run_pass(&token).await?;

            let again = {
                let mut state = self.state.lock();
                let again = self.looping
                    && state.is_running
                    && !state.is_failed
                    && !self.actions.read().is_empty();
                if again {
                    state.current_action_index = 0;
                    state.elapsed_time = 0.0;
                }
                again
            };

            if !again {
                break;
            }
            tokio::task::yield_now().await;
        }

        let completed = {
            let mut state = self.state.lock();
            let completed = state.is_running && !state.is_failed;
            state.is_running = false;
            state.is_paused = false;
            completed
        };

        if completed {
            log::debug!("[Timeline] completed");
            if let Some(cb) = &self.callbacks.on_complete {
                cb();
            }
        }
        Ok(())
    }

    async fn run_pass(&self, token: &CancellationToken) -> Result<(), TimelineError> {
        loop {
            while self.is_paused() {
                tokio::time::sleep(Duration::from_millis(PAUSE_POLL_MS)).await;
            }

            let (index, action) = {
                let state = self.state.lock();
                if !state.is_running {
                    return Ok(());
                }
                let actions = self.actions.read();
                match actions.get(state.current_action_index) {
                    Some(action) => (state.current_action_index, ArcAction::clone(action)),
                    None => return Ok(()),
                }
            };

            if let Err(source) = action.execute(token).await {
                // An action that bails out with Cancelled after stop() is not a failure
                let cancelled = matches!(
                    source.downcast_ref::<TimelineError>(),
                    Some(TimelineError::Cancelled)
                );
                if cancelled && token.is_cancelled() {
                    return Ok(());
                }
                return Err(self.fail(TimelineError::action_failed(action.id(), source)));
            }

            let progress = {
                let mut state = self.state.lock();
                if !state.is_running {
                    return Ok(());
                }
                // skip_to() during execution already moved the cursor
                if state.current_action_index == index {
                    state.current_action_index += 1;
                    state.elapsed_time += action.duration();
                }
                state.progress()
            };

            if let Some(cb) = &self.callbacks.on_update {
                cb(progress);
            }
        }
    }

    fn fail(&self, error: TimelineError) -> TimelineError {
        {
            let mut state = self.state.lock();
            state.is_failed = true;
            state.is_running = false;
            state.is_paused = false;
            state.last_error = Some(error.to_string());
        }
        log::error!("[Timeline] {}", error);

        if let Some(cb) = &self.callbacks.on_error {
            cb(&error);
        }
        error
    }

    /// Pause between actions; only effective while running
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.is_running {
            state.is_paused = true;
        }
    }

    /// Resume after pause; only effective while running
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if state.is_running {
            state.is_paused = false;
        }
    }

    /// Stop and cancel the active token
    ///
    /// Actions that ignore their token keep running until they settle on
    /// their own; the runner will not start another one.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            state.is_running = false;
            state.is_paused = false;
        }
        if let Some(token) = self.token.lock().as_ref() {
            token.cancel();
        }
    }

    /// Move the cursor to `index`; out-of-range input is ignored
    pub fn skip_to(&self, index: usize) {
        let actions = self.actions.read();
        if index >= actions.len() {
            log::debug!(
                "[Timeline] skip_to({}) out of range ({} actions), ignored",
                index,
                actions.len()
            );
            return;
        }
        let elapsed = total_duration(&actions[..index]);
        drop(actions);

        let mut state = self.state.lock();
        state.current_action_index = index;
        state.elapsed_time = elapsed;
    }

    /// Return a finished or failed runner to Idle
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.is_running {
            return;
        }
        *state = TimelineState {
            total_duration: total_duration(&self.actions.read()),
            ..Default::default()
        };
    }

    /// Snapshot of the current state
    pub fn state(&self) -> TimelineState {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_running
    }

    pub fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.is_running && state.is_paused
    }

    pub fn is_failed(&self) -> bool {
        self.state.lock().is_failed
    }

    /// Deterministic progress in [0, 1]
    pub fn progress(&self) -> f64 {
        self.state.lock().progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CallbackAction, DelayAction, TimelineAction};
    use crate::builder::SequenceBuilder;
    use crate::error::ActionError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_actions_in_order_and_completes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let completions = counter();
        let done = Arc::clone(&completions);

        let actions = SequenceBuilder::new()
            .call(move || a.lock().push(1))
            .delay(100.0)
            .call(move || b.lock().push(2))
            .build();

        let runner = TimelineRunner::new(actions).on_complete(move || {
            done.fetch_add(1, Ordering::SeqCst);
        });
        runner.start().await.unwrap();

        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        let state = runner.state();
        assert!(!state.is_running);
        assert_eq!(state.current_action_index, 3);
        assert_eq!(state.elapsed_time, 100.0);
        assert_eq!(runner.progress(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_follows_declared_durations() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);

        let actions = SequenceBuilder::new()
            .delay(100.0)
            .call_timed(|| {}, 300.0)
            .build();

        let runner = TimelineRunner::new(actions).on_update(move |p| sink.lock().push(p));
        runner.start().await.unwrap();

        assert_eq!(*updates.lock(), vec![0.25, 1.0]);
    }

    #[test]
    fn test_progress_zero_for_empty_timeline() {
        let runner = TimelineRunner::new(Vec::new());
        assert_eq!(runner.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_failure_marks_failed_and_returns_error() {
        let errors = counter();
        let seen = Arc::clone(&errors);
        let completions = counter();
        let done = Arc::clone(&completions);

        let actions = SequenceBuilder::new()
            .add(CallbackAction::from_fn(|| async { Err("reel view gone".into()) }).with_id("explode"))
            .call(|| panic!("must not run"))
            .build();

        let runner = TimelineRunner::new(actions)
            .on_error(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .on_complete(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });

        let err = runner.start().await.unwrap_err();
        assert!(matches!(err, TimelineError::ActionFailed { ref action_id, .. } if action_id == "explode"));

        let state = runner.state();
        assert!(state.is_failed);
        assert!(!state.is_running);
        assert!(state.last_error.unwrap().contains("reel view gone"));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        runner.reset();
        assert!(!runner.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_delay() {
        let completions = counter();
        let done = Arc::clone(&completions);
        let runner = Arc::new(
            TimelineRunner::new(SequenceBuilder::new().delay(60_000.0).delay(60_000.0).build())
                .on_complete(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                }),
        );

        let stopper = Arc::clone(&runner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.stop();
        });

        let started = tokio::time::Instant::now();
        runner.start().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!runner.is_running());
        assert!(!runner.is_failed());
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let runs = counter();
        let hits = Arc::clone(&runs);
        let runner = Arc::new(TimelineRunner::new(
            SequenceBuilder::new()
                .call(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .delay(500.0)
                .build(),
        ));

        let first = Arc::clone(&runner);
        let handle = tokio::spawn(async move { first.start().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        runner.start().await.unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_next_action() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let runner = Arc::new(TimelineRunner::new(
            SequenceBuilder::new()
                .delay(100.0)
                .call(move || sink.lock().push("after"))
                .build(),
        ));

        let driver = Arc::clone(&runner);
        let handle = tokio::spawn(async move { driver.start().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        runner.pause();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(runner.is_paused());
        assert!(log.lock().is_empty());

        runner.resume();
        handle.await.unwrap().unwrap();
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn test_pause_ignored_when_idle() {
        let runner = TimelineRunner::new(Vec::new());
        runner.pause();
        assert!(!runner.state().is_paused);
    }

    #[test]
    fn test_skip_to_clamps_silently() {
        let runner = TimelineRunner::new(SequenceBuilder::new().delay(100.0).delay(50.0).build());

        runner.skip_to(5);
        assert_eq!(runner.state().current_action_index, 0);

        runner.skip_to(1);
        let state = runner.state();
        assert_eq!(state.current_action_index, 1);
        assert_eq!(state.elapsed_time, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_repeats_until_stopped() {
        let passes = counter();
        let hits = Arc::clone(&passes);
        let completions = counter();
        let done = Arc::clone(&completions);

        let runner = Arc::new(
            TimelineRunner::new(
                SequenceBuilder::new()
                    .call(move || {
                        hits.fetch_add(1, Ordering::SeqCst);
                    })
                    .delay(100.0)
                    .build(),
            )
            .with_loop(true)
            .on_complete(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let stopper = Arc::clone(&runner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            stopper.stop();
        });
        runner.start().await.unwrap();

        assert_eq!(passes.load(Ordering::SeqCst), 4);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_error_after_stop_is_not_failure() {
        let runner = Arc::new(TimelineRunner::new(Vec::new()));
        let handle = Arc::downgrade(&runner);
        let action = CallbackAction::from_fn(move || {
            let runner = handle.upgrade();
            async move {
                if let Some(runner) = runner {
                    runner.stop();
                }
                let err: ActionError = Box::new(TimelineError::Cancelled);
                Err(err)
            }
        });
        assert_eq!(action.duration(), 0.0);
        runner.set_actions(vec![Arc::new(action), Arc::new(DelayAction::new(10.0))]);

        runner.start().await.unwrap();
        assert!(!runner.is_failed());

        // The action only holds a weak handle, so the runner is freed
        let weak = Arc::downgrade(&runner);
        drop(runner);
        assert!(weak.upgrade().is_none());
    }
}
