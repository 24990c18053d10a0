//! StepSequencePresenter - replays spin steps against the reel view
//!
//! ## Per step
//!
//! ```text
//! RESULT:   COMMIT ──▶ highlight + hold (only when wins exist)
//! CASCADE:  REMOVAL ──▶ DROP ──▶ REFILL ──▶ COMMIT ──▶ highlight + hold
//! ```
//!
//! Phases are barriers: all tweens of a phase settle (or the run is
//! cancelled) before the next phase touches the [`SymbolMap`]. COMMIT always
//! resynchronises map and view to the server grid, so any drift introduced
//! by defensive skips earlier in the step is repaired there.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use rf_timeline::{CancellationToken, sleep_or_cancel};

use crate::geometry::{dedup_movements, dedup_positions, derive_gravity_moves};
use crate::grid::{GridSize, Position};
use crate::matrix::{grid_size, parse_matrix};
use crate::step::{CascadeStep, Movement, Refill, ResultStep, SpinStep, StepType, WinLine};
use crate::symbol_map::SymbolMap;
use crate::timing::CascadeTiming;
use crate::view::{GridView, InstanceId, Tween, TweenKind};

/// Tolerance when comparing reported win totals
const WIN_EPSILON: f64 = 1e-6;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS & RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Observable presenter output
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    /// Map and view now match the step's server grid
    GridCommitted {
        step_index: usize,
        step_type: StepType,
        matrix: String,
    },
    /// A step's wins are on screen
    WinHighlight {
        step_index: usize,
        wins: Vec<WinLine>,
        amount: f64,
    },
}

/// Event sink callback
pub type PresenterSink = Arc<dyn Fn(&PresenterEvent) + Send + Sync>;

/// Outcome of one `execute` call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PresenterSummary {
    /// Steps that ran to completion
    pub steps_presented: usize,
    /// Cumulative win of the last presented step
    pub cumulative_win: f64,
    pub cancelled: bool,
    /// Cells COMMIT had to repair
    pub drift_corrections: usize,
}

/// Presenter errors
#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    #[error("Step {step_index}: grid '{matrix}' is not rectangular")]
    InvalidGrid { step_index: usize, matrix: String },

    #[error("Step {step_index}: server grid is {found}, view is {expected}")]
    GridMismatch {
        step_index: usize,
        expected: GridSize,
        found: GridSize,
    },
}

/// Why a step stopped early
enum StepAbort {
    Cancelled,
    Failed(PresenterError),
}

impl From<PresenterError> for StepAbort {
    fn from(err: PresenterError) -> Self {
        Self::Failed(err)
    }
}

type StepResult<T> = Result<T, StepAbort>;

fn ensure_live(token: &CancellationToken) -> StepResult<()> {
    if token.is_cancelled() {
        return Err(StepAbort::Cancelled);
    }
    Ok(())
}

/// Barrier: wait for every tween, or for cancellation
async fn settle(tweens: Vec<BoxFuture<'static, ()>>, token: &CancellationToken) -> StepResult<()> {
    if !tweens.is_empty() {
        tokio::select! {
            _ = join_all(tweens) => {}
            _ = token.cancelled() => {}
        }
    }
    ensure_live(token)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRESENTER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct StepSequencePresenter {
    view: Arc<dyn GridView>,
    timing: CascadeTiming,
    sinks: Vec<PresenterSink>,
    /// Token of the in-flight `execute` call
    active: Mutex<Option<CancellationToken>>,
}

impl StepSequencePresenter {
    pub fn new(view: Arc<dyn GridView>, timing: CascadeTiming) -> Self {
        Self {
            view,
            timing,
            sinks: Vec::new(),
            active: Mutex::new(None),
        }
    }

    /// Add an event sink; sinks run in registration order
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&PresenterEvent) + Send + Sync + 'static,
    {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn timing(&self) -> &CascadeTiming {
        &self.timing
    }

    pub fn view(&self) -> &Arc<dyn GridView> {
        &self.view
    }

    /// True while an `execute` call is in flight
    pub fn is_presenting(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Cancel the in-flight `execute` call, if any
    pub fn cancel(&self) {
        let token = self.active.lock().clone();
        if let Some(token) = token {
            log::debug!("[Presenter] Cancel requested");
            token.cancel();
        }
    }

    /// Present `steps` in order
    ///
    /// A new call cancels the previous one. Cancellation is not an error:
    /// the summary reports how far the run got.
    pub async fn execute(
        &self,
        steps: &[SpinStep],
        total_win: f64,
        bet: f64,
    ) -> Result<PresenterSummary, PresenterError> {
        let token = CancellationToken::new();
        let previous = self.active.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        log::debug!(
            "[Presenter] Executing {} steps (total win {:.2}, bet {:.2})",
            steps.len(),
            total_win,
            bet
        );
        let result = self.run_steps(steps, &token).await;

        {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|current| current.ptr_eq(&token)) {
                *active = None;
            }
        }

        let summary = result?;
        if !summary.cancelled
            && summary.steps_presented > 0
            && (summary.cumulative_win - total_win).abs() > WIN_EPSILON
        {
            log::warn!(
                "[Presenter] Step cumulative win {:.2} differs from reported total {:.2}",
                summary.cumulative_win,
                total_win
            );
        }
        Ok(summary)
    }

    async fn run_steps(
        &self,
        steps: &[SpinStep],
        token: &CancellationToken,
    ) -> Result<PresenterSummary, PresenterError> {
        let mut map = SymbolMap::seed_from(self.view.as_ref());
        let mut summary = PresenterSummary::default();

        for (index, step) in steps.iter().enumerate() {
            if token.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            log::debug!("[Presenter] Step {} ({})", index, step.step_type());
            let outcome = match step {
                SpinStep::Result(result) => self.present_result(index, result, &mut map, token).await,
                SpinStep::Cascade(cascade) => {
                    self.present_cascade(index, cascade, &mut map, token).await
                }
            };

            match outcome {
                Ok(corrections) => {
                    summary.steps_presented += 1;
                    summary.cumulative_win = step.cumulative_win();
                    summary.drift_corrections += corrections;
                }
                Err(StepAbort::Cancelled) => {
                    log::debug!("[Presenter] Cancelled during step {}", index);
                    summary.cancelled = true;
                    break;
                }
                Err(StepAbort::Failed(err)) => return Err(err),
            }
        }

        Ok(summary)
    }

    fn emit(&self, event: PresenterEvent) {
        for sink in &self.sinks {
            sink(&event);
        }
    }

    // ─── RESULT ──────────────────────────────────────────────────────────────

    async fn present_result(
        &self,
        index: usize,
        step: &ResultStep,
        map: &mut SymbolMap,
        token: &CancellationToken,
    ) -> StepResult<usize> {
        let corrections = self.commit(index, StepType::Result, &step.grid, map)?;
        self.highlight(index, &step.wins, step.total_win, token).await?;
        Ok(corrections)
    }

    // ─── CASCADE ─────────────────────────────────────────────────────────────

    async fn present_cascade(
        &self,
        index: usize,
        step: &CascadeStep,
        map: &mut SymbolMap,
        token: &CancellationToken,
    ) -> StepResult<usize> {
        let removed = dedup_positions(&step.removed_positions);

        self.remove(&removed, map, token).await?;
        self.drop_survivors(step.movements.as_deref(), &removed, map, token)
            .await?;
        self.refill(&step.refills, map, token).await?;

        let corrections = self.commit(index, StepType::Cascade, &step.grid_after, map)?;
        self.highlight(index, &step.wins, step.step_win, token).await?;
        Ok(corrections)
    }

    /// Phase 1: fade out unique removed cells, then free their slots
    async fn remove(
        &self,
        removed: &[Position],
        map: &mut SymbolMap,
        token: &CancellationToken,
    ) -> StepResult<()> {
        ensure_live(token)?;

        let targets: Vec<(Position, InstanceId)> = removed
            .iter()
            .filter_map(|&pos| match map.get(pos) {
                Some(id) => Some((pos, id)),
                None => {
                    log::warn!("[Presenter] No instance at {} to remove, skipping", pos);
                    None
                }
            })
            .collect();
        log::debug!("[Presenter] Removal: {} cells", targets.len());

        let tween = Tween::new(TweenKind::FadeOut, self.timing.removal_ms);
        let tweens = targets
            .iter()
            .map(|(_, id)| self.view.animate(*id, tween))
            .collect();
        settle(tweens, token).await?;

        for (pos, id) in targets {
            map.clear(pos);
            self.view.set_visible(id, false);
        }
        Ok(())
    }

    /// Phase 2: move survivors down
    async fn drop_survivors(
        &self,
        movements: Option<&[Movement]>,
        removed: &[Position],
        map: &mut SymbolMap,
        token: &CancellationToken,
    ) -> StepResult<()> {
        ensure_live(token)?;

        let movements = match movements {
            Some(list) => dedup_movements(list),
            None => derive_gravity_moves(map.size(), removed).moves,
        };

        let planned: Vec<(Movement, InstanceId)> = movements
            .into_iter()
            .filter_map(|movement| {
                if !map.in_bounds(movement.to) {
                    log::warn!("[Presenter] Drop target {} outside grid, skipping", movement.to);
                    return None;
                }
                match map.get(movement.from) {
                    Some(id) => Some((movement, id)),
                    None => {
                        log::warn!("[Presenter] No instance at drop source {}, skipping", movement.from);
                        None
                    }
                }
            })
            .collect();
        log::debug!("[Presenter] Drop: {} moves", planned.len());

        let tweens = planned
            .iter()
            .filter(|(movement, _)| !movement.is_noop())
            .map(|(movement, id)| {
                let kind = TweenKind::MoveTo {
                    row: movement.to.row as f64,
                };
                self.view.animate(*id, Tween::new(kind, self.timing.drop_ms))
            })
            .collect();

        // Two passes so chained moves never overwrite a not-yet-moved source
        for (movement, _) in &planned {
            map.clear(movement.from);
        }
        for (movement, id) in &planned {
            let previous = map.set(movement.to, Some(*id));
            if let Some(previous) = previous.filter(|previous| previous != id) {
                log::warn!(
                    "[Presenter] Drop target {} still owned by {}, overwriting",
                    movement.to,
                    previous
                );
            }
        }

        settle(tweens, token).await
    }

    /// Phase 3: bring spare instances in from above
    async fn refill(
        &self,
        refills: &[Refill],
        map: &mut SymbolMap,
        token: &CancellationToken,
    ) -> StepResult<()> {
        ensure_live(token)?;

        let rows = map.size().rows as f64;
        let mut claimed: HashSet<InstanceId> = HashSet::new();
        let mut tweens = Vec::with_capacity(refills.len());

        for (i, refill) in refills.iter().enumerate() {
            ensure_live(token)?;

            let pos = refill.position;
            if !map.in_bounds(pos) {
                log::warn!("[Presenter] Refill at {} outside grid, skipping", pos);
                continue;
            }
            let Some(id) = self.claim_instance(pos, map, &claimed) else {
                log::warn!("[Presenter] No instance available for refill at {}, skipping", pos);
                continue;
            };
            claimed.insert(id);

            if let Some(old) = map.position_of(id) {
                map.clear(old);
            }
            map.set(pos, Some(id));

            self.view.set_symbol(id, &refill.symbol);
            self.view.set_row(id, pos.row as f64 - rows);
            self.view.set_alpha(id, 1.0);
            self.view.set_visible(id, true);

            let tween = Tween::new(
                TweenKind::MoveTo {
                    row: pos.row as f64,
                },
                self.timing.refill_ms,
            )
            .with_delay(self.timing.refill_delay_ms(i));
            tweens.push(self.view.animate(id, tween));
        }
        log::debug!("[Presenter] Refill: {} instances", tweens.len());

        settle(tweens, token).await
    }

    /// Hidden, unowned, unclaimed instance of the reel, else the one on `pos`
    fn claim_instance(
        &self,
        pos: Position,
        map: &SymbolMap,
        claimed: &HashSet<InstanceId>,
    ) -> Option<InstanceId> {
        let pool = self.view.column_pool(pos.col);

        let spare = pool.iter().copied().find(|id| {
            !claimed.contains(id)
                && !map.contains_instance(*id)
                && self.view.instance(*id).is_some_and(|inst| !inst.visible)
        });
        if spare.is_some() {
            return spare;
        }

        let reclaimed = map
            .get(pos)
            .filter(|id| !claimed.contains(id))
            .or_else(|| {
                pool.iter().copied().find(|id| {
                    !claimed.contains(id)
                        && self
                            .view
                            .instance(*id)
                            .is_some_and(|inst| inst.nominal_row() == Some(pos.row))
                })
            });
        if let Some(id) = reclaimed {
            log::warn!(
                "[Presenter] No spare instance in reel {}, reclaiming {} at {}",
                pos.col,
                id,
                pos
            );
        }
        reclaimed
    }

    // ─── COMMIT ──────────────────────────────────────────────────────────────

    /// Phase 4: force map and view onto the server grid
    ///
    /// Returns the number of cells (and stray instances) that needed repair.
    fn commit(
        &self,
        index: usize,
        step_type: StepType,
        grid: &str,
        map: &mut SymbolMap,
    ) -> Result<usize, PresenterError> {
        let matrix = parse_matrix(grid);
        let expected = map.size();
        let found = grid_size(&matrix).ok_or_else(|| PresenterError::InvalidGrid {
            step_index: index,
            matrix: grid.to_string(),
        })?;
        if found != expected {
            return Err(PresenterError::GridMismatch {
                step_index: index,
                expected,
                found,
            });
        }

        // An instance owns at most one cell; later duplicates are dropped
        let mut owned = HashSet::new();
        for pos in expected.positions() {
            let duplicate = map.get(pos).is_some_and(|id| !owned.insert(id));
            if duplicate {
                map.clear(pos);
            }
        }

        let mut corrections = 0;
        for pos in expected.positions() {
            let symbol = &matrix[pos.row][pos.col];

            let (id, mut drifted) = match map.get(pos) {
                Some(id) => (id, false),
                None => match self.free_instance(pos.col, map) {
                    Some(id) => {
                        map.set(pos, Some(id));
                        (id, true)
                    }
                    None => {
                        log::warn!("[Presenter] No instance left for {} at commit, skipping", pos);
                        continue;
                    }
                },
            };

            let Some(inst) = self.view.instance(id) else {
                log::warn!("[Presenter] View lost instance {} at {}", id, pos);
                map.clear(pos);
                continue;
            };
            if inst.symbol != *symbol {
                self.view.set_symbol(id, symbol);
                drifted = true;
            }
            if !inst.is_settled_at(pos.row) {
                self.view.set_row(id, pos.row as f64);
                self.view.set_alpha(id, 1.0);
                self.view.set_visible(id, true);
                drifted = true;
            }
            if drifted {
                corrections += 1;
            }
        }

        for col in 0..expected.cols {
            for id in self.view.column_pool(col) {
                let stray = !map.contains_instance(id)
                    && self.view.instance(id).is_some_and(|inst| inst.visible);
                if stray {
                    self.view.set_visible(id, false);
                    corrections += 1;
                }
            }
        }

        if corrections > 0 {
            log::debug!("[Presenter] Commit of step {} repaired {} cells", index, corrections);
        }
        self.emit(PresenterEvent::GridCommitted {
            step_index: index,
            step_type,
            matrix: grid.to_string(),
        });
        Ok(corrections)
    }

    fn free_instance(&self, col: usize, map: &SymbolMap) -> Option<InstanceId> {
        self.view
            .column_pool(col)
            .into_iter()
            .find(|id| !map.contains_instance(*id))
    }

    /// Emit a highlight and hold it; no-op without wins
    async fn highlight(
        &self,
        index: usize,
        wins: &[WinLine],
        amount: f64,
        token: &CancellationToken,
    ) -> StepResult<()> {
        if wins.is_empty() {
            return Ok(());
        }
        self.emit(PresenterEvent::WinHighlight {
            step_index: index,
            wins: wins.to_vec(),
            amount,
        });
        sleep_or_cancel(self.timing.win_display_ms(wins.len()), token).await;
        ensure_live(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGridView;
    use std::time::Duration;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    fn win(symbol: &str, amount: f64) -> WinLine {
        WinLine {
            symbol: symbol.into(),
            positions: vec![pos(0, 0)],
            amount,
            line_id: None,
        }
    }

    fn result(grid: &str, wins: Vec<WinLine>) -> SpinStep {
        let total_win = wins.iter().map(|w| w.amount).sum();
        SpinStep::Result(ResultStep {
            grid: grid.into(),
            wins,
            total_win,
        })
    }

    fn cascade(
        before: &str,
        removed: Vec<Position>,
        movements: Option<Vec<Movement>>,
        refills: Vec<(Position, &str)>,
        after: &str,
    ) -> SpinStep {
        SpinStep::Cascade(CascadeStep {
            grid_before: before.into(),
            removed_positions: removed,
            movements,
            refills: refills
                .into_iter()
                .map(|(position, symbol)| Refill {
                    position,
                    symbol: symbol.into(),
                })
                .collect(),
            grid_after: after.into(),
            wins: Vec::new(),
            step_win: 0.0,
            cumulative_win: 0.0,
        })
    }

    fn presenter(
        view: &HeadlessGridView,
        timing: CascadeTiming,
    ) -> (StepSequencePresenter, Arc<Mutex<Vec<PresenterEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let presenter = StepSequencePresenter::new(Arc::new(view.clone()), timing)
            .with_sink(move |event| sink.lock().push(event.clone()));
        (presenter, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_with_duplicate_removals_and_gravity() {
        let view = HeadlessGridView::from_matrix("ABC;DEF;GHI", 0).unwrap();
        let (presenter, events) = presenter(&view, CascadeTiming::turbo());

        let steps = vec![cascade(
            "ABC;DEF;GHI",
            vec![pos(2, 0), pos(2, 0), pos(1, 1)],
            None,
            vec![(pos(0, 0), "X"), (pos(0, 1), "Y")],
            "XYC;ABF;DHI",
        )];

        let summary = presenter.execute(&steps, 0.0, 1.0).await.unwrap();
        assert_eq!(view.matrix(), "XYC;ABF;DHI");
        assert_eq!(summary.steps_presented, 1);
        assert_eq!(summary.drift_corrections, 0);
        assert!(!summary.cancelled);

        // Two unique removals fade out, not three
        let fades = view
            .tween_log()
            .iter()
            .filter(|(_, tween)| tween.kind == TweenKind::FadeOut)
            .count();
        assert_eq!(fades, 2);

        assert!(matches!(
            events.lock().as_slice(),
            [PresenterEvent::GridCommitted { step_index: 0, step_type: StepType::Cascade, .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_with_server_movements() {
        let view = HeadlessGridView::from_matrix("AB;CD", 1).unwrap();
        let (presenter, _) = presenter(&view, CascadeTiming::turbo());

        let drop = Movement::new(pos(0, 1), pos(1, 1));
        let steps = vec![cascade(
            "AB;CD",
            vec![pos(1, 1)],
            Some(vec![drop, drop]),
            vec![(pos(0, 1), "Q")],
            "AQ;CB",
        )];

        let summary = presenter.execute(&steps, 0.0, 1.0).await.unwrap();
        assert_eq!(view.matrix(), "AQ;CB");
        assert_eq!(summary.drift_corrections, 0);

        // fade + one drop + one refill entrance
        assert_eq!(view.tween_log().len(), 3);
        for cell in [pos(0, 0), pos(0, 1), pos(1, 0), pos(1, 1)] {
            assert_eq!(view.visible_at(cell), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chained_server_moves_in_one_reel() {
        let view = HeadlessGridView::from_matrix("A;B;C", 1).unwrap();
        let (presenter, _) = presenter(&view, CascadeTiming::turbo());

        // (1,0) is both a destination and a source
        let steps = vec![cascade(
            "A;B;C",
            vec![pos(2, 0)],
            Some(vec![
                Movement::new(pos(1, 0), pos(2, 0)),
                Movement::new(pos(0, 0), pos(1, 0)),
            ]),
            vec![(pos(0, 0), "Z")],
            "Z;A;B",
        )];

        let summary = presenter.execute(&steps, 0.0, 1.0).await.unwrap();
        assert_eq!(view.matrix(), "Z;A;B");
        assert_eq!(summary.drift_corrections, 0);

        let drops: Vec<f64> = view
            .tween_log()
            .iter()
            .filter_map(|(_, tween)| match tween.kind {
                TweenKind::MoveTo { row } if tween.delay_ms == 0.0 && row > 0.0 => Some(row),
                _ => None,
            })
            .collect();
        assert_eq!(drops, vec![2.0, 1.0]);
        for row in 0..3 {
            assert_eq!(view.visible_at(pos(row, 0)), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_reclaims_owner_and_staggers_entrance() {
        let view = HeadlessGridView::from_matrix("AB;CD", 0).unwrap();
        let timing = CascadeTiming::turbo();
        let (presenter, _) = presenter(&view, timing.clone());

        let top = view.instance_at(pos(0, 0)).unwrap();
        let bottom = view.instance_at(pos(1, 0)).unwrap();

        // No removals and no spares: both refills must reclaim the cell owner
        let steps = vec![cascade(
            "AB;CD",
            Vec::new(),
            None,
            vec![(pos(0, 0), "X"), (pos(1, 0), "Y")],
            "XB;YD",
        )];

        let observe = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            (
                view.instance(top).unwrap().row,
                view.instance(bottom).unwrap().row,
            )
        };
        let (summary, (top_row, bottom_row)) =
            tokio::join!(presenter.execute(&steps, 0.0, 1.0), observe);
        let summary = summary.unwrap();

        // Entrances start one grid height above their target
        assert_eq!(top_row, -2.0);
        assert_eq!(bottom_row, -1.0);

        assert_eq!(view.matrix(), "XB;YD");
        assert_eq!(summary.drift_corrections, 0);

        let entrances: Vec<(InstanceId, f64)> = view
            .tween_log()
            .iter()
            .filter(|(_, tween)| matches!(tween.kind, TweenKind::MoveTo { .. }))
            .map(|(id, tween)| (*id, tween.delay_ms))
            .collect();
        assert_eq!(
            entrances,
            vec![(top, 0.0), (bottom, timing.refill_stagger_ms)]
        );
        assert_eq!(timing.refill_stagger_ms, 15.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_repairs_missing_refill() {
        let view = HeadlessGridView::from_matrix("AB;CD", 0).unwrap();
        let (presenter, _) = presenter(&view, CascadeTiming::instant());

        // Server forgot the refill for (0,0)
        let steps = vec![cascade("AB;CD", vec![pos(0, 0)], None, Vec::new(), "ZB;CD")];

        let summary = presenter.execute(&steps, 0.0, 1.0).await.unwrap();
        assert_eq!(view.matrix(), "ZB;CD");
        assert_eq!(summary.drift_corrections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_step_holds_only_with_wins() {
        let view = HeadlessGridView::from_matrix("AB;CD", 0).unwrap();
        let (presenter, events) = presenter(&view, CascadeTiming::normal());

        let start = tokio::time::Instant::now();
        presenter
            .execute(&[result("AB;CD", Vec::new())], 0.0, 1.0)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(events.lock().len(), 1);

        let start = tokio::time::Instant::now();
        let summary = presenter
            .execute(&[result("AB;CD", vec![win("A", 2.0), win("B", 3.0)])], 5.0, 1.0)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(summary.cumulative_win, 5.0);

        let events = events.lock();
        assert!(matches!(
            events[2],
            PresenterEvent::WinHighlight { step_index: 0, amount, .. } if amount == 5.0
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_step_resyncs_blank_view() {
        let view = HeadlessGridView::new(GridSize::new(2, 2), 0);
        let (presenter, _) = presenter(&view, CascadeTiming::instant());

        let summary = presenter
            .execute(&[result("KQ;JA", Vec::new())], 0.0, 1.0)
            .await
            .unwrap();
        assert_eq!(view.matrix(), "KQ;JA");
        assert_eq!(summary.drift_corrections, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_in_flight_run() {
        let view = HeadlessGridView::from_matrix("AB;CD", 0).unwrap();
        let (presenter, _) = presenter(&view, CascadeTiming::normal());
        let presenter = Arc::new(presenter);

        let steps = vec![
            result("AB;CD", vec![win("A", 1.0)]),
            cascade("AB;CD", vec![pos(0, 0)], None, vec![(pos(0, 0), "Z")], "ZB;CD"),
        ];
        let running = Arc::clone(&presenter);
        let handle = tokio::spawn(async move { running.execute(&steps, 1.0, 1.0).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(presenter.is_presenting());
        presenter.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.steps_presented, 0);
        assert!(!presenter.is_presenting());
        assert_eq!(view.matrix(), "AB;CD");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grid_size_mismatch_fails() {
        let view = HeadlessGridView::from_matrix("AB;CD", 0).unwrap();
        let (presenter, _) = presenter(&view, CascadeTiming::instant());

        let err = presenter
            .execute(&[result("ABC;DEF", Vec::new())], 0.0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PresenterError::GridMismatch { step_index: 0, .. }));
        assert!(!presenter.is_presenting());
    }
}
