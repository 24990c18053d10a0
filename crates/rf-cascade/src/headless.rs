//! HeadlessGridView - in-memory reel view
//!
//! Drives the presenter without a renderer. Tweens settle after their
//! declared time on the tokio clock and then jump to their end state, so
//! paused-clock tests run instantly and deterministically.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rf_timeline::duration_from_ms;

use crate::grid::{GridSize, Position};
use crate::ingest::IngestError;
use crate::matrix::{format_matrix, grid_size, parse_matrix};
use crate::view::{GridView, InstanceId, Tween, TweenKind, VisualInstance};

/// Cell marker for an empty slot in [`HeadlessGridView::matrix`]
pub const EMPTY_CELL: &str = "_";

#[derive(Debug)]
struct HeadlessState {
    instances: Vec<VisualInstance>,
    tweens: Vec<(InstanceId, Tween)>,
}

impl HeadlessState {
    fn get_mut(&mut self, id: InstanceId) -> Option<&mut VisualInstance> {
        self.instances.get_mut(id.0)
    }

    fn settle(&mut self, id: InstanceId, kind: TweenKind) {
        let Some(inst) = self.get_mut(id) else {
            return;
        };
        match kind {
            TweenKind::FadeOut => inst.alpha = 0.0,
            TweenKind::FadeIn => inst.alpha = 1.0,
            TweenKind::MoveTo { row } => inst.row = row,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessGridView {
    size: GridSize,
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessGridView {
    /// Blank view: one visible instance per cell plus hidden spares per reel
    ///
    /// Ids are column-major: reel `c` owns `c * (rows + spare) ..`.
    pub fn new(size: GridSize, spare_per_column: usize) -> Self {
        let per_column = size.rows + spare_per_column;
        let mut instances = Vec::with_capacity(per_column * size.cols);

        for col in 0..size.cols {
            for slot in 0..per_column {
                let on_grid = slot < size.rows;
                instances.push(VisualInstance {
                    id: InstanceId(instances.len()),
                    col,
                    row: if on_grid { slot as f64 } else { -1.0 },
                    visible: on_grid,
                    alpha: if on_grid { 1.0 } else { 0.0 },
                    symbol: String::new(),
                });
            }
        }

        Self {
            size,
            state: Arc::new(Mutex::new(HeadlessState {
                instances,
                tweens: Vec::new(),
            })),
        }
    }

    /// View showing `matrix`
    pub fn from_matrix(matrix: &str, spare_per_column: usize) -> Result<Self, IngestError> {
        let grid = parse_matrix(matrix);
        let size = grid_size(&grid).ok_or(IngestError::InvalidGrid {
            index: 0,
            field: "matrix",
        })?;

        let view = Self::new(size, spare_per_column);
        for pos in size.positions() {
            if let Some(id) = view.instance_at(pos) {
                view.set_symbol(id, &grid[pos.row][pos.col]);
            }
        }
        Ok(view)
    }

    /// Visible symbols as a matrix string, `_` where nothing rests
    pub fn matrix(&self) -> String {
        let state = self.state.lock();
        let mut rows = vec![vec![EMPTY_CELL.to_string(); self.size.cols]; self.size.rows];

        for inst in state.instances.iter().filter(|inst| inst.visible) {
            if let Some(cell) = inst.nominal_row().and_then(|row| rows.get_mut(row)) {
                cell[inst.col] = inst.symbol.clone();
            }
        }
        format_matrix(&rows)
    }

    /// Every tween requested so far
    pub fn tween_log(&self) -> Vec<(InstanceId, Tween)> {
        self.state.lock().tweens.clone()
    }

    pub fn clear_tween_log(&self) {
        self.state.lock().tweens.clear();
    }

    pub fn instances(&self) -> Vec<VisualInstance> {
        self.state.lock().instances.clone()
    }

    /// Visible instances resting on `pos`
    pub fn visible_at(&self, pos: Position) -> usize {
        self.state
            .lock()
            .instances
            .iter()
            .filter(|inst| inst.visible && inst.col == pos.col && inst.nominal_row() == Some(pos.row))
            .count()
    }
}

impl GridView for HeadlessGridView {
    fn size(&self) -> GridSize {
        self.size
    }

    fn instance(&self, id: InstanceId) -> Option<VisualInstance> {
        self.state.lock().instances.get(id.0).cloned()
    }

    fn column_pool(&self, col: usize) -> Vec<InstanceId> {
        self.state
            .lock()
            .instances
            .iter()
            .filter(|inst| inst.col == col)
            .map(|inst| inst.id)
            .collect()
    }

    fn set_symbol(&self, id: InstanceId, symbol: &str) {
        if let Some(inst) = self.state.lock().get_mut(id) {
            inst.symbol = symbol.to_string();
        }
    }

    fn set_visible(&self, id: InstanceId, visible: bool) {
        if let Some(inst) = self.state.lock().get_mut(id) {
            inst.visible = visible;
        }
    }

    fn set_alpha(&self, id: InstanceId, alpha: f64) {
        if let Some(inst) = self.state.lock().get_mut(id) {
            inst.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn set_row(&self, id: InstanceId, row: f64) {
        if let Some(inst) = self.state.lock().get_mut(id) {
            inst.row = row;
        }
    }

    fn animate(&self, id: InstanceId, tween: Tween) -> BoxFuture<'static, ()> {
        self.state.lock().tweens.push((id, tween));
        let state = Arc::clone(&self.state);

        async move {
            if let Some(wait) = duration_from_ms(tween.total_ms()) {
                tokio::time::sleep(wait).await;
            }
            state.lock().settle(id, tween.kind);
        }
        .boxed()
    }
}
