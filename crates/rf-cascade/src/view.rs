//! Reel view collaborator
//!
//! The presenter never owns visuals. It addresses a pool of visual
//! instances by index through [`GridView`]; the concrete renderer (or the
//! [`HeadlessGridView`](crate::HeadlessGridView)) decides what a tween looks
//! like and resolves the returned future once it has settled.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::grid::{GridSize, Position};

/// Index into the view's instance pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of one visual symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualInstance {
    pub id: InstanceId,
    /// Reel the instance belongs to (fixed for its lifetime)
    pub col: usize,
    /// Vertical position in row units; negative is above the grid
    pub row: f64,
    pub visible: bool,
    pub alpha: f64,
    pub symbol: String,
}

impl VisualInstance {
    /// Grid row the instance sits on, if it is exactly on one
    pub fn nominal_row(&self) -> Option<usize> {
        if self.row < 0.0 || self.row.fract() != 0.0 {
            return None;
        }
        Some(self.row as usize)
    }

    /// Visible, opaque and resting on `row`
    pub fn is_settled_at(&self, row: usize) -> bool {
        self.visible && self.alpha >= 1.0 && self.nominal_row() == Some(row)
    }
}

/// What a tween animates towards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TweenKind {
    /// Alpha to 0
    FadeOut,
    /// Alpha to 1
    FadeIn,
    /// Vertical move to `row`
    MoveTo { row: f64 },
}

/// One animation request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    pub kind: TweenKind,
    pub duration_ms: f64,
    pub delay_ms: f64,
}

impl Tween {
    pub fn new(kind: TweenKind, duration_ms: f64) -> Self {
        Self {
            kind,
            duration_ms,
            delay_ms: 0.0,
        }
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Delay plus duration
    pub fn total_ms(&self) -> f64 {
        self.delay_ms + self.duration_ms
    }
}

/// Indexed access to the reel view's visual instances
///
/// Setters on unknown ids are ignored. `animate` must resolve once the
/// instance has reached the tween's end state.
pub trait GridView: Send + Sync {
    fn size(&self) -> GridSize;

    fn instance(&self, id: InstanceId) -> Option<VisualInstance>;

    /// Every instance owned by reel `col`, spares included
    fn column_pool(&self, col: usize) -> Vec<InstanceId>;

    /// Visible instance resting on `pos`
    fn instance_at(&self, pos: Position) -> Option<InstanceId> {
        self.column_pool(pos.col).into_iter().find(|id| {
            self.instance(*id)
                .is_some_and(|inst| inst.visible && inst.nominal_row() == Some(pos.row))
        })
    }

    fn set_symbol(&self, id: InstanceId, symbol: &str);

    fn set_visible(&self, id: InstanceId, visible: bool);

    fn set_alpha(&self, id: InstanceId, alpha: f64);

    fn set_row(&self, id: InstanceId, row: f64);

    fn animate(&self, id: InstanceId, tween: Tween) -> BoxFuture<'static, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(row: f64) -> VisualInstance {
        VisualInstance {
            id: InstanceId(0),
            col: 0,
            row,
            visible: true,
            alpha: 1.0,
            symbol: "A".into(),
        }
    }

    #[test]
    fn test_nominal_row() {
        assert_eq!(instance(2.0).nominal_row(), Some(2));
        assert_eq!(instance(-1.0).nominal_row(), None);
        assert_eq!(instance(0.5).nominal_row(), None);
    }

    #[test]
    fn test_settled() {
        let mut inst = instance(1.0);
        assert!(inst.is_settled_at(1));
        inst.alpha = 0.0;
        assert!(!inst.is_settled_at(1));
    }

    #[test]
    fn test_tween_total() {
        let tween = Tween::new(TweenKind::FadeIn, 200.0).with_delay(40.0);
        assert_eq!(tween.total_ms(), 240.0);
    }
}
