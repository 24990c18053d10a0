//! Spin steps - server-reported stages of one spin
//!
//! A spin is an ordered list of steps: one RESULT step (the landed grid)
//! optionally followed by CASCADE steps (remove → drop → refill cycles).

use serde::{Deserialize, Serialize};

use crate::grid::Position;

/// Step type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Result,
    Cascade,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Result => "RESULT",
            Self::Cascade => "CASCADE",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single evaluated win
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinLine {
    /// Paying symbol id
    pub symbol: String,
    /// Cells taking part in the win
    #[serde(default)]
    pub positions: Vec<Position>,
    /// Credits paid
    pub amount: f64,
    /// Payline index, when the mechanic has paylines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<u32>,
}

/// One server-supplied drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Movement {
    pub from: Position,
    pub to: Position,
}

impl Movement {
    pub const fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }

    /// Stationary moves need no tween
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// A new symbol entering from above
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refill {
    pub position: Position,
    pub symbol: String,
}

/// Landed grid of the spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStep {
    /// Matrix string
    pub grid: String,
    #[serde(default)]
    pub wins: Vec<WinLine>,
    pub total_win: f64,
}

/// One tumble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeStep {
    pub grid_before: String,
    /// May list one cell several times (one entry per win it belongs to)
    pub removed_positions: Vec<Position>,
    /// Server-computed drops; gravity is derived when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movements: Option<Vec<Movement>>,
    #[serde(default)]
    pub refills: Vec<Refill>,
    pub grid_after: String,
    #[serde(default)]
    pub wins: Vec<WinLine>,
    pub step_win: f64,
    pub cumulative_win: f64,
}

/// Tagged union of step kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpinStep {
    Result(ResultStep),
    Cascade(CascadeStep),
}

impl SpinStep {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::Result(_) => StepType::Result,
            Self::Cascade(_) => StepType::Cascade,
        }
    }

    pub fn wins(&self) -> &[WinLine] {
        match self {
            Self::Result(step) => &step.wins,
            Self::Cascade(step) => &step.wins,
        }
    }

    /// Win paid by this step alone
    pub fn step_win(&self) -> f64 {
        match self {
            Self::Result(step) => step.total_win,
            Self::Cascade(step) => step.step_win,
        }
    }

    /// Running total after this step
    pub fn cumulative_win(&self) -> f64 {
        match self {
            Self::Result(step) => step.total_win,
            Self::Cascade(step) => step.cumulative_win,
        }
    }

    /// Grid the view must show once the step is committed
    pub fn committed_grid(&self) -> &str {
        match self {
            Self::Result(step) => &step.grid,
            Self::Cascade(step) => &step.grid_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_result_step() {
        let step: SpinStep = serde_json::from_value(json!({
            "type": "RESULT",
            "grid": "KKKQP;AQPAP;JAPJA",
            "wins": [{ "symbol": "K", "positions": [{"row": 0, "col": 0}], "amount": 5.0 }],
            "totalWin": 5.0
        }))
        .unwrap();

        assert_eq!(step.step_type(), StepType::Result);
        assert_eq!(step.wins().len(), 1);
        assert_eq!(step.cumulative_win(), 5.0);
        assert_eq!(step.committed_grid(), "KKKQP;AQPAP;JAPJA");
    }

    #[test]
    fn test_deserialize_cascade_step_without_movements() {
        let step: SpinStep = serde_json::from_value(json!({
            "type": "CASCADE",
            "gridBefore": "AB;CD",
            "removedPositions": [{"row": 1, "col": 0}],
            "refills": [{"position": {"row": 0, "col": 0}, "symbol": "Q"}],
            "gridAfter": "QB;AD",
            "stepWin": 2.0,
            "cumulativeWin": 7.0
        }))
        .unwrap();

        let SpinStep::Cascade(cascade) = &step else {
            panic!("expected cascade step");
        };
        assert!(cascade.movements.is_none());
        assert!(cascade.wins.is_empty());
        assert_eq!(step.step_win(), 2.0);
        assert_eq!(step.cumulative_win(), 7.0);
        assert_eq!(step.committed_grid(), "QB;AD");
    }

    #[test]
    fn test_step_type_serializes_uppercase() {
        assert_eq!(serde_json::to_value(StepType::Cascade).unwrap(), json!("CASCADE"));
        assert_eq!(StepType::Result.to_string(), "RESULT");
    }

    #[test]
    fn test_noop_movement() {
        let pos = Position::new(1, 1);
        assert!(Movement::new(pos, pos).is_noop());
        assert!(!Movement::new(pos, Position::new(2, 1)).is_noop());
    }
}
