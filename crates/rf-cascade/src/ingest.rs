//! Ingest - validate server payloads once, at the boundary
//!
//! Everything past this module works with typed, checked steps. Malformed
//! input is rejected with an [`IngestError`] instead of being defaulted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::{GridSize, Position};
use crate::matrix::{grid_size, parse_matrix};
use crate::step::{CascadeStep, SpinStep};

/// Complete server result for one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinPayload {
    pub spin_id: String,
    pub steps: Vec<SpinStep>,
    pub total_win: f64,
    pub total_bet: f64,
    pub final_matrix: String,
}

/// Ingest errors
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spin has no steps")]
    NoSteps,

    #[error("Step {index}: missing 'type' field")]
    MissingStepType { index: usize },

    #[error("Step {index}: unknown step type '{found}'")]
    UnknownStepType { index: usize, found: String },

    #[error("Step {index}: malformed step: {reason}")]
    MalformedStep { index: usize, reason: String },

    #[error("Step {index}: {field} is not a rectangular grid")]
    InvalidGrid { index: usize, field: &'static str },

    #[error("Step {index}: {field} is {found}, expected {expected}")]
    GridSizeMismatch {
        index: usize,
        field: &'static str,
        expected: GridSize,
        found: GridSize,
    },

    #[error("Step {index}: {field} position {position} outside {size} grid")]
    PositionOutOfBounds {
        index: usize,
        field: &'static str,
        position: Position,
        size: GridSize,
    },

    #[error("{field} must be a finite, non-negative amount (got {value})")]
    InvalidAmount { field: &'static str, value: f64 },
}

/// Parse a JSON array of steps
pub fn parse_steps(json: &str) -> Result<Vec<SpinStep>, IngestError> {
    let value: Value = serde_json::from_str(json)?;
    steps_from_value(&value)
}

/// Convert a JSON array of steps into validated typed steps
pub fn steps_from_value(value: &Value) -> Result<Vec<SpinStep>, IngestError> {
    let Some(items) = value.as_array() else {
        return Err(IngestError::MalformedStep {
            index: 0,
            reason: "steps must be a JSON array".to_string(),
        });
    };

    let steps = typed_steps(items)?;
    validate_steps(&steps)?;
    Ok(steps)
}

fn typed_steps(items: &[Value]) -> Result<Vec<SpinStep>, IngestError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| step_from_value(index, item))
        .collect()
}

/// Parse and validate a complete spin payload
pub fn parse_payload(json: &str) -> Result<SpinPayload, IngestError> {
    parse_payload_with_size(json).map(|(payload, _)| payload)
}

/// Parse and validate a payload, also returning its grid size
pub fn parse_payload_with_size(json: &str) -> Result<(SpinPayload, GridSize), IngestError> {
    let value: Value = serde_json::from_str(json)?;
    payload_with_size_from_value(&value)
}

pub fn payload_from_value(value: &Value) -> Result<SpinPayload, IngestError> {
    payload_with_size_from_value(value).map(|(payload, _)| payload)
}

fn payload_with_size_from_value(value: &Value) -> Result<(SpinPayload, GridSize), IngestError> {
    // Type steps first so a bad step reports its index and type
    let Some(items) = value.get("steps").and_then(Value::as_array) else {
        return Err(IngestError::MalformedStep {
            index: 0,
            reason: "steps must be a JSON array".to_string(),
        });
    };
    let steps = typed_steps(items)?;

    let mut payload: SpinPayload = serde_json::from_value(value.clone())?;
    payload.steps = steps;
    let size = validate_payload(&payload)?;
    Ok((payload, size))
}

fn step_from_value(index: usize, value: &Value) -> Result<SpinStep, IngestError> {
    let Some(kind) = value.get("type") else {
        return Err(IngestError::MissingStepType { index });
    };
    match kind.as_str() {
        Some("RESULT") | Some("CASCADE") => {}
        _ => {
            return Err(IngestError::UnknownStepType {
                index,
                found: kind.to_string(),
            });
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| IngestError::MalformedStep {
        index,
        reason: e.to_string(),
    })
}

fn checked_size(index: usize, field: &'static str, matrix: &str) -> Result<GridSize, IngestError> {
    grid_size(&parse_matrix(matrix)).ok_or(IngestError::InvalidGrid { index, field })
}

fn check_same_size(
    index: usize,
    field: &'static str,
    expected: GridSize,
    found: GridSize,
) -> Result<(), IngestError> {
    if expected != found {
        return Err(IngestError::GridSizeMismatch {
            index,
            field,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_position(
    index: usize,
    field: &'static str,
    position: Position,
    size: GridSize,
) -> Result<(), IngestError> {
    if !size.contains(position) {
        return Err(IngestError::PositionOutOfBounds {
            index,
            field,
            position,
            size,
        });
    }
    Ok(())
}

fn check_amount(field: &'static str, value: f64) -> Result<(), IngestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(IngestError::InvalidAmount { field, value });
    }
    Ok(())
}

fn validate_cascade(index: usize, step: &CascadeStep, size: GridSize) -> Result<(), IngestError> {
    check_same_size(index, "gridBefore", size, checked_size(index, "gridBefore", &step.grid_before)?)?;
    check_same_size(index, "gridAfter", size, checked_size(index, "gridAfter", &step.grid_after)?)?;

    for &position in &step.removed_positions {
        check_position(index, "removedPositions", position, size)?;
    }
    for movement in step.movements.iter().flatten() {
        check_position(index, "movements.from", movement.from, size)?;
        check_position(index, "movements.to", movement.to, size)?;
    }
    for refill in &step.refills {
        check_position(index, "refills", refill.position, size)?;
    }
    check_amount("stepWin", step.step_win)?;
    check_amount("cumulativeWin", step.cumulative_win)
}

/// Check grid shapes, positions and amounts of an ordered step list
///
/// Every step must share the grid size of the first step.
pub fn validate_steps(steps: &[SpinStep]) -> Result<GridSize, IngestError> {
    let first = steps.first().ok_or(IngestError::NoSteps)?;
    let size = checked_size(0, "grid", first.committed_grid())?;

    for (index, step) in steps.iter().enumerate() {
        match step {
            SpinStep::Result(result) => {
                let found = checked_size(index, "grid", &result.grid)?;
                check_same_size(index, "grid", size, found)?;
                check_amount("totalWin", result.total_win)?;
            }
            SpinStep::Cascade(cascade) => validate_cascade(index, cascade, size)?,
        }

        for win in step.wins() {
            check_amount("wins.amount", win.amount)?;
            for &position in &win.positions {
                check_position(index, "wins.positions", position, size)?;
            }
        }
    }
    Ok(size)
}

/// Validate a full payload (steps plus totals and final matrix)
pub fn validate_payload(payload: &SpinPayload) -> Result<GridSize, IngestError> {
    let size = validate_steps(&payload.steps)?;
    check_amount("totalWin", payload.total_win)?;
    check_amount("totalBet", payload.total_bet)?;

    let last = payload.steps.len().saturating_sub(1);
    let found = checked_size(last, "finalMatrix", &payload.final_matrix)?;
    check_same_size(last, "finalMatrix", size, found)?;
    Ok(size)
}
