//! Cascade geometry - dedup and gravity derivation
//!
//! Pure functions over positions. The server may list one cell once per win
//! it belongs to, so every count taken here must run on deduplicated input.

use std::collections::HashSet;
use std::hash::Hash;

use crate::grid::{GridSize, Position};
use crate::step::Movement;

fn dedup_by_key<T: Copy + Eq + Hash>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().copied().filter(|item| seen.insert(*item)).collect()
}

/// Drop repeated cells, keeping first-occurrence order
pub fn dedup_positions(positions: &[Position]) -> Vec<Position> {
    dedup_by_key(positions)
}

/// Drop repeated `(from, to)` pairs, keeping first-occurrence order
pub fn dedup_movements(movements: &[Movement]) -> Vec<Movement> {
    dedup_by_key(movements)
}

/// Gravity derived from a removal set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GravityPlan {
    /// Survivor moves (stationary survivors included)
    pub moves: Vec<Movement>,
    /// Moves whose target fell outside the grid, skipped
    pub overflow: Vec<Movement>,
}

impl GravityPlan {
    /// True when every computed target is inside the grid
    pub fn is_consistent(&self) -> bool {
        self.overflow.is_empty()
    }
}

/// Derive drops when the server sent no movement list
///
/// Per column, survivors keep their top-to-bottom order and survivor `i`
/// lands on row `removed_in_column + i`. `removed` is taken as given: a
/// repeated cell inflates the column count, which is what pushes targets
/// past the bottom row. Callers pass [`dedup_positions`] output.
pub fn derive_gravity_moves(size: GridSize, removed: &[Position]) -> GravityPlan {
    let mut plan = GravityPlan::default();

    for col in 0..size.cols {
        let in_column: Vec<usize> = removed
            .iter()
            .filter(|pos| pos.col == col)
            .map(|pos| pos.row)
            .collect();
        let removed_count = in_column.len();

        let survivors = (0..size.rows).filter(|row| !in_column.contains(row));
        for (i, row) in survivors.enumerate() {
            let target = removed_count + i;
            let movement = Movement::new(Position::new(row, col), Position::new(target, col));
            if target >= size.rows {
                log::warn!(
                    "[Cascade] Gravity target {} outside {} grid, skipping",
                    movement.to,
                    size
                );
                plan.overflow.push(movement);
            } else {
                plan.moves.push(movement);
            }
        }
    }

    plan
}

/// Count of unique removed cells per column
pub fn removed_per_column(size: GridSize, removed: &[Position]) -> Vec<usize> {
    let mut counts = vec![0; size.cols];
    for pos in dedup_positions(removed) {
        if let Some(count) = counts.get_mut(pos.col) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(cells: &[(usize, usize)]) -> Vec<Position> {
        cells.iter().copied().map(Position::from).collect()
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let input = positions(&[(0, 0), (0, 1), (0, 2), (0, 0), (0, 1), (0, 2)]);
        assert_eq!(dedup_positions(&input), positions(&[(0, 0), (0, 1), (0, 2)]));
    }

    #[test]
    fn test_dedup_idempotent() {
        let input = positions(&[(2, 1), (0, 0), (2, 1), (1, 4), (0, 0)]);
        let once = dedup_positions(&input);
        assert_eq!(dedup_positions(&once), once);
        assert!(once.len() <= input.len());
    }

    #[test]
    fn test_dedup_movements() {
        let a = Movement::new(Position::new(0, 0), Position::new(1, 0));
        let b = Movement::new(Position::new(0, 1), Position::new(2, 1));
        assert_eq!(dedup_movements(&[a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_gravity_single_removal() {
        // Bottom cell of column 0 removed: rows 0 and 1 shift down by one
        let plan = derive_gravity_moves(GridSize::new(3, 1), &positions(&[(2, 0)]));
        assert!(plan.is_consistent());
        assert_eq!(
            plan.moves,
            vec![
                Movement::new(Position::new(0, 0), Position::new(1, 0)),
                Movement::new(Position::new(1, 0), Position::new(2, 0)),
            ]
        );
    }

    #[test]
    fn test_gravity_untouched_column_is_stationary() {
        let plan = derive_gravity_moves(GridSize::new(2, 2), &positions(&[(0, 0)]));
        let column_one: Vec<_> = plan.moves.iter().filter(|m| m.from.col == 1).collect();
        assert_eq!(column_one.len(), 2);
        assert!(column_one.iter().all(|m| m.is_noop()));
    }

    #[test]
    fn test_raw_duplicates_overflow() {
        let raw = positions(&[(0, 0), (0, 0)]);
        let size = GridSize::new(3, 1);

        // Count of 2 sends survivor row 2 to row 3
        let plan = derive_gravity_moves(size, &raw);
        assert_eq!(
            plan.overflow,
            vec![Movement::new(Position::new(2, 0), Position::new(3, 0))]
        );

        let plan = derive_gravity_moves(size, &dedup_positions(&raw));
        assert!(plan.is_consistent());
    }

    #[test]
    fn test_deduped_gravity_stays_in_bounds() {
        let size = GridSize::standard_5x3();
        let removed = dedup_positions(&positions(&[
            (0, 0),
            (1, 0),
            (2, 0),
            (1, 2),
            (1, 2),
            (2, 4),
            (0, 4),
        ]));
        let plan = derive_gravity_moves(size, &removed);
        assert!(plan.is_consistent());
        assert!(plan.moves.iter().all(|m| size.contains(m.to)));
    }

    #[test]
    fn test_removed_per_column() {
        let counts = removed_per_column(
            GridSize::new(3, 3),
            &positions(&[(0, 0), (0, 0), (1, 2), (2, 2)]),
        );
        assert_eq!(counts, vec![1, 0, 2]);
    }
}
