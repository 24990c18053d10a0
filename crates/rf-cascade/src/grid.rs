//! Grid geometry

use serde::{Deserialize, Serialize};

/// Cell coordinate, row 0 at the top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Grid dimensions (rows × reels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

impl GridSize {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Standard 5×3 video slot
    pub const fn standard_5x3() -> Self {
        Self::new(3, 5)
    }

    /// Total cell count
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Row-major iteration over every cell
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| Position::new(row, col)))
    }
}

impl std::fmt::Display for GridSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_contains() {
        let size = GridSize::standard_5x3();
        assert!(size.contains(Position::new(2, 4)));
        assert!(!size.contains(Position::new(3, 0)));
        assert!(!size.contains(Position::new(0, 5)));
        assert_eq!(size.cells(), 15);
    }

    #[test]
    fn test_positions_row_major() {
        let positions: Vec<_> = GridSize::new(2, 2).positions().collect();
        assert_eq!(
            positions,
            vec![
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(1, 1),
            ]
        );
    }
}
