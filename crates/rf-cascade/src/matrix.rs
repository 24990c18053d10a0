//! Matrix strings - compact server encoding of a symbol grid
//!
//! Rows are joined by `;`. Every symbol id is one character except the
//! literal two-character id `"10"`, which is matched greedily first:
//!
//! ```text
//! "KKKQP;AQPAP"  →  [["K","K","K","Q","P"], ["A","Q","P","A","P"]]
//! "A10BJ"        →  [["A","10","B","J"]]
//! ```

use crate::grid::GridSize;

/// Row-major symbol grid
pub type SymbolGrid = Vec<Vec<String>>;

/// Row separator
pub const ROW_SEPARATOR: char = ';';

const ROW_SEPARATOR_STR: &str = ";";

/// The only multi-character symbol id
pub const TEN_SYMBOL: &str = "10";

/// Split one row into symbol ids
pub fn tokenize_row(row: &str) -> Vec<String> {
    let chars: Vec<char> = row.trim().chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '1' && chars.get(i + 1) == Some(&'0') {
            tokens.push(TEN_SYMBOL.to_string());
            i += 2;
        } else {
            tokens.push(chars[i].to_string());
            i += 1;
        }
    }
    tokens
}

/// Parse a full matrix string; blank rows are ignored
pub fn parse_matrix(matrix: &str) -> SymbolGrid {
    matrix
        .split(ROW_SEPARATOR)
        .filter(|row| !row.trim().is_empty())
        .map(tokenize_row)
        .collect()
}

/// Inverse of [`parse_matrix`]
pub fn format_matrix(grid: &[Vec<String>]) -> String {
    grid.iter()
        .map(|row| row.concat())
        .collect::<Vec<_>>()
        .join(ROW_SEPARATOR_STR)
}

/// Dimensions of a rectangular, non-empty grid
pub fn grid_size(grid: &[Vec<String>]) -> Option<GridSize> {
    let cols = grid.first()?.len();
    if cols == 0 || grid.iter().any(|row| row.len() != cols) {
        return None;
    }
    Some(GridSize::new(grid.len(), cols))
}
