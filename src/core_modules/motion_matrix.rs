// THEORY:
// The `MotionMatrix` is the final output of the motion engine for one tick: a
// snapshot of per-cell motion scores with no identity or history. Renderers get
// three guarantees from it and nothing more:
//
// 1.  **Shape**: exactly `resolution_x` columns, each with exactly `resolution_y`
//     scores.
// 2.  **Ordering**: indexed `[column][row]`. Columns run left to right, and the
//     rows inside a column run top to bottom.
// 3.  **Range**: every score is a `u8`, so it always lies in `[0, 255]`.
//
// How a score turns into pixels on screen is the renderer's business.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotionMatrix {
    columns: Vec<Vec<u8>>,
}

impl MotionMatrix {
    /// Builds a matrix from column-major scores. Every column must hold the same
    /// number of rows; `None` otherwise.
    pub fn from_columns(columns: Vec<Vec<u8>>) -> Option<Self> {
        let rows = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|column| column.len() != rows) {
            return None;
        }
        Some(Self { columns })
    }

    /// Number of columns (`resolution_x`).
    pub fn resolution_x(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows per column (`resolution_y`).
    pub fn resolution_y(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn get(&self, column: usize, row: usize) -> Option<u8> {
        self.columns.get(column)?.get(row).copied()
    }

    pub fn columns(&self) -> &[Vec<u8>] {
        &self.columns
    }

    /// Every cell as `(column, row, score)` in storage order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.columns.iter().enumerate().flat_map(|(column, scores)| {
            scores
                .iter()
                .enumerate()
                .map(move |(row, &score)| (column, row, score))
        })
    }

    /// The hottest cell, first in storage order on ties.
    pub fn max(&self) -> Option<(usize, usize, u8)> {
        self.cells()
            .fold(None, |best: Option<(usize, usize, u8)>, cell| match best {
                Some(b) if b.2 >= cell.2 => Some(b),
                _ => Some(cell),
            })
    }

    /// Cells whose score exceeds `threshold`.
    pub fn active_cells(&self, threshold: u8) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.cells().filter(move |&(_, _, score)| score > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MotionMatrix {
        MotionMatrix::from_columns(vec![vec![0, 10, 20], vec![30, 40, 5]]).unwrap()
    }

    #[test]
    fn ragged_columns_are_rejected() {
        assert!(MotionMatrix::from_columns(vec![vec![1, 2], vec![3]]).is_none());
    }

    #[test]
    fn indexing_is_column_then_row() {
        let matrix = sample();
        assert_eq!(matrix.resolution_x(), 2);
        assert_eq!(matrix.resolution_y(), 3);
        assert_eq!(matrix.get(0, 2), Some(20));
        assert_eq!(matrix.get(1, 0), Some(30));
        assert_eq!(matrix.get(2, 0), None);
    }

    #[test]
    fn cells_walk_each_column_top_to_bottom() {
        let order: Vec<_> = sample().cells().map(|(c, r, _)| (c, r)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn max_and_active_cells() {
        let matrix = sample();
        assert_eq!(matrix.max(), Some((1, 1, 40)));
        let active: Vec<_> = matrix.active_cells(15).collect();
        assert_eq!(active, vec![(0, 2, 20), (1, 0, 30), (1, 1, 40)]);
    }

    #[test]
    fn serializes_as_nested_columns() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"columns":[[0,10,20],[30,40,5]]}"#);
    }
}
