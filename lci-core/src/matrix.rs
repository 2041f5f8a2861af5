use serde::{Deserialize, Serialize};

use crate::error::{LciCoreError, Result};

/// A single coefficient contribution to the technosphere matrix: one value at
/// (sample, source-flow row, destination-activity column).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    sample: usize,
    row: usize,
    col: usize,
    value: f64,
}

impl Exchange {
    pub fn new(sample: usize, row: usize, col: usize, value: f64) -> Self {
        Exchange {
            sample,
            row,
            col,
            value,
        }
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Dense 3-axis technosphere matrix, indexed by (sample, row, column).
///
/// Rows are source flows, columns are destination activities; both axes share
/// one activity index space. Sign convention: negative values are inputs
/// consumed by the column activity, positive values are outputs (emissions,
/// waste).
#[derive(Debug, Clone, PartialEq)]
pub struct TechnosphereMatrix {
    samples: usize,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TechnosphereMatrix {
    /// Creates a zero-filled matrix with the given dimensions.
    pub fn new(samples: usize, rows: usize, cols: usize) -> Self {
        TechnosphereMatrix {
            samples,
            rows,
            cols,
            data: vec![0.0; samples * rows * cols],
        }
    }

    /// Returns the dimensions of the matrix as (samples, rows, cols).
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.samples, self.rows, self.cols)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    fn offset(&self, sample: usize, row: usize, col: usize) -> Option<usize> {
        if sample >= self.samples || row >= self.rows || col >= self.cols {
            return None;
        }
        Some((sample * self.rows + row) * self.cols + col)
    }

    /// Gets the value at a specific position, or `None` when out of bounds.
    pub fn get(&self, sample: usize, row: usize, col: usize) -> Option<f64> {
        self.offset(sample, row, col).map(|i| self.data[i])
    }

    /// Adds `value` to the cell at (sample, row, col).
    pub fn add(&mut self, sample: usize, row: usize, col: usize, value: f64) -> Result<()> {
        let i = self.offset(sample, row, col).ok_or_else(|| {
            LciCoreError::IndexOutOfBounds(format!(
                "({}, {}, {}) outside matrix of dims {:?}",
                sample,
                row,
                col,
                self.dims()
            ))
        })?;
        self.data[i] += value;
        Ok(())
    }

    /// Applies a batch of exchanges by summation.
    ///
    /// The whole batch is bounds-checked before the first write, so a bad
    /// index never leaves the matrix half-written.
    pub fn apply(&mut self, exchanges: &[Exchange]) -> Result<()> {
        for exchange in exchanges {
            if self
                .offset(exchange.sample, exchange.row, exchange.col)
                .is_none()
            {
                return Err(LciCoreError::IndexOutOfBounds(format!(
                    "exchange at ({}, {}, {}) outside matrix of dims {:?}",
                    exchange.sample,
                    exchange.row,
                    exchange.col,
                    self.dims()
                )));
            }
        }
        for exchange in exchanges {
            let i = self
                .offset(exchange.sample, exchange.row, exchange.col)
                .unwrap();
            self.data[i] += exchange.value;
        }
        log::debug!("Applied {} exchange(s)", exchanges.len());
        Ok(())
    }

    /// Returns the number of nonzero entries.
    pub fn nnz(&self) -> usize {
        self.data.iter().filter(|v| **v != 0.0).count()
    }

    /// Iterates over the nonzero entries as exchanges.
    /// Primarily for auditing and testing.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = Exchange> + '_ {
        let cols = self.cols;
        let rows = self.rows;
        self.data.iter().enumerate().filter_map(move |(i, &v)| {
            if v == 0.0 {
                return None;
            }
            let col = i % cols;
            let row = (i / cols) % rows;
            let sample = i / (rows * cols);
            Some(Exchange::new(sample, row, col, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_new() {
        let matrix = TechnosphereMatrix::new(2, 3, 4);
        assert_eq!(matrix.dims(), (2, 3, 4));
        assert_eq!(matrix.nnz(), 0);
        assert_eq!(matrix.get(1, 2, 3), Some(0.0));
        assert_eq!(matrix.get(2, 0, 0), None);
    }

    #[test]
    fn test_add_accumulates() {
        let mut matrix = TechnosphereMatrix::new(1, 2, 2);
        matrix.add(0, 1, 0, -2.5).unwrap();
        matrix.add(0, 1, 0, -0.5).unwrap();
        assert_eq!(matrix.get(0, 1, 0), Some(-3.0));
        assert_eq!(matrix.nnz(), 1);
    }

    #[test]
    fn test_apply_sums_exchanges() {
        let mut matrix = TechnosphereMatrix::new(2, 2, 2);
        matrix
            .apply(&[
                Exchange::new(0, 0, 1, -1.0),
                Exchange::new(0, 0, 1, -0.5),
                Exchange::new(1, 1, 0, 2.0),
            ])
            .unwrap();
        assert_eq!(matrix.get(0, 0, 1), Some(-1.5));
        assert_eq!(matrix.get(1, 1, 0), Some(2.0));
    }

    #[test]
    fn test_apply_out_of_bounds_leaves_matrix_untouched() {
        let mut matrix = TechnosphereMatrix::new(1, 2, 2);
        let result = matrix.apply(&[
            Exchange::new(0, 0, 0, 1.0),
            Exchange::new(0, 5, 0, 1.0), // out of bounds
        ]);
        assert!(matches!(result, Err(LciCoreError::IndexOutOfBounds(_))));
        // The valid exchange before the bad one must not have been applied.
        assert_eq!(matrix.nnz(), 0);
    }

    #[test]
    fn test_iter_nonzero_round_trips() {
        let mut matrix = TechnosphereMatrix::new(2, 3, 3);
        let exchanges = vec![
            Exchange::new(0, 0, 2, -1.25),
            Exchange::new(1, 2, 1, 4.0),
        ];
        matrix.apply(&exchanges).unwrap();
        let collected: Vec<Exchange> = matrix.iter_nonzero().collect();
        assert_eq!(collected.len(), 2);
        assert!(collected.contains(&Exchange::new(0, 0, 2, -1.25)));
        assert!(collected.contains(&Exchange::new(1, 2, 1, 4.0)));
    }
}
