//! Column-oriented in-memory table shared by the offline and online paths.
//!
//! Columns are named `f64` series of equal length; NaN marks a missing value.
//! Row index doubles as the time index: rows are appended in arrival order and
//! never reordered.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column {column} has length {actual}, frame has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Inserts a column, overwriting in place if the name already exists.
    /// An existing column keeps its position; a new one is appended last.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        if !self.names.is_empty() && values.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.len(),
                actual: values.len(),
            });
        }

        match self.names.iter().position(|n| *n == name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// New frame containing exactly the named columns, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Frame, FrameError> {
        let mut out = Frame::new();
        for name in names {
            let values = self
                .column(name)
                .ok_or_else(|| FrameError::UnknownColumn(name.clone()))?;
            out.insert_column(name.clone(), values.to_vec())?;
        }
        Ok(out)
    }

    pub fn row(&self, idx: usize) -> Option<Vec<f64>> {
        if idx >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|col| col[idx]).collect())
    }

    /// First `n` rows (all of them if `n` exceeds the frame length).
    pub fn head(&self, n: usize) -> Frame {
        let n = n.min(self.len());
        let mut out = Frame::new();
        for (name, col) in self.names.iter().zip(&self.columns) {
            out.insert_column(name.clone(), col[..n].to_vec())
                .expect("head columns share one length");
        }
        out
    }

    /// Shifts every column forward: row i takes the value previously at
    /// row i - periods, and the first `periods` rows become missing.
    pub fn shift_all(&self, periods: usize) -> Frame {
        let mut out = Frame::new();
        for (name, col) in self.names.iter().zip(&self.columns) {
            let mut shifted = vec![f64::NAN; col.len()];
            for i in periods..col.len() {
                shifted[i] = col[i - periods];
            }
            out.insert_column(name.clone(), shifted)
                .expect("shifted columns share one length");
        }
        out
    }

    /// Per-row flag: true when any column holds NaN at that row.
    pub fn nan_row_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.len()];
        for col in &self.columns {
            for (i, value) in col.iter().enumerate() {
                if value.is_nan() {
                    mask[i] = true;
                }
            }
        }
        mask
    }

    /// New frame keeping only rows where `keep` is true.
    pub fn retain_rows(&self, keep: &[bool]) -> Frame {
        let mut out = Frame::new();
        for (name, col) in self.names.iter().zip(&self.columns) {
            let filtered: Vec<f64> = col
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect();
            out.insert_column(name.clone(), filtered)
                .expect("filtered columns share one length");
        }
        out
    }

    pub fn map_values(&mut self, f: impl Fn(f64) -> f64) {
        for col in &mut self.columns {
            for value in col.iter_mut() {
                *value = f(*value);
            }
        }
    }
}
