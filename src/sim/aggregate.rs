//! Member stacks and the across-member averages that form the LFP.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sim::SimError;

/// Rows of equal length indexed (row, sample).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Stack {
    n_samples: usize,
    rows: Vec<Vec<f64>>,
}

impl Stack {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(n_samples: usize, rows: Vec<Vec<f64>>) -> Result<Self, SimError> {
        let mut stack = Self::new(n_samples);
        stack.rows.reserve(rows.len());
        for row in rows {
            stack.push(row)?;
        }
        Ok(stack)
    }

    pub fn push(&mut self, row: Vec<f64>) -> Result<(), SimError> {
        if row.len() != self.n_samples {
            return Err(SimError::shape("stack row", self.n_samples, row.len()));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    /// The only row of a single-member stack.
    pub fn as_single(&self) -> Option<&[f64]> {
        match self.rows.as_slice() {
            [only] => Some(only.as_slice()),
            _ => None,
        }
    }

    /// Row-major copy of every sample.
    pub fn flatten(&self) -> Vec<f64> {
        self.rows.iter().flatten().copied().collect()
    }

    /// Arithmetic mean over rows. A single row is returned unchanged.
    pub fn mean_rows(&self) -> Result<Vec<f64>, SimError> {
        let Some((first, rest)) = self.rows.split_first() else {
            return Err(SimError::shape("stack rows", 1, 0));
        };
        let mut acc = first.clone();
        if rest.is_empty() {
            return Ok(acc);
        }
        for row in rest {
            for (a, &v) in acc.iter_mut().zip(row) {
                *a += v;
            }
        }
        let n = self.rows.len() as f64;
        for a in acc.iter_mut() {
            *a /= n;
        }
        Ok(acc)
    }
}

/// Across-member averages of a population ensemble.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationAggregate {
    pub lfp: Vec<f64>,
    pub mean_e: Vec<f64>,
    pub mean_i: Vec<f64>,
}

/// LFP of a population ensemble: mean over members of `E + I`.
pub fn population_lfp(e: &Stack, i: &Stack) -> Result<PopulationAggregate, SimError> {
    if e.n_rows() != i.n_rows() {
        return Err(SimError::shape("inhibitory stack", e.n_rows(), i.n_rows()));
    }
    if e.n_samples() != i.n_samples() {
        return Err(SimError::shape("inhibitory samples", e.n_samples(), i.n_samples()));
    }
    let summed: Vec<Vec<f64>> = e
        .rows()
        .iter()
        .zip(i.rows())
        .map(|(er, ir)| er.iter().zip(ir).map(|(a, b)| a + b).collect())
        .collect();
    let summed = Stack::from_rows(e.n_samples(), summed)?;
    Ok(PopulationAggregate {
        lfp: summed.mean_rows()?,
        mean_e: e.mean_rows()?,
        mean_i: i.mean_rows()?,
    })
}

/// LFP of an oscillator ensemble: mean over networks of each network's
/// oscillator-averaged wave.
pub fn oscillator_lfp(network_waves: &Stack) -> Result<Vec<f64>, SimError> {
    network_waves.mean_rows()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_wrong_length() {
        let mut stack = Stack::new(3);
        stack.push(vec![1.0, 2.0, 3.0]).unwrap();
        let err = stack.push(vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            SimError::ShapeMismatch {
                expected: 3,
                actual: 1,
                ..
            }
        ));
        assert_eq!(stack.n_rows(), 1);
    }

    #[test]
    fn mean_of_rows() {
        let stack = Stack::from_rows(2, vec![vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        assert_eq!(stack.mean_rows().unwrap(), vec![2.0, 4.0]);
        assert_eq!(stack.flatten(), vec![1.0, 2.0, 3.0, 6.0]);
        assert!(stack.as_single().is_none());
    }

    #[test]
    fn mean_is_sum_divided_by_count() {
        let rows = vec![
            vec![0.1, 0.2, 0.3, 0.7, 1.0],
            vec![0.4, 0.5, 0.6, 0.9, 2.0],
            vec![0.2, 0.0, 0.1, 0.3, 4.0],
        ];
        let stack = Stack::from_rows(5, rows.clone()).unwrap();
        let mean = stack.mean_rows().unwrap();
        for (col, m) in mean.iter().enumerate() {
            let sum = rows[0][col] + rows[1][col] + rows[2][col];
            assert_eq!(m.to_bits(), (sum / 3.0).to_bits(), "column {col}");
        }
    }

    #[test]
    fn single_row_mean_is_identity() {
        let row = vec![0.1, -0.0, 1e-300, 3.3];
        let stack = Stack::from_rows(4, vec![row.clone()]).unwrap();
        let mean = stack.mean_rows().unwrap();
        for (a, b) in mean.iter().zip(&row) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(stack.as_single(), Some(row.as_slice()));
    }

    #[test]
    fn empty_stack_has_no_mean() {
        assert!(Stack::new(5).mean_rows().is_err());
    }
}
