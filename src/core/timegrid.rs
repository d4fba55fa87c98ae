use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sim::SimError;

// Quotients this close to an integer are treated as that integer.
const SNAP_EPS: f64 = 1e-9;

fn snapped(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() < SNAP_EPS { r } else { x }
}

/// Sample clock shared by every waveform and trajectory of one run.
///
/// Sample `k` sits at `k * dt`; the grid holds `floor(duration / dt)` samples.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeGrid {
    duration: f64,
    dt: f64,
    n_samples: usize,
}

impl TimeGrid {
    pub fn new(duration: f64, dt: f64) -> Result<Self, SimError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::invalid("dt", dt, "must be finite and > 0"));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::invalid(
                "duration",
                duration,
                "must be finite and >= 0",
            ));
        }
        let n_samples = snapped(duration / dt).floor() as usize;
        Ok(Self {
            duration,
            dt,
            n_samples,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn len(&self) -> usize {
        self.n_samples
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    pub fn time(&self, idx: usize) -> f64 {
        idx as f64 * self.dt
    }

    pub fn times(&self) -> Vec<f64> {
        (0..self.n_samples).map(|k| self.time(k)).collect()
    }

    /// Index of the first sample at or after `t`; non-positive times map to 0.
    /// May exceed `len()` for times past the end of the grid.
    pub fn first_index_at(&self, t: f64) -> usize {
        if t <= 0.0 {
            return 0;
        }
        snapped(t / self.dt).ceil() as usize
    }

    /// Sample indices whose times fall in `[start, end)`, clipped to the grid.
    pub fn index_range(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        let lo = self.first_index_at(start).min(self.n_samples);
        let hi = self.first_index_at(end).min(self.n_samples);
        lo..hi.max(lo)
    }
}
