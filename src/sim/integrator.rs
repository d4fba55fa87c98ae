//! Deterministic strategies for advancing a phase vector across one grid
//! interval of an autonomous system `dy/dt = f(y)`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sim::SimError;

/// LSODA's default tolerances.
pub const DEFAULT_RTOL: f64 = 1.49012e-8;
pub const DEFAULT_ATOL: f64 = 1.49012e-8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Dormand-Prince 5(4) with error-controlled step size.
    Adaptive { rtol: f64, atol: f64 },
    /// Classic RK4 with `substeps` equal steps per grid interval.
    Rk4 { substeps: usize },
}

impl Default for IntegratorKind {
    fn default() -> Self {
        Self::Adaptive {
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
        }
    }
}

impl IntegratorKind {
    pub fn validate(&self) -> Result<(), SimError> {
        match *self {
            IntegratorKind::Adaptive { rtol, atol } => {
                if !rtol.is_finite() || rtol <= 0.0 {
                    return Err(SimError::invalid("rtol", rtol, "must be > 0"));
                }
                if !atol.is_finite() || atol <= 0.0 {
                    return Err(SimError::invalid("atol", atol, "must be > 0"));
                }
                Ok(())
            }
            IntegratorKind::Rk4 { substeps } => {
                if substeps == 0 {
                    return Err(SimError::invalid("substeps", 0.0, "must be >= 1"));
                }
                Ok(())
            }
        }
    }

    pub fn build(&self, dim: usize) -> Box<dyn PhaseStepper + Send> {
        match *self {
            IntegratorKind::Adaptive { rtol, atol } => {
                Box::new(DormandPrince::new(dim, rtol, atol))
            }
            IntegratorKind::Rk4 { substeps } => Box::new(Rk4::new(dim, substeps)),
        }
    }
}

/// Vector field evaluated into a caller-owned buffer.
pub type Field<'a> = dyn Fn(&[f64], &mut [f64]) + 'a;

pub trait PhaseStepper {
    /// Advance `y` in place by `interval` time units.
    fn advance(&mut self, field: &Field<'_>, y: &mut [f64], interval: f64);
}

#[derive(Debug, Clone)]
pub struct Rk4 {
    substeps: usize,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4 {
    pub fn new(dim: usize, substeps: usize) -> Self {
        Self {
            substeps: substeps.max(1),
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl PhaseStepper for Rk4 {
    fn advance(&mut self, field: &Field<'_>, y: &mut [f64], interval: f64) {
        let h = interval / self.substeps as f64;
        for _ in 0..self.substeps {
            field(y, &mut self.k1);
            for j in 0..y.len() {
                self.tmp[j] = y[j] + 0.5 * h * self.k1[j];
            }
            field(&self.tmp, &mut self.k2);
            for j in 0..y.len() {
                self.tmp[j] = y[j] + 0.5 * h * self.k2[j];
            }
            field(&self.tmp, &mut self.k3);
            for j in 0..y.len() {
                self.tmp[j] = y[j] + h * self.k3[j];
            }
            field(&self.tmp, &mut self.k4);
            for j in 0..y.len() {
                y[j] += h / 6.0 * (self.k1[j] + 2.0 * self.k2[j] + 2.0 * self.k3[j] + self.k4[j]);
            }
        }
    }
}

const DP_A: [[f64; 6]; 6] = [
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    // Last row doubles as the fifth-order weights.
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

// Fifth minus fourth order weights.
const DP_E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_SHRINK: f64 = 0.2;
const MAX_GROW: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct DormandPrince {
    rtol: f64,
    atol: f64,
    // Step carried over between intervals; None until the first interval.
    h: Option<f64>,
    k: [Vec<f64>; 7],
    stage: Vec<f64>,
}

impl DormandPrince {
    pub fn new(dim: usize, rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            h: None,
            k: std::array::from_fn(|_| vec![0.0; dim]),
            stage: vec![0.0; dim],
        }
    }

    /// One trial step of size `h`; leaves the fifth-order solution in
    /// `self.stage` and returns the scaled RMS error.
    fn trial(&mut self, field: &Field<'_>, y: &[f64], h: f64) -> f64 {
        field(y, &mut self.k[0]);
        for s in 1..7 {
            let row = &DP_A[s - 1];
            for j in 0..y.len() {
                let mut acc = 0.0;
                for (m, &a) in row.iter().enumerate().take(s) {
                    acc += a * self.k[m][j];
                }
                self.stage[j] = y[j] + h * acc;
            }
            field(&self.stage, &mut self.k[s]);
        }

        let mut sum = 0.0;
        for j in 0..y.len() {
            let mut err = 0.0;
            for (m, &e) in DP_E.iter().enumerate() {
                err += e * self.k[m][j];
            }
            let scale = self.atol + self.rtol * y[j].abs().max(self.stage[j].abs());
            let ratio = h * err / scale;
            sum += ratio * ratio;
        }
        if y.is_empty() {
            0.0
        } else {
            (sum / y.len() as f64).sqrt()
        }
    }
}

impl PhaseStepper for DormandPrince {
    fn advance(&mut self, field: &Field<'_>, y: &mut [f64], interval: f64) {
        if interval <= 0.0 {
            return;
        }
        let h_min = interval * 1e-12;
        let mut h = self.h.unwrap_or(interval).min(interval);
        let mut t = 0.0;
        while interval - t > h_min {
            let step = h.min(interval - t);
            let err = self.trial(field, y, step);
            if err <= 1.0 || step <= h_min {
                y.copy_from_slice(&self.stage);
                t += step;
            }
            let factor = if err == 0.0 {
                MAX_GROW
            } else {
                (SAFETY * err.powf(-0.2)).clamp(MIN_SHRINK, MAX_GROW)
            };
            // Do not let the shortened final step of an interval shrink the
            // carried step size.
            let base = if step < h && err <= 1.0 { h } else { step };
            h = (base * factor).max(h_min);
        }
        self.h = Some(h);
    }
}
