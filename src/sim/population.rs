//! Wilson-Cowan excitatory/inhibitory rate population.
//!
//! dE/dt = [-E + (1 - re*E) * (S_e(k*c1*E - k*c2*I + k*P(t) - 2) - S_e(-2))] / tau_e
//! dI/dt = [-I + (1 - ri*I) * (S_i(kn*c3*E - kn*c4*I + kn*Q - 2.5) - S_i(-2.5))] / tau_i
//!
//! with S_e(x) = 1/(1+exp(-x)) and S_i(x) = 1/(1+exp(-2x)). The subtracted
//! terms are the resting outputs at zero net input, so (0, 0) is a fixed point
//! when P = Q = 0.

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::rng::gaussian;
use crate::core::timegrid::TimeGrid;
use crate::sim::drive::DriveProfile;
use crate::sim::{SimError, require_finite};

const E_THRESHOLD: f64 = 2.0;
const I_THRESHOLD: f64 = 2.5;

#[inline]
fn sigmoid_e(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
fn sigmoid_i(x: f64) -> f64 {
    1.0 / (1.0 + (-2.0 * x).exp())
}

/// Connection weights, gains and time constants (seconds).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WilsonCowanParams {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub c4: f64,
    pub re: f64,
    pub ri: f64,
    pub k: f64,
    pub kn: f64,
    pub tau_e: f64,
    pub tau_i: f64,
}

impl Default for WilsonCowanParams {
    fn default() -> Self {
        Self {
            c1: 15.0,
            c2: 15.0,
            c3: 15.0,
            c4: 3.0,
            re: 1.0,
            ri: 0.5,
            k: 1.0,
            kn: 1.0,
            tau_e: 5e-3,
            tau_i: 10e-3,
        }
    }
}

impl WilsonCowanParams {
    pub fn validate(&self) -> Result<(), SimError> {
        require_finite("c1", self.c1)?;
        require_finite("c2", self.c2)?;
        require_finite("c3", self.c3)?;
        require_finite("c4", self.c4)?;
        require_finite("re", self.re)?;
        require_finite("ri", self.ri)?;
        require_finite("k", self.k)?;
        require_finite("kn", self.kn)?;
        for (name, tau) in [("tau_e", self.tau_e), ("tau_i", self.tau_i)] {
            if !tau.is_finite() || tau <= 0.0 {
                return Err(SimError::invalid(name, tau, "time constant must be > 0"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PopulationState {
    pub e: f64,
    pub i: f64,
}

/// Recorded E and I series of one member.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationTrajectory {
    pub e: Vec<f64>,
    pub i: Vec<f64>,
}

impl PopulationTrajectory {
    pub fn len(&self) -> usize {
        self.e.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e.is_empty()
    }

    /// Per-sample `E + I`, the member's contribution to the LFP.
    pub fn summed(&self) -> Vec<f64> {
        self.e.iter().zip(&self.i).map(|(e, i)| e + i).collect()
    }
}

#[derive(Clone, Debug)]
pub struct PopulationUnit {
    params: WilsonCowanParams,
    e_rest: f64,
    i_rest: f64,
}

impl PopulationUnit {
    pub fn new(params: WilsonCowanParams) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self {
            params,
            e_rest: sigmoid_e(-E_THRESHOLD),
            i_rest: sigmoid_i(-I_THRESHOLD),
        })
    }

    pub fn params(&self) -> &WilsonCowanParams {
        &self.params
    }

    /// Deterministic right-hand side at drive `p` and inhibitory drive `q`.
    #[inline]
    pub fn derivative(&self, s: PopulationState, p: f64, q: f64) -> PopulationState {
        let w = &self.params;
        let e_in = w.k * w.c1 * s.e - w.k * w.c2 * s.i + w.k * p - E_THRESHOLD;
        let i_in = w.kn * w.c3 * s.e - w.kn * w.c4 * s.i + w.kn * q - I_THRESHOLD;
        PopulationState {
            e: (-s.e + (1.0 - w.re * s.e) * (sigmoid_e(e_in) - self.e_rest)) / w.tau_e,
            i: (-s.i + (1.0 - w.ri * s.i) * (sigmoid_i(i_in) - self.i_rest)) / w.tau_i,
        }
    }

    /// One forward-Euler step; with `sigma > 0` an Euler-Maruyama step adding
    /// `sigma * sqrt(dt / tau)` Gaussian increments to E then I.
    #[inline]
    pub fn step<R: Rng + ?Sized>(
        &self,
        s: PopulationState,
        p: f64,
        q: f64,
        dt: f64,
        sigma: f64,
        rng: &mut R,
    ) -> PopulationState {
        let d = self.derivative(s, p, q);
        let mut next = PopulationState {
            e: s.e + dt * d.e,
            i: s.i + dt * d.i,
        };
        if sigma > 0.0 {
            let sqrt_dt = dt.sqrt();
            next.e += sigma * sqrt_dt / self.params.tau_e.sqrt() * gaussian(rng);
            next.i += sigma * sqrt_dt / self.params.tau_i.sqrt() * gaussian(rng);
        }
        next
    }

    /// Integrate from (0, 0) over `grid`, recording the state at the start of
    /// every sample.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        grid: &TimeGrid,
        drive: &DriveProfile,
        q: f64,
        sigma: f64,
        rng: &mut R,
    ) -> Result<PopulationTrajectory, SimError> {
        if drive.len() != grid.len() {
            return Err(SimError::shape("drive profile", grid.len(), drive.len()));
        }
        require_finite("q", q)?;
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(SimError::invalid("sigma", sigma, "noise must be finite and >= 0"));
        }

        let n = grid.len();
        let dt = grid.dt();
        let mut e = Vec::with_capacity(n);
        let mut i = Vec::with_capacity(n);
        let mut state = PopulationState::default();
        for idx in 0..n {
            e.push(state.e);
            i.push(state.i);
            state = self.step(state, drive.at(idx), q, dt, sigma, rng);
        }
        Ok(PopulationTrajectory { e, i })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_fixed_point_at_zero_drive() {
        let unit = PopulationUnit::new(WilsonCowanParams::default()).unwrap();
        let d = unit.derivative(PopulationState::default(), 0.0, 0.0);
        assert_eq!(d.e, 0.0);
        assert_eq!(d.i, 0.0);
    }

    #[test]
    fn positive_drive_excites() {
        let unit = PopulationUnit::new(WilsonCowanParams::default()).unwrap();
        let d = unit.derivative(PopulationState::default(), 2.0, 1.0);
        assert!(d.e > 0.0);
        assert!(d.i > 0.0);
    }

    #[test]
    fn rejects_non_positive_tau() {
        let params = WilsonCowanParams {
            tau_i: 0.0,
            ..WilsonCowanParams::default()
        };
        let err = PopulationUnit::new(params).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { name: "tau_i", .. }));
    }

    #[test]
    fn sigmoids_saturate_without_overflow() {
        assert_eq!(sigmoid_e(-1e6), 0.0);
        assert_eq!(sigmoid_e(1e6), 1.0);
        assert_eq!(sigmoid_i(-1e6), 0.0);
        assert!((sigmoid_i(0.0) - 0.5).abs() < 1e-15);
    }
}
