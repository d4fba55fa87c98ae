//! All-to-all Kuramoto network:
//! dθ_i/dt = ω_i + (K/N) Σ_j sin(θ_j − θ_i) [+ σ ξ_i], optionally gated.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::phase::{order_parameter, shift_pm_pi};
use crate::core::rng::gaussian;
use crate::core::timegrid::TimeGrid;
use crate::sim::aggregate::Stack;
use crate::sim::integrator::IntegratorKind;
use crate::sim::{SimError, require_finite};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct KuramotoParams {
    pub n_oscillators: usize,
    /// Global coupling K, divided by N in the vector field.
    pub coupling: f64,
    /// Centre natural frequency.
    pub omega: f64,
    /// Half width of the uniform natural-frequency distribution.
    pub omega_range: f64,
    /// Additive noise magnitude; 0 selects the deterministic solver.
    pub sigma: f64,
    /// Per-step probability that an oscillator's increment is applied.
    pub p_on: f64,
    pub integrator: IntegratorKind,
}

impl Default for KuramotoParams {
    fn default() -> Self {
        Self {
            n_oscillators: 1000,
            coupling: 6.0,
            omega: 10.0,
            omega_range: 1.0,
            sigma: 0.0,
            p_on: 1.0,
            integrator: IntegratorKind::default(),
        }
    }
}

impl KuramotoParams {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.n_oscillators == 0 {
            return Err(SimError::invalid("n_oscillators", 0.0, "must be >= 1"));
        }
        require_finite("coupling", self.coupling)?;
        if !self.omega.is_finite() || self.omega < 0.0 {
            return Err(SimError::invalid("omega", self.omega, "centre frequency must be >= 0"));
        }
        if !self.omega_range.is_finite() || self.omega_range < 0.0 {
            return Err(SimError::invalid(
                "omega_range",
                self.omega_range,
                "frequency range must be >= 0",
            ));
        }
        if self.omega - self.omega_range < 0.0 {
            return Err(SimError::invalid(
                "omega_range",
                self.omega_range,
                "lowest natural frequency must be >= 0",
            ));
        }
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(SimError::invalid("sigma", self.sigma, "noise must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.p_on) {
            return Err(SimError::invalid("p_on", self.p_on, "probability must lie in [0, 1]"));
        }
        self.integrator.validate()
    }

    /// Fixed-step stochastic stepping is used whenever noise or gating is on.
    pub fn is_stochastic(&self) -> bool {
        self.sigma > 0.0 || self.p_on < 1.0
    }
}

/// Phase read-outs, waves and order parameter of one network run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OscillatorTrajectory {
    pub omegas: Vec<f64>,
    pub theta0: Vec<f64>,
    /// Rows are oscillators, values in [-π, π).
    pub phases: Stack,
    /// `sin(ω_i 2π t + θ_i(t))` per oscillator.
    pub waves: Stack,
    pub order: Vec<f64>,
}

impl OscillatorTrajectory {
    /// Oscillator-averaged wave, the network's contribution to the LFP.
    pub fn mean_wave(&self) -> Result<Vec<f64>, SimError> {
        self.waves.mean_rows()
    }
}

#[derive(Clone, Debug)]
pub struct OscillatorNetwork {
    params: KuramotoParams,
    omegas: Vec<f64>,
    theta0: Vec<f64>,
}

impl OscillatorNetwork {
    /// Draw natural frequencies, then initial phases on [-2π, 2π).
    pub fn new<R: Rng + ?Sized>(params: KuramotoParams, rng: &mut R) -> Result<Self, SimError> {
        params.validate()?;
        let n = params.n_oscillators;
        let lo = params.omega - params.omega_range;
        let hi = params.omega + params.omega_range;
        let omegas: Vec<f64> = (0..n).map(|_| rng.random_range(lo..=hi)).collect();
        let theta0: Vec<f64> = (0..n).map(|_| rng.random_range(-TAU..TAU)).collect();
        Ok(Self {
            params,
            omegas,
            theta0,
        })
    }

    pub fn params(&self) -> &KuramotoParams {
        &self.params
    }

    pub fn omegas(&self) -> &[f64] {
        &self.omegas
    }

    pub fn theta0(&self) -> &[f64] {
        &self.theta0
    }

    /// Deterministic phase velocity, using
    /// Σ_j sin(θ_j − θ_i) = cos θ_i Σ sin θ_j − sin θ_i Σ cos θ_j.
    pub fn velocity(&self, theta: &[f64], out: &mut [f64]) {
        let (mut sum_sin, mut sum_cos) = (0.0f64, 0.0f64);
        for &th in theta {
            sum_sin += th.sin();
            sum_cos += th.cos();
        }
        let c = self.params.coupling / theta.len() as f64;
        for ((o, &th), &w) in out.iter_mut().zip(theta).zip(&self.omegas) {
            *o = w + c * (sum_sin * th.cos() - sum_cos * th.sin());
        }
    }

    pub fn simulate<R: Rng + ?Sized>(
        &self,
        grid: &TimeGrid,
        rng: &mut R,
    ) -> Result<OscillatorTrajectory, SimError> {
        let n = self.params.n_oscillators;
        let n_samples = grid.len();
        let dt = grid.dt();

        let mut phase_rows: Vec<Vec<f64>> = vec![Vec::with_capacity(n_samples); n];
        let mut wave_rows: Vec<Vec<f64>> = vec![Vec::with_capacity(n_samples); n];
        let mut order = Vec::with_capacity(n_samples);
        let mut theta = self.theta0.clone();

        let stochastic = self.params.is_stochastic();
        let mut stepper = (!stochastic).then(|| self.params.integrator.build(n));
        let mut drift = vec![0.0; n];
        let noise_sd = self.params.sigma * dt.sqrt();
        let mut gated_off: u64 = 0;

        for idx in 0..n_samples {
            let t = grid.time(idx);
            for j in 0..n {
                let phase = shift_pm_pi(theta[j]);
                phase_rows[j].push(phase);
                wave_rows[j].push((self.omegas[j] * 2.0 * PI * t + phase).sin());
            }
            order.push(order_parameter(&theta));

            if idx + 1 == n_samples {
                break;
            }
            match stepper.as_mut() {
                Some(stepper) => {
                    let field = |y: &[f64], out: &mut [f64]| self.velocity(y, out);
                    stepper.advance(&field, &mut theta, dt);
                }
                None => {
                    self.velocity(&theta, &mut drift);
                    for j in 0..n {
                        let mut inc = drift[j] * dt;
                        if noise_sd > 0.0 {
                            inc += noise_sd * gaussian(rng);
                        }
                        if self.params.p_on < 1.0 && !rng.random_bool(self.params.p_on) {
                            inc = 0.0;
                            gated_off += 1;
                        }
                        theta[j] += inc;
                    }
                }
            }
        }
        debug!(
            oscillators = n,
            samples = n_samples,
            stochastic,
            gated_off,
            final_order = order.last().copied().unwrap_or(0.0),
            "kuramoto network integrated"
        );

        Ok(OscillatorTrajectory {
            omegas: self.omegas.clone(),
            theta0: self.theta0.clone(),
            phases: Stack::from_rows(n_samples, phase_rows)?,
            waves: Stack::from_rows(n_samples, wave_rows)?,
            order,
        })
    }
}
