//! Ensemble execution: per-member parameter jitter, independent random
//! streams, and stacking of member traces.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::rng::{JITTER_STREAM, SeedRecord, member_stream, seeded_rng, stream_seed};
use crate::core::timegrid::TimeGrid;
use crate::sim::aggregate::{Stack, oscillator_lfp, population_lfp};
use crate::sim::bundle::{
    ModelConfig, OscillatorMember, PopulationMember, ResultBundle, Traces,
};
use crate::sim::drive::{DriveKind, DriveProfile};
use crate::sim::oscillator::{KuramotoParams, OscillatorNetwork, OscillatorTrajectory};
use crate::sim::population::{PopulationUnit, WilsonCowanParams};
use crate::sim::{SimError, require_finite};

/// Replacement for a drawn width, drift rate or floor that came out negative.
pub const JITTER_FLOOR: f64 = 1e-4;

const ZERO_JITTER_EPS: f64 = 1e-8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct JitterSpec {
    /// Standard deviation of each draw as a fraction of its nominal value.
    pub relative_std: f64,
    /// Also jitter the inhibitory drive Q.
    pub inhibitory: bool,
}

impl JitterSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.relative_std.abs() <= ZERO_JITTER_EPS
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !self.relative_std.is_finite() || self.relative_std < 0.0 {
            return Err(SimError::invalid(
                "relative_std",
                self.relative_std,
                "must be finite and >= 0",
            ));
        }
        Ok(())
    }

    fn draw<R: Rng + ?Sized>(&self, mean: f64, rng: &mut R) -> Result<f64, SimError> {
        let normal = Normal::new(mean, (mean * self.relative_std).abs())
            .map_err(|_| SimError::invalid("relative_std", self.relative_std, "bad spread"))?;
        Ok(normal.sample(rng))
    }

    fn draw_positive<R: Rng + ?Sized>(&self, mean: f64, rng: &mut R) -> Result<f64, SimError> {
        let v = self.draw(mean, rng)?;
        Ok(if v < 0.0 { JITTER_FLOOR } else { v })
    }

    /// One member's perturbed drive.
    pub fn jitter_drive<R: Rng + ?Sized>(
        &self,
        drive: &DriveKind,
        rng: &mut R,
    ) -> Result<DriveKind, SimError> {
        Ok(match *drive {
            DriveKind::Constant { amplitude } => DriveKind::Constant {
                amplitude: self.draw(amplitude, rng)?,
            },
            DriveKind::Burst {
                amplitude,
                onset,
                width,
                floor,
            } => DriveKind::Burst {
                amplitude: self.draw(amplitude, rng)?,
                onset,
                width: self.draw_positive(width, rng)?,
                floor,
            },
            DriveKind::Drift {
                baseline,
                rate,
                min,
                walk,
            } => DriveKind::Drift {
                baseline: self.draw(baseline, rng)?,
                rate: self.draw_positive(rate, rng)?,
                min,
                walk,
            },
            DriveKind::Ramp { start, end } => DriveKind::Ramp {
                start: self.draw(start, rng)?,
                end: self.draw(end, rng)?,
            },
        })
    }
}

/// Per-member drives and inhibitory drives for an ensemble of `members`.
///
/// The nominal drive is validated first, so a negative nominal drift rate is
/// rejected rather than clamped.
pub fn resolve_members<R: Rng + ?Sized>(
    members: usize,
    drive: &DriveKind,
    q: f64,
    jitter: &JitterSpec,
    rng: &mut R,
) -> Result<(Vec<DriveKind>, Vec<f64>), SimError> {
    if members == 0 {
        return Err(SimError::invalid("members", 0.0, "ensemble must have >= 1 member"));
    }
    drive.validate()?;
    require_finite("q", q)?;
    jitter.validate()?;

    if jitter.is_zero() {
        return Ok((vec![drive.clone(); members], vec![q; members]));
    }

    let mut drives = Vec::with_capacity(members);
    let mut qs = Vec::with_capacity(members);
    for _ in 0..members {
        drives.push(jitter.jitter_drive(drive, rng)?);
        qs.push(if jitter.inhibitory {
            jitter.draw(q, rng)?
        } else {
            q
        });
    }
    Ok((drives, qs))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PopulationEnsembleConfig {
    pub members: usize,
    pub drive: DriveKind,
    /// Nominal inhibitory drive Q.
    pub q: f64,
    /// Population noise; 0 disables the stochastic terms.
    pub sigma: f64,
    pub jitter: JitterSpec,
    pub params: WilsonCowanParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OscillatorEnsembleConfig {
    /// Number of independent networks.
    pub members: usize,
    pub params: KuramotoParams,
}

/// Stacked traces of a population ensemble, before aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationRun {
    pub members: Vec<PopulationMember>,
    pub e: Stack,
    pub i: Stack,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OscillatorRun {
    pub members: Vec<OscillatorMember>,
    pub networks: Vec<OscillatorTrajectory>,
    /// One row per network: its oscillator-averaged wave.
    pub network_waves: Stack,
}

#[derive(Clone, Debug)]
pub struct EnsembleRunner {
    grid: TimeGrid,
    seed: SeedRecord,
    parallel: bool,
}

impl EnsembleRunner {
    pub fn new(grid: TimeGrid, seed: SeedRecord) -> Self {
        Self {
            grid,
            seed,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn seed(&self) -> SeedRecord {
        self.seed
    }

    fn member_seed(&self, member: usize) -> u64 {
        stream_seed(self.seed.seed, member_stream(member))
    }

    fn map_members<T, F>(&self, members: usize, f: F) -> Result<Vec<T>, SimError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, SimError> + Sync + Send,
    {
        if self.parallel {
            (0..members).into_par_iter().map(f).collect()
        } else {
            (0..members).map(f).collect()
        }
    }

    /// Run one population per entry of `drives`/`qs`. Both must hold exactly
    /// `members` entries.
    pub fn simulate_population(
        &self,
        drives: &[DriveKind],
        qs: &[f64],
        members: usize,
        sigma: f64,
        params: &WilsonCowanParams,
    ) -> Result<PopulationRun, SimError> {
        if drives.len() != members {
            return Err(SimError::shape("drive parameters", members, drives.len()));
        }
        if qs.len() != members {
            return Err(SimError::shape("inhibitory drives", members, qs.len()));
        }
        if members == 0 {
            return Err(SimError::invalid("members", 0.0, "ensemble must have >= 1 member"));
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(SimError::invalid("sigma", sigma, "noise must be finite and >= 0"));
        }
        for (drive, &q) in drives.iter().zip(qs) {
            drive.validate()?;
            require_finite("q", q)?;
        }
        let unit = PopulationUnit::new(*params)?;
        let grid = self.grid;

        info!(
            members,
            samples = grid.len(),
            dt = grid.dt(),
            sigma,
            parallel = self.parallel,
            "population ensemble start"
        );

        let results = self.map_members(members, |k| {
            let seed = self.member_seed(k);
            let mut rng = seeded_rng(seed);
            let profile = DriveProfile::generate(&grid, &drives[k], &mut rng)?;
            let traj = unit.simulate(&grid, &profile, qs[k], sigma, &mut rng)?;
            debug!(
                member = k,
                seed,
                final_e = traj.e.last().copied().unwrap_or(0.0),
                final_i = traj.i.last().copied().unwrap_or(0.0),
                "population member done"
            );
            let record = PopulationMember {
                index: k,
                seed,
                drive: drives[k].clone(),
                q: qs[k],
                adjustments: profile.into_adjustments(),
            };
            Ok((record, traj))
        })?;

        let mut records = Vec::with_capacity(members);
        let mut e = Stack::new(grid.len());
        let mut i = Stack::new(grid.len());
        for (record, traj) in results {
            records.push(record);
            e.push(traj.e)?;
            i.push(traj.i)?;
        }
        Ok(PopulationRun {
            members: records,
            e,
            i,
        })
    }

    /// Resolve jitter, simulate every member and aggregate into a bundle.
    pub fn run_population(
        &self,
        cfg: &PopulationEnsembleConfig,
    ) -> Result<ResultBundle, SimError> {
        let mut jitter_rng = self.seed.stream(JITTER_STREAM);
        let (drives, qs) =
            resolve_members(cfg.members, &cfg.drive, cfg.q, &cfg.jitter, &mut jitter_rng)?;
        let run = self.simulate_population(&drives, &qs, cfg.members, cfg.sigma, &cfg.params)?;
        let agg = population_lfp(&run.e, &run.i)?;
        info!(members = cfg.members, samples = agg.lfp.len(), "population ensemble aggregated");

        Ok(ResultBundle::assemble(
            self.grid,
            self.seed,
            ModelConfig::Population(cfg.clone()),
            Traces::Population {
                members: run.members,
                e: run.e,
                i: run.i,
                mean_e: agg.mean_e,
                mean_i: agg.mean_i,
            },
            agg.lfp,
        ))
    }

    pub fn simulate_oscillators(
        &self,
        cfg: &OscillatorEnsembleConfig,
    ) -> Result<OscillatorRun, SimError> {
        if cfg.members == 0 {
            return Err(SimError::invalid("members", 0.0, "ensemble must have >= 1 member"));
        }
        cfg.params.validate()?;
        let grid = self.grid;

        info!(
            members = cfg.members,
            oscillators = cfg.params.n_oscillators,
            samples = grid.len(),
            stochastic = cfg.params.is_stochastic(),
            "oscillator ensemble start"
        );

        let results = self.map_members(cfg.members, |k| {
            let seed = self.member_seed(k);
            let mut rng = seeded_rng(seed);
            let network = OscillatorNetwork::new(cfg.params, &mut rng)?;
            let traj = network.simulate(&grid, &mut rng)?;
            let wave = traj.mean_wave()?;
            Ok((OscillatorMember { index: k, seed }, traj, wave))
        })?;

        let mut members = Vec::with_capacity(cfg.members);
        let mut networks = Vec::with_capacity(cfg.members);
        let mut network_waves = Stack::new(grid.len());
        for (member, traj, wave) in results {
            members.push(member);
            networks.push(traj);
            network_waves.push(wave)?;
        }
        Ok(OscillatorRun {
            members,
            networks,
            network_waves,
        })
    }

    pub fn run_oscillator(&self, cfg: &OscillatorEnsembleConfig) -> Result<ResultBundle, SimError> {
        let run = self.simulate_oscillators(cfg)?;
        let lfp = oscillator_lfp(&run.network_waves)?;
        info!(members = cfg.members, samples = lfp.len(), "oscillator ensemble aggregated");

        Ok(ResultBundle::assemble(
            self.grid,
            self.seed,
            ModelConfig::Oscillator(cfg.clone()),
            Traces::Oscillator {
                members: run.members,
                networks: run.networks,
                network_waves: run.network_waves,
            },
            lfp,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_jitter_repeats_nominal() {
        let drive = DriveKind::Constant { amplitude: 2.0 };
        let (drives, qs) = resolve_members(
            4,
            &drive,
            1.0,
            &JitterSpec::none(),
            &mut seeded_rng(0),
        )
        .unwrap();
        assert!(drives.iter().all(|d| *d == drive));
        assert_eq!(qs, vec![1.0; 4]);
    }

    #[test]
    fn inhibitory_flag_controls_q() {
        let drive = DriveKind::Constant { amplitude: 2.0 };
        let fixed = JitterSpec {
            relative_std: 0.1,
            inhibitory: false,
        };
        let (_, qs) = resolve_members(8, &drive, 1.0, &fixed, &mut seeded_rng(5)).unwrap();
        assert!(qs.iter().all(|&q| q == 1.0));

        let spread = JitterSpec {
            relative_std: 0.1,
            inhibitory: true,
        };
        let (_, qs) = resolve_members(8, &drive, 1.0, &spread, &mut seeded_rng(5)).unwrap();
        assert!(qs.iter().any(|&q| q != 1.0));
    }

    #[test]
    fn zero_members_rejected() {
        let drive = DriveKind::Constant { amplitude: 2.0 };
        let err =
            resolve_members(0, &drive, 1.0, &JitterSpec::none(), &mut seeded_rng(0)).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { name: "members", .. }));
    }
}
