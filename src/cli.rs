use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{DriveShape, IntegratorChoice, KuramotoConfig, PopulationConfig, SimConfig};
use crate::core::rng::SeedRecord;
use crate::core::timegrid::TimeGrid;
use crate::sim::SimError;
use crate::sim::ensemble::{JitterSpec, OscillatorEnsembleConfig, PopulationEnsembleConfig};
use crate::sim::oscillator::KuramotoParams;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML; a commented template is written if it is missing
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for result bundles (overrides config)
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Wilson-Cowan E/I population ensemble
    Population(PopulationArgs),
    /// Kuramoto oscillator network ensemble
    Kuramoto(KuramotoArgs),
    /// Print the JSON schema of the result bundle
    Schema {
        /// Write the schema here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct PopulationArgs {
    /// Run name; the bundle is written to `<out_dir>/<name>.json`
    pub name: String,
    /// Duration in seconds
    #[arg(short = 't', long)]
    pub duration: Option<f64>,
    /// Ensemble members
    #[arg(short = 'n', long)]
    pub members: Option<usize>,
    #[arg(long, value_enum)]
    pub drive: Option<DriveShape>,
    /// Drive amplitude (drift baseline)
    #[arg(short = 'p', long, allow_negative_numbers = true)]
    pub p: Option<f64>,
    /// Inhibitory drive
    #[arg(short = 'q', long, allow_negative_numbers = true)]
    pub q: Option<f64>,
    /// Relative jitter across members
    #[arg(short = 's', long)]
    pub jitter: Option<f64>,
    /// Burst onset in seconds
    #[arg(short = 'b', long)]
    pub onset: Option<f64>,
    /// Burst width in seconds
    #[arg(short = 'w', long, allow_negative_numbers = true)]
    pub width: Option<f64>,
    /// Burst floor
    #[arg(long, allow_negative_numbers = true)]
    pub floor: Option<f64>,
    /// Drift rate per second
    #[arg(short = 'd', long, allow_negative_numbers = true)]
    pub drift: Option<f64>,
    /// Lower clamp of the drifting drive
    #[arg(long, allow_negative_numbers = true)]
    pub min_p: Option<f64>,
    /// Random-walk magnitude of the drifting drive
    #[arg(long)]
    pub walk: Option<f64>,
    /// Ramp start value
    #[arg(long, allow_negative_numbers = true)]
    pub p0: Option<f64>,
    /// Ramp end value
    #[arg(long, allow_negative_numbers = true)]
    pub pn: Option<f64>,
    /// Population noise magnitude
    #[arg(long)]
    pub sigma: Option<f64>,
    #[arg(long)]
    pub dt: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Jitter the inhibitory drive too
    #[arg(long)]
    pub jitter_q: bool,
    /// Run members one after another
    #[arg(long)]
    pub sequential: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct KuramotoArgs {
    pub name: String,
    #[arg(short = 't', long)]
    pub duration: Option<f64>,
    /// Oscillators per network
    #[arg(short = 'n', long)]
    pub oscillators: Option<usize>,
    /// Independent networks
    #[arg(short = 'm', long)]
    pub members: Option<usize>,
    #[arg(short = 'k', long, allow_negative_numbers = true)]
    pub coupling: Option<f64>,
    /// Centre natural frequency
    #[arg(short = 'o', long)]
    pub omega: Option<f64>,
    /// Half width of the natural-frequency distribution
    #[arg(short = 'r', long)]
    pub range: Option<f64>,
    #[arg(long)]
    pub sigma: Option<f64>,
    /// Probability that an oscillator steps on a given sample
    #[arg(long)]
    pub p_on: Option<f64>,
    #[arg(long, value_enum)]
    pub integrator: Option<IntegratorChoice>,
    /// RK4 substeps per sample
    #[arg(long)]
    pub substeps: Option<usize>,
    #[arg(long)]
    pub dt: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub sequential: bool,
}

/// Everything needed to run and persist one ensemble.
#[derive(Debug, Clone)]
pub struct Job<C> {
    pub grid: TimeGrid,
    pub seed: SeedRecord,
    pub parallel: bool,
    pub ensemble: C,
    pub out: PathBuf,
}

fn bundle_path(cfg: &SimConfig, out_dir: Option<&Path>, name: &str) -> PathBuf {
    let dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&cfg.run.out_dir));
    dir.join(format!("{name}.json"))
}

impl PopulationArgs {
    /// Config values overridden by every flag given on the command line.
    pub fn merged(&self, base: &PopulationConfig) -> PopulationConfig {
        let mut cfg = base.clone();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        take!(duration, members, drive, p, q, jitter, onset, width, floor, drift, min_p, walk, p0, pn, sigma, dt);
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.jitter_q {
            cfg.jitter_q = true;
        }
        cfg
    }

    pub fn resolve(
        &self,
        cfg: &SimConfig,
        out_dir: Option<&Path>,
    ) -> Result<Job<PopulationEnsembleConfig>, SimError> {
        let pop = self.merged(&cfg.population);
        let grid = TimeGrid::new(pop.duration, pop.dt)?;
        let ensemble = PopulationEnsembleConfig {
            members: pop.members,
            drive: pop.drive_kind(),
            q: pop.q,
            sigma: pop.sigma,
            jitter: JitterSpec {
                relative_std: pop.jitter,
                inhibitory: pop.jitter_q,
            },
            params: pop.weights,
        };
        Ok(Job {
            grid,
            seed: SeedRecord::resolve(pop.seed),
            parallel: cfg.run.parallel && !self.sequential,
            ensemble,
            out: bundle_path(cfg, out_dir, &self.name),
        })
    }
}

impl KuramotoArgs {
    pub fn merged(&self, base: &KuramotoConfig) -> KuramotoConfig {
        let mut cfg = base.clone();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        take!(duration, oscillators, members, coupling, omega, range, sigma, p_on, integrator, substeps, dt);
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        cfg
    }

    pub fn resolve(
        &self,
        cfg: &SimConfig,
        out_dir: Option<&Path>,
    ) -> Result<Job<OscillatorEnsembleConfig>, SimError> {
        let kur = self.merged(&cfg.kuramoto);
        let grid = TimeGrid::new(kur.duration, kur.dt)?;
        let params = KuramotoParams {
            n_oscillators: kur.oscillators,
            coupling: kur.coupling,
            omega: kur.omega,
            omega_range: kur.range,
            sigma: kur.sigma,
            p_on: kur.p_on,
            integrator: kur.integrator_kind(),
        };
        params.validate()?;
        Ok(Job {
            grid,
            seed: SeedRecord::resolve(kur.seed),
            parallel: cfg.run.parallel && !self.sequential,
            ensemble: OscillatorEnsembleConfig {
                members: kur.members,
                params,
            },
            out: bundle_path(cfg, out_dir, &self.name),
        })
    }
}
