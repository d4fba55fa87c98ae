use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sim::SimError;
use crate::sim::drive::DriveKind;
use crate::sim::integrator::{DEFAULT_ATOL, DEFAULT_RTOL, IntegratorKind};
use crate::sim::population::WilsonCowanParams;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Run ensemble members on the rayon pool.
    pub parallel: bool,
    /// Directory result bundles are written to.
    pub out_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            out_dir: "out".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DriveShape {
    Constant,
    Burst,
    Drift,
    Ramp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopulationConfig {
    pub duration: f64,
    pub dt: f64,
    pub members: usize,
    pub drive: DriveShape,
    /// Drive amplitude; also the drift baseline.
    pub p: f64,
    pub q: f64,
    /// Relative jitter of the drive across members.
    pub jitter: f64,
    pub jitter_q: bool,
    pub onset: f64,
    pub width: f64,
    pub floor: f64,
    pub drift: f64,
    pub min_p: f64,
    pub walk: f64,
    pub p0: f64,
    pub pn: f64,
    pub sigma: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub weights: WilsonCowanParams,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            duration: 3.0,
            dt: 1e-3,
            members: 1,
            drive: DriveShape::Constant,
            p: 2.0,
            q: 1.0,
            jitter: 0.1,
            jitter_q: false,
            onset: 1.0,
            width: 0.1,
            floor: 0.0,
            drift: 0.1,
            min_p: 1.0,
            walk: 0.0,
            p0: 0.5,
            pn: 2.0,
            sigma: 0.0,
            seed: None,
            weights: WilsonCowanParams::default(),
        }
    }
}

impl PopulationConfig {
    /// Nominal drive waveform described by the selected shape.
    pub fn drive_kind(&self) -> DriveKind {
        match self.drive {
            DriveShape::Constant => DriveKind::Constant { amplitude: self.p },
            DriveShape::Burst => DriveKind::Burst {
                amplitude: self.p,
                onset: self.onset,
                width: self.width,
                floor: self.floor,
            },
            DriveShape::Drift => DriveKind::Drift {
                baseline: self.p,
                rate: self.drift,
                min: self.min_p,
                walk: self.walk,
            },
            DriveShape::Ramp => DriveKind::Ramp {
                start: self.p0,
                end: self.pn,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IntegratorChoice {
    Adaptive,
    Rk4,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KuramotoConfig {
    pub duration: f64,
    pub dt: f64,
    pub oscillators: usize,
    pub members: usize,
    pub coupling: f64,
    pub omega: f64,
    pub range: f64,
    pub sigma: f64,
    pub p_on: f64,
    pub integrator: IntegratorChoice,
    pub substeps: usize,
    pub rtol: f64,
    pub atol: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for KuramotoConfig {
    fn default() -> Self {
        Self {
            duration: 3.0,
            dt: 1e-2,
            oscillators: 1000,
            members: 1,
            coupling: 6.0,
            omega: 10.0,
            range: 1.0,
            sigma: 0.0,
            p_on: 1.0,
            integrator: IntegratorChoice::Adaptive,
            substeps: 20,
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
            seed: Some(42),
        }
    }
}

impl KuramotoConfig {
    pub fn integrator_kind(&self) -> IntegratorKind {
        match self.integrator {
            IntegratorChoice::Adaptive => IntegratorKind::Adaptive {
                rtol: self.rtol,
                atol: self.atol,
            },
            IntegratorChoice::Rk4 => IntegratorKind::Rk4 {
                substeps: self.substeps,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SimConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub kuramoto: KuramotoConfig,
}

impl SimConfig {
    /// Defaults rendered as TOML with every key commented out, so the file
    /// documents the defaults without pinning them.
    pub fn commented_template() -> Option<String> {
        let text = match toml::to_string_pretty(&Self::default()) {
            Ok(text) => text,
            Err(err) => {
                warn!("failed to serialize default config: {err}");
                return None;
            }
        };
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                commented.push_str("# ");
                commented.push_str(line);
                commented.push('\n');
            }
        }
        Some(commented)
    }

    /// No path gives the defaults. An existing file is parsed and a parse
    /// error is returned. A missing file receives the commented template.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SimError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let cfg = toml::from_str(&contents)?;
            info!(path = %path.display(), "config loaded");
            return Ok(cfg);
        }

        if let Some(template) = Self::commented_template() {
            match fs::write(path, template) {
                Ok(()) => info!(path = %path.display(), "wrote default config template"),
                Err(err) => warn!(path = %path.display(), "failed to write default config: {err}"),
            }
        }
        Ok(Self::default())
    }
}
