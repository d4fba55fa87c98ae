//! The persisted result of one run: configuration, provenance, member traces
//! and the aggregate LFP, written as a single JSON document.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use schemars::{JsonSchema, Schema};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::rng::SeedRecord;
use crate::core::timegrid::TimeGrid;
use crate::sim::SimError;
use crate::sim::aggregate::Stack;
use crate::sim::drive::{DriveAdjustment, DriveKind};
use crate::sim::ensemble::{OscillatorEnsembleConfig, PopulationEnsembleConfig};
use crate::sim::oscillator::OscillatorTrajectory;

/// Bumped whenever the bundle layout changes incompatibly.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelConfig {
    Population(PopulationEnsembleConfig),
    Oscillator(OscillatorEnsembleConfig),
}

/// Resolved inputs of one population member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PopulationMember {
    pub index: usize,
    pub seed: u64,
    pub drive: DriveKind,
    pub q: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<DriveAdjustment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OscillatorMember {
    pub index: usize,
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Traces {
    Population {
        members: Vec<PopulationMember>,
        e: Stack,
        i: Stack,
        mean_e: Vec<f64>,
        mean_i: Vec<f64>,
    },
    Oscillator {
        members: Vec<OscillatorMember>,
        networks: Vec<OscillatorTrajectory>,
        network_waves: Stack,
    },
}

impl Traces {
    pub fn n_members(&self) -> usize {
        match self {
            Traces::Population { members, .. } => members.len(),
            Traces::Oscillator { members, .. } => members.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultBundle {
    version: u32,
    grid: TimeGrid,
    times: Vec<f64>,
    seed: SeedRecord,
    n_members: usize,
    config: ModelConfig,
    traces: Traces,
    lfp: Vec<f64>,
}

impl ResultBundle {
    pub(crate) fn assemble(
        grid: TimeGrid,
        seed: SeedRecord,
        config: ModelConfig,
        traces: Traces,
        lfp: Vec<f64>,
    ) -> Self {
        Self {
            version: BUNDLE_VERSION,
            times: grid.times(),
            grid,
            seed,
            n_members: traces.n_members(),
            config,
            traces,
            lfp,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn seed(&self) -> SeedRecord {
        self.seed
    }

    pub fn n_members(&self) -> usize {
        self.n_members
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn traces(&self) -> &Traces {
        &self.traces
    }

    pub fn lfp(&self) -> &[f64] {
        &self.lfp
    }

    /// Write to `path` via a sibling temporary file so a reader never sees a
    /// partial document.
    pub fn write_json(&self, path: &Path) -> Result<(), SimError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        if let Err(err) = self.write_and_rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        info!(
            path = %path.display(),
            members = self.n_members,
            samples = self.times.len(),
            "result bundle written"
        );
        Ok(())
    }

    fn write_and_rename(&self, tmp: &Path, path: &Path) -> Result<(), SimError> {
        let mut w = BufWriter::new(File::create(tmp)?);
        serde_json::to_writer(&mut w, self)?;
        w.flush()?;
        drop(w);
        fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self, SimError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// JSON schema of the bundle document.
    pub fn schema() -> Schema {
        schemars::schema_for!(ResultBundle)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result.json".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
