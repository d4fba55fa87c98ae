//! Simulation engine: drive waveforms, the two model integrators, ensemble
//! execution and the aggregate result record.

pub mod aggregate;
pub mod bundle;
pub mod drive;
pub mod ensemble;
pub mod integrator;
pub mod oscillator;
pub mod population;

use thiserror::Error;

/// Errors returned by the simulation engine. All are raised before any
/// integration starts.
#[derive(Debug, Error)]
pub enum SimError {
    /// Scalar input outside its domain.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// Vector length does not match the ensemble size or sample count.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }

    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }
}

pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid(name, value, "must be finite"))
    }
}
