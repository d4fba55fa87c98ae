//! External drive waveforms (the `P(t)` input of the E population).
//!
//! Every profile is multiplied by `2^-0.03` after shaping; this ties the drive
//! units to the operating point of the excitatory sigmoid.

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::rng::gaussian;
use crate::core::timegrid::TimeGrid;
use crate::sim::{SimError, require_finite};

/// Exponent of the calibration factor applied to every drive sample.
pub const DRIVE_SCALE_LOG2: f64 = -0.03;

#[inline]
pub fn drive_scale() -> f64 {
    2f64.powf(DRIVE_SCALE_LOG2)
}

/// Waveform shape and its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveKind {
    Constant {
        amplitude: f64,
    },
    /// `floor` except at samples with times in `[onset, onset + width)`.
    Burst {
        amplitude: f64,
        onset: f64,
        width: f64,
        floor: f64,
    },
    /// `baseline + rate * t` plus a Gaussian random walk, clamped below at `min`.
    Drift {
        baseline: f64,
        rate: f64,
        min: f64,
        walk: f64,
    },
    /// Linear interpolation from `start` to `end` over the whole run.
    Ramp {
        start: f64,
        end: f64,
    },
}

impl DriveKind {
    pub fn validate(&self) -> Result<(), SimError> {
        match *self {
            DriveKind::Constant { amplitude } => require_finite("amplitude", amplitude),
            DriveKind::Burst {
                amplitude,
                onset,
                width,
                floor,
            } => {
                require_finite("amplitude", amplitude)?;
                require_finite("onset", onset)?;
                require_finite("floor", floor)?;
                if width.is_nan() {
                    return Err(SimError::invalid("width", width, "is undefined"));
                }
                Ok(())
            }
            DriveKind::Drift {
                baseline,
                rate,
                min,
                walk,
            } => {
                require_finite("baseline", baseline)?;
                require_finite("min", min)?;
                if !rate.is_finite() || rate < 0.0 {
                    return Err(SimError::invalid("rate", rate, "drift must be finite and >= 0"));
                }
                if !walk.is_finite() || walk < 0.0 {
                    return Err(SimError::invalid("walk", walk, "must be finite and >= 0"));
                }
                Ok(())
            }
            DriveKind::Ramp { start, end } => {
                require_finite("start", start)?;
                require_finite("end", end)
            }
        }
    }

    /// Whether generating this waveform consumes random numbers.
    pub fn is_stochastic(&self) -> bool {
        matches!(*self, DriveKind::Drift { walk, .. } if walk > 0.0)
    }
}

/// Leniency applied while shaping a degenerate waveform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveAdjustment {
    /// Pulse interval containing no sample was widened to one sample.
    BurstWidthClamped { requested: f64, samples: usize },
    /// Ramp over fewer than two samples collapsed to its start value.
    RampCollapsed { samples: usize },
}

/// Scaled drive, one value per grid sample.
#[derive(Clone, Debug, PartialEq)]
pub struct DriveProfile {
    values: Vec<f64>,
    adjustments: Vec<DriveAdjustment>,
}

impl DriveProfile {
    /// Shape `kind` on `grid`. `rng` is only drawn from for a drift with a
    /// non-zero random walk.
    pub fn generate<R: Rng + ?Sized>(
        grid: &TimeGrid,
        kind: &DriveKind,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        kind.validate()?;
        let n = grid.len();
        let mut adjustments = Vec::new();

        let mut values = match *kind {
            DriveKind::Constant { amplitude } => vec![amplitude; n],
            DriveKind::Burst {
                amplitude,
                onset,
                width,
                floor,
            } => {
                let mut values = vec![floor; n];
                let mut span = grid.index_range(onset, onset + width);
                let first = grid.first_index_at(onset);
                if span.is_empty() && first < n {
                    warn!(width, dt = grid.dt(), "burst covers no sample, using one sample");
                    adjustments.push(DriveAdjustment::BurstWidthClamped {
                        requested: width,
                        samples: 1,
                    });
                    span = first..first + 1;
                }
                values[span].fill(amplitude);
                values
            }
            DriveKind::Drift {
                baseline,
                rate,
                min,
                walk,
            } => {
                let step_sd = walk * grid.dt().sqrt();
                let mut excursion = 0.0;
                (0..n)
                    .map(|k| {
                        if k > 0 && walk > 0.0 {
                            excursion += step_sd * gaussian(&mut *rng);
                        }
                        (baseline + rate * grid.time(k) + excursion).max(min)
                    })
                    .collect()
            }
            DriveKind::Ramp { start, end } => {
                if n < 2 {
                    warn!(samples = n, "ramp spans fewer than two samples, holding start value");
                    adjustments.push(DriveAdjustment::RampCollapsed { samples: n });
                    vec![start; n]
                } else {
                    let step = (end - start) / (n - 1) as f64;
                    let mut values: Vec<f64> = (0..n).map(|k| start + step * k as f64).collect();
                    values[n - 1] = end;
                    values
                }
            }
        };

        let scale = drive_scale();
        for v in values.iter_mut() {
            *v *= scale;
        }

        Ok(Self {
            values,
            adjustments,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value held over sample `idx`; indices past the end hold the last value.
    #[inline]
    pub fn at(&self, idx: usize) -> f64 {
        match self.values.get(idx) {
            Some(&v) => v,
            None => self.values.last().copied().unwrap_or(0.0),
        }
    }

    pub fn adjustments(&self) -> &[DriveAdjustment] {
        &self.adjustments
    }

    pub fn into_adjustments(self) -> Vec<DriveAdjustment> {
        self.adjustments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::seeded_rng;

    #[test]
    fn scale_constant_matches_calibration() {
        assert!((drive_scale() - 0.979_420_297_586_926_8).abs() < 1e-15);
    }

    #[test]
    fn onset_past_end_leaves_floor() {
        let grid = TimeGrid::new(1.0, 1e-2).unwrap();
        let kind = DriveKind::Burst {
            amplitude: 3.0,
            onset: 5.0,
            width: 0.5,
            floor: 0.5,
        };
        let profile = DriveProfile::generate(&grid, &kind, &mut seeded_rng(0)).unwrap();
        let floor = 0.5 * drive_scale();
        assert!(profile.values().iter().all(|&v| v == floor));
        assert!(profile.adjustments().is_empty());
    }

    #[test]
    fn drift_walk_is_seeded() {
        let grid = TimeGrid::new(1.0, 1e-3).unwrap();
        let kind = DriveKind::Drift {
            baseline: 2.0,
            rate: 0.1,
            min: 1.0,
            walk: 0.5,
        };
        assert!(kind.is_stochastic());
        let a = DriveProfile::generate(&grid, &kind, &mut seeded_rng(9)).unwrap();
        let b = DriveProfile::generate(&grid, &kind, &mut seeded_rng(9)).unwrap();
        let c = DriveProfile::generate(&grid, &kind, &mut seeded_rng(10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let min = drive_scale();
        assert!(a.values().iter().all(|&v| v >= min));
    }

    #[test]
    fn held_value_past_end() {
        let grid = TimeGrid::new(0.05, 1e-2).unwrap();
        let kind = DriveKind::Constant { amplitude: 1.0 };
        let profile = DriveProfile::generate(&grid, &kind, &mut seeded_rng(0)).unwrap();
        assert_eq!(profile.at(100), profile.at(profile.len() - 1));
    }
}
