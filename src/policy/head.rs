//! Affine bound maps that confine raw network outputs to physical ranges.

use serde::{Deserialize, Serialize};

use super::distribution::Gaussian;
use crate::error::{PolicyError, Result};

/// Fixed affine map `value = raw * scale + offset`.
///
/// With `raw ∈ [0, 1]` the result lies in `[offset, offset + scale]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineBound {
    pub scale: f64,
    pub offset: f64,
}

impl AffineBound {
    /// Map with the given `scale` and `offset`.
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    /// Maps a raw logistic output into the bound.
    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    /// Value reached at `raw = 0`.
    pub fn lower(&self) -> f64 {
        self.offset
    }

    /// Value reached at `raw = 1`.
    pub fn upper(&self) -> f64 {
        self.offset + self.scale
    }

    /// `true` if `value` lies in `[lower, upper]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower() && value <= self.upper()
    }

    fn validate(&self, label: &str) -> Result<()> {
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(PolicyError::InvalidConfig(format!(
                "{label} bound must be finite (scale={}, offset={})",
                self.scale, self.offset
            )));
        }
        if self.scale < 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "{label} bound scale must be non-negative, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Bounded Gaussian head for one action dimension.
///
/// Converts the pair of logistic outputs for a dimension into the mean and
/// standard deviation of its Gaussian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedGaussianHead {
    /// Human-readable label, used in diagnostics only.
    pub name: String,
    pub mean: AffineBound,
    pub stddev: AffineBound,
}

impl BoundedGaussianHead {
    pub fn new(name: impl Into<String>, mean: AffineBound, stddev: AffineBound) -> Self {
        Self {
            name: name.into(),
            mean,
            stddev,
        }
    }

    /// Hitting time `T`: mean in `[0.3, 0.5]`, stddev in `[0.0, 0.02]`.
    pub fn hitting_time() -> Self {
        Self::new(
            "T",
            AffineBound::new(0.2, 0.3),
            AffineBound::new(0.02, 0.0),
        )
    }

    /// Hitting offset `delta_t0`: mean in `[0.8, 0.9]`, stddev in `[0.0, 0.01]`.
    pub fn hitting_offset() -> Self {
        Self::new(
            "delta_t0",
            AffineBound::new(0.1, 0.8),
            AffineBound::new(0.01, 0.0),
        )
    }

    pub fn distribution(&self, raw_mean: f64, raw_stddev: f64) -> Gaussian {
        Gaussian::new(self.mean.apply(raw_mean), self.stddev.apply(raw_stddev))
    }

    /// Checks that the head can only ever produce a valid Gaussian.
    pub fn validate(&self) -> Result<()> {
        self.mean.validate(&format!("{} mean", self.name))?;
        self.stddev.validate(&format!("{} stddev", self.name))?;
        if self.stddev.offset < 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "{} stddev offset must be non-negative, got {}",
                self.name, self.stddev.offset
            )));
        }
        Ok(())
    }
}
