//! Univariate Gaussian used for each action dimension.

use rand::RngCore;
use rand_distr::{Distribution, Normal};

use super::head::AffineBound;
use crate::error::{PolicyError, Result};

/// Redraws attempted before a sample is clamped into its bound.
const MAX_REDRAWS: usize = 64;

/// `ln(√(2π))`.
pub(crate) const HALF_LN_TWO_PI: f64 = 0.918_938_533_204_672_7;

/// Mean and standard deviation of one action dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub mean: f64,
    pub stddev: f64,
}

impl Gaussian {
    /// Distribution with the given parameters, unchecked.
    pub fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }

    /// `true` if both parameters are finite.
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.stddev.is_finite()
    }

    /// Log-density at `x`.
    ///
    /// A zero standard deviation yields a non-finite value, which callers
    /// report as numerical instability.
    pub fn log_prob(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.stddev;
        -0.5 * z * z - self.stddev.ln() - HALF_LN_TWO_PI
    }

    /// Draws one value restricted to `bound`.
    ///
    /// Out-of-range draws are rejected and redrawn; after [`MAX_REDRAWS`]
    /// attempts the last draw is clamped.
    pub fn sample_within(&self, bound: &AffineBound, rng: &mut dyn RngCore) -> Result<f64> {
        if self.stddev == 0.0 {
            return Ok(self.mean);
        }
        let normal = Normal::new(self.mean, self.stddev).map_err(|e| {
            PolicyError::NumericalInstability(format!(
                "cannot sample N({}, {}): {e}",
                self.mean, self.stddev
            ))
        })?;

        let mut draw = normal.sample(rng);
        for _ in 0..MAX_REDRAWS {
            if bound.contains(draw) {
                return Ok(draw);
            }
            draw = normal.sample(rng);
        }
        if bound.contains(draw) {
            return Ok(draw);
        }
        tracing::warn!(
            mean = self.mean,
            stddev = self.stddev,
            draw,
            "sample stayed outside its bound, clamping"
        );
        Ok(draw.clamp(bound.lower(), bound.upper()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn log_prob_standard_normal_at_zero() {
        let g = Gaussian::new(0.0, 1.0);
        assert!((g.log_prob(0.0) + HALF_LN_TWO_PI).abs() < 1e-12);
    }

    #[test]
    fn log_prob_peaks_at_mean() {
        let g = Gaussian::new(0.4, 0.01);
        assert!(g.log_prob(0.4) > g.log_prob(0.41));
        assert!(g.log_prob(0.4) > g.log_prob(0.39));
    }

    #[test]
    fn zero_stddev_log_prob_is_not_finite() {
        let g = Gaussian::new(0.4, 0.0);
        assert!(!g.log_prob(0.4).is_finite());
    }

    #[test]
    fn zero_stddev_sample_is_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = Gaussian::new(0.37, 0.0);
        let bound = AffineBound::new(0.2, 0.3);
        assert_eq!(g.sample_within(&bound, &mut rng).unwrap(), 0.37);
    }

    #[test]
    fn samples_stay_within_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let bound = AffineBound::new(0.2, 0.3);
        // Mean sitting on the upper edge with a wide spread.
        let g = Gaussian::new(0.5, 0.5);
        for _ in 0..1000 {
            let x = g.sample_within(&bound, &mut rng).unwrap();
            assert!(bound.contains(x), "{x} escaped its bound");
        }
    }

    #[test]
    fn nan_stddev_is_reported() {
        let mut rng = StdRng::seed_from_u64(3);
        let g = Gaussian::new(0.4, f64::NAN);
        let bound = AffineBound::new(0.2, 0.3);
        assert!(matches!(
            g.sample_within(&bound, &mut rng),
            Err(PolicyError::NumericalInstability(_))
        ));
    }
}
