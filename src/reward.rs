//! Reward functions scoring an achieved action against a target.

/// Scalar reward for reaching `achieved` when `target` was wanted.
///
/// Implementations must be deterministic; higher is better.
pub trait RewardFunction {
    fn reward(&self, target: &[f64], achieved: &[f64]) -> f64;
}

impl<F> RewardFunction for F
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    fn reward(&self, target: &[f64], achieved: &[f64]) -> f64 {
        self(target, achieved)
    }
}

/// `-scale · ‖target − achieved‖²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegativeSquaredDistance {
    pub scale: f64,
}

impl Default for NegativeSquaredDistance {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl RewardFunction for NegativeSquaredDistance {
    fn reward(&self, target: &[f64], achieved: &[f64]) -> f64 {
        -self.scale * squared_distance(target, achieved)
    }
}

/// Squared Euclidean distance over the common prefix of both slices.
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
