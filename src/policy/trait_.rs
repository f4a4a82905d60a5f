//! Policy trait: the seam between the learner and the function approximator.

use candle_nn::AdamW;
use rand::RngCore;

use super::distribution::Gaussian;
use super::head::BoundedGaussianHead;
use super::network::Gradients;
use crate::error::{PolicyError, Result};
use crate::training::buffer::Batch;

/// A parametric policy producing one independent, bounded Gaussian per
/// action dimension.
///
/// Implementors provide the forward pass and the REINFORCE gradient; the
/// sampling, deterministic and log-probability paths are derived from the
/// forward pass and never mutate parameters.
pub trait StochasticPolicy {
    /// Dimension of the context vector.
    fn state_dim(&self) -> usize;

    /// Dimension of the action vector.
    fn action_dim(&self) -> usize;

    /// Bound maps, one per action dimension.
    fn heads(&self) -> &[BoundedGaussianHead];

    /// Evaluates the per-dimension distributions for `state`.
    fn forward(&self, state: &[f64]) -> Result<Vec<Gaussian>>;

    /// Loss `mean(log_prob · −reward)` over the batch and all action
    /// dimensions, together with its gradient.
    ///
    /// Fails with `NumericalInstability` if the loss or any gradient entry
    /// is not finite; parameters are never touched here.
    fn reinforce_gradient(&self, batch: &Batch) -> Result<(f64, Gradients)>;

    /// Applies one optimizer step using `gradients`.
    fn apply_gradient_step(&mut self, gradients: &Gradients, optimizer: &mut AdamW) -> Result<()>;

    /// Draws one action, each component inside its head's mean range.
    fn sample(&self, state: &[f64], rng: &mut dyn RngCore) -> Result<Vec<f64>> {
        let dists = self.forward(state)?;
        let mut action = Vec::with_capacity(dists.len());
        for (dist, head) in dists.iter().zip(self.heads()) {
            action.push(dist.sample_within(&head.mean, rng)?);
        }
        Ok(action)
    }

    /// The per-dimension means.
    fn deterministic(&self, state: &[f64]) -> Result<Vec<f64>> {
        Ok(self.forward(state)?.iter().map(|d| d.mean).collect())
    }

    /// Per-dimension log-density of `action` under the current policy.
    fn log_prob(&self, state: &[f64], action: &[f64]) -> Result<Vec<f64>> {
        PolicyError::check_dim("action", self.action_dim(), action.len())?;
        let dists = self.forward(state)?;
        dists
            .iter()
            .zip(action)
            .map(|(dist, &a)| {
                let lp = dist.log_prob(a);
                if lp.is_finite() {
                    Ok(lp)
                } else {
                    Err(PolicyError::NumericalInstability(format!(
                        "log-probability of {a} under N({}, {}) is {lp}",
                        dist.mean, dist.stddev
                    )))
                }
            })
            .collect()
    }
}
