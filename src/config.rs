//! Configuration for the policy network and the policy-gradient learner.

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::policy::head::BoundedGaussianHead;
use crate::policy::optimizer::AdamConfig;

/// Whether the learner samples and learns, or acts on the distribution means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Actions are sampled and [`learn`](crate::PolicyGradient::learn) is enabled.
    #[default]
    Training,
    /// Actions are the per-dimension means; learning is disabled.
    Deterministic,
}

/// Configuration for the policy network and its training.
///
/// Defaults reproduce the robot hitting setup: a 6-dimensional ball state,
/// two hidden layers of 20 units, and two action heads (`T`, `delta_t0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    // --- Network geometry ---
    /// Dimension of the context (ball state) vector.
    pub state_dim: usize,
    /// Width of each of the two hidden layers.
    pub hidden_dim: usize,
    /// One bounded Gaussian head per action dimension.
    pub heads: Vec<BoundedGaussianHead>,

    // --- Initialisation ---
    /// Standard deviation of the zero-mean Gaussian used for kernel weights.
    pub init_std: f64,

    // --- Optimisation ---
    /// Adam hyper-parameters.
    pub optimizer: AdamConfig,

    // --- Behaviour ---
    /// Training or deterministic operation.
    pub mode: Mode,
}

impl PolicyConfig {
    /// Number of action dimensions.
    pub fn action_dim(&self) -> usize {
        self.heads.len()
    }

    /// Shorthand for overriding the Adam learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.optimizer.learning_rate = learning_rate;
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PolicyError::InvalidConfig(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_dim == 0 {
            return Err(PolicyError::InvalidConfig(
                "state_dim must be positive".to_string(),
            ));
        }
        if self.hidden_dim == 0 {
            return Err(PolicyError::InvalidConfig(
                "hidden_dim must be positive".to_string(),
            ));
        }
        if self.heads.is_empty() {
            return Err(PolicyError::InvalidConfig(
                "at least one action head is required".to_string(),
            ));
        }
        for head in &self.heads {
            head.validate()?;
        }
        if !(self.init_std.is_finite() && self.init_std >= 0.0) {
            return Err(PolicyError::InvalidConfig(format!(
                "init_std must be finite and non-negative, got {}",
                self.init_std
            )));
        }
        self.optimizer.validate()
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            state_dim: 6,
            hidden_dim: 20,
            heads: vec![
                BoundedGaussianHead::hitting_time(),
                BoundedGaussianHead::hitting_offset(),
            ],
            init_std: 0.3,
            optimizer: AdamConfig::default(),
            mode: Mode::Training,
        }
    }
}
