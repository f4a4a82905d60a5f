//! hitpolicy - REINFORCE policy-gradient learning of ball-hitting parameters
//!
//! A small stochastic policy maps a ball observation to a hitting time and a
//! hitting offset, each drawn from a Gaussian whose mean and spread are kept
//! inside configured ranges. The learner collects `(state, action, reward)`
//! transitions and improves the policy with the REINFORCE estimator.

pub mod config;
pub mod error;
pub mod policy;
pub mod reward;
pub mod training;

pub use config::{Mode, PolicyConfig};
pub use error::{CheckpointError, PolicyError, Result};
pub use policy::{
    AdamConfig, AffineBound, BoundedGaussianHead, Gaussian, NetworkSnapshot, PolicyNetwork,
    StochasticPolicy,
};
pub use reward::{NegativeSquaredDistance, RewardFunction};
pub use training::{LossHistory, PolicyGradient, TrainingCurve, Transition};
