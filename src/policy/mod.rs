//! Policy representation: bounded Gaussian heads on top of a small MLP.
//!
//! The network is a candle-nn model trained through candle's autograd;
//! [`StochasticPolicy`] is the interface the learner programs against.

pub mod distribution;
pub mod head;
pub mod network;
pub mod optimizer;
pub mod snapshot;
pub mod trait_;

pub use distribution::Gaussian;
pub use head::{AffineBound, BoundedGaussianHead};
pub use network::{Gradients, PolicyNetwork};
pub use optimizer::AdamConfig;
pub use snapshot::{LayerSnapshot, NetworkSnapshot};
pub use trait_::StochasticPolicy;
