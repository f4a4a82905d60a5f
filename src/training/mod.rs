//! Training infrastructure for the REINFORCE learner.
//!
//! Provides the transition buffer, the loss history and its compressed
//! curve, checkpoint persistence, and the [`PolicyGradient`] learner.

pub mod buffer;
pub mod checkpoint;
pub mod curve;
pub mod learner;


pub use buffer::{Batch, Transition, TransitionBuffer};
pub use checkpoint::Checkpoint;
pub use curve::{CurvePoint, LossHistory, TrainingCurve};
pub use learner::PolicyGradient;
