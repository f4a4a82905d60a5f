//! REINFORCE policy-gradient learner.

use std::path::{Path, PathBuf};

use candle_nn::AdamW;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::buffer::{Transition, TransitionBuffer};
use super::checkpoint::{self, Checkpoint};
use super::curve::{LossHistory, TrainingCurve};
use crate::config::{Mode, PolicyConfig};
use crate::error::{PolicyError, Result};
use crate::policy::network::PolicyNetwork;
use crate::policy::trait_::StochasticPolicy;

/// Trains a [`PolicyNetwork`] from `(state, action, reward)` transitions.
///
/// Typical use:
///
/// 1. [`generate_action`](Self::generate_action) for the observed state.
/// 2. [`store_transition`](Self::store_transition) once the reward is known.
/// 3. [`learn`](Self::learn) after a batch has been collected.
///
/// The learner exclusively owns the network parameters, the optimizer, the
/// transition buffer and the random source. Parameters only change inside
/// [`learn`](Self::learn).
pub struct PolicyGradient<R: RngCore = StdRng> {
    config: PolicyConfig,
    network: PolicyNetwork,
    optimizer: AdamW,
    updates: u64,
    buffer: TransitionBuffer,
    history: LossHistory,
    mode: Mode,
    rng: R,
}

impl PolicyGradient<StdRng> {
    /// Creates a learner with a reproducible random source.
    pub fn from_seed(config: PolicyConfig, seed: u64) -> Result<Self> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    /// Creates a learner seeded from operating-system entropy.
    pub fn from_entropy(config: PolicyConfig) -> Result<Self> {
        Self::new(config, StdRng::from_entropy())
    }
}

impl<R: RngCore> PolicyGradient<R> {
    /// Creates a learner with freshly initialised parameters.
    pub fn new(config: PolicyConfig, mut rng: R) -> Result<Self> {
        let network = PolicyNetwork::new(&config, &mut rng)?;
        Self::assemble(config, network, 0, rng)
    }

    /// Creates a learner whose parameters and update count are read from
    /// the checkpoint `<stem>.ckpt` next to `path`. Adam moments start from
    /// zero.
    ///
    /// Fails without constructing anything if the checkpoint is missing,
    /// malformed, or shaped for a different configuration.
    pub fn restore(config: PolicyConfig, rng: R, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let (network, updates) = checkpoint::load(path.as_ref())?.into_parts(&config)?;
        Self::assemble(config, network, updates, rng)
    }

    fn assemble(
        config: PolicyConfig,
        network: PolicyNetwork,
        updates: u64,
        rng: R,
    ) -> Result<Self> {
        let optimizer = config.optimizer.build(network.trainable_vars())?;
        tracing::debug!(
            parameters = network.parameter_count(),
            updates,
            "policy network ready"
        );
        let mode = config.mode;
        Ok(Self {
            config,
            network,
            optimizer,
            updates,
            buffer: TransitionBuffer::new(),
            history: LossHistory::new(),
            mode,
            rng,
        })
    }

    /// Samples an action in training mode, or returns the distribution means
    /// in deterministic mode. Every component lies within its head's mean
    /// range.
    pub fn generate_action(&mut self, state: &[f64]) -> Result<Vec<f64>> {
        match self.mode {
            Mode::Training => self.network.sample(state, &mut self.rng),
            Mode::Deterministic => self.network.deterministic(state),
        }
    }

    /// Records one transition for the next [`learn`](Self::learn) call.
    ///
    /// Inputs are validated before the buffer is touched.
    pub fn store_transition(&mut self, state: &[f64], action: &[f64], reward: f64) -> Result<()> {
        PolicyError::check_dim("state", self.network.state_dim(), state.len())?;
        PolicyError::check_dim("action", self.network.action_dim(), action.len())?;
        if !reward.is_finite() {
            return Err(PolicyError::NonFiniteReward(reward));
        }
        if state.iter().chain(action).any(|x| !x.is_finite()) {
            return Err(PolicyError::NumericalInstability(
                "transition contains a non-finite state or action value".to_string(),
            ));
        }
        self.buffer
            .push(Transition::new(state.to_vec(), action.to_vec(), reward));
        Ok(())
    }

    /// Performs one REINFORCE update over every stored transition and
    /// returns the loss.
    ///
    /// The buffer is drained even if the update then fails; parameters are
    /// only modified when the loss and gradient are finite.
    pub fn learn(&mut self) -> Result<f64> {
        if self.mode == Mode::Deterministic {
            return Err(PolicyError::LearningDisabled);
        }
        if self.buffer.is_empty() {
            return Err(PolicyError::EmptyBatch);
        }
        let batch = self.buffer.drain();
        let (loss, gradients) = self.network.reinforce_gradient(&batch)?;
        self.network
            .apply_gradient_step(&gradients, &mut self.optimizer)?;
        self.updates += 1;
        self.history.push(loss);

        tracing::debug!(
            update = self.updates,
            batch = batch.len(),
            loss,
            mean_reward = batch.mean_reward().unwrap_or_default(),
            grad_norm = gradients.norm(),
            "policy gradient step"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Some(state) = batch.states().first() {
                if let Ok(dists) = self.network.forward(state) {
                    for (head, dist) in self.network.heads().iter().zip(&dists) {
                        tracing::trace!(
                            head = %head.name,
                            mean = dist.mean,
                            stddev = dist.stddev,
                            "updated distribution"
                        );
                    }
                }
            }
        }
        Ok(loss)
    }

    /// [`learn`](Self::learn), then save a timestamped checkpoint derived
    /// from `base`.
    pub fn learn_with_checkpoint(&mut self, base: impl AsRef<Path>) -> Result<(f64, PathBuf)> {
        let loss = self.learn()?;
        let path = self.save_checkpoint(base)?;
        Ok((loss, path))
    }

    /// Saves parameters and the update count to
    /// `<parent>/<stem>_YYYYMMDD_HHMMSS.ckpt`.
    pub fn save_checkpoint(&self, base: impl AsRef<Path>) -> Result<PathBuf> {
        let ckpt = Checkpoint::capture(&self.network, self.updates, &self.config)?;
        checkpoint::save(&ckpt, base.as_ref())
    }

    /// Loss history compressed into at most 20 averaged points.
    pub fn report_training_curve(&self) -> TrainingCurve {
        self.history.curve()
    }

    /// Writes the raw loss history to `<parent>/<stem>.json`.
    pub fn export_loss_history(&self, base: impl AsRef<Path>) -> Result<PathBuf> {
        self.history.export_json(base)
    }

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switches between training and deterministic operation.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Loss of every successful update, oldest first.
    pub fn loss_history(&self) -> &LossHistory {
        &self.history
    }

    /// Transitions stored since the last [`learn`](Self::learn).
    pub fn pending_transitions(&self) -> usize {
        self.buffer.len()
    }

    /// Number of optimizer steps applied, including restored ones.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// The policy being trained.
    pub fn policy(&self) -> &PolicyNetwork {
        &self.network
    }

    /// Configuration the learner was built with.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}
