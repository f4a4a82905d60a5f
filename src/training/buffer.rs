//! Transition buffer for one learning iteration.

use crate::error::{PolicyError, Result};

/// A single `(state, action, reward)` observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Context vector the action was generated for.
    pub state: Vec<f64>,
    /// Action that was executed.
    pub action: Vec<f64>,
    /// Scalar reward, higher is better.
    pub reward: f64,
}

impl Transition {
    /// Bundles one observation.
    pub fn new(state: Vec<f64>, action: Vec<f64>, reward: f64) -> Self {
        Self {
            state,
            action,
            reward,
        }
    }
}

/// A drained batch stored as three parallel, equal-length sequences.
///
/// Built by [`TransitionBuffer::drain`] or [`Batch::from_parts`], both of
/// which keep the three sequences the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    states: Vec<Vec<f64>>,
    actions: Vec<Vec<f64>>,
    rewards: Vec<f64>,
}

impl Batch {
    /// Assembles a batch from parallel sequences.
    ///
    /// Fails with [`PolicyError::DimensionMismatch`] unless all three have
    /// the same length.
    pub fn from_parts(
        states: Vec<Vec<f64>>,
        actions: Vec<Vec<f64>>,
        rewards: Vec<f64>,
    ) -> Result<Self> {
        PolicyError::check_dim("batch states", rewards.len(), states.len())?;
        PolicyError::check_dim("batch actions", rewards.len(), actions.len())?;
        Ok(Self {
            states,
            actions,
            rewards,
        })
    }

    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    pub fn actions(&self) -> &[Vec<f64>] {
        &self.actions
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Iterates transitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64], f64)> + '_ {
        self.states
            .iter()
            .zip(&self.actions)
            .zip(&self.rewards)
            .map(|((s, a), &r)| (s.as_slice(), a.as_slice(), r))
    }

    /// Mean reward of the batch, `None` when empty.
    pub fn mean_reward(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.rewards.iter().sum::<f64>() / self.len() as f64)
        }
    }
}

/// Append-only queue of transitions, emptied by [`TransitionBuffer::drain`].
#[derive(Debug, Default)]
pub struct TransitionBuffer {
    transitions: Vec<Transition>,
}

impl TransitionBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Appends a transition. No validation happens here.
    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    /// Takes every stored transition, leaving the buffer empty.
    ///
    /// Draining an empty buffer yields an empty batch.
    pub fn drain(&mut self) -> Batch {
        let n = self.transitions.len();
        let mut batch = Batch {
            states: Vec::with_capacity(n),
            actions: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
        };
        for t in self.transitions.drain(..) {
            batch.states.push(t.state);
            batch.actions.push(t.action);
            batch.rewards.push(t.reward);
        }
        batch
    }

    /// Discards every stored transition.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
