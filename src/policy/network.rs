//! Feed-forward policy network with bounded Gaussian heads.
//!
//! Architecture: `state_dim → H → H → 2·action_dim`, tanh on the hidden
//! layers and a logistic output so every raw value lies in `[0, 1]` before
//! it reaches its [`BoundedGaussianHead`]. Output unit `2i` is the raw mean
//! and `2i + 1` the raw standard deviation of action dimension `i`.
//!
//! Parameters live in a candle [`VarMap`]; the REINFORCE loss is built from
//! tensor ops and differentiated by candle's autograd.

use std::fmt;

use candle_core::backprop::GradStore;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{linear, AdamW, Linear, Module, Optimizer, VarBuilder, VarMap};
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use super::distribution::{Gaussian, HALF_LN_TWO_PI};
use super::head::BoundedGaussianHead;
use super::snapshot::{LayerSnapshot, NetworkSnapshot};
use super::trait_::StochasticPolicy;
use crate::config::PolicyConfig;
use crate::error::{PolicyError, Result};
use crate::training::buffer::Batch;

/// Number of tanh hidden layers.
pub const HIDDEN_LAYERS: usize = 2;

fn layer_name(index: usize) -> String {
    format!("layer{index}")
}

/// Gradient of the REINFORCE loss with respect to every network parameter.
pub struct Gradients {
    store: GradStore,
    norm: f64,
}

impl Gradients {
    /// Euclidean norm over all entries.
    pub fn norm(&self) -> f64 {
        self.norm
    }
}

impl fmt::Debug for Gradients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gradients")
            .field("norm", &self.norm)
            .finish_non_exhaustive()
    }
}

/// Affine head bounds laid out as `(action_dim,)` tensors.
struct HeadBounds {
    mean_scale: Tensor,
    mean_offset: Tensor,
    stddev_scale: Tensor,
    stddev_offset: Tensor,
}

impl HeadBounds {
    fn new(heads: &[BoundedGaussianHead], device: &Device) -> Result<Self> {
        let column = |f: fn(&BoundedGaussianHead) -> f64| -> Result<Tensor> {
            let values: Vec<f64> = heads.iter().map(f).collect();
            Ok(Tensor::from_vec(values, heads.len(), device)?)
        };
        Ok(Self {
            mean_scale: column(|h| h.mean.scale)?,
            mean_offset: column(|h| h.mean.offset)?,
            stddev_scale: column(|h| h.stddev.scale)?,
            stddev_offset: column(|h| h.stddev.offset)?,
        })
    }
}

/// MLP policy mapping a context vector to bounded Gaussians.
pub struct PolicyNetwork {
    state_dim: usize,
    heads: Vec<BoundedGaussianHead>,
    bounds: HeadBounds,
    varmap: VarMap,
    layers: Vec<Linear>,
    device: Device,
}

impl fmt::Debug for PolicyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyNetwork")
            .field("state_dim", &self.state_dim)
            .field("heads", &self.heads)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

impl PolicyNetwork {
    /// Builds a freshly initialised network: kernels drawn from
    /// `N(0, init_std²)` with `rng`, biases zero.
    pub fn new(config: &PolicyConfig, rng: &mut dyn RngCore) -> Result<Self> {
        config.validate()?;
        let normal = Normal::new(0.0, config.init_std).map_err(|e| {
            PolicyError::InvalidConfig(format!("weight init stddev {}: {e}", config.init_std))
        })?;
        let mut layers = Vec::new();
        for pair in Self::layer_dims(config).windows(2) {
            let (inputs, outputs) = (pair[0], pair[1]);
            let mut weights = Vec::with_capacity(inputs * outputs);
            for _ in 0..inputs * outputs {
                weights.push(normal.sample(rng));
            }
            layers.push(LayerSnapshot {
                inputs,
                outputs,
                weights,
                bias: vec![0.0; outputs],
            });
        }
        Self::from_snapshot(config, NetworkSnapshot { layers })
    }

    /// Rebuilds a network around saved parameters, checking every shape
    /// against `config`.
    pub fn from_snapshot(config: &PolicyConfig, snapshot: NetworkSnapshot) -> Result<Self> {
        config.validate()?;
        let dims = Self::layer_dims(config);
        if snapshot.layers.len() != dims.len() - 1 {
            return Err(PolicyError::InvalidConfig(format!(
                "expected {} layers, got {}",
                dims.len() - 1,
                snapshot.layers.len()
            )));
        }
        for (i, (layer, pair)) in snapshot.layers.iter().zip(dims.windows(2)).enumerate() {
            if !layer.has_shape(pair[0], pair[1]) {
                return Err(PolicyError::InvalidConfig(format!(
                    "layer {i} has shape {}x{}, expected {}x{}",
                    layer.inputs, layer.outputs, pair[0], pair[1]
                )));
            }
        }
        if !snapshot.is_finite() {
            return Err(PolicyError::InvalidConfig(
                "parameters contain non-finite values".to_string(),
            ));
        }

        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let layers = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F64, &device);
            snapshot
                .layers
                .iter()
                .enumerate()
                .map(|(i, l)| linear(l.inputs, l.outputs, vb.pp(layer_name(i))))
                .collect::<candle_core::Result<Vec<_>>>()?
        };
        for (i, l) in snapshot.layers.iter().enumerate() {
            let name = layer_name(i);
            let weights = Tensor::from_slice(&l.weights, (l.outputs, l.inputs), &device)?;
            let bias = Tensor::from_slice(&l.bias, l.outputs, &device)?;
            varmap.set_one(format!("{name}.weight"), weights)?;
            varmap.set_one(format!("{name}.bias"), bias)?;
        }

        Ok(Self {
            state_dim: config.state_dim,
            bounds: HeadBounds::new(&config.heads, &device)?,
            heads: config.heads.clone(),
            varmap,
            layers,
            device,
        })
    }

    fn layer_dims(config: &PolicyConfig) -> Vec<usize> {
        let mut dims = vec![config.state_dim];
        dims.extend(std::iter::repeat(config.hidden_dim).take(HIDDEN_LAYERS));
        dims.push(2 * config.heads.len());
        dims
    }

    /// Copies the current parameters out of the network.
    pub fn snapshot(&self) -> Result<NetworkSnapshot> {
        let layers = self
            .layers
            .iter()
            .map(|layer| -> Result<LayerSnapshot> {
                let (outputs, inputs) = layer.weight().dims2()?;
                let bias = match layer.bias() {
                    Some(b) => b.to_vec1::<f64>()?,
                    None => vec![0.0; outputs],
                };
                Ok(LayerSnapshot {
                    inputs,
                    outputs,
                    weights: layer.weight().flatten_all()?.to_vec1::<f64>()?,
                    bias,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(NetworkSnapshot { layers })
    }

    /// Total number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.varmap.all_vars().iter().map(|v| v.elem_count()).sum()
    }

    /// The trainable variables, for building an optimizer.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    fn check_state(&self, state: &[f64]) -> Result<()> {
        PolicyError::check_dim("state", self.state_dim, state.len())?;
        if let Some(bad) = state.iter().find(|x| !x.is_finite()) {
            return Err(PolicyError::NumericalInstability(format!(
                "state contains non-finite value {bad}"
            )));
        }
        Ok(())
    }

    /// Logistic outputs for a `(batch, state_dim)` tensor.
    fn raw_outputs(&self, states: &Tensor) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut x = states.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&x)?;
            x = if i == last {
                candle_nn::ops::sigmoid(&z)?
            } else {
                z.tanh()?
            };
        }
        Ok(x)
    }

    /// Per-entry Gaussian log-density, shape `(batch, action_dim)`.
    fn log_prob_tensor(&self, states: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let n = states.dim(0)?;
        let raw = self.raw_outputs(states)?.reshape((n, self.heads.len(), 2))?;
        let raw_mean = raw.narrow(2, 0, 1)?.squeeze(2)?;
        let raw_stddev = raw.narrow(2, 1, 1)?.squeeze(2)?;
        let mean = raw_mean
            .broadcast_mul(&self.bounds.mean_scale)?
            .broadcast_add(&self.bounds.mean_offset)?;
        let stddev = raw_stddev
            .broadcast_mul(&self.bounds.stddev_scale)?
            .broadcast_add(&self.bounds.stddev_offset)?;
        let z = actions.sub(&mean)?.div(&stddev)?;
        Ok(z.sqr()?.affine(-0.5, -HALF_LN_TWO_PI)?.sub(&stddev.log()?)?)
    }

    fn distributions(&self, raw: &[f64]) -> Result<Vec<Gaussian>> {
        raw.chunks_exact(2)
            .zip(&self.heads)
            .map(|(pair, head)| {
                let dist = head.distribution(pair[0], pair[1]);
                if dist.is_finite() && dist.stddev >= 0.0 {
                    Ok(dist)
                } else {
                    Err(PolicyError::NumericalInstability(format!(
                        "head {} produced N({}, {})",
                        head.name, dist.mean, dist.stddev
                    )))
                }
            })
            .collect()
    }
}

impl StochasticPolicy for PolicyNetwork {
    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn action_dim(&self) -> usize {
        self.heads.len()
    }

    fn heads(&self) -> &[BoundedGaussianHead] {
        &self.heads
    }

    fn forward(&self, state: &[f64]) -> Result<Vec<Gaussian>> {
        self.check_state(state)?;
        let input = Tensor::from_slice(state, (1, self.state_dim), &self.device)?;
        let raw = self.raw_outputs(&input)?.squeeze(0)?.to_vec1::<f64>()?;
        self.distributions(&raw)
    }

    fn reinforce_gradient(&self, batch: &Batch) -> Result<(f64, Gradients)> {
        if batch.is_empty() {
            return Err(PolicyError::EmptyBatch);
        }
        let n = batch.len();
        let action_dim = self.action_dim();
        PolicyError::check_dim("batch states", n, batch.states().len())?;
        PolicyError::check_dim("batch actions", n, batch.actions().len())?;

        let mut states = Vec::with_capacity(n * self.state_dim);
        let mut actions = Vec::with_capacity(n * action_dim);
        for (state, action, reward) in batch.iter() {
            self.check_state(state)?;
            PolicyError::check_dim("action", action_dim, action.len())?;
            if !reward.is_finite() {
                return Err(PolicyError::NonFiniteReward(reward));
            }
            states.extend_from_slice(state);
            actions.extend_from_slice(action);
        }
        let states = Tensor::from_vec(states, (n, self.state_dim), &self.device)?;
        let actions = Tensor::from_vec(actions, (n, action_dim), &self.device)?;
        let rewards = Tensor::from_slice(batch.rewards(), (n, 1), &self.device)?;

        let loss = self
            .log_prob_tensor(&states, &actions)?
            .broadcast_mul(&rewards.neg()?)?
            .mean_all()?;
        let value = loss.to_scalar::<f64>()?;
        if !value.is_finite() {
            return Err(PolicyError::NumericalInstability(format!(
                "loss evaluated to {value}"
            )));
        }

        let store = loss.backward()?;
        let mut squared = 0.0;
        for var in self.varmap.all_vars() {
            if let Some(grad) = store.get(var.as_tensor()) {
                for g in grad.flatten_all()?.to_vec1::<f64>()? {
                    if !g.is_finite() {
                        return Err(PolicyError::NumericalInstability(
                            "gradient contains non-finite entries".to_string(),
                        ));
                    }
                    squared += g * g;
                }
            }
        }
        Ok((
            value,
            Gradients {
                store,
                norm: squared.sqrt(),
            },
        ))
    }

    fn apply_gradient_step(&mut self, gradients: &Gradients, optimizer: &mut AdamW) -> Result<()> {
        optimizer.step(&gradients.store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::head::AffineBound;
    use crate::training::buffer::{Transition, TransitionBuffer};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn network(seed: u64) -> PolicyNetwork {
        let mut rng = StdRng::seed_from_u64(seed);
        PolicyNetwork::new(&PolicyConfig::default(), &mut rng).unwrap()
    }

    fn ball_state() -> Vec<f64> {
        vec![0.294, -3.092, -0.347, -1.469, 4.524, 1.274]
    }

    fn batch(transitions: Vec<Transition>) -> Batch {
        let mut buf = TransitionBuffer::new();
        for t in transitions {
            buf.push(t);
        }
        buf.drain()
    }

    fn frozen_heads_config() -> PolicyConfig {
        PolicyConfig {
            heads: vec![
                BoundedGaussianHead::new(
                    "T",
                    AffineBound::new(0.2, 0.3),
                    AffineBound::new(0.0, 0.0),
                ),
                BoundedGaussianHead::new(
                    "delta_t0",
                    AffineBound::new(0.1, 0.8),
                    AffineBound::new(0.0, 0.0),
                ),
            ],
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn layer_shapes() {
        let net = network(0);
        let snap = net.snapshot().unwrap();
        let shapes: Vec<(usize, usize)> =
            snap.layers.iter().map(|l| (l.inputs, l.outputs)).collect();
        assert_eq!(shapes, vec![(6, 20), (20, 20), (20, 4)]);
        let expected = 6 * 20 + 20 + 20 * 20 + 20 + 20 * 4 + 4;
        assert_eq!(net.parameter_count(), expected);
        assert_eq!(snap.parameter_count(), expected);
        assert_eq!(net.trainable_vars().len(), 6);
    }

    #[test]
    fn init_uses_zero_bias_and_seeded_kernels() {
        let a = network(17).snapshot().unwrap();
        let b = network(17).snapshot().unwrap();
        assert_eq!(a, b);
        for layer in &a.layers {
            assert!(layer.bias.iter().all(|&x| x == 0.0));
            assert!(layer.weights.iter().any(|&w| w != 0.0));
        }
        assert_ne!(a, network(18).snapshot().unwrap());
    }

    #[test]
    fn zero_state_gives_mid_range_means() {
        // Zero biases and a zero input make every raw output sigmoid(0).
        let net = network(11);
        let action = net.deterministic(&[0.0; 6]).unwrap();
        assert!((action[0] - 0.4).abs() < 1e-12);
        assert!((action[1] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn deterministic_is_bit_identical() {
        let net = network(3);
        let a = net.deterministic(&ball_state()).unwrap();
        let b = net.deterministic(&ball_state()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn actions_respect_bounds_under_extreme_weights() {
        let config = PolicyConfig::default();
        let mut rng = StdRng::seed_from_u64(99);
        for trial in 0..20 {
            let mut snap = network(trial).snapshot().unwrap();
            let scale = if trial % 2 == 0 { 50.0 } else { -50.0 };
            for layer in &mut snap.layers {
                for w in layer.weights.iter_mut().chain(layer.bias.iter_mut()) {
                    *w = rng.gen_range(-1.0..1.0) * scale;
                }
            }
            let net = PolicyNetwork::from_snapshot(&config, snap).unwrap();
            let state: Vec<f64> = (0..6).map(|_| rng.gen_range(-5.0..5.0)).collect();
            let det = net.deterministic(&state).unwrap();
            for _ in 0..50 {
                let sampled = net.sample(&state, &mut rng).unwrap();
                for ((head, s), d) in net.heads().iter().zip(&sampled).zip(&det) {
                    assert!(head.mean.contains(*s), "sample {s} outside {:?}", head.mean);
                    assert!(head.mean.contains(*d), "mean {d} outside {:?}", head.mean);
                }
            }
        }
    }

    #[test]
    fn zero_stddev_sampling_equals_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = PolicyNetwork::new(&frozen_heads_config(), &mut rng).unwrap();
        let det = net.deterministic(&ball_state()).unwrap();
        for _ in 0..10 {
            assert_eq!(net.sample(&ball_state(), &mut rng).unwrap(), det);
        }
    }

    #[test]
    fn zero_stddev_loss_is_unstable() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = PolicyNetwork::new(&frozen_heads_config(), &mut rng).unwrap();
        let mean = net.deterministic(&ball_state()).unwrap();
        let b = batch(vec![Transition::new(ball_state(), mean, -0.01)]);
        assert!(matches!(
            net.reinforce_gradient(&b),
            Err(PolicyError::NumericalInstability(_))
        ));
    }

    #[test]
    fn wrong_state_dimension_rejected() {
        let net = network(1);
        let err = net.deterministic(&[0.0; 4]).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::DimensionMismatch {
                what: "state",
                expected: 6,
                actual: 4
            }
        ));
    }

    #[test]
    fn log_prob_has_one_entry_per_dimension() {
        let net = network(2);
        let state = ball_state();
        let mean = net.deterministic(&state).unwrap();
        let lp = net.log_prob(&state, &mean).unwrap();
        assert_eq!(lp.len(), 2);
        let off = vec![mean[0] + 0.01, mean[1] - 0.005];
        let lp_off = net.log_prob(&state, &off).unwrap();
        assert!(lp[0] > lp_off[0]);
        assert!(lp[1] > lp_off[1]);
        assert!(net.log_prob(&state, &[0.4]).is_err());
    }

    #[test]
    fn empty_batch_rejected() {
        let net = network(0);
        let err = net.reinforce_gradient(&Batch::default()).unwrap_err();
        assert!(matches!(err, PolicyError::EmptyBatch));
    }

    #[test]
    fn malformed_batch_rows_rejected() {
        let net = network(0);
        let short_action =
            Batch::from_parts(vec![ball_state()], vec![vec![0.4]], vec![1.0]).unwrap();
        assert!(matches!(
            net.reinforce_gradient(&short_action),
            Err(PolicyError::DimensionMismatch { what: "action", .. })
        ));
        let short_state =
            Batch::from_parts(vec![vec![0.0; 3]], vec![vec![0.4, 0.85]], vec![1.0]).unwrap();
        assert!(matches!(
            net.reinforce_gradient(&short_state),
            Err(PolicyError::DimensionMismatch { what: "state", .. })
        ));
        let bad_reward =
            Batch::from_parts(vec![ball_state()], vec![vec![0.4, 0.85]], vec![f64::NAN]).unwrap();
        assert!(matches!(
            net.reinforce_gradient(&bad_reward),
            Err(PolicyError::NonFiniteReward(_))
        ));
    }

    #[test]
    fn loss_matches_log_prob_definition() {
        let net = network(4);
        let s1 = ball_state();
        let s2 = vec![0.1, 0.2, -0.3, 0.4, -0.5, 0.6];
        let a1 = vec![0.41, 0.84];
        let a2 = vec![0.38, 0.86];
        let b = batch(vec![
            Transition::new(s1.clone(), a1.clone(), -0.5),
            Transition::new(s2.clone(), a2.clone(), 0.25),
        ]);
        let (loss, _) = net.reinforce_gradient(&b).unwrap();
        let lp1 = net.log_prob(&s1, &a1).unwrap();
        let lp2 = net.log_prob(&s2, &a2).unwrap();
        let expected = (lp1.iter().map(|l| l * 0.5).sum::<f64>()
            + lp2.iter().map(|l| l * -0.25).sum::<f64>())
            / 4.0;
        assert!((loss - expected).abs() < 1e-9);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let config = PolicyConfig::default();
        let net = network(8);
        let b = batch(vec![
            Transition::new(ball_state(), vec![0.405, 0.848], -0.02),
            Transition::new(vec![0.5; 6], vec![0.395, 0.852], 0.7),
        ]);
        let (_, grads) = net.reinforce_gradient(&b).unwrap();
        let base = net.snapshot().unwrap();
        let loss_at = |snap: NetworkSnapshot| {
            let perturbed = PolicyNetwork::from_snapshot(&config, snap).unwrap();
            perturbed.reinforce_gradient(&b).unwrap().0
        };
        let h = 1e-6;
        for (l, layer) in net.layers.iter().enumerate() {
            let analytic = grads
                .store
                .get(layer.weight())
                .unwrap()
                .flatten_all()
                .unwrap()
                .to_vec1::<f64>()
                .unwrap();
            for k in (0..analytic.len()).step_by(7) {
                let mut plus = base.clone();
                plus.layers[l].weights[k] += h;
                let mut minus = base.clone();
                minus.layers[l].weights[k] -= h;
                let fd = (loss_at(plus) - loss_at(minus)) / (2.0 * h);
                let tol = 1e-4 * fd.abs().max(analytic[k].abs()).max(1.0);
                assert!(
                    (analytic[k] - fd).abs() < tol,
                    "layer {l} weight {k}: analytic {} vs fd {fd}",
                    analytic[k]
                );
            }
        }
    }

    #[test]
    fn gradient_step_changes_parameters() {
        let mut net = network(6);
        let before = net.snapshot().unwrap();
        let b = batch(vec![Transition::new(ball_state(), vec![0.41, 0.84], -0.01)]);
        let (_, grads) = net.reinforce_gradient(&b).unwrap();
        assert!(grads.norm() > 0.0);
        let mut adam = PolicyConfig::default()
            .optimizer
            .build(net.trainable_vars())
            .unwrap();
        net.apply_gradient_step(&grads, &mut adam).unwrap();
        assert_ne!(net.snapshot().unwrap(), before);
    }

    #[test]
    fn from_snapshot_checks_parameters() {
        let config = PolicyConfig::default();
        let net = network(0);
        let snap = net.snapshot().unwrap();

        let mut missing = snap.clone();
        missing.layers.pop();
        assert!(matches!(
            PolicyNetwork::from_snapshot(&config, missing),
            Err(PolicyError::InvalidConfig(_))
        ));

        let mut poisoned = snap.clone();
        poisoned.layers[0].weights[0] = f64::INFINITY;
        assert!(PolicyNetwork::from_snapshot(&config, poisoned).is_err());

        let rebuilt = PolicyNetwork::from_snapshot(&config, snap.clone()).unwrap();
        assert_eq!(rebuilt.snapshot().unwrap(), snap);
        assert_eq!(
            rebuilt.deterministic(&ball_state()).unwrap(),
            net.deterministic(&ball_state()).unwrap()
        );
    }
}
