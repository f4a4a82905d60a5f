//! Plain-data copies of the network parameters.

use serde::{Deserialize, Serialize};

/// Weights and bias of one dense layer, weights row-major (`outputs × inputs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl LayerSnapshot {
    /// Number of scalar parameters in the layer.
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub(crate) fn has_shape(&self, inputs: usize, outputs: usize) -> bool {
        self.inputs == inputs
            && self.outputs == outputs
            && self.weights.len() == inputs * outputs
            && self.bias.len() == outputs
    }
}

/// Every layer of a policy network, input layer first.
///
/// Snapshots compare by value, which makes them the way to check whether
/// parameters changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub layers: Vec<LayerSnapshot>,
}

impl NetworkSnapshot {
    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(LayerSnapshot::parameter_count).sum()
    }

    /// `true` if every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.layers
            .iter()
            .all(|l| l.weights.iter().chain(&l.bias).all(|x| x.is_finite()))
    }
}
