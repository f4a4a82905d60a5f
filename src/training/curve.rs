//! Loss history and its compressed training curve.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CheckpointError, Result};

/// Default number of bins used by [`LossHistory::curve`].
pub const DEFAULT_CURVE_BINS: usize = 20;

/// One averaged window of the loss history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Episode index at the centre of the window.
    pub episode: usize,
    /// Mean loss over the window.
    pub loss: f64,
}

/// Compressed view of a loss history, suitable for plotting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingCurve {
    pub points: Vec<CurvePoint>,
}

impl TrainingCurve {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// `true` if the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The averaged loss of each point, in episode order.
    pub fn losses(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.loss).collect()
    }
}

impl fmt::Display for TrainingCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Training Curve ({} points) ===", self.points.len())?;
        for p in &self.points {
            writeln!(f, "  episode {:>6}  loss {:>12.6}", p.episode, p.loss)?;
        }
        Ok(())
    }
}

/// Append-only record of the loss produced by each learning step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossHistory {
    values: Vec<f64>,
}

impl LossHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Records the loss of one update.
    pub fn push(&mut self, loss: f64) {
        self.values.push(loss);
    }

    /// Every recorded loss, oldest first.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of recorded updates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` before the first successful update.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Averages consecutive runs so at most `bins` points remain.
    ///
    /// Windows are `ceil(len / bins)` long; the last one may be shorter.
    /// Each point sits at the middle episode of its window.
    pub fn compress(&self, bins: usize) -> TrainingCurve {
        let len = self.values.len();
        if len == 0 || bins == 0 {
            return TrainingCurve::default();
        }
        let rate = len.div_ceil(bins);
        let points = self
            .values
            .chunks(rate)
            .enumerate()
            .map(|(i, window)| CurvePoint {
                episode: i * rate + window.len() / 2,
                loss: window.iter().sum::<f64>() / window.len() as f64,
            })
            .collect();
        TrainingCurve { points }
    }

    /// [`compress`](Self::compress) with [`DEFAULT_CURVE_BINS`].
    pub fn curve(&self) -> TrainingCurve {
        self.compress(DEFAULT_CURVE_BINS)
    }

    /// Writes the raw history as a JSON array to `<parent>/<stem>.json`.
    pub fn export_json(&self, base: impl AsRef<Path>) -> Result<PathBuf> {
        let path = base.as_ref().with_extension("json");
        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.values).map_err(|source| {
            CheckpointError::Format {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;
        tracing::info!(
            path = %path.display(),
            entries = self.values.len(),
            "exported loss history"
        );
        Ok(path)
    }
}
