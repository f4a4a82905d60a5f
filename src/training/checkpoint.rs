//! File-based checkpoints of network parameters and the update count.
//!
//! Checkpoints are JSON documents. Saving appends a local timestamp to the
//! base name (`<stem>_YYYYMMDD_HHMMSS.ckpt`); restoring reads
//! `<stem>.ckpt` next to the supplied path.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::error::{CheckpointError, PolicyError, Result};
use crate::policy::network::PolicyNetwork;
use crate::policy::snapshot::NetworkSnapshot;

pub const CHECKPOINT_EXTENSION: &str = "ckpt";
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serialized form of a trained policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub state_dim: usize,
    pub hidden_dim: usize,
    pub action_dim: usize,
    pub network: NetworkSnapshot,
    pub updates: u64,
}

impl Checkpoint {
    /// Copies the parameters of `network` out for saving.
    pub fn capture(network: &PolicyNetwork, updates: u64, config: &PolicyConfig) -> Result<Self> {
        Ok(Self {
            version: CHECKPOINT_VERSION,
            state_dim: config.state_dim,
            hidden_dim: config.hidden_dim,
            action_dim: config.action_dim(),
            network: network.snapshot()?,
            updates,
        })
    }

    /// Rebuilds the network and returns it with the stored update count,
    /// checking the stored shape against `config`.
    pub fn into_parts(self, config: &PolicyConfig) -> Result<(PolicyNetwork, u64)> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                found: self.version,
                expected: CHECKPOINT_VERSION,
            }
            .into());
        }
        let expected = (config.state_dim, config.hidden_dim, config.action_dim());
        let found = (self.state_dim, self.hidden_dim, self.action_dim);
        if expected != found {
            return Err(CheckpointError::Shape(format!(
                "checkpoint has (state, hidden, action) = {found:?}, config expects {expected:?}"
            ))
            .into());
        }
        let network =
            PolicyNetwork::from_snapshot(config, self.network).map_err(|e| match e {
                PolicyError::InvalidConfig(msg) => CheckpointError::Shape(msg).into(),
                other => other,
            })?;
        Ok((network, self.updates))
    }
}

/// `<parent>/<stem>_YYYYMMDD_HHMMSS.ckpt` for the given instant.
pub fn timestamped_path(base: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!(
        "{stem}_{}.{CHECKPOINT_EXTENSION}",
        now.format("%Y%m%d_%H%M%S")
    );
    base.with_file_name(name)
}

/// `<parent>/<stem>.ckpt`.
pub fn restore_path(base: &Path) -> PathBuf {
    base.with_extension(CHECKPOINT_EXTENSION)
}

/// Writes `checkpoint` to a timestamped file derived from `base`.
pub fn save(checkpoint: &Checkpoint, base: &Path) -> Result<PathBuf> {
    let path = timestamped_path(base, Local::now());
    write_to(checkpoint, &path)?;
    tracing::info!(path = %path.display(), "saved policy parameters");
    Ok(path)
}

/// Writes `checkpoint` to exactly `path`.
pub fn write_to(checkpoint: &Checkpoint, path: &Path) -> Result<()> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, checkpoint).map_err(|source| CheckpointError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

/// Reads the checkpoint at [`restore_path`]`(base)`.
pub fn load(base: &Path) -> Result<Checkpoint> {
    let path = restore_path(base);
    let file = File::open(&path).map_err(|source| CheckpointError::Io {
        path: path.clone(),
        source,
    })?;
    let checkpoint = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        CheckpointError::Format {
            path: path.clone(),
            source,
        }
    })?;
    tracing::info!(path = %path.display(), "restored policy parameters");
    Ok(checkpoint)
}
