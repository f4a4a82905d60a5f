use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors reported by the policy, the learner and their collaborators.
///
/// Every variant is a local, synchronous failure; nothing is retried.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{what} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot learn from an empty batch: no transitions were stored")]
    EmptyBatch,

    #[error("Learning is disabled while the policy is in deterministic mode")]
    LearningDisabled,

    #[error("Reward must be finite, got {0}")]
    NonFiniteReward(f64),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl PolicyError {
    pub(crate) fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(PolicyError::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}

/// Failures while saving or restoring network parameters and diagnostics.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed checkpoint {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Checkpoint shape mismatch: {0}")]
    Shape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_display() {
        let e = PolicyError::DimensionMismatch {
            what: "state",
            expected: 6,
            actual: 4,
        };
        assert_eq!(e.to_string(), "state has dimension 4, expected 6");
    }

    #[test]
    fn empty_batch_display() {
        let e = PolicyError::EmptyBatch;
        assert_eq!(
            e.to_string(),
            "Cannot learn from an empty batch: no transitions were stored"
        );
    }

    #[test]
    fn non_finite_reward_display() {
        let e = PolicyError::NonFiniteReward(f64::NAN);
        assert!(e.to_string().contains("Reward must be finite"));
    }

    #[test]
    fn check_dim_accepts_equal() {
        assert!(PolicyError::check_dim("action", 2, 2).is_ok());
        assert!(matches!(
            PolicyError::check_dim("action", 2, 3),
            Err(PolicyError::DimensionMismatch {
                what: "action",
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn checkpoint_error_is_transparent() {
        let e: PolicyError = CheckpointError::Version {
            found: 7,
            expected: 1,
        }
        .into();
        assert_eq!(e.to_string(), "Unsupported checkpoint version 7 (expected 1)");
    }
}
