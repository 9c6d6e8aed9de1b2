//! Typed errors surfaced at the component boundaries.
//!
//! Internals propagate `anyhow::Error` with context; the two failure kinds a
//! caller is expected to branch on get their own enums.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid construction parameters. Raised before any data flows.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown augmentation strength {name:?} (expected one of: light, medium, strong)")]
    UnknownStrength { name: String },
    #[error("image size must be positive (got {height}x{width})")]
    InvalidImageSize { height: u32, width: u32 },
    #[error("batch size must be greater than 0")]
    InvalidBatchSize,
    #[error("probability must be in [0.0, 1.0] (got {0})")]
    InvalidProbability(f64),
}

/// Failure to build the train/test batch sources from a dataset root.
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("{split} split directory not found: {}", path.display())]
    MissingSplit { split: String, path: PathBuf },
    #[error("no class directories found in {}", path.display())]
    NoClasses { path: PathBuf },
    #[error("no readable images found in {}", path.display())]
    EmptySplit { path: PathBuf },
    #[error("failed to scan {}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to build {split} data loader")]
    Build {
        split: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid loader configuration")]
    Config(#[from] ConfigError),
}

impl ConfigError {
    pub(crate) fn check_probability(p: f64) -> Result<f64, ConfigError> {
        if (0.0..=1.0).contains(&p) {
            Ok(p)
        } else {
            Err(ConfigError::InvalidProbability(p))
        }
    }
}
