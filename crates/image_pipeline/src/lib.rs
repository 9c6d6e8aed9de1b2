//! Folder-based image classification data pipeline.
//!
//! - [`provision`]: download sample images into a `train`/`test` tree
//! - [`loader`]: build train/test [`DataLoader`]s over that tree
//! - [`augmentation`]: train-time augmentation pipelines by strength
//! - [`visualize`]: render a few de-normalized images from a batch

pub mod augmentation;
pub mod batch;
pub mod dataloader;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod normalization;
pub mod provision;
pub mod random;
pub mod readers;
pub mod sample;
pub mod sampler;
pub mod transforms;
pub mod visualize;

pub use augmentation::{AugmentationPolicy, AugmentationStrength, StrengthProfile};
pub use batch::{BatchSource, ImageBatch};
pub use dataloader::{DataLoader, DataLoaderConfig};
pub use dataset::{Dataset, ImageFolderDataset};
pub use error::{ConfigError, DatasetLoadError};
pub use loader::{DatasetLoader, Split};
pub use normalization::{NormalizationConstant, IMAGENET};
pub use provision::{DatasetProvisioner, ProvisionReport, SplitMode};
pub use random::RandomSource;
pub use sample::LabeledImage;
pub use transforms::vision::ImageSize;
pub use transforms::{Transform, TransformPipeline};
pub use visualize::{BatchVisualizer, PngGridRenderer};
