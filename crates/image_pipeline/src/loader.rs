//! Builds train/test batch sources from a `train`/`test` image tree.
//!
//! ```text
//! <root>/
//! ├── train/<class_name>/<file>
//! └── test/<class_name>/<file>
//! ```

use crate::dataloader::{DataLoader, DataLoaderConfig};
use crate::dataset::ImageFolderDataset;
use crate::error::{ConfigError, DatasetLoadError};
use crate::readers::ImageFolder;
use crate::transforms::vision::{ImageSize, Normalize, Resize, ToTensor};
use crate::transforms::{Transform, TransformPipeline};
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display};
use tracing::{debug, error, info, warn};

/// One of the two top-level partitions of a dataset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

/// Deterministic `Resize` (bilinear, exact) -> `ToTensor` -> `Normalize(IMAGENET)`.
pub fn eval_transform(size: ImageSize) -> TransformPipeline {
    TransformPipeline::new(
        Resize::bilinear(size)
            .then(ToTensor)
            .then(Normalize::imagenet()),
    )
}

pub type ImageLoader = DataLoader<ImageFolderDataset>;

/// Loads the `train` and `test` splits under a root directory.
///
/// Train batches are reshuffled every pass; test batches keep scan order.
/// Images are decoded from disk on every pass.
///
/// # Example
/// ```ignore
/// let loader = DatasetLoader::new("medical_images_test", ImageSize::new(128, 128)?, 32, 2)?;
/// let (train, test) = loader.create_loaders()?;
/// ```
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    root: PathBuf,
    image_size: ImageSize,
    batch_size: usize,
    num_workers: usize,
    seed: Option<u64>,
}

impl DatasetLoader {
    pub fn new(
        root: impl Into<PathBuf>,
        image_size: ImageSize,
        batch_size: usize,
        num_workers: usize,
    ) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        Ok(Self {
            root: root.into(),
            image_size,
            batch_size,
            num_workers,
            seed: None,
        })
    }

    /// Makes train shuffling and worker RNGs reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Builds `(train, test)` loaders with the fixed evaluation transform.
    ///
    /// Failures are logged with `error!` before being returned.
    pub fn create_loaders(&self) -> Result<(ImageLoader, ImageLoader), DatasetLoadError> {
        let result = self.build_pair();
        if let Err(e) = &result {
            error!(root = %self.root.display(), error = %e, "Failed to create dataloaders");
        }
        let (train, test) = result?;

        if train.dataset().classes() != test.dataset().classes() {
            warn!(
                train_classes = ?train.dataset().classes(),
                test_classes = ?test.dataset().classes(),
                "Train and test splits have different classes"
            );
        }

        info!(
            "Created dataloaders with {} training images and {} test images",
            train.num_samples(),
            test.num_samples()
        );
        Ok((train, test))
    }

    /// Builds a loader for one split with any pipeline, e.g. an augmented
    /// train transform from [`AugmentationPolicy`](crate::augmentation::AugmentationPolicy).
    pub fn create_loader(
        &self,
        split: Split,
        transform: TransformPipeline,
        shuffle: bool,
    ) -> Result<ImageLoader, DatasetLoadError> {
        self.build(split, transform, shuffle).inspect_err(|e| {
            error!(root = %self.root.display(), %split, error = %e, "Failed to create dataloader");
        })
    }

    fn build_pair(&self) -> Result<(ImageLoader, ImageLoader), DatasetLoadError> {
        let transform = eval_transform(self.image_size);
        let train = self.build(Split::Train, transform.clone(), true)?;
        let test = self.build(Split::Test, transform, false)?;
        Ok((train, test))
    }

    fn build(
        &self,
        split: Split,
        transform: TransformPipeline,
        shuffle: bool,
    ) -> Result<ImageLoader, DatasetLoadError> {
        let split_dir = self.root.join(split.as_ref());
        if !split_dir.is_dir() {
            return Err(DatasetLoadError::MissingSplit {
                split: split.to_string(),
                path: split_dir,
            });
        }

        let folder = ImageFolder::scan(&split_dir)?;
        debug!(
            %split,
            images = folder.len(),
            classes = ?folder.classes(),
            class_counts = ?folder.class_counts(),
            "Scanned split"
        );

        let mut config = DataLoaderConfig::builder()
            .batch_size(self.batch_size)
            .num_workers(self.num_workers)
            .shuffle(shuffle);
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }

        DataLoader::new(ImageFolderDataset::new(folder, transform), config.build())
            .map_err(|source| DatasetLoadError::Build { split: split.to_string(), source })
    }
}
