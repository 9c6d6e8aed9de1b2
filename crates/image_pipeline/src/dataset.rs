use crate::readers::ImageFolder;
use crate::sample::LabeledImage;
use crate::transforms::vision::LoadLabeledImage;
use crate::transforms::{Transform, TransformPipeline};
use anyhow::{anyhow, Result};
use std::path::Path;

/// A `Dataset` provides indexed access to labeled samples.
///
/// All implementations must be `Send + Sync` so one instance can be shared
/// across dataloader workers behind an `Arc`.
pub trait Dataset: Send + Sync {
    /// Returns total number of samples.
    fn len(&self) -> usize;

    /// Produces the sample at `index`. Lazy datasets decode on every call.
    fn get_sample(&self, index: usize) -> Result<LabeledImage>;

    /// Checks if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dataset over an [`ImageFolder`] scan.
///
/// Stores only `(path, class_index)` pairs. Each access re-reads the file
/// from disk and runs it through the split's [`TransformPipeline`], so
/// randomized pipelines give a fresh augmentation per access.
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
    folder: ImageFolder,
    loader: LoadLabeledImage<TransformPipeline>,
    transform: TransformPipeline,
}

impl ImageFolderDataset {
    pub fn new(folder: ImageFolder, transform: TransformPipeline) -> Self {
        Self {
            folder,
            loader: LoadLabeledImage::new(transform.clone()),
            transform,
        }
    }

    pub fn root(&self) -> &Path {
        self.folder.root()
    }

    pub fn classes(&self) -> &[String] {
        self.folder.classes()
    }

    pub fn folder(&self) -> &ImageFolder {
        &self.folder
    }

    pub fn transform(&self) -> &TransformPipeline {
        &self.transform
    }
}

impl Dataset for ImageFolderDataset {
    fn len(&self) -> usize {
        self.folder.len()
    }

    fn get_sample(&self, index: usize) -> Result<LabeledImage> {
        let (path, class_index) = self.folder.entries().get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of {} images",
                index,
                self.len()
            )
        })?;
        self.loader.apply((path.clone(), *class_index))
    }
}
