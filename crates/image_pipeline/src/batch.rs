use crate::sample::LabeledImage;
use anyhow::{bail, Result};
use tch::{Kind, Tensor};

/// A batch of labeled images stacked along dimension 0.
///
/// - `images`: `[N, 3, H, W]` float tensor
/// - `labels`: `[N]` int64 tensor of class indices
#[derive(Debug)]
pub struct ImageBatch {
    pub images: Tensor,
    pub labels: Tensor,
}

impl ImageBatch {
    /// Stacks samples into a batch. Every image must have the same shape.
    ///
    /// Example:
    /// let batch = ImageBatch::collate(vec![sample_a, sample_b])?;
    pub fn collate(samples: Vec<LabeledImage>) -> Result<Self> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        let reference_shape = samples[0].image.size();
        for (i, sample) in samples.iter().enumerate() {
            if sample.image.size() != reference_shape {
                bail!(
                    "Shape mismatch in sample {}: expected {:?}, got {:?}",
                    i,
                    reference_shape,
                    sample.image.size()
                );
            }
        }

        let images: Vec<&Tensor> = samples.iter().map(|s| &s.image).collect();
        let labels: Vec<i64> = samples.iter().map(|s| s.label).collect();

        Ok(Self {
            images: Tensor::stack(&images, 0),
            labels: Tensor::from_slice(&labels).to_kind(Kind::Int64),
        })
    }

    /// Returns the number of samples in the batch.
    pub fn len(&self) -> usize {
        self.labels.size().first().copied().unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the labels as a plain vector.
    pub fn label_vec(&self) -> Result<Vec<i64>> {
        Ok(Vec::<i64>::try_from(&self.labels)?)
    }

    /// Returns the image tensor at `index` with shape `[3, H, W]`.
    pub fn image(&self, index: usize) -> Result<Tensor> {
        if index >= self.len() {
            bail!("Index {} out of bounds for batch of {}", index, self.len());
        }
        Ok(self.images.get(index as i64))
    }
}

/// Anything that can hand out a fresh pass of [`ImageBatch`]es.
///
/// Implemented by [`DataLoader`](crate::dataloader::DataLoader); consumers
/// such as [`BatchVisualizer`](crate::visualize::BatchVisualizer) only need
/// this seam.
pub trait BatchSource {
    fn batches(&self) -> Result<Box<dyn Iterator<Item = Result<ImageBatch>> + '_>>;
}
