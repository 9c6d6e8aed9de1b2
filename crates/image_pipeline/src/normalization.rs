//! Per-channel normalization statistics shared by loading, augmentation and
//! visualization.
//!
//! ```text
//! normalize:   out[c] = (x[c] - mean[c]) / std[c]
//! denormalize: out[c] = x[c] * std[c] + mean[c]
//! ```

use anyhow::{ensure, Result};
use tch::Tensor;

/// Fixed 3-channel mean / standard deviation pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationConstant {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// ImageNet RGB statistics.
pub const IMAGENET: NormalizationConstant = NormalizationConstant {
    mean: [0.485, 0.456, 0.406],
    std: [0.229, 0.224, 0.225],
};

impl Default for NormalizationConstant {
    fn default() -> Self {
        IMAGENET
    }
}

impl NormalizationConstant {
    /// Applies `(x - mean) / std` to a `[3, H, W]` or `[N, 3, H, W]` tensor.
    pub fn normalize(&self, tensor: &Tensor) -> Result<Tensor> {
        let (mean, std) = self.broadcast(tensor)?;
        Ok((tensor - mean) / std)
    }

    /// Exact inverse of [`normalize`](Self::normalize).
    pub fn denormalize(&self, tensor: &Tensor) -> Result<Tensor> {
        let (mean, std) = self.broadcast(tensor)?;
        Ok(tensor * std + mean)
    }

    /// Mean and std reshaped to `[3, 1, 1]` in the tensor's kind and device.
    fn broadcast(&self, tensor: &Tensor) -> Result<(Tensor, Tensor)> {
        let dims = tensor.dim();
        ensure!(
            dims == 3 || dims == 4,
            "Expected a [C, H, W] or [N, C, H, W] tensor, got shape {:?}",
            tensor.size()
        );
        let channels = tensor.size()[dims - 3];
        ensure!(
            channels == 3,
            "Channel count mismatch: input has {} channels but normalization expects 3",
            channels
        );

        let reshape = |values: &[f32; 3]| {
            Tensor::from_slice(values)
                .reshape(&[3, 1, 1])
                .to_kind(tensor.kind())
                .to_device(tensor.device())
        };
        Ok((reshape(&self.mean), reshape(&self.std)))
    }
}
