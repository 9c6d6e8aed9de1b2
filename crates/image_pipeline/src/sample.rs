use tch::Tensor;

/// A single example produced by a [`Dataset`](crate::dataset::Dataset).
///
/// - `image`: float tensor `[3, H, W]`, normalized by the split's pipeline
/// - `label`: class index into the dataset's sorted class list
#[derive(Debug)]
pub struct LabeledImage {
    pub image: Tensor,
    pub label: i64,
}

/// Creates a shallow clone of the `LabeledImage`
impl Clone for LabeledImage {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            label: self.label,
        }
    }
}

impl LabeledImage {
    pub fn new(image: Tensor, label: i64) -> Self {
        Self { image, label }
    }

    /// Returns `(height, width)` of the image tensor.
    pub fn spatial_size(&self) -> Option<(i64, i64)> {
        match self.image.size().as_slice() {
            [_, h, w] => Some((*h, *w)),
            _ => None,
        }
    }
}
