use crate::sample::LabeledImage;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use tch::Tensor;

// ============================================================================
// LoadImage - Base image loader
// ============================================================================

/// Loads an image file from disk and converts it to RGB8.
///
/// The format is guessed from the content, not the extension. Uses buffered
/// I/O sized to the file.
///
/// # Example
/// ```ignore
/// let image = LoadImage::new().apply(PathBuf::from("xray.jpg"))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;

        let file_size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        let image = ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()
            .with_context(|| format!("Failed to detect image format: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))?;

        Ok(match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.into_rgb8()),
        })
    }
}

// ============================================================================
// LoadLabeledImage
// ============================================================================

/// Loads `(path, class_index)` pairs into [`LabeledImage`]s.
///
/// 1. Loads the file with [`LoadImage`]
/// 2. Applies the image pipeline (`DynamicImage -> Tensor`)
/// 3. Pairs the tensor with its class index
///
/// # Example
/// ```ignore
/// let pipeline = Resize::bilinear(size).then(ToTensor).then(Normalize::imagenet());
/// let loader = LoadLabeledImage::new(pipeline);
/// let sample = loader.apply((PathBuf::from("train/NORMAL/image_0.jpg"), 0))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadLabeledImage<T> {
    image_loader: LoadImage,
    image_transform: T,
}

impl<T> LoadLabeledImage<T> {
    pub fn new(image_transform: T) -> Self {
        Self {
            image_loader: LoadImage::new(),
            image_transform,
        }
    }
}

impl<T> Transform<(PathBuf, usize), LabeledImage> for LoadLabeledImage<T>
where
    T: Transform<DynamicImage, Tensor>,
{
    fn apply(&self, (path, label): (PathBuf, usize)) -> Result<LabeledImage> {
        let image = self.image_loader.apply(path.clone())?;

        let image_tensor = self
            .image_transform
            .apply(image)
            .with_context(|| format!("Failed to apply transforms to image: {}", path.display()))?;

        Ok(LabeledImage::new(image_tensor, label as i64))
    }
}
