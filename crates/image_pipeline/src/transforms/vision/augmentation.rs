use crate::error::ConfigError;
use crate::random::RandomSource;
use crate::transforms::Transform;
use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView, ImageBuffer, RgbImage};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Randomly flips images horizontally with probability `p`.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5, RandomSource::Worker)?;
/// let augmented = flip.apply(image)?;
/// ```
#[derive(Debug)]
pub struct RandomHorizontalFlip {
    p: f64,
    rng: RandomSource,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64, rng: RandomSource) -> Result<Self> {
        ConfigError::check_probability(p)?;
        Ok(Self { p, rng })
    }

    /// Flips an RGB8 image by copying pixel triplets right to left.
    fn flip_rgb8(img: RgbImage) -> Result<RgbImage> {
        let (width, height) = img.dimensions();
        let row_len = width as usize * 3;
        let source_pixels = img.into_raw();

        let mut flipped_pixels = Vec::with_capacity(source_pixels.len());
        for row in source_pixels.chunks_exact(row_len) {
            for pixel in row.chunks_exact(3).rev() {
                flipped_pixels.extend_from_slice(pixel);
            }
        }

        ImageBuffer::from_raw(width, height, flipped_pixels)
            .ok_or_else(|| anyhow!("Failed to create flipped image buffer"))
    }

    fn flip(img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(rgb_img) => DynamicImage::ImageRgb8(Self::flip_rgb8(rgb_img)?),
            _ => img.fliph(),
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if img.width() == 0 || img.height() == 0 {
            return Ok(img);
        }
        if self.rng.gen_bool(self.p) {
            Self::flip(img)
        } else {
            Ok(img)
        }
    }
}
