use crate::error::ConfigError;
use crate::random::RandomSource;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

// ============================================================================
// ImageSize
// ============================================================================

/// Target spatial size of pipeline outputs, `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    height: u32,
    width: u32,
}

impl ImageSize {
    pub fn new(height: u32, width: u32) -> Result<Self, ConfigError> {
        if height == 0 || width == 0 {
            return Err(ConfigError::InvalidImageSize { height, width });
        }
        Ok(Self { height, width })
    }

    pub fn square(side: u32) -> Result<Self, ConfigError> {
        Self::new(side, side)
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            height: 128,
            width: 128,
        }
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Resizes an image to exactly `(height, width)`. The aspect ratio is not
/// preserved.
///
/// # Filter Types
/// - `Nearest`: Nearest neighbour, fastest
/// - `Triangle`: Bilinear filter, good all-round default
/// - `CatmullRom`: Bicubic sharpening
/// - `Gaussian`: Blurring/smoothing
/// - `Lanczos3`: Lanczos with window 3, highest quality re-sampling but slowest.
///
/// # Examples
/// ``` ignore
/// let resize = Resize::new(ImageSize::new(128, 128)?, FilterType::Triangle);
/// let resized = resize.apply(img)?;
/// ```
#[derive(Debug)]
pub struct Resize {
    size: ImageSize,
    filter: FilterType,
}

impl Resize {
    pub fn new(size: ImageSize, filter: FilterType) -> Self {
        Self { size, filter }
    }

    /// Bilinear resize.
    pub fn bilinear(size: ImageSize) -> Self {
        Self::new(size, FilterType::Triangle)
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        Ok(img.resize_exact(self.size.width, self.size.height, self.filter))
    }
}

// ============================================================================
// RandomResizedCrop
// ============================================================================

/// Crops a random region covering `scale` of the original area with an aspect
/// ratio drawn log-uniformly from `ratio`, then resizes it to the target size.
///
/// Up to 10 candidate regions are drawn; if none fits inside the image a
/// centre crop clamped to the ratio bounds is used instead.
#[derive(Debug)]
pub struct RandomResizedCrop {
    size: ImageSize,
    scale: (f64, f64),
    ratio: (f64, f64),
    filter: FilterType,
    rng: RandomSource,
}

impl RandomResizedCrop {
    const MAX_ATTEMPTS: usize = 10;

    pub fn new(size: ImageSize, scale: (f64, f64), rng: RandomSource) -> Result<Self> {
        ensure!(
            scale.0 > 0.0 && scale.0 <= scale.1 && scale.1 <= 1.0,
            "Crop scale must satisfy 0 < min <= max <= 1 (got {:?})",
            scale
        );
        Ok(Self {
            size,
            scale,
            ratio: (3.0 / 4.0, 4.0 / 3.0),
            filter: FilterType::Triangle,
            rng,
        })
    }

    /// Returns `(x, y, crop_width, crop_height)`.
    fn crop_params(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let area = width as f64 * height as f64;
        let log_ratio = self.ratio.0.ln()..=self.ratio.1.ln();

        for _ in 0..Self::MAX_ATTEMPTS {
            let target_area = area * self.rng.gen_f64(self.scale.0..=self.scale.1);
            let aspect = self.rng.gen_f64(log_ratio.clone()).exp();

            let crop_w = (target_area * aspect).sqrt().round() as u32;
            let crop_h = (target_area / aspect).sqrt().round() as u32;

            if crop_w > 0 && crop_w <= width && crop_h > 0 && crop_h <= height {
                let x = self.rng.gen_index(width - crop_w);
                let y = self.rng.gen_index(height - crop_h);
                return (x, y, crop_w, crop_h);
            }
        }

        // Fallback: centre crop
        let in_ratio = width as f64 / height as f64;
        let (crop_w, crop_h) = if in_ratio < self.ratio.0 {
            (width, (width as f64 / self.ratio.0).round() as u32)
        } else if in_ratio > self.ratio.1 {
            ((height as f64 * self.ratio.1).round() as u32, height)
        } else {
            (width, height)
        };
        let crop_w = crop_w.clamp(1, width);
        let crop_h = crop_h.clamp(1, height);
        ((width - crop_w) / 2, (height - crop_h) / 2, crop_w, crop_h)
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomResizedCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Cannot crop an empty image (got {}x{})",
            width,
            height
        );

        let (x, y, crop_w, crop_h) = self.crop_params(width, height);
        Ok(img
            .crop_imm(x, y, crop_w, crop_h)
            .resize_exact(self.size.width, self.size.height, self.filter))
    }
}

// ============================================================================
// RandomRotation
// ============================================================================

/// Rotates the image by an angle drawn uniformly from `[-degrees, degrees]`
/// about its centre. Positive angles turn counter-clockwise. The canvas keeps
/// its size; uncovered pixels are filled with black.
#[derive(Debug)]
pub struct RandomRotation {
    degrees: f64,
    rng: RandomSource,
}

impl RandomRotation {
    pub fn new(degrees: f64, rng: RandomSource) -> Result<Self> {
        ensure!(
            degrees >= 0.0 && degrees.is_finite(),
            "Rotation range must be a non-negative number of degrees (got {})",
            degrees
        );
        Ok(Self { degrees, rng })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomRotation {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let angle = self.rng.gen_f64(-self.degrees..=self.degrees);
        if angle == 0.0 {
            return Ok(img);
        }
        Ok(DynamicImage::ImageRgb8(rotate_nearest(&img.into_rgb8(), angle)))
    }
}

/// Nearest-neighbour rotation by `degrees` (counter-clockwise) about the centre.
pub(crate) fn rotate_nearest(img: &RgbImage, degrees: f64) -> RgbImage {
    let (width, height) = img.dimensions();
    let center_x = (width as f64 - 1.0) / 2.0;
    let center_y = (height as f64 - 1.0) / 2.0;
    let (sin, cos) = degrees.to_radians().sin_cos();

    let mut rotated = RgbImage::new(width, height);
    for (x, y, pixel) in rotated.enumerate_pixels_mut() {
        // Inverse map each output pixel back into the source image
        let dx = x as f64 - center_x;
        let dy = y as f64 - center_y;
        let src_x = (cos * dx - sin * dy + center_x).round();
        let src_y = (sin * dx + cos * dy + center_y).round();

        if src_x >= 0.0 && src_y >= 0.0 && src_x < width as f64 && src_y < height as f64 {
            *pixel = *img.get_pixel(src_x as u32, src_y as u32);
        }
    }
    rotated
}
