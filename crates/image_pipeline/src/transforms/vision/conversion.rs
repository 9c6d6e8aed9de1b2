use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first RGB f32 tensor `[3, H, W]` in
/// `[0.0, 1.0]`.
///
/// Grayscale inputs are replicated across the three channels and alpha is
/// dropped, so every output matches the 3-channel normalization statistics.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?;
/// assert_eq!(tensor.size(), vec![3, h, w]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );

        let rgb = match img {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };

        // HWC bytes -> CHW floats
        Tensor::from_slice(rgb.as_raw())
            .reshape(&[height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("Failed to scale tensor values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn test_rgb_image() -> DynamicImage {
        let mut img = RgbImage::new(3, 2);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 85) as u8, (y * 255) as u8, 128]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_to_tensor() -> Result<()> {
        let tensor = ToTensor.apply(test_rgb_image())?;
        assert_eq!(tensor.size(), vec![3, 2, 3]); // CHW format
        assert_eq!(tensor.kind(), Kind::Float);

        let min = tensor.f_min()?.double_value(&[]);
        let max = tensor.f_max()?.double_value(&[]);
        assert!(min >= 0.0 && max <= 1.0);
        Ok(())
    }

    #[test]
    fn test_to_tensor_channel_layout() -> Result<()> {
        let tensor = ToTensor.apply(test_rgb_image())?;
        // pixel (x=2, y=1): r = 170, g = 255, b = 128
        assert!((tensor.double_value(&[0, 1, 2]) - 170.0 / 255.0).abs() < 1e-6);
        assert!((tensor.double_value(&[1, 1, 2]) - 1.0).abs() < 1e-6);
        assert!((tensor.double_value(&[2, 1, 2]) - 128.0 / 255.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_grayscale_expands_to_three_channels() -> Result<()> {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 5, Luma([51])));
        let tensor = ToTensor.apply(gray)?;
        assert_eq!(tensor.size(), vec![3, 5, 4]);
        assert!((tensor.double_value(&[2, 4, 3]) - 0.2).abs() < 1e-6);
        Ok(())
    }
}
