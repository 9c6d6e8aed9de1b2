use crate::error::ConfigError;
use crate::normalization::{NormalizationConstant, IMAGENET};
use crate::random::RandomSource;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, RgbImage};
use tch::Tensor;

/// ITU-R 601-2 luma weights.
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes `[C, H, W]` tensors with channel-wise statistics.
///
/// # Mathematical Operation:
/// ```text
/// output[c,h,w] = (input[c,h,w] - mean[c]) / std[c]
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Normalize {
    constant: NormalizationConstant,
}

impl Normalize {
    pub fn new(constant: NormalizationConstant) -> Self {
        Self { constant }
    }

    /// ImageNet standard normalization (RGB)
    pub fn imagenet() -> Self {
        Self::new(IMAGENET)
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;
        self.constant.normalize(&tensor)
    }
}

// ============================================================================
// Pixel helpers
// ============================================================================

/// Applies `f` to every pixel in float space, then rounds and clamps back to u8.
fn map_pixels(img: &mut RgbImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for pixel in img.pixels_mut() {
        let [r, g, b] = pixel.0;
        let out = f([r as f32, g as f32, b as f32]);
        pixel.0 = out.map(|v| v.round().clamp(0.0, 255.0) as u8);
    }
}

fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA[0] + rgb[1] * LUMA[1] + rgb[2] * LUMA[2]
}

/// `factor * a + (1 - factor) * b`
fn blend(a: f32, b: f32, factor: f32) -> f32 {
    factor * a + (1.0 - factor) * b
}

pub(crate) fn adjust_brightness(img: &mut RgbImage, factor: f32) {
    map_pixels(img, |rgb| rgb.map(|v| v * factor));
}

pub(crate) fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    let pixel_count = (img.width() * img.height()).max(1) as f32;
    let mean = img.pixels().map(|p| luma(p.0.map(f32::from))).sum::<f32>() / pixel_count;
    map_pixels(img, |rgb| rgb.map(|v| blend(v, mean, factor)));
}

pub(crate) fn adjust_saturation(img: &mut RgbImage, factor: f32) {
    map_pixels(img, |rgb| {
        let gray = luma(rgb);
        rgb.map(|v| blend(v, gray, factor))
    });
}

/// Rotates hue by `shift` turns (`shift` in `[-0.5, 0.5]`).
pub(crate) fn adjust_hue(img: &mut RgbImage, shift: f32) {
    map_pixels(img, |rgb| {
        let (h, s, v) = rgb_to_hsv(rgb.map(|c| c / 255.0));
        hsv_to_rgb((h + shift).rem_euclid(1.0), s, v).map(|c| c * 255.0)
    });
}

/// RGB in `[0, 1]` -> `(hue in [0, 1), saturation, value)`
fn rgb_to_hsv([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let sector = h * 6.0;
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 % 6 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

// ============================================================================
// ColorJitter
// ============================================================================

/// Randomly changes brightness, contrast, saturation and hue.
///
/// - brightness/contrast/saturation `x`: factor drawn from `[max(0, 1 - x), 1 + x]`
/// - hue `h` (in `[0, 0.5]`): shift drawn from `[-h, h]` turns of the colour wheel
///
/// The four adjustments are applied in a freshly shuffled order for every image.
/// A magnitude of 0 disables that adjustment.
#[derive(Debug)]
pub struct ColorJitter {
    brightness: Option<(f64, f64)>,
    contrast: Option<(f64, f64)>,
    saturation: Option<(f64, f64)>,
    hue: Option<(f64, f64)>,
    rng: RandomSource,
}

#[derive(Debug, Clone, Copy)]
enum JitterOp {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

impl ColorJitter {
    pub fn new(
        brightness: f64,
        contrast: f64,
        saturation: f64,
        hue: f64,
        rng: RandomSource,
    ) -> Result<Self> {
        for (name, value) in [
            ("brightness", brightness),
            ("contrast", contrast),
            ("saturation", saturation),
        ] {
            ensure!(value >= 0.0, "{} jitter must be non-negative (got {})", name, value);
        }
        ensure!(
            (0.0..=0.5).contains(&hue),
            "hue jitter must be in [0.0, 0.5] (got {})",
            hue
        );

        let factor_range = |x: f64| (x > 0.0).then(|| ((1.0 - x).max(0.0), 1.0 + x));
        Ok(Self {
            brightness: factor_range(brightness),
            contrast: factor_range(contrast),
            saturation: factor_range(saturation),
            hue: (hue > 0.0).then_some((-hue, hue)),
            rng,
        })
    }

    fn draw(&self, range: Option<(f64, f64)>) -> Option<f32> {
        range.map(|(lo, hi)| self.rng.gen_f64(lo..=hi) as f32)
    }
}

impl Transform<DynamicImage, DynamicImage> for ColorJitter {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let mut rgb = img.into_rgb8();

        let mut order = [
            JitterOp::Brightness,
            JitterOp::Contrast,
            JitterOp::Saturation,
            JitterOp::Hue,
        ];
        self.rng.shuffle(&mut order);

        for op in order {
            match op {
                JitterOp::Brightness => {
                    if let Some(factor) = self.draw(self.brightness) {
                        adjust_brightness(&mut rgb, factor);
                    }
                }
                JitterOp::Contrast => {
                    if let Some(factor) = self.draw(self.contrast) {
                        adjust_contrast(&mut rgb, factor);
                    }
                }
                JitterOp::Saturation => {
                    if let Some(factor) = self.draw(self.saturation) {
                        adjust_saturation(&mut rgb, factor);
                    }
                }
                JitterOp::Hue => {
                    if let Some(shift) = self.draw(self.hue) {
                        adjust_hue(&mut rgb, shift);
                    }
                }
            }
        }
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

// ============================================================================
// RandomAdjustSharpness
// ============================================================================

/// With probability `p`, sharpens (factor > 1) or blurs (factor < 1) the image.
///
/// The degenerate image is a 3×3 smoothing of the interior
/// (`[[1,1,1],[1,5,1],[1,1,1]] / 13`); border pixels are left as they are.
/// Output is `factor * img + (1 - factor) * degenerate`.
#[derive(Debug)]
pub struct RandomAdjustSharpness {
    factor: f32,
    p: f64,
    rng: RandomSource,
}

impl RandomAdjustSharpness {
    pub fn new(factor: f32, p: f64, rng: RandomSource) -> Result<Self> {
        ensure!(factor >= 0.0, "Sharpness factor must be non-negative (got {})", factor);
        ConfigError::check_probability(p)?;
        Ok(Self { factor, p, rng })
    }
}

pub(crate) fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return img.clone();
    }

    let mut degenerate = img.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0f32; 3];
            for ky in 0..3 {
                for kx in 0..3 {
                    let weight = if kx == 1 && ky == 1 { 5.0 } else { 1.0 };
                    let neighbour = img.get_pixel(x + kx - 1, y + ky - 1).0;
                    for c in 0..3 {
                        acc[c] += weight * neighbour[c] as f32;
                    }
                }
            }
            degenerate.get_pixel_mut(x, y).0 = acc.map(|v| (v / 13.0).round().clamp(0.0, 255.0) as u8);
        }
    }

    let mut out = img.clone();
    for (sharp, smooth) in out.pixels_mut().zip(degenerate.pixels()) {
        for c in 0..3 {
            let value = blend(sharp.0[c] as f32, smooth.0[c] as f32, factor);
            sharp.0[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

impl Transform<DynamicImage, DynamicImage> for RandomAdjustSharpness {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !self.rng.gen_bool(self.p) {
            return Ok(img);
        }
        Ok(DynamicImage::ImageRgb8(adjust_sharpness(&img.into_rgb8(), self.factor)))
    }
}

// ============================================================================
// RandomAutocontrast
// ============================================================================

/// With probability `p`, stretches each channel so its darkest pixel maps to 0
/// and its brightest to 255. Constant channels are left untouched.
#[derive(Debug)]
pub struct RandomAutocontrast {
    p: f64,
    rng: RandomSource,
}

impl RandomAutocontrast {
    pub fn new(p: f64, rng: RandomSource) -> Result<Self> {
        ConfigError::check_probability(p)?;
        Ok(Self { p, rng })
    }
}

pub(crate) fn autocontrast(img: &mut RgbImage) {
    let mut lo = [u8::MAX; 3];
    let mut hi = [u8::MIN; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            lo[c] = lo[c].min(pixel.0[c]);
            hi[c] = hi[c].max(pixel.0[c]);
        }
    }

    map_pixels(img, |rgb| {
        let mut out = rgb;
        for c in 0..3 {
            if hi[c] > lo[c] {
                let scale = 255.0 / (hi[c] - lo[c]) as f32;
                out[c] = (rgb[c] - lo[c] as f32) * scale;
            }
        }
        out
    });
}

impl Transform<DynamicImage, DynamicImage> for RandomAutocontrast {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !self.rng.gen_bool(self.p) {
            return Ok(img);
        }
        let mut rgb = img.into_rgb8();
        autocontrast(&mut rgb);
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
