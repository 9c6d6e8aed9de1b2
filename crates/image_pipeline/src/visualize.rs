//! Renders a few images from a batch source after undoing normalization.

use crate::batch::{BatchSource, ImageBatch};
use crate::normalization::{NormalizationConstant, IMAGENET};
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tch::{Kind, Tensor};
use tracing::{debug, info, warn};

/// One de-normalized image ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub pixels: RgbImage,
    pub label: i64,
}

impl Panel {
    pub fn caption(&self) -> String {
        format!("Class: {}", self.label)
    }
}

/// Draws a row of panels somewhere.
pub trait PanelRenderer {
    fn render(&self, panels: &[Panel]) -> Result<()>;
}

/// Writes panels side by side into a PNG, one captioned cell per image, no axes.
#[derive(Debug, Clone)]
pub struct PngGridRenderer {
    path: PathBuf,
}

impl PngGridRenderer {
    const MARGIN: u32 = 10;
    const CAPTION_HEIGHT: u32 = 30;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("{}", e)
}

impl PanelRenderer for PngGridRenderer {
    fn render(&self, panels: &[Panel]) -> Result<()> {
        if panels.is_empty() {
            debug!(path = %self.path.display(), "No panels to render");
            return Ok(());
        }

        let cell_width = panels.iter().map(|p| p.pixels.width()).max().unwrap_or(0) + 2 * Self::MARGIN;
        let cell_height = panels.iter().map(|p| p.pixels.height()).max().unwrap_or(0)
            + 2 * Self::MARGIN
            + Self::CAPTION_HEIGHT;
        let canvas = (cell_width * panels.len() as u32, cell_height);

        let root = BitMapBackend::new(&self.path, canvas).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        for (cell, panel) in root.split_evenly((1, panels.len())).iter().zip(panels) {
            // Captions need a system font; fall back to an untitled cell without one.
            let area = match cell.titled(&panel.caption(), ("sans-serif", 20)) {
                Ok(area) => area,
                Err(e) => {
                    warn!(error = %e, "Failed to draw caption");
                    cell.clone()
                }
            };

            let (width, height) = panel.pixels.dimensions();
            let element: BitMapElement<(i32, i32)> = BitMapElement::with_owned_buffer(
                (Self::MARGIN as i32, Self::MARGIN as i32),
                (width, height),
                panel.pixels.as_raw().clone(),
            )
            .ok_or_else(|| anyhow!("Pixel buffer does not match {}x{}", width, height))?;
            area.draw(&element).map_err(plot_err)?;
        }

        root.present()
            .map_err(plot_err)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), panels = panels.len(), "Rendered batch");
        Ok(())
    }
}

/// Shows the first images of a batch source.
///
/// # Example
/// ```ignore
/// let visualizer = BatchVisualizer::new(PngGridRenderer::new("batch.png"));
/// visualizer.show_batch(&train_loader, 4)?;
/// ```
pub struct BatchVisualizer {
    constant: NormalizationConstant,
    renderer: Box<dyn PanelRenderer>,
}

impl BatchVisualizer {
    pub fn new(renderer: impl PanelRenderer + 'static) -> Self {
        Self {
            constant: IMAGENET,
            renderer: Box::new(renderer),
        }
    }

    /// `x * std + mean` per channel. Accepts `[3, H, W]` or `[N, 3, H, W]`.
    pub fn denormalize(&self, tensor: &Tensor) -> Result<Tensor> {
        self.constant.denormalize(tensor)
    }

    /// Converts the first `min(count, batch.len())` images into 8-bit panels.
    pub fn prepare_panels(&self, batch: &ImageBatch, count: usize) -> Result<Vec<Panel>> {
        let labels = batch.label_vec()?;
        let take = count.min(batch.len());

        (0..take)
            .map(|i| {
                let image = self.denormalize(&batch.image(i)?)?;
                Ok(Panel {
                    pixels: to_rgb8(&image).with_context(|| format!("Failed to convert image {}", i))?,
                    label: labels[i],
                })
            })
            .collect()
    }

    /// Pulls one batch from a fresh pass over `source` and renders up to
    /// `count` of its images. An exhausted source renders nothing.
    pub fn show_batch(&self, source: &impl BatchSource, count: usize) -> Result<()> {
        let panels = match source.batches()?.next() {
            Some(batch) => self.prepare_panels(&batch?, count)?,
            None => Vec::new(),
        };
        debug!(requested = count, shown = panels.len(), "Showing batch");
        self.renderer.render(&panels)
    }
}

/// `[3, H, W]` floats in any range -> clamped `[0, 1]` -> RGB8.
fn to_rgb8(image: &Tensor) -> Result<RgbImage> {
    let size = image.size();
    let (height, width) = match size.as_slice() {
        [3, h, w] => (*h, *w),
        other => return Err(anyhow!("Expected a [3, H, W] image, got {:?}", other)),
    };

    let bytes = image
        .clamp(0.0, 1.0)
        .f_mul_scalar(255.0)?
        .round()
        .to_kind(Kind::Uint8)
        .permute(&[1, 2, 0])
        .contiguous()
        .flatten(0, -1);
    let raw = Vec::<u8>::try_from(bytes)?;

    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| anyhow!("Pixel buffer does not match {}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LabeledImage;
    use image::GenericImageView;
    use std::sync::{Arc, Mutex};
    use tch::Device;

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        calls: Arc<Mutex<Vec<Vec<Panel>>>>,
    }

    impl PanelRenderer for RecordingRenderer {
        fn render(&self, panels: &[Panel]) -> Result<()> {
            self.calls.lock().unwrap().push(panels.to_vec());
            Ok(())
        }
    }

    struct FixedSource {
        batches: Vec<(usize, f64)>,
    }

    impl BatchSource for FixedSource {
        fn batches(&self) -> Result<Box<dyn Iterator<Item = Result<ImageBatch>> + '_>> {
            Ok(Box::new(self.batches.iter().map(|&(size, value)| {
                let samples = (0..size)
                    .map(|i| {
                        let pixels = Tensor::full(&[3, 4, 5], value, (Kind::Float, Device::Cpu));
                        LabeledImage::new(IMAGENET.normalize(&pixels)?, i as i64)
                    })
                    .collect::<Result<Vec<_>>>()?;
                ImageBatch::collate(samples)
            })))
        }
    }

    #[test]
    fn test_denormalize_inverts_normalize() -> Result<()> {
        let visualizer = BatchVisualizer::new(RecordingRenderer::default());
        let x = Tensor::rand(&[2, 3, 6, 6], (Kind::Float, Device::Cpu));
        let back = visualizer.denormalize(&IMAGENET.normalize(&x)?)?;
        assert!(back.allclose(&x, 1e-5, 1e-6, false));
        Ok(())
    }

    #[test]
    fn test_show_batch_renders_requested_count() -> Result<()> {
        let renderer = RecordingRenderer::default();
        let visualizer = BatchVisualizer::new(renderer.clone());
        let source = FixedSource {
            batches: vec![(4, 0.5), (4, 0.1)],
        };

        visualizer.show_batch(&source, 2)?;

        let calls = renderer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let panels = &calls[0];
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[1].label, 1);
        assert_eq!(panels[1].caption(), "Class: 1");
        assert_eq!(panels[0].pixels.dimensions(), (5, 4));
        // 0.5 * 255 = 127.5, rounded to even after the round trip
        let value = panels[0].pixels.get_pixel(0, 0)[0];
        assert!((127..=128).contains(&value));
        Ok(())
    }

    #[test]
    fn test_small_and_empty_sources() -> Result<()> {
        let renderer = RecordingRenderer::default();
        let visualizer = BatchVisualizer::new(renderer.clone());

        visualizer.show_batch(&FixedSource { batches: vec![(1, 0.2)] }, 4)?;
        visualizer.show_batch(&FixedSource { batches: vec![] }, 4)?;

        let calls = renderer.calls.lock().unwrap();
        assert_eq!(calls[0].len(), 1);
        assert!(calls[1].is_empty());
        Ok(())
    }

    #[test]
    fn test_out_of_range_values_are_clamped() -> Result<()> {
        let image = Tensor::from_slice(&[-0.5f32, 0.25, 2.0]).reshape(&[3, 1, 1]);
        let rgb = to_rgb8(&image)?;
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 64, 255]);
        assert!(to_rgb8(&Tensor::zeros(&[1, 2, 2], (Kind::Float, Device::Cpu))).is_err());
        Ok(())
    }

    #[test]
    fn test_png_grid_renderer_writes_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("grid.png");
        let panels = vec![
            Panel {
                pixels: RgbImage::from_pixel(8, 6, image::Rgb([200, 10, 10])),
                label: 0,
            },
            Panel {
                pixels: RgbImage::from_pixel(8, 6, image::Rgb([10, 10, 200])),
                label: 1,
            },
        ];

        PngGridRenderer::new(&path).render(&panels)?;

        let written = image::open(&path)?;
        assert_eq!(written.width(), 2 * (8 + 2 * PngGridRenderer::MARGIN));
        Ok(())
    }
}
