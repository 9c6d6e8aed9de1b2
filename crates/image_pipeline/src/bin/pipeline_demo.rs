//! Downloads the sample chest X-ray set, builds loaders and writes two
//! batch previews: one plain, one with strong augmentation.
//!
//! ```text
//! cargo run --bin pipeline_demo
//! ```

use anyhow::Result;
use image_pipeline::{
    AugmentationPolicy, BatchVisualizer, DatasetLoader, DatasetProvisioner, ImageSize,
    PngGridRenderer, Split, SplitMode,
};
use tracing::info;

const BATCH_SIZE: usize = 2;
const NUM_WORKERS: usize = 2;
const PREVIEW_COUNT: usize = 4;

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt().try_init();

    // Mirrored so both splits are populated from the handful of sample URLs.
    let report = DatasetProvisioner::new()
        .with_split_mode(SplitMode::Mirrored)
        .provision()?;
    if !report.failed_urls.is_empty() {
        info!(failed = report.failed_urls.len(), "Some images could not be downloaded");
    }

    let image_size = ImageSize::new(128, 128)?;
    let loader = DatasetLoader::new(&report.base_dir, image_size, BATCH_SIZE, NUM_WORKERS)?;
    let (train, test) = loader.create_loaders()?;
    info!(
        train_batches = train.len(),
        test_batches = test.len(),
        "Loaders ready"
    );

    BatchVisualizer::new(PngGridRenderer::new("batch_preview.png"))
        .show_batch(&train, PREVIEW_COUNT)?;

    let augment = AugmentationPolicy::new(image_size, "strong")?.get_transform(true)?;
    info!(steps = ?augment.steps(), "Strong augmentation pipeline");
    let augmented = loader.create_loader(Split::Train, augment, true)?;
    BatchVisualizer::new(PngGridRenderer::new("augmented_preview.png"))
        .show_batch(&augmented, PREVIEW_COUNT)?;

    info!("Wrote batch_preview.png and augmented_preview.png");
    Ok(())
}
