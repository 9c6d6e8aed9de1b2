pub mod image_dir;

pub use image_dir::{ImageFolder, IMAGE_EXTENSIONS};
