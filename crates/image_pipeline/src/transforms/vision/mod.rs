//! src/transforms/vision/mod.rs
//!
//! Vision transforms for image preprocessing and augmentation.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (resize, crop, rotate)
//! ├── photometric.rs   → Colour and appearance (jitter, sharpness, autocontrast, normalize)
//! ├── conversion.rs    → Format conversions (image → tensor)
//! ├── augmentation.rs  → Flips
//! └── io.rs            → Image loading utilities
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{ImageSize, Normalize, Resize, ToTensor};
//!
//! let pipeline = Resize::bilinear(ImageSize::new(128, 128)?)
//!     .then(ToTensor)
//!     .then(Normalize::imagenet());
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::ToTensor;
pub use geometric::{ImageSize, RandomResizedCrop, RandomRotation, Resize};
pub use io::{LoadImage, LoadLabeledImage};
pub use photometric::{ColorJitter, Normalize, RandomAdjustSharpness, RandomAutocontrast};
