//! Train-time augmentation policies.
//!
//! An [`AugmentationPolicy`] turns a named strength level into a
//! [`TransformPipeline`]. The evaluation pipeline is the plain
//! resize / to-tensor / normalize chain used by the dataset loader.

use crate::error::ConfigError;
use crate::loader::eval_transform;
use crate::random::RandomSource;
use crate::transforms::vision::{
    ColorJitter, ImageSize, Normalize, RandomAdjustSharpness, RandomAutocontrast,
    RandomHorizontalFlip, RandomResizedCrop, RandomRotation, ToTensor,
};
use crate::transforms::{Transform, TransformPipeline};
use anyhow::Result;
use strum::{AsRefStr, Display, EnumString};
use tracing::debug;

/// Named augmentation intensity.
///
/// Parsed from `"light"`, `"medium"` or `"strong"` (exact, lowercase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AugmentationStrength {
    Light,
    Medium,
    Strong,
}

/// The five magnitudes a strength level controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthProfile {
    /// Rotation angle is drawn from `[-rotate_degrees, rotate_degrees]`.
    pub rotate_degrees: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub hue: f64,
}

impl AugmentationStrength {
    pub const ALL: [AugmentationStrength; 3] = [Self::Light, Self::Medium, Self::Strong];

    /// Parses a lowercase strength name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        name.parse().map_err(|_| ConfigError::UnknownStrength {
            name: name.to_string(),
        })
    }

    pub fn profile(self) -> StrengthProfile {
        match self {
            Self::Light => StrengthProfile {
                rotate_degrees: 15.0,
                brightness: 0.1,
                contrast: 0.1,
                saturation: 0.1,
                hue: 0.05,
            },
            Self::Medium => StrengthProfile {
                rotate_degrees: 30.0,
                brightness: 0.2,
                contrast: 0.2,
                saturation: 0.2,
                hue: 0.1,
            },
            Self::Strong => StrengthProfile {
                rotate_degrees: 45.0,
                brightness: 0.3,
                contrast: 0.3,
                saturation: 0.3,
                hue: 0.15,
            },
        }
    }
}


/// Builds train and eval pipelines for one image size and strength.
///
/// # Example
/// ```ignore
/// let policy = AugmentationPolicy::new(ImageSize::new(128, 128)?, "strong")?;
/// let train = policy.get_transform(true)?;
/// let eval = policy.get_transform(false)?;
/// ```
#[derive(Debug, Clone)]
pub struct AugmentationPolicy {
    image_size: ImageSize,
    strength: AugmentationStrength,
    rng: RandomSource,
}

impl AugmentationPolicy {
    /// Fails with [`ConfigError::UnknownStrength`] for any name other than
    /// `light`, `medium` or `strong`.
    pub fn new(image_size: ImageSize, strength: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_strength(
            image_size,
            AugmentationStrength::from_name(strength)?,
        ))
    }

    pub fn from_strength(image_size: ImageSize, strength: AugmentationStrength) -> Self {
        Self {
            image_size,
            strength,
            rng: RandomSource::default(),
        }
    }

    /// Selects where the random steps draw from. Defaults to the worker RNG.
    pub fn with_random_source(mut self, rng: RandomSource) -> Self {
        self.rng = rng;
        self
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn strength(&self) -> AugmentationStrength {
        self.strength
    }

    /// Returns the train pipeline when `train` is true, otherwise the
    /// deterministic resize / to-tensor / normalize pipeline.
    pub fn get_transform(&self, train: bool) -> Result<TransformPipeline> {
        if !train {
            return Ok(eval_transform(self.image_size));
        }

        let profile = self.strength.profile();
        debug!(strength = %self.strength, ?profile, "Building train transform");

        let pipeline = RandomResizedCrop::new(self.image_size, (0.8, 1.0), self.rng.clone())?
            .then(RandomHorizontalFlip::new(0.5, self.rng.clone())?)
            .then(RandomRotation::new(profile.rotate_degrees, self.rng.clone())?)
            .then(ColorJitter::new(
                profile.brightness,
                profile.contrast,
                profile.saturation,
                profile.hue,
                self.rng.clone(),
            )?)
            .then(RandomAdjustSharpness::new(2.0, 0.5, self.rng.clone())?)
            .then(RandomAutocontrast::new(0.5, self.rng.clone())?)
            .then(ToTensor)
            .then(Normalize::imagenet());

        Ok(TransformPipeline::new(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_profiles() {
        assert_eq!(AugmentationStrength::Light.profile().rotate_degrees, 15.0);
        assert_eq!(AugmentationStrength::Medium.profile().saturation, 0.2);
        let strong = AugmentationStrength::Strong.profile();
        assert_eq!(strong.rotate_degrees, 45.0);
        assert_eq!(strong.hue, 0.15);
    }

    #[test]
    fn test_train_output_shape_for_every_strength() -> Result<()> {
        let size = ImageSize::new(48, 64)?;
        for strength in AugmentationStrength::ALL {
            let policy = AugmentationPolicy::from_strength(size, strength)
                .with_random_source(RandomSource::seeded(3));
            let pipeline = policy.get_transform(true)?;
            for (w, h) in [(100, 80), (30, 200), (64, 48)] {
                let tensor = pipeline.apply(gradient(w, h))?;
                assert_eq!(tensor.size(), vec![3, 48, 64], "strength {}", strength);
            }
        }
        Ok(())
    }

    #[test]
    fn test_train_step_order() -> Result<()> {
        let policy = AugmentationPolicy::new(ImageSize::default(), "medium")?;
        assert_eq!(
            policy.get_transform(true)?.steps(),
            vec![
                "RandomResizedCrop",
                "RandomHorizontalFlip",
                "RandomRotation",
                "ColorJitter",
                "RandomAdjustSharpness",
                "RandomAutocontrast",
                "ToTensor",
                "Normalize",
            ]
        );
        assert_eq!(
            policy.get_transform(false)?.steps(),
            vec!["Resize", "ToTensor", "Normalize"]
        );
        Ok(())
    }

    #[test]
    fn test_eval_transform_is_deterministic() -> Result<()> {
        let policy = AugmentationPolicy::new(ImageSize::new(16, 16)?, "light")?;
        let pipeline = policy.get_transform(false)?;
        let a = pipeline.apply(gradient(40, 30))?;
        let b = pipeline.apply(gradient(40, 30))?;
        assert!(a.equal(&b));
        assert_eq!(a.size(), vec![3, 16, 16]);
        Ok(())
    }

    #[test]
    fn test_seeded_policies_replay() -> Result<()> {
        let size = ImageSize::new(32, 32)?;
        let run = || -> Result<tch::Tensor> {
            AugmentationPolicy::from_strength(size, AugmentationStrength::Strong)
                .with_random_source(RandomSource::seeded(99))
                .get_transform(true)?
                .apply(gradient(50, 40))
        };
        assert!(run()?.equal(&run()?));
        Ok(())
    }

    #[test]
    fn test_unknown_strength_is_rejected() {
        for name in ["extreme", "", "Medium", "heavy"] {
            let result = AugmentationPolicy::new(ImageSize::default(), name);
            assert!(
                matches!(result, Err(ConfigError::UnknownStrength { name: ref n }) if n == name),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_strength_round_trips_through_names() -> Result<()> {
        for strength in AugmentationStrength::ALL {
            assert_eq!(AugmentationStrength::from_name(strength.as_ref())?, strength);
        }
        assert_eq!(AugmentationStrength::Strong.to_string(), "strong");
        assert!(matches!(
            AugmentationStrength::from_name("LIGHT"),
            Err(ConfigError::UnknownStrength { .. })
        ));
        Ok(())
    }
}
