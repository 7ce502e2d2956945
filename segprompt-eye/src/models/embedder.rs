//! Contract for the vision-language embedding model used by text prompts

use crate::error::VisionError;
use image::RgbImage;

/// Encodes image regions and text into a shared embedding space.
///
/// Implementations may return unnormalized vectors; callers L2-normalize
/// before comparing. Each call is a single blocking step with no partial
/// results.
pub trait RegionEmbedder {
    /// One embedding per image, in input order.
    fn encode_images(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError>;

    fn encode_text(&mut self, text: &str) -> Result<Vec<f32>, VisionError>;
}

impl<E: RegionEmbedder + ?Sized> RegionEmbedder for Box<E> {
    fn encode_images(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError> {
        (**self).encode_images(images)
    }

    fn encode_text(&mut self, text: &str) -> Result<Vec<f32>, VisionError> {
        (**self).encode_text(text)
    }
}
