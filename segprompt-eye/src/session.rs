//! Single-image prompt session

use crate::error::VisionError;
use crate::models::RegionEmbedder;
use crate::processing::{
    compose_from_points, filter_masks, format_results, retrieve_by_text, select_by_box,
};
use crate::render::{compositor_for, Compositor, Renderer};
use image::RgbImage;
use segprompt_core::{BBox, Device, Error, LabeledPoint, Mask, RenderOptions, SegmentationResults};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a prompt needs about the current image. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct SessionContext {
    image: RgbImage,
    image_path: PathBuf,
    results: SegmentationResults,
    device: Device,
}

impl SessionContext {
    pub fn new(image: RgbImage, image_path: PathBuf, results: SegmentationResults, device: Device) -> Self {
        Self {
            image,
            image_path,
            results,
            device,
        }
    }

    /// Decodes the image at `image_path` and pairs it with `results`.
    pub fn open(
        image_path: impl AsRef<Path>,
        results: SegmentationResults,
        device: Device,
    ) -> Result<Self, VisionError> {
        let image_path = image_path.as_ref().to_path_buf();
        let image = image::open(&image_path)?.to_rgb8();
        info!(
            "Opened {:?} ({}x{}) with {} masks on {}",
            image_path,
            image.width(),
            image.height(),
            results.len(),
            device
        );
        Ok(Self::new(image, image_path, results, device))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn results(&self) -> &SegmentationResults {
        &self.results
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// `(width, height)` of the source image.
    pub fn image_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Prompt entry points over one image and its segmentation results.
///
/// The compositor backend is fixed from the context's device at construction.
pub struct PromptSession {
    context: SessionContext,
    compositor: Box<dyn Compositor>,
    min_area: usize,
}

impl PromptSession {
    pub fn new(context: SessionContext) -> Self {
        let compositor = compositor_for(context.device());
        info!("Prompt session using {} compositor", compositor.name());
        Self {
            context,
            compositor,
            min_area: 0,
        }
    }

    /// Masks with fewer pixels are left out of the everything prompt.
    pub fn with_min_area(mut self, min_area: usize) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The raw mask with the best IoU against `bbox`.
    pub fn box_prompt(&self, bbox: BBox) -> Result<Vec<Mask>, VisionError> {
        Ok(select_by_box(
            self.context.results.masks(),
            self.context.image_size(),
            bbox,
        )?)
    }

    /// Union of masks under foreground points minus masks under background points.
    pub fn point_prompt(&self, points: &[LabeledPoint]) -> Result<Vec<Mask>, VisionError> {
        let annotations = format_results(&self.context.results, 0);
        Ok(compose_from_points(
            &annotations,
            self.context.image_size(),
            points,
        )?)
    }

    /// The mask whose cropped region best matches `text`.
    pub fn text_prompt(
        &self,
        embedder: &mut dyn RegionEmbedder,
        text: &str,
    ) -> Result<Vec<Mask>, VisionError> {
        retrieve_by_text(&self.context.image, &self.context.results, embedder, text)
    }

    /// Every mask, optionally with near-duplicates contained in larger masks removed.
    pub fn everything_prompt(&self, filter_overlaps: bool) -> Result<Vec<Mask>, VisionError> {
        if self.context.results.is_empty() {
            return Err(Error::EmptyResult("segmentation produced no masks".to_string()).into());
        }
        let annotations = format_results(&self.context.results, self.min_area);
        if !filter_overlaps {
            return Ok(annotations.into_iter().map(|a| a.segmentation).collect());
        }
        let (kept, removed) = filter_masks(&annotations);
        info!(
            "Everything prompt kept {} masks, removed {} contained",
            kept.len(),
            removed.len()
        );
        Ok(kept.into_iter().map(|a| a.segmentation).collect())
    }

    pub fn renderer(&self) -> Renderer<'_> {
        Renderer::new(&self.context, self.compositor.as_ref())
    }

    /// Renders `masks` over the image without writing it.
    pub fn render(
        &self,
        masks: &[Mask],
        bbox: Option<BBox>,
        points: &[LabeledPoint],
        options: &RenderOptions,
    ) -> Result<RgbImage, VisionError> {
        self.renderer().render(masks, bbox, points, options)
    }

    /// Renders `masks` and writes `<output_dir>/<image file name>`.
    pub fn plot(
        &self,
        masks: &[Mask],
        output_dir: &Path,
        bbox: Option<BBox>,
        points: &[LabeledPoint],
        options: &RenderOptions,
    ) -> Result<PathBuf, VisionError> {
        self.renderer().plot(masks, output_dir, bbox, points, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(device: Device) -> PromptSession {
        let masks = vec![
            Mask::from_rect(40, 40, 0, 0, 30, 30),
            Mask::from_rect(40, 40, 5, 5, 10, 10),
            Mask::from_rect(40, 40, 32, 32, 40, 40),
        ];
        let results = SegmentationResults::from_masks(masks).unwrap();
        let image = RgbImage::new(80, 80);
        PromptSession::new(SessionContext::new(image, PathBuf::from("a/b.png"), results, device))
    }

    #[test]
    fn test_box_prompt_rescales_query() {
        let s = session(Device::Cpu);
        let out = s.box_prompt(BBox::new(64.0, 64.0, 80.0, 80.0)).unwrap();
        assert_eq!(out, vec![Mask::from_rect(40, 40, 32, 32, 40, 40)]);
    }

    #[test]
    fn test_point_prompt() {
        let s = session(Device::Cpu);
        let out = s.point_prompt(&[LabeledPoint::foreground(70.0, 70.0)]).unwrap();
        assert_eq!(out[0], Mask::from_rect(40, 40, 32, 32, 40, 40));
    }

    #[test]
    fn test_everything_prompt_filtering() {
        let s = session(Device::Accelerator);
        assert_eq!(s.everything_prompt(false).unwrap().len(), 3);
        let filtered = s.everything_prompt(true).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(!filtered.contains(&Mask::from_rect(40, 40, 5, 5, 10, 10)));
    }

    #[test]
    fn test_everything_prompt_min_area() {
        let s = session(Device::Cpu).with_min_area(50);
        let out = s.everything_prompt(false).unwrap();
        assert_eq!(out.len(), 2);
        assert!(!out.contains(&Mask::from_rect(40, 40, 5, 5, 10, 10)));
    }

    #[test]
    fn test_everything_prompt_empty() {
        let ctx = SessionContext::new(
            RgbImage::new(4, 4),
            PathBuf::from("x.png"),
            SegmentationResults::default(),
            Device::Cpu,
        );
        let err = PromptSession::new(ctx).everything_prompt(false).unwrap_err();
        assert!(matches!(err.as_prompt(), Some(Error::EmptyResult(_))));
    }

    #[test]
    fn test_open_missing_image() {
        let err = SessionContext::open(
            "/definitely/not/here.png",
            SegmentationResults::default(),
            Device::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::Image(_)));
    }
}
