//! Overlay rendering for prompt results

use crate::error::VisionError;
use crate::render::compositor::{layer_colors, Compositor, MaskLayer};
use crate::render::morphology::smooth;
use crate::session::SessionContext;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use segprompt_core::{BBox, Error, LabeledPoint, Mask, PointLabel, RenderOptions};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const FOREGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const POINT_RADIUS: i32 = 3;
/// Contour lines: blue at 0.8 opacity, 2 px thick.
const CONTOUR_COLOR: Rgba<u8> = Rgba([0, 0, 255, 204]);
const CONTOUR_THICKNESS: u32 = 2;
/// Stroke cells on the outer side of a contour point.
const STROKE_BEFORE: i32 = CONTOUR_THICKNESS as i32 / 2;

/// Draws prompt results over the session image.
pub struct Renderer<'a> {
    context: &'a SessionContext,
    compositor: &'a dyn Compositor,
}

impl<'a> Renderer<'a> {
    pub fn new(context: &'a SessionContext, compositor: &'a dyn Compositor) -> Self {
        Self { context, compositor }
    }

    /// Checks that `masks` can be composited together and applies the
    /// morphological cleanup when `options.better_quality` is set. Fill and
    /// contours are both drawn from the returned masks.
    fn prepare<'m>(&self, masks: &'m [Mask], options: &RenderOptions) -> Result<Cow<'m, [Mask]>, VisionError> {
        let first = masks
            .first()
            .ok_or_else(|| Error::EmptyResult("nothing to render".to_string()))?;
        let (mask_w, mask_h) = first.dimensions();
        if let Some(m) = masks.iter().find(|m| m.dimensions() != (mask_w, mask_h)) {
            return Err(Error::ResolutionMismatch(format!(
                "cannot composite a {}x{} mask with {}x{} masks",
                m.width(),
                m.height(),
                mask_w,
                mask_h
            ))
            .into());
        }

        if options.better_quality {
            Ok(Cow::Owned(masks.iter().map(smooth).collect()))
        } else {
            Ok(Cow::Borrowed(masks))
        }
    }

    /// Composites already prepared masks at their own resolution, resized
    /// (nearest) to the image unless `options.retina` is set.
    fn composite(&self, masks: &[Mask], options: &RenderOptions) -> RgbaImage {
        let (mask_w, mask_h) = masks.first().map(Mask::dimensions).unwrap_or((0, 0));
        let colors = layer_colors(masks.len(), options.random_color, options.seed);
        let layers: Vec<MaskLayer> = masks
            .iter()
            .zip(colors)
            .map(|(mask, color)| MaskLayer { mask, color })
            .collect();
        let overlay = self.compositor.composite(&layers, mask_w, mask_h);

        if options.retina {
            return overlay;
        }
        let (w, h) = self.context.image_size();
        resize_nearest(&overlay, w, h)
    }

    /// The composited mask layer before it is blended over the image.
    ///
    /// At the mask resolution when `options.retina` is set, otherwise
    /// resized (nearest) to the image resolution.
    pub fn overlay(&self, masks: &[Mask], options: &RenderOptions) -> Result<RgbaImage, VisionError> {
        let masks = self.prepare(masks, options)?;
        Ok(self.composite(&masks, options))
    }

    /// Renders `masks` with the optional query box and points over the image.
    pub fn render(
        &self,
        masks: &[Mask],
        bbox: Option<BBox>,
        points: &[LabeledPoint],
        options: &RenderOptions,
    ) -> Result<RgbImage, VisionError> {
        let (width, height) = self.context.image_size();
        let masks = self.prepare(masks, options)?;
        let overlay = self.composite(&masks, options);
        // the overlay is stretched over the whole image, as an extent would be
        let overlay = resize_nearest(&overlay, width, height);

        let mut canvas = self.context.image().clone();
        blend(&mut canvas, &overlay);

        if let Some(bbox) = bbox {
            draw_box(&mut canvas, bbox);
        }
        for point in points {
            let color = match point.label {
                PointLabel::Foreground => FOREGROUND_COLOR,
                PointLabel::Background => BACKGROUND_COLOR,
            };
            draw_filled_circle_mut(
                &mut canvas,
                (point.x.round() as i32, point.y.round() as i32),
                POINT_RADIUS,
                color,
            );
        }

        if options.with_contours {
            let outline = contour_layer(&masks, width, height);
            blend(&mut canvas, &outline);
        }

        debug!(
            "Rendered {} masks at {}x{} with {} compositor",
            masks.len(),
            width,
            height,
            self.compositor.name()
        );
        Ok(canvas)
    }

    /// Renders and writes the result to `<output_dir>/<image file name>`,
    /// creating the directory if needed. Returns the written path.
    pub fn plot(
        &self,
        masks: &[Mask],
        output_dir: &Path,
        bbox: Option<BBox>,
        points: &[LabeledPoint],
        options: &RenderOptions,
    ) -> Result<PathBuf, VisionError> {
        let canvas = self.render(masks, bbox, points, options)?;

        fs::create_dir_all(output_dir).map_err(|source| VisionError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let file_name = self
            .context
            .image_path()
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| "result.png".into());
        let path = output_dir.join(file_name);

        canvas.save(&path).map_err(|source| VisionError::ImageWrite {
            path: path.clone(),
            source,
        })?;
        info!("Saved overlay to {:?}", path);
        Ok(path)
    }
}

fn resize_nearest(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Nearest)
}

/// Alpha-blends `overlay` over `base`; both have the same size.
fn blend(base: &mut RgbImage, overlay: &RgbaImage) {
    for (dst, src) in base.pixels_mut().zip(overlay.pixels()) {
        let alpha = src.0[3] as f32 / 255.0;
        if alpha == 0.0 {
            continue;
        }
        for c in 0..3 {
            let mixed = dst.0[c] as f32 * (1.0 - alpha) + src.0[c] as f32 * alpha;
            dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn draw_box(canvas: &mut RgbImage, bbox: BBox) {
    let w = bbox.width().round();
    let h = bbox.height().round();
    if !bbox.is_valid() || w < 1.0 || h < 1.0 {
        return;
    }
    let rect = Rect::at(bbox.x1.round() as i32, bbox.y1.round() as i32).of_size(w as u32, h as u32);
    draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
}

/// Outer contours of every mask at the image resolution, painted into a
/// translucent layer.
fn contour_layer(masks: &[Mask], width: u32, height: u32) -> RgbaImage {
    let mut lines = GrayImage::new(width, height);
    for mask in masks {
        let resized = mask.resize_nearest(width, height);
        let contours = find_contours::<i32>(&resized.to_luma());
        for contour in contours
            .iter()
            .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        {
            for p in &contour.points {
                for dy in -STROKE_BEFORE..CONTOUR_THICKNESS as i32 - STROKE_BEFORE {
                    for dx in -STROKE_BEFORE..CONTOUR_THICKNESS as i32 - STROKE_BEFORE {
                        let (x, y) = (p.x + dx, p.y + dy);
                        if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                            lines.put_pixel(x as u32, y as u32, Luma([255]));
                        }
                    }
                }
            }
        }
    }

    RgbaImage::from_fn(width, height, |x, y| {
        if lines.get_pixel(x, y).0[0] != 0 {
            CONTOUR_COLOR
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}
