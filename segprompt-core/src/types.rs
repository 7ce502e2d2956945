use crate::error::{Error, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense boolean grid, row-major.
///
/// Masks are immutable once built: every operation that changes pixels
/// returns a new mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    /// An all-false mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidResults(format!(
                "mask of {}x{} needs {} cells, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// A mask whose true cells are exactly the half-open rectangle
    /// `[x1, x2) × [y1, y2)`, clipped to the grid.
    pub fn from_rect(width: u32, height: u32, x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::from_fn(width, height, |x, y| x >= x1 && x < x2 && y >= y1 && y < y2)
    }

    /// Any non-zero luma value is treated as inside the mask.
    pub fn from_luma(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.pixels().map(|p| p.0[0] != 0).collect();
        Self { width, height, data }
    }

    /// Threshold a float plane (0.0/1.0 as emitted by most segmentation heads).
    pub fn from_plane(width: u32, height: u32, plane: &[f32]) -> Result<Self> {
        Self::from_vec(width, height, plane.iter().map(|&v| v > 0.5).collect())
    }

    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Number of true cells.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Number of cells true in both masks. Masks of different shapes share nothing.
    pub fn intersection_count(&self, other: &Mask) -> usize {
        if self.dimensions() != other.dimensions() {
            return 0;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|(&a, &b)| a && b)
            .count()
    }

    /// Number of true cells inside the half-open rectangle `[x1, x2) × [y1, y2)`.
    pub fn count_in_rect(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> usize {
        let x2 = x2.min(self.width);
        let y2 = y2.min(self.height);
        if x1 >= x2 || y1 >= y2 {
            return 0;
        }
        let w = self.width as usize;
        (y1..y2)
            .map(|y| {
                let row = &self.data[y as usize * w..(y as usize + 1) * w];
                row[x1 as usize..x2 as usize].iter().filter(|&&v| v).count()
            })
            .sum()
    }

    /// Tight `[x1, y1, x2, y2]` extent of the true cells, exclusive on the
    /// right and bottom. `None` for an empty mask.
    pub fn extent(&self) -> Option<[u32; 4]> {
        let mut extent: Option<[u32; 4]> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                let e = extent.get_or_insert([x, y, x + 1, y + 1]);
                e[0] = e[0].min(x);
                e[1] = e[1].min(y);
                e[2] = e[2].max(x + 1);
                e[3] = e[3].max(y + 1);
            }
        }
        extent
    }

    /// Nearest-neighbor resample. Returns a clone when the size already matches.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Mask {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let resized = imageops::resize(&self.to_luma(), width, height, FilterType::Nearest);
        Mask::from_luma(&resized)
    }
}

/// Axis-aligned box `(x1, y1, x2, y2)` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Finite coordinates with a strictly positive width and height.
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

impl From<[u32; 4]> for BBox {
    fn from(b: [u32; 4]) -> Self {
        Self::new(b[0] as f32, b[1] as f32, b[2] as f32, b[3] as f32)
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Whether a prompt point includes or excludes the masks under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointLabel {
    Background = 0,
    Foreground = 1,
}

impl TryFrom<u8> for PointLabel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PointLabel::Background),
            1 => Ok(PointLabel::Foreground),
            other => Err(Error::InvalidPoint(format!(
                "point label must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub x: f32,
    pub y: f32,
    pub label: PointLabel,
}

impl LabeledPoint {
    pub fn foreground(x: f32, y: f32) -> Self {
        Self { x, y, label: PointLabel::Foreground }
    }

    pub fn background(x: f32, y: f32) -> Self {
        Self { x, y, label: PointLabel::Background }
    }
}

/// One detection box emitted by the segmentation model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

/// Normalized record for one model instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Index of the instance in the raw mask stack.
    pub id: usize,
    pub segmentation: Mask,
    pub bbox: BBox,
    pub score: f32,
    /// True cells of `segmentation`, computed once.
    pub area: usize,
}

/// Raw output of the segmentation model for a single image.
///
/// Treated as read-only once constructed.
#[derive(Debug, Clone, Default)]
pub struct SegmentationResults {
    masks: Vec<Mask>,
    detections: Vec<Detection>,
}

impl SegmentationResults {
    /// Every mask must share one shape and every mask needs a parallel detection.
    pub fn new(masks: Vec<Mask>, detections: Vec<Detection>) -> Result<Self> {
        if masks.len() != detections.len() {
            return Err(Error::InvalidResults(format!(
                "{} masks but {} boxes",
                masks.len(),
                detections.len()
            )));
        }
        if let Some(first) = masks.first() {
            let dims = first.dimensions();
            if let Some((i, m)) = masks.iter().enumerate().find(|(_, m)| m.dimensions() != dims) {
                return Err(Error::ResolutionMismatch(format!(
                    "mask {} is {}x{}, expected {}x{}",
                    i,
                    m.width(),
                    m.height(),
                    dims.0,
                    dims.1
                )));
            }
        }
        Ok(Self { masks, detections })
    }

    /// Builds detections from each mask's own extent, with confidence 1.0.
    pub fn from_masks(masks: Vec<Mask>) -> Result<Self> {
        let detections = masks
            .iter()
            .map(|m| {
                let bbox = m.extent().map(BBox::from).unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
                Detection::new(bbox, 1.0)
            })
            .collect();
        Self::new(masks, detections)
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// `(width, height)` of the mask grid, `None` when there are no masks.
    pub fn mask_size(&self) -> Option<(u32, u32)> {
        self.masks.first().map(Mask::dimensions)
    }
}
