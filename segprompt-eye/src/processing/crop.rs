//! Region cropping for the text retriever

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use segprompt_core::{Annotation, Mask};
use std::collections::BTreeSet;
use tracing::debug;

/// Regions whose mask covers this many pixels or fewer are not cropped.
pub const MIN_CROP_AREA: usize = 100;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Positions dropped from a sequence before ranking.
///
/// Ranking happens over the surviving positions only; this maps a rank
/// position back to the position it had in the full sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredIds {
    removed: BTreeSet<usize>,
}

impl FilteredIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: usize) {
        self.removed.insert(position);
    }

    pub fn contains(&self, position: usize) -> bool {
        self.removed.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.removed.iter().copied()
    }

    /// How many removed positions are `<= position`.
    pub fn count_removed_at_or_before(&self, position: usize) -> usize {
        self.removed.range(..=position).count()
    }

    /// Position in the full sequence of the `index`-th surviving element.
    pub fn to_original(&self, index: usize) -> usize {
        let mut candidate = index;
        loop {
            let next = index + self.count_removed_at_or_before(candidate);
            if next == candidate {
                return candidate;
            }
            candidate = next;
        }
    }
}

impl FromIterator<usize> for FilteredIds {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            removed: iter.into_iter().collect(),
        }
    }
}

/// Output of [`crop_image`].
#[derive(Debug, Clone, Default)]
pub struct CropSet {
    /// One masked image per surviving annotation, in annotation order.
    pub crops: Vec<RgbImage>,
    /// `[x1, y1, x2, y2]` of each crop, parallel to `crops`.
    pub boxes: Vec<[u32; 4]>,
    /// Annotation positions that were too small to crop.
    pub filtered_ids: FilteredIds,
}

impl CropSet {
    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }
}

/// Bounding box `[x1, y1, x2, y2]` (exclusive right/bottom) covering every
/// connected component of `mask`. `None` when the mask is empty.
pub fn bbox_from_mask(mask: &Mask) -> Option<[u32; 4]> {
    let contours = find_contours::<i32>(&mask.to_luma());

    let mut merged: Option<[i32; 4]> = None;
    for contour in contours.iter().filter(|c| matches!(c.border_type, BorderType::Outer)) {
        let Some(rect) = bounding_rect(&contour.points) else {
            continue;
        };
        let m = merged.get_or_insert(rect);
        m[0] = m[0].min(rect[0]);
        m[1] = m[1].min(rect[1]);
        m[2] = m[2].max(rect[2]);
        m[3] = m[3].max(rect[3]);
    }

    merged.map(|m| [m[0].max(0) as u32, m[1].max(0) as u32, m[2] as u32, m[3] as u32])
}

fn bounding_rect(points: &[imageproc::point::Point<i32>]) -> Option<[i32; 4]> {
    let first = points.first()?;
    let mut rect = [first.x, first.y, first.x + 1, first.y + 1];
    for p in points {
        rect[0] = rect[0].min(p.x);
        rect[1] = rect[1].min(p.y);
        rect[2] = rect[2].max(p.x + 1);
        rect[3] = rect[3].max(p.y + 1);
    }
    Some(rect)
}

/// White canvas of the image size holding only the pixels of `image` that
/// are inside both `bbox` and `mask`.
pub fn segment_image(image: &RgbImage, mask: &Mask, bbox: [u32; 4]) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = RgbImage::from_pixel(width, height, BACKGROUND);

    let x2 = bbox[2].min(width).min(mask.width());
    let y2 = bbox[3].min(height).min(mask.height());
    for y in bbox[1]..y2 {
        for x in bbox[0]..x2 {
            if mask.get(x, y) {
                out.put_pixel(x, y, *image.get_pixel(x, y));
            }
        }
    }
    out
}

/// Crops every annotation large enough to rank.
///
/// The image is resampled to the mask resolution first so crops and masks
/// share one coordinate system. Annotations with `area <= 100` are skipped
/// and their positions recorded in `filtered_ids`.
pub fn crop_image(image: &RgbImage, annotations: &[Annotation]) -> CropSet {
    let mut set = CropSet::default();
    let Some(first) = annotations.first() else {
        return set;
    };

    let (mask_w, mask_h) = first.segmentation.dimensions();
    let resized;
    let image = if image.dimensions() != (mask_w, mask_h) {
        resized = imageops::resize(image, mask_w, mask_h, FilterType::CatmullRom);
        &resized
    } else {
        image
    };

    for (position, annotation) in annotations.iter().enumerate() {
        if annotation.area <= MIN_CROP_AREA {
            set.filtered_ids.insert(position);
            continue;
        }
        let Some(bbox) = bbox_from_mask(&annotation.segmentation) else {
            set.filtered_ids.insert(position);
            continue;
        };
        set.crops.push(segment_image(image, &annotation.segmentation, bbox));
        set.boxes.push(bbox);
    }

    debug!(
        "Cropped {} regions, {} filtered as too small",
        set.crops.len(),
        set.filtered_ids.len()
    );
    set
}
