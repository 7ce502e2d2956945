//! End-to-end prompt tests for segprompt-eye

use image::RgbImage;
use segprompt_core::{BBox, Device, Error, LabeledPoint, Mask, SegmentationResults};
use segprompt_eye::models::RegionEmbedder;
use segprompt_eye::processing::{
    crop_image, filter_masks, format_results, mask_ious, match_text, select_by_box, FilteredIds,
};
use segprompt_eye::{PromptSession, SessionContext, VisionError};
use std::path::PathBuf;

/// Image embeddings are one-hot on the crop index, the text on `target`.
struct PickCrop {
    target: usize,
}

impl RegionEmbedder for PickCrop {
    fn encode_images(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError> {
        Ok((0..images.len())
            .map(|i| {
                let mut v = vec![0.0; 8];
                v[i] = 1.0;
                v
            })
            .collect())
    }

    fn encode_text(&mut self, _text: &str) -> Result<Vec<f32>, VisionError> {
        let mut v = vec![0.0; 8];
        v[self.target] = 1.0;
        Ok(v)
    }
}

struct Broken;

impl RegionEmbedder for Broken {
    fn encode_images(&mut self, _images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError> {
        Err(VisionError::Embedding("model unavailable".to_string()))
    }

    fn encode_text(&mut self, _text: &str) -> Result<Vec<f32>, VisionError> {
        Err(VisionError::Embedding("model unavailable".to_string()))
    }
}

fn five_masks() -> Vec<Mask> {
    vec![
        Mask::from_rect(60, 60, 0, 0, 20, 20),
        Mask::from_rect(60, 60, 0, 0, 3, 3),
        Mask::from_rect(60, 60, 20, 20, 40, 40),
        Mask::from_rect(60, 60, 45, 45, 48, 48),
        Mask::from_rect(60, 60, 40, 0, 60, 20),
    ]
}

#[test]
fn test_box_selects_own_square() {
    let mut masks = vec![Mask::from_rect(100, 100, 0, 0, 100, 100)];
    masks.push(Mask::from_rect(100, 100, 20, 20, 30, 30));
    masks.push(Mask::from_rect(100, 100, 60, 10, 90, 40));

    let query = BBox::new(20.0, 20.0, 30.0, 30.0);
    let ious = mask_ious(&masks, (100, 100), query).unwrap();
    assert_eq!(ious[1], 1.0);

    let selected = select_by_box(&masks, (100, 100), query).unwrap();
    assert_eq!(selected, vec![masks[1].clone()]);
}

#[test]
fn test_box_rejects_malformed_query() {
    let masks = vec![Mask::from_rect(10, 10, 0, 0, 5, 5)];
    let err = select_by_box(&masks, (10, 10), BBox::new(5.0, 5.0, 5.0, 9.0)).unwrap_err();
    assert!(matches!(err, Error::InvalidBox(_)));
    let err = select_by_box(&masks, (10, 10), BBox::new(f32::NAN, 0.0, 4.0, 4.0)).unwrap_err();
    assert!(matches!(err, Error::InvalidBox(_)));
}

#[test]
fn test_box_collapsing_under_rescale() {
    let masks = vec![Mask::from_rect(10, 10, 0, 0, 5, 5)];
    // 0.2 px wide at image scale 100 → 10 rounds to nothing
    let err = select_by_box(&masks, (100, 100), BBox::new(50.0, 50.0, 50.2, 60.0)).unwrap_err();
    assert!(matches!(err, Error::ResolutionMismatch(_)));
}

#[test]
fn test_point_foreground_and_background() {
    let a = Mask::from_rect(50, 50, 0, 0, 20, 20);
    let b = Mask::from_rect(50, 50, 30, 30, 50, 50);
    let results = SegmentationResults::from_masks(vec![a.clone(), b]).unwrap();
    let annotations = format_results(&results, 0);

    let session = PromptSession::new(SessionContext::new(
        RgbImage::new(50, 50),
        PathBuf::from("p.png"),
        results,
        Device::Cpu,
    ));
    assert_eq!(session.point_prompt(&[LabeledPoint::foreground(5.0, 5.0)]).unwrap(), vec![a]);

    let cleared = session
        .point_prompt(&[
            LabeledPoint::foreground(5.0, 5.0),
            LabeledPoint::background(10.0, 10.0),
        ])
        .unwrap();
    assert!(cleared[0].is_empty());
    assert_eq!(annotations.len(), 2);
}

#[test]
fn test_text_remap_skips_filtered_regions() {
    let results = SegmentationResults::from_masks(five_masks()).unwrap();
    let image = RgbImage::new(60, 60);

    let crops = crop_image(&image, &format_results(&results, 0));
    assert_eq!(crops.len(), 3);
    assert_eq!(crops.filtered_ids, [1, 3].into_iter().collect::<FilteredIds>());

    let found = match_text(&image, &results, &mut PickCrop { target: 1 }, "a square").unwrap();
    assert_eq!(found.position, 2);
    assert_eq!(found.mask, five_masks()[2]);

    let last = match_text(&image, &results, &mut PickCrop { target: 2 }, "a square").unwrap();
    assert_eq!(last.position, 4);
}

#[test]
fn test_text_prompt_through_session() {
    let results = SegmentationResults::from_masks(five_masks()).unwrap();
    let session = PromptSession::new(SessionContext::new(
        RgbImage::new(60, 60),
        PathBuf::from("t.png"),
        results,
        Device::Accelerator,
    ));
    let masks = session.text_prompt(&mut PickCrop { target: 0 }, "corner").unwrap();
    assert_eq!(masks, vec![five_masks()[0].clone()]);
}

#[test]
fn test_text_embedding_failure_propagates() {
    let results = SegmentationResults::from_masks(five_masks()).unwrap();
    let err = match_text(&RgbImage::new(60, 60), &results, &mut Broken, "x").unwrap_err();
    assert!(matches!(err, VisionError::Embedding(_)));
}

#[test]
fn test_everything_with_overlap_filter() {
    let big = Mask::from_rect(30, 30, 0, 0, 20, 20);
    let inside = Mask::from_rect(30, 30, 2, 2, 10, 10);
    let apart = Mask::from_rect(30, 30, 22, 22, 30, 30);
    let results = SegmentationResults::from_masks(vec![big.clone(), inside, apart.clone()]).unwrap();

    let (kept, removed) = filter_masks(&format_results(&results, 0));
    assert_eq!(kept.len(), 2);
    assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec![1]);

    let session = PromptSession::new(SessionContext::new(
        RgbImage::new(30, 30),
        PathBuf::from("e.png"),
        results,
        Device::Cpu,
    ));
    assert_eq!(session.everything_prompt(true).unwrap(), vec![big, apart]);
}

#[test]
fn test_results_validation() {
    let err = SegmentationResults::from_masks(vec![Mask::new(4, 4), Mask::new(5, 4)]).unwrap_err();
    assert!(matches!(err, Error::ResolutionMismatch(_)));
}
