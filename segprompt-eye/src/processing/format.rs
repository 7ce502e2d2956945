//! Raw results to annotation records

use segprompt_core::{Annotation, SegmentationResults};
use tracing::debug;

/// Turns every raw instance into an [`Annotation`], dropping the ones whose
/// mask covers fewer than `min_area` pixels. Input order is preserved and
/// `id` is the instance's index in the raw stack.
pub fn format_results(results: &SegmentationResults, min_area: usize) -> Vec<Annotation> {
    let mut annotations = Vec::with_capacity(results.len());

    for (id, (mask, detection)) in results
        .masks()
        .iter()
        .zip(results.detections())
        .enumerate()
    {
        let area = mask.count();
        if area < min_area {
            continue;
        }
        annotations.push(Annotation {
            id,
            segmentation: mask.clone(),
            bbox: detection.bbox,
            score: detection.confidence,
            area,
        });
    }

    debug!(
        "Formatted {} of {} instances (min_area = {})",
        annotations.len(),
        results.len(),
        min_area
    );
    annotations
}

#[cfg(test)]
mod tests {
    use super::*;
    use segprompt_core::{BBox, Detection, Mask};

    fn results() -> SegmentationResults {
        let masks = vec![
            Mask::from_rect(20, 20, 0, 0, 10, 10),
            Mask::from_rect(20, 20, 0, 0, 2, 2),
            Mask::new(20, 20),
        ];
        let detections = vec![
            Detection::new(BBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
            Detection::new(BBox::new(0.0, 0.0, 2.0, 2.0), 0.5),
            Detection::new(BBox::new(0.0, 0.0, 1.0, 1.0), 0.1),
        ];
        SegmentationResults::new(masks, detections).unwrap()
    }

    #[test]
    fn test_format_keeps_everything_at_zero() {
        let annotations = format_results(&results(), 0);
        assert_eq!(annotations.len(), 3);
        assert_eq!(
            annotations.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(annotations[0].area, 100);
        assert_eq!(annotations[1].area, 4);
        assert_eq!(annotations[2].area, 0);
        assert_eq!(annotations[0].score, 0.9);
        assert_eq!(annotations[1].bbox, BBox::new(0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn test_format_min_area_keeps_raw_ids() {
        let annotations = format_results(&results(), 5);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].id, 0);

        let annotations = format_results(&results(), 4);
        assert_eq!(
            annotations.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_format_empty_results() {
        let empty = SegmentationResults::default();
        assert!(format_results(&empty, 0).is_empty());
    }
}
