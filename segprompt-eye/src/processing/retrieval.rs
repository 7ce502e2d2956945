//! Text prompt: rank cropped regions against a text query

use crate::error::VisionError;
use crate::models::RegionEmbedder;
use crate::processing::crop::crop_image;
use crate::processing::format::format_results;
use crate::utils::{argmax, dot, normalize, softmax};
use image::RgbImage;
use segprompt_core::{Error, Mask, SegmentationResults};
use tracing::{debug, info};

/// Scale applied to cosine similarities before the softmax.
pub const LOGIT_SCALE: f32 = 100.0;

/// Winner of a text query.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    /// Position of the winner in the formatted annotation list.
    pub position: usize,
    /// Raw instance index of the winner.
    pub id: usize,
    /// Softmax probability of the winner among the ranked crops.
    pub probability: f32,
    pub mask: Mask,
}

/// Softmax over `LOGIT_SCALE * cos(image_i, text)` for every image embedding.
pub fn rank_regions(image_embeddings: &[Vec<f32>], text_embedding: &[f32]) -> Vec<f32> {
    let mut text = text_embedding.to_vec();
    normalize(&mut text);

    let logits: Vec<f32> = image_embeddings
        .iter()
        .map(|embedding| {
            let mut image = embedding.clone();
            normalize(&mut image);
            LOGIT_SCALE * dot(&image, &text)
        })
        .collect();
    softmax(&logits)
}

/// Finds the annotation whose cropped region best matches `text`.
///
/// Regions of 100 pixels or fewer are never ranked; the winning crop index
/// is mapped back through the filtered positions to the full annotation list.
pub fn match_text(
    image: &RgbImage,
    results: &SegmentationResults,
    embedder: &mut dyn RegionEmbedder,
    text: &str,
) -> Result<TextMatch, VisionError> {
    let annotations = format_results(results, 0);
    if annotations.is_empty() {
        return Err(Error::EmptyResult("no masks to rank against the text query".to_string()).into());
    }

    let crops = crop_image(image, &annotations);
    if crops.is_empty() {
        return Err(Error::NoRegions(format!(
            "all {} regions were too small to crop",
            annotations.len()
        ))
        .into());
    }

    let image_embeddings = embedder.encode_images(&crops.crops)?;
    if image_embeddings.len() != crops.len() {
        return Err(VisionError::Embedding(format!(
            "expected {} image embeddings, got {}",
            crops.len(),
            image_embeddings.len()
        )));
    }
    let text_embedding = embedder.encode_text(text)?;

    let probs = rank_regions(&image_embeddings, &text_embedding);
    let best = argmax(&probs)
        .ok_or_else(|| VisionError::Embedding("ranking produced no finite score".to_string()))?;
    let position = crops.filtered_ids.to_original(best);
    debug!(
        "Crop {} maps to annotation position {} ({} filtered)",
        best,
        position,
        crops.filtered_ids.len()
    );

    let annotation = &annotations[position];
    info!(
        "Text prompt {:?} matched mask {} (p = {:.3})",
        text, annotation.id, probs[best]
    );
    Ok(TextMatch {
        position,
        id: annotation.id,
        probability: probs[best],
        mask: annotation.segmentation.clone(),
    })
}

/// The mask best matching `text`, as a one-element stack.
pub fn retrieve_by_text(
    image: &RgbImage,
    results: &SegmentationResults,
    embedder: &mut dyn RegionEmbedder,
    text: &str,
) -> Result<Vec<Mask>, VisionError> {
    let found = match_text(image, results, embedder, text)?;
    Ok(vec![found.mask])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds crop `i` as the unit vector `e_i` and the text as `e_target`.
    struct OneHotEmbedder {
        target: usize,
        dim: usize,
        seen: usize,
    }

    impl RegionEmbedder for OneHotEmbedder {
        fn encode_images(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError> {
            self.seen = images.len();
            Ok((0..images.len())
                .map(|i| {
                    let mut v = vec![0.0; self.dim];
                    v[i] = 1.0;
                    v
                })
                .collect())
        }

        fn encode_text(&mut self, _text: &str) -> Result<Vec<f32>, VisionError> {
            let mut v = vec![0.0; self.dim];
            v[self.target] = 1.0;
            Ok(v)
        }
    }

    #[test]
    fn test_rank_regions_prefers_aligned_embedding() {
        let probs = rank_regions(&[vec![1.0, 0.0], vec![0.0, 2.0]], &[0.0, 5.0]);
        assert!(probs[1] > 0.99);
        assert_eq!(argmax(&probs), Some(1));
    }

    #[test]
    fn test_rank_regions_scale_is_applied() {
        // cosines 1.0 and 0.99 differ by 1 logit after scaling
        let a = vec![1.0, 0.0];
        let b = vec![0.99, (1.0f32 - 0.99 * 0.99).sqrt()];
        let probs = rank_regions(&[a, b], &[1.0, 0.0]);
        let ratio = probs[0] / probs[1];
        assert!((ratio - 1.0f32.exp()).abs() < 1e-2);
    }

    #[test]
    fn test_all_regions_filtered() {
        let results = SegmentationResults::from_masks(vec![
            Mask::from_rect(50, 50, 0, 0, 5, 5),
            Mask::from_rect(50, 50, 10, 10, 20, 20),
        ])
        .unwrap();
        let image = RgbImage::new(50, 50);
        let mut embedder = OneHotEmbedder { target: 0, dim: 4, seen: 0 };
        let err = retrieve_by_text(&image, &results, &mut embedder, "dog").unwrap_err();
        assert!(matches!(err.as_prompt(), Some(Error::NoRegions(_))));
        assert_eq!(embedder.seen, 0);
    }

    #[test]
    fn test_no_masks() {
        let image = RgbImage::new(10, 10);
        let mut embedder = OneHotEmbedder { target: 0, dim: 4, seen: 0 };
        let err =
            retrieve_by_text(&image, &SegmentationResults::default(), &mut embedder, "x").unwrap_err();
        assert!(matches!(err.as_prompt(), Some(Error::EmptyResult(_))));
    }

    #[test]
    fn test_winner_remapped_past_filtered() {
        let masks = vec![
            Mask::from_rect(60, 60, 0, 0, 20, 20),
            Mask::from_rect(60, 60, 0, 0, 3, 3),
            Mask::from_rect(60, 60, 20, 20, 40, 40),
        ];
        let results = SegmentationResults::from_masks(masks.clone()).unwrap();
        let image = RgbImage::new(60, 60);
        let mut embedder = OneHotEmbedder { target: 1, dim: 4, seen: 0 };
        let found = match_text(&image, &results, &mut embedder, "thing").unwrap();
        assert_eq!(embedder.seen, 2);
        assert_eq!(found.position, 2);
        assert_eq!(found.id, 2);
        assert_eq!(found.mask, masks[2]);
    }
}
