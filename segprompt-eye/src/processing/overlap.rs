//! Suppression of masks that sit almost entirely inside a larger one

use segprompt_core::Annotation;
use std::collections::BTreeSet;
use tracing::debug;

/// Fraction of the smaller mask that must lie inside the larger one for it
/// to be dropped.
pub const CONTAINMENT_THRESHOLD: f64 = 0.8;

/// Removes every annotation whose mask is more than 80% covered by a
/// strictly larger mask.
///
/// Candidates are visited by descending area; equal areas never suppress
/// each other. Returns the survivors in their input order together with the
/// ids of the removed annotations.
pub fn filter_masks(annotations: &[Annotation]) -> (Vec<Annotation>, BTreeSet<usize>) {
    let mut order: Vec<usize> = (0..annotations.len()).collect();
    // stable: equal areas keep their input order
    order.sort_by(|&a, &b| annotations[b].area.cmp(&annotations[a].area));

    let mut removed = vec![false; annotations.len()];
    for (i, &ai) in order.iter().enumerate() {
        let a = &annotations[ai];
        for &bi in &order[i + 1..] {
            let b = &annotations[bi];
            if removed[bi] || b.area >= a.area || b.area == 0 {
                continue;
            }
            let inter = a.segmentation.intersection_count(&b.segmentation);
            if inter as f64 / b.area as f64 > CONTAINMENT_THRESHOLD {
                removed[bi] = true;
            }
        }
    }

    let mut kept = Vec::with_capacity(annotations.len());
    let mut removed_ids = BTreeSet::new();
    for (annotation, &gone) in annotations.iter().zip(&removed) {
        if gone {
            removed_ids.insert(annotation.id);
        } else {
            kept.push(annotation.clone());
        }
    }

    debug!(
        "Overlap filter kept {} of {} masks",
        kept.len(),
        annotations.len()
    );
    (kept, removed_ids)
}
