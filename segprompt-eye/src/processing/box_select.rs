//! Box prompt: pick the raw mask with the best IoU against a query box

use crate::utils::{argmax, GridScale};
use segprompt_core::{BBox, Error, Mask, Result};
use tracing::debug;

/// Maps an image-space query box onto the `[x1, y1, x2, y2]` integer cell
/// range of a `grid` sized mask, clamped to the grid.
pub fn grid_box(query: BBox, grid: (u32, u32), image: (u32, u32)) -> Result<[u32; 4]> {
    if !query.is_valid() {
        return Err(Error::InvalidBox(format!(
            "query box {} must have positive width and height",
            query
        )));
    }

    let scale = GridScale::new(grid, image);
    let (w, h) = (grid.0 as f32, grid.1 as f32);
    let x1 = scale.x(query.x1).round().max(0.0);
    let y1 = scale.y(query.y1).round().max(0.0);
    let x2 = scale.x(query.x2).round().min(w);
    let y2 = scale.y(query.y2).round().min(h);

    if x2 <= x1 || y2 <= y1 {
        // the query itself was well formed, so the grid mapping collapsed it
        return Err(if scale.is_identity() {
            Error::InvalidBox(format!(
                "query box {} does not overlap the {}x{} mask grid",
                query, grid.0, grid.1
            ))
        } else {
            Error::ResolutionMismatch(format!(
                "query box {} collapses when scaled from {}x{} to {}x{}",
                query, image.0, image.1, grid.0, grid.1
            ))
        });
    }

    Ok([x1 as u32, y1 as u32, x2 as u32, y2 as u32])
}

/// IoU of every mask against the query box.
pub fn mask_ious(masks: &[Mask], image: (u32, u32), query: BBox) -> Result<Vec<f32>> {
    let first = masks
        .first()
        .ok_or_else(|| Error::EmptyResult("no masks to match the box against".to_string()))?;
    let [x1, y1, x2, y2] = grid_box(query, first.dimensions(), image)?;
    let box_area = (x2 - x1) as f64 * (y2 - y1) as f64;

    Ok(masks
        .iter()
        .map(|mask| {
            let inter = mask.count_in_rect(x1, y1, x2, y2) as f64;
            let union = box_area + mask.count() as f64 - inter;
            (inter / union) as f32
        })
        .collect())
}

/// The raw mask maximizing IoU with `query`, as a one-element stack.
/// Ties go to the first mask in stack order.
pub fn select_by_box(masks: &[Mask], image: (u32, u32), query: BBox) -> Result<Vec<Mask>> {
    let ious = mask_ious(masks, image, query)?;
    let best = argmax(&ious)
        .ok_or_else(|| Error::EmptyResult("no mask produced a finite IoU".to_string()))?;
    debug!("Box prompt {} selected mask {} (IoU {:.3})", query, best, ious[best]);
    Ok(vec![masks[best].clone()])
}
