//! Point prompt: union of masks under foreground points minus masks under
//! background points

use crate::utils::GridScale;
use segprompt_core::{Annotation, Error, LabeledPoint, Mask, PointLabel, Result};
use tracing::debug;

/// Maps image-space points onto integer cells of the mask grid.
fn grid_points(
    points: &[LabeledPoint],
    grid: (u32, u32),
    image: (u32, u32),
) -> Result<Vec<(u32, u32, PointLabel)>> {
    let scale = GridScale::new(grid, image);
    points
        .iter()
        .map(|p| {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(Error::InvalidPoint(format!(
                    "point ({}, {}) is not finite",
                    p.x, p.y
                )));
            }
            let x = scale.x(p.x).trunc();
            let y = scale.y(p.y).trunc();
            if x < 0.0 || y < 0.0 || x >= grid.0 as f32 || y >= grid.1 as f32 {
                return Err(Error::InvalidPoint(format!(
                    "point ({}, {}) falls outside the {}x{} mask grid",
                    p.x, p.y, grid.0, grid.1
                )));
            }
            Ok((x as u32, y as u32, p.label))
        })
        .collect()
}

/// Builds one mask from labeled points.
///
/// Every annotation containing a foreground point is added to an integer
/// accumulator, every annotation containing a background point is
/// subtracted; the result is `accumulator >= 1`. All masks hit by a point
/// contribute, not only the best one.
pub fn compose_from_points(
    annotations: &[Annotation],
    image: (u32, u32),
    points: &[LabeledPoint],
) -> Result<Vec<Mask>> {
    let first = annotations
        .first()
        .ok_or_else(|| Error::EmptyResult("no masks to compose points against".to_string()))?;
    let (width, height) = first.segmentation.dimensions();
    let cells = grid_points(points, (width, height), image)?;

    let mut accumulator = vec![0i32; width as usize * height as usize];
    for annotation in annotations {
        let mask = &annotation.segmentation;
        for &(x, y, label) in &cells {
            if !mask.get(x, y) {
                continue;
            }
            let delta = match label {
                PointLabel::Foreground => 1,
                PointLabel::Background => -1,
            };
            for (acc, &on) in accumulator.iter_mut().zip(mask.data()) {
                if on {
                    *acc += delta;
                }
            }
        }
    }

    let composed = Mask::from_vec(width, height, accumulator.iter().map(|&v| v >= 1).collect())?;
    debug!(
        "Point prompt with {} points selected {} pixels",
        points.len(),
        composed.count()
    );
    Ok(vec![composed])
}
