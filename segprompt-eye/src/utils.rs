//! Coordinate and vector helpers shared by the prompt pipelines

/// Maps image-space coordinates onto the mask grid.
///
/// When the grid and the image have the same size the mapping is the
/// identity; otherwise each axis is scaled linearly and truncated, matching
/// how the segmentation model downsampled the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GridScale {
    grid: (u32, u32),
    image: (u32, u32),
}

impl GridScale {
    pub(crate) fn new(grid: (u32, u32), image: (u32, u32)) -> Self {
        Self { grid, image }
    }

    pub(crate) fn is_identity(&self) -> bool {
        self.grid == self.image
    }

    pub(crate) fn x(&self, v: f32) -> f32 {
        if self.is_identity() || self.image.0 == 0 {
            v
        } else {
            (v * self.grid.0 as f32 / self.image.0 as f32).trunc()
        }
    }

    pub(crate) fn y(&self, v: f32) -> f32 {
        if self.is_identity() || self.image.1 == 0 {
            v
        } else {
            (v * self.grid.1 as f32 / self.image.1 as f32).trunc()
        }
    }
}

/// L2-normalize a vector in place.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Numerically stable softmax.
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
