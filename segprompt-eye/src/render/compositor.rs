//! Z-ordered compositing of boolean masks into one RGBA layer
//!
//! Smaller masks are drawn on top of larger ones. Every pixel takes the
//! color of the first mask covering it when masks are scanned by ascending
//! area; pixels no mask covers stay fully transparent.

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use segprompt_core::{Device, Mask};
use tracing::debug;

/// Fill color used when random colors are off.
pub const DEFAULT_MASK_RGB: [u8; 3] = [30, 144, 255];

/// Overlay opacity, 0.6 of full scale.
pub const MASK_ALPHA: u8 = 153;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// One mask with the color it is painted in.
#[derive(Debug, Clone, Copy)]
pub struct MaskLayer<'a> {
    pub mask: &'a Mask,
    pub color: Rgba<u8>,
}

/// Per-mask colors, drawn once per input mask so every backend paints the
/// same mask with the same color.
pub fn layer_colors(count: usize, random: bool, seed: Option<u64>) -> Vec<Rgba<u8>> {
    if !random {
        let [r, g, b] = DEFAULT_MASK_RGB;
        return vec![Rgba([r, g, b, MASK_ALPHA]); count];
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..count)
        .map(|_| {
            let [r, g, b]: [u8; 3] = rng.gen();
            Rgba([r, g, b, MASK_ALPHA])
        })
        .collect()
}

/// Layers sorted by ascending mask area; equal areas keep their input order.
pub fn z_order<'a>(layers: &[MaskLayer<'a>]) -> Vec<MaskLayer<'a>> {
    let mut ordered = layers.to_vec();
    ordered.sort_by_cached_key(|layer| layer.mask.count());
    ordered
}

#[inline]
fn winner(ordered: &[MaskLayer<'_>], index: usize) -> Rgba<u8> {
    ordered
        .iter()
        .find(|layer| layer.mask.data()[index])
        .map(|layer| layer.color)
        .unwrap_or(TRANSPARENT)
}

/// Backend that paints z-ordered layers into a buffer.
///
/// Implementations differ only in how they schedule the per-pixel scan;
/// they must produce identical images.
pub trait Compositor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Paint `ordered` (smallest first) into `canvas`, which has the masks' size.
    fn paint(&self, ordered: &[MaskLayer<'_>], canvas: &mut RgbaImage);

    /// Composite `layers` in any order into a `width × height` image.
    fn composite(&self, layers: &[MaskLayer<'_>], width: u32, height: u32) -> RgbaImage {
        let ordered = z_order(layers);
        let mut canvas = RgbaImage::new(width, height);
        if !ordered.is_empty() {
            self.paint(&ordered, &mut canvas);
        }
        debug!("{} compositor painted {} layers", self.name(), ordered.len());
        canvas
    }
}

/// Sequential pixel scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuCompositor;

impl Compositor for CpuCompositor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn paint(&self, ordered: &[MaskLayer<'_>], canvas: &mut RgbaImage) {
        for (index, pixel) in canvas.pixels_mut().enumerate() {
            *pixel = winner(ordered, index);
        }
    }
}

/// Row-parallel pixel scan on the rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelCompositor;

impl Compositor for ParallelCompositor {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    fn paint(&self, ordered: &[MaskLayer<'_>], canvas: &mut RgbaImage) {
        let width = canvas.width() as usize;
        if width == 0 {
            return;
        }
        let buffer: &mut [u8] = canvas;
        buffer
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    px.copy_from_slice(&winner(ordered, y * width + x).0);
                }
            });
    }
}

/// The compositor for a session's device.
pub fn compositor_for(device: Device) -> Box<dyn Compositor> {
    match device {
        Device::Cpu => Box::new(CpuCompositor),
        Device::Accelerator => Box::new(ParallelCompositor),
    }
}
