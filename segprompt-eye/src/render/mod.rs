//! Mask smoothing, compositing and overlay rendering

pub mod morphology;
pub mod compositor;
pub mod renderer;

pub use compositor::{
    compositor_for, layer_colors, z_order, Compositor, CpuCompositor, MaskLayer, ParallelCompositor,
};
pub use renderer::Renderer;
