//! segprompt-eye: prompt-driven mask selection for segprompt
//!
//! Turns the raw masks and boxes of an instance segmentation model into a
//! selected mask, driven by a query box, labeled points or a text query,
//! and renders masks as a z-ordered color overlay.
//!
//! Text queries rank cropped regions through a [`RegionEmbedder`]; the
//! ONNX CLIP implementation lives behind the `onnx` feature.

pub mod error;
pub mod models;
pub mod processing;
pub mod render;
pub mod session;
mod utils;

pub use error::VisionError;
pub use models::RegionEmbedder;
#[cfg(feature = "onnx")]
pub use models::ClipEmbedder;
pub use render::{Compositor, CpuCompositor, ParallelCompositor, Renderer};
pub use session::{PromptSession, SessionContext};
