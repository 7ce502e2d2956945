//! Embedding models for text-driven region retrieval

pub mod embedder;
#[cfg(feature = "onnx")]
pub mod clip;

pub use embedder::RegionEmbedder;
#[cfg(feature = "onnx")]
pub use clip::ClipEmbedder;
