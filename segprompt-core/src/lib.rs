//! segprompt-core: data model shared by the segprompt crates
//!
//! Masks, boxes, prompt points, annotation records, the raw segmentation
//! results contract, the error taxonomy and session configuration.

pub mod types;
pub mod error;
pub mod config;

pub use error::{Error, Result};
pub use types::{Annotation, BBox, Detection, LabeledPoint, Mask, PointLabel, SegmentationResults};
pub use config::{Device, PromptConfig, RenderOptions};
