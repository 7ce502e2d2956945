//! Prompt processing pipelines

pub mod format;
pub mod overlap;
pub mod crop;
pub mod box_select;
pub mod point_compose;
pub mod retrieval;

pub use format::format_results;
pub use overlap::filter_masks;
pub use crop::{bbox_from_mask, crop_image, segment_image, CropSet, FilteredIds};
pub use box_select::{mask_ious, select_by_box};
pub use point_compose::compose_from_points;
pub use retrieval::{match_text, rank_regions, retrieve_by_text, TextMatch};
