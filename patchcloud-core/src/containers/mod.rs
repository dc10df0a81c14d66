//! Containers for points and patches.
//!
//! [PointCloud] is the basic de-duplicating point container with lazily cached geometric properties,
//! [PatchCloud] is the patch manager that maps patch keys to patches and keeps the regular, irregular and
//! isolated classification. Anything implementing [PointSource] can be fed into the segmentation pipeline.

mod patch_cloud;
pub use self::patch_cloud::*;

mod point_cloud;
pub use self::point_cloud::*;

mod point_source;
pub use self::point_source::*;
