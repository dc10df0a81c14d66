#![warn(clippy::all)]
//! Algorithms that split point clouds into patches.
//!
//! Points are bucketed into the leaves of an [octree](octree::Octree), grown into [regions](region::Regions)
//! inside every leaf and classified into regular, irregular and isolated patches by the
//! [classification](classification) pipeline. The [distance](distance) module estimates minimum distances between
//! the resulting patches.

// Patch classification pipeline and its parameters.
pub mod classification;
// Minimum distances between patches, approximated by their oriented bounding boxes.
pub mod distance;
// Normal estimation from the k nearest neighbours of every point.
pub mod normal_estimation;
// Octree that splits a point cloud into voxels with a bounded number of points.
pub mod octree;
// Region growing with pluggable merge criteria.
pub mod region;
pub mod segmentation;
pub mod voxel;
