#![warn(clippy::all)]

//! Core data structures for patch based point cloud segmentation
//!
//! This crate provides the [Point](crate::math::Point) type and its hash key, the box geometry used for octree
//! partitioning and patch distances ([Hexahedron](crate::math::Hexahedron),
//! [OrientedBoundingBox](crate::math::OrientedBoundingBox)), and the containers that hold points and
//! classified patches ([PointCloud](crate::containers::PointCloud), [PatchCloud](crate::containers::PatchCloud)).

pub extern crate nalgebra;

/// Point and patch containers
pub mod containers;
/// Points, colors and box geometry
pub mod math;
