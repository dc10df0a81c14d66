use log::debug;
use patchcloud_core::containers::{PointCloud, PointSource};
use rayon::prelude::*;

use crate::{
    region::{MergeCriterion, Regions},
    voxel::{Voxel, Voxels},
};

/// Region growing over all points of `source`: every point starts as its own region, then all regions that
/// are linked through `criterion` are merged into one region
///
/// ```
/// # use patchcloud_algorithms::{region::EuclideanCriterion, segmentation::segment};
/// # use patchcloud_core::math::Point;
/// let points = vec![
///     Point::new(0.0, 0.0, 0.0),
///     Point::new(0.5, 0.0, 0.0),
///     Point::new(5.0, 0.0, 0.0),
/// ];
/// let regions = segment(&points, EuclideanCriterion::new(1.0));
/// assert_eq!(2, regions.len());
/// ```
pub fn segment<S, C>(source: &S, criterion: C) -> Regions<C>
where
    S: PointSource + ?Sized,
    C: MergeCriterion,
{
    let regions = Regions::from_points(source, criterion).merges();
    debug!(
        "Segmented {} points into {} regions",
        source.len(),
        regions.len()
    );
    regions
}

/// Segments every voxel independently and in parallel. The criterion of a voxel is built from the voxel itself,
/// so that thresholds can adapt to the local point density. Voxels for which `make_criterion` returns `None`
/// are not segmented, each of their points ends up in a region of its own
pub fn segment_voxels<C, F>(voxels: Voxels, make_criterion: F) -> Vec<PointCloud>
where
    C: MergeCriterion,
    F: Fn(&Voxel) -> Option<C> + Sync,
{
    let voxel_count = voxels.len();
    let clouds = voxels
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|voxel| match make_criterion(&voxel) {
            Some(criterion) => segment(voxel.cloud(), criterion).into_clouds(),
            None => voxel
                .into_cloud()
                .into_iter()
                .map(|point| std::iter::once(point).collect::<PointCloud>())
                .collect(),
        })
        .collect::<Vec<_>>();
    debug!(
        "Segmented {} voxels into {} regions",
        voxel_count,
        clouds.len()
    );
    clouds
}
