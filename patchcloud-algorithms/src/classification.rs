use log::{debug, info};
use patchcloud_core::{
    containers::{PatchCloud, PatchKind, PointCloud, PointSource},
    math::{NormalComparison, DEFAULT_COLOR_ACCURACY},
};

use crate::{
    octree::{raw_voxels, DEFAULT_MAX_DEPTH},
    region::{ColorCriterion, MergeCriterion, NormalCriterion},
    segmentation::segment_voxels,
    voxel::Voxel,
};

/// Parameters of the patch classification pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchParameters {
    /// Maximum number of points per octree leaf, and thereby per patch
    pub max_patch_size: usize,
    /// Regular patches need at least this fraction of `max_patch_size` points
    pub regular_fraction: f64,
    /// Minimum number of points of an irregular patch
    pub irregular_min_size: usize,
    /// Maximum distance between the mean normals of two regions that grow together. If `None`, the threshold
    /// is estimated per octree leaf from the spread of its normals
    pub normal_threshold: Option<f64>,
    pub normal_comparison: NormalComparison,
    /// Bucket size for the perceptual color comparison of irregular patches
    pub color_accuracy: u8,
    /// Maximum octree depth
    pub max_depth: usize,
}

impl PatchParameters {
    /// Minimum number of points of a regular patch
    pub fn regular_min_size(&self) -> usize {
        ((self.regular_fraction * self.max_patch_size as f64).ceil() as usize).max(1)
    }
}

impl Default for PatchParameters {
    fn default() -> Self {
        Self {
            max_patch_size: 5000,
            regular_fraction: 0.01,
            irregular_min_size: 10,
            normal_threshold: None,
            normal_comparison: NormalComparison::Unsigned,
            color_accuracy: DEFAULT_COLOR_ACCURACY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Buckets `source` into octree leaves, grows regions inside every leaf and registers all regions with at
/// least `min_size` points as patches of `kind`. Returns all points that did not end up in a patch
fn segment_pass<S, C, F>(
    source: &S,
    params: &PatchParameters,
    make_criterion: F,
    min_size: usize,
    kind: PatchKind,
    patches: &mut PatchCloud,
) -> PointCloud
where
    S: PointSource + ?Sized,
    C: MergeCriterion,
    F: Fn(&Voxel) -> Option<C> + Sync,
{
    let mut voxels = raw_voxels(source, params.max_patch_size, params.max_depth);
    let mut unknown = voxels.remove_alone().into_iter().collect::<PointCloud>();
    let mut created = 0;
    for region in segment_voxels(voxels, make_criterion) {
        if region.len() < min_size {
            unknown.append(region);
        } else {
            patches.add_classified(region, kind);
            created += 1;
        }
    }
    debug!(
        "{:?} pass: {} patches, {} points left",
        kind,
        created,
        unknown.len()
    );
    unknown
}

/// Splits all points of `source` into patches and classifies them:
///
/// 1. Regions grown by normal similarity with at least [regular_min_size](PatchParameters::regular_min_size)
///    points become regular patches
/// 2. The remaining points are grown by color similarity, regions with at least
///    [irregular_min_size](PatchParameters::irregular_min_size) points become irregular patches
/// 3. Everything left over is bucketed into octree leaves, every leaf becomes an isolated patch
///
/// Every point of `source` ends up in exactly one patch, points that share a [key](patchcloud_core::math::PointKey)
/// count as one point.
pub fn classify<S: PointSource + ?Sized>(source: &S, params: &PatchParameters) -> PatchCloud {
    let mut patches = PatchCloud::new();
    if source.is_empty() {
        return patches;
    }

    let unknown = segment_pass(
        source,
        params,
        |voxel| {
            let distance = voxel.optimal_point_space()?;
            let threshold = params
                .normal_threshold
                .or_else(|| voxel.optimal_normal_threshold(params.normal_comparison))?;
            Some(
                NormalCriterion::new(distance, threshold)
                    .with_comparison(params.normal_comparison),
            )
        },
        params.regular_min_size(),
        PatchKind::Regular,
        &mut patches,
    );
    let unknown = segment_pass(
        &unknown,
        params,
        |voxel| {
            voxel
                .optimal_point_space()
                .map(|distance| ColorCriterion::new(distance, params.color_accuracy))
        },
        params.irregular_min_size,
        PatchKind::Irregular,
        &mut patches,
    );
    for voxel in raw_voxels(&unknown, params.max_patch_size, params.max_depth) {
        patches.add_classified(voxel.into_cloud(), PatchKind::Isolated);
    }

    info!(
        "Classified {} points into {} regular, {} irregular and {} isolated patches",
        patches.point_count(),
        patches.regular().len(),
        patches.irregular().len(),
        patches.isolated().len()
    );
    patches
}

/// Recreates all patches of `patches` from the points they hold, see [classify]
pub fn refactor(patches: &mut PatchCloud, params: &PatchParameters) {
    let points = patches.take_points().into_iter().collect::<PointCloud>();
    *patches = classify(&points, params);
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchcloud_core::{
        math::{Color, Point},
        nalgebra::Vector3,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn small_params() -> PatchParameters {
        PatchParameters {
            max_patch_size: 200,
            regular_fraction: 0.1,
            irregular_min_size: 5,
            ..Default::default()
        }
    }

    fn assert_total(source: &PointCloud, patches: &PatchCloud) {
        patches.validate().unwrap();
        assert_eq!(source.len(), patches.point_count());
        let mut seen = HashSet::new();
        for (key, patch) in patches.iter() {
            assert!(patches.kind_of(key).is_some());
            for point in patch.iter() {
                assert!(seen.insert(point.key()));
                assert!(source.contains(point));
            }
        }
        assert_eq!(0, patches.unclassified().count());
    }

    #[test]
    fn test_default_parameters() {
        let params = PatchParameters::default();
        assert_eq!(5000, params.max_patch_size);
        assert_eq!(50, params.regular_min_size());
        assert_eq!(10, params.irregular_min_size);
        assert_eq!(69, params.color_accuracy);
        assert_eq!(NormalComparison::Unsigned, params.normal_comparison);
    }

    #[test]
    fn test_classify_empty() {
        let patches = classify(&PointCloud::new(), &PatchParameters::default());
        assert!(patches.is_empty());
    }

    #[test]
    fn test_flat_grid_becomes_regular() {
        let cloud = (0..400)
            .map(|i| {
                Point::new((i % 20) as f64 * 0.1, (i / 20) as f64 * 0.1, 0.0)
                    .with_normal(Vector3::z())
                    .with_color(Color::WHITE)
            })
            .collect::<PointCloud>();
        let params = PatchParameters {
            normal_threshold: Some(0.1),
            ..small_params()
        };
        let patches = classify(&cloud, &params);
        assert_total(&cloud, &patches);
        assert!(!patches.regular().is_empty());
    }

    #[test]
    fn test_points_without_normals_are_not_regular() {
        let mut rng = StdRng::seed_from_u64(3);
        let cloud = (0..300)
            .map(|_| {
                Point::new(
                    rng.gen_range(0.0..2.0),
                    rng.gen_range(0.0..2.0),
                    rng.gen_range(0.0..2.0),
                )
            })
            .collect::<PointCloud>();
        let patches = classify(&cloud, &small_params());
        assert_total(&cloud, &patches);
        assert!(patches.regular().is_empty());
    }

    #[test]
    fn test_random_cloud_is_classified_totally() {
        let mut rng = StdRng::seed_from_u64(11);
        let cloud = (0..1000)
            .map(|_| {
                let normal = Vector3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                );
                Point::new(
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-1.0..1.0),
                )
                .with_normal(normal)
                .with_color(Color::new(rng.gen(), rng.gen(), rng.gen()))
            })
            .collect::<PointCloud>();
        let patches = classify(&cloud, &small_params());
        assert_total(&cloud, &patches);
    }

    #[test]
    fn test_refactor_keeps_points() {
        let cloud = (0..150)
            .map(|i| Point::new(i as f64 * 0.05, (i % 7) as f64 * 0.05, 0.0))
            .collect::<PointCloud>();
        let mut patches = PatchCloud::new();
        patches.add_classified(cloud.clone(), PatchKind::Isolated);
        refactor(&mut patches, &small_params());
        assert_total(&cloud, &patches);
    }
}
