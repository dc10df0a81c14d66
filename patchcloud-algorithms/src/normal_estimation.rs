// The normal estimation follows the covariance analysis of the PCL library (https://pointclouds.org/)
use float_ord::FloatOrd;
use kd_tree::{KdPoint, KdTree};
use patchcloud_core::{
    containers::PointCloud,
    nalgebra::{Matrix3, Vector3},
};
use rayon::prelude::*;

/// Default number of neighbours used to estimate a normal
pub const DEFAULT_NEIGHBOURS: usize = 10;

/// Position of a point together with its index, for the kd-tree
#[derive(Debug, Clone, Copy)]
struct IndexedPosition {
    position: [f64; 3],
    index: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f64;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f64 {
        self.position[k]
    }
}

/// Surface normal and curvature of the plane through `positions`. The normal is the eigenvector of the smallest
/// eigenvalue of the covariance matrix, oriented towards positive Z. The curvature is the smallest eigenvalue
/// divided by the sum of all eigenvalues.
///
/// Returns `None` if fewer than 3 finite positions are given
///
/// ```
/// # use patchcloud_algorithms::normal_estimation::estimate_normal;
/// # use patchcloud_core::nalgebra::Vector3;
/// let positions = vec![
///     Vector3::new(1.0, 0.0, 0.0),
///     Vector3::new(0.0, 1.0, 0.0),
///     Vector3::new(1.0, 1.0, 0.0),
///     Vector3::new(-1.0, 0.0, 0.0),
/// ];
/// let (normal, curvature) = estimate_normal(&positions).unwrap();
/// assert!((normal - Vector3::z()).norm() < 1e-9);
/// assert!(curvature.abs() < 1e-9);
/// ```
pub fn estimate_normal(positions: &[Vector3<f64>]) -> Option<(Vector3<f64>, f64)> {
    let finite = positions
        .iter()
        .filter(|position| position.iter().all(|c| c.is_finite()))
        .collect::<Vec<_>>();
    if finite.len() < 3 {
        return None;
    }

    let centroid = finite.iter().copied().sum::<Vector3<f64>>() / finite.len() as f64;
    let covariance = finite
        .iter()
        .map(|position| {
            let diff = *position - centroid;
            diff * diff.transpose()
        })
        .fold(Matrix3::zeros(), |sum, m| sum + m);

    let eigen = covariance.symmetric_eigen();
    let smallest = (0..3).min_by_key(|i| FloatOrd(eigen.eigenvalues[*i]))?;
    let mut normal = eigen.eigenvectors.column(smallest).into_owned();
    let length = normal.norm();
    if length == 0.0 {
        return None;
    }
    normal /= length;
    if normal.z < 0.0 {
        normal = -normal;
    }

    let sum = eigen.eigenvalues.iter().map(|v| v.abs()).sum::<f64>();
    let curvature = if sum > 0.0 {
        eigen.eigenvalues[smallest].abs() / sum
    } else {
        0.0
    };
    Some((normal, curvature))
}

/// Estimates normal and curvature of every point of `cloud` from its `k_nn` nearest neighbours (including the point
/// itself). The result holds one entry per point in iteration order, `None` where no plane could be fitted
///
/// # Panics
///
/// If `k_nn` is less than 3
pub fn compute_normals(cloud: &PointCloud, k_nn: usize) -> Vec<Option<(Vector3<f64>, f64)>> {
    if k_nn < 3 {
        panic!("The k nearest neighbours attribute is too small!");
    }

    let points = cloud
        .iter()
        .enumerate()
        .map(|(index, point)| IndexedPosition {
            position: [point.x(), point.y(), point.z()],
            index,
        })
        .collect::<Vec<_>>();
    let tree = KdTree::build_by_ordered_float(points);
    let positions = cloud.positions().copied().collect::<Vec<_>>();

    positions
        .par_iter()
        .map(|position| {
            let query = [position.x, position.y, position.z];
            let neighbours = tree
                .nearests(&query, k_nn)
                .iter()
                .map(|found| positions[found.item.index])
                .collect::<Vec<_>>();
            estimate_normal(&neighbours)
        })
        .collect()
}

/// Returns `cloud` with an estimated normal for every point that has none. Points that already have a normal
/// keep it, points for which no normal can be estimated stay without one
///
/// # Panics
///
/// If `k_nn` is less than 3
pub fn with_estimated_normals(cloud: PointCloud, k_nn: usize) -> PointCloud {
    if cloud.iter().all(|point| point.normal.is_some()) {
        return cloud;
    }
    let normals = compute_normals(&cloud, k_nn);
    cloud
        .into_iter()
        .zip(normals)
        .map(|(point, estimated)| match (point.normal, estimated) {
            (None, Some((normal, _))) => point.with_normal(normal),
            _ => point,
        })
        .collect()
}
