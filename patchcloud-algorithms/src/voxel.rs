use patchcloud_core::nalgebra::Vector3;
use patchcloud_core::{
    containers::PointCloud,
    math::{Hexahedron, NormalComparison, Point, DEFAULT_GAP},
};

/// Scales the standard deviation of normal divergence to the normal similarity threshold of a voxel
const NORMAL_DEVIATION_FACTOR: f64 = 0.65;

/// A box-shaped cell owning the points that fall inside of it, together with their running mean position
#[derive(Debug, Clone)]
pub struct Voxel {
    shape: Hexahedron,
    cloud: PointCloud,
    mean: Option<Vector3<f64>>,
}

impl Voxel {
    /// Creates an empty voxel with the given shape
    pub fn new(shape: Hexahedron) -> Self {
        Self {
            shape,
            cloud: PointCloud::new(),
            mean: None,
        }
    }

    /// Creates an empty cubic voxel of the given side length around `center`
    pub fn cube(center: &Vector3<f64>, side: f64) -> Self {
        Self::new(Hexahedron::from_center_size(center, side, side, side))
    }

    pub fn shape(&self) -> &Hexahedron {
        &self.shape
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn into_cloud(self) -> PointCloud {
        self.cloud
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    /// Running mean of the positions of all points in this voxel
    pub fn mean(&self) -> Option<Vector3<f64>> {
        self.mean
    }

    /// Adds `point` to this voxel if it lies inside of the voxel. Returns `false` if the point is outside, in
    /// which case the voxel is not changed. Adding a point that the voxel owns already is accepted and ignored
    /// ```
    /// # use patchcloud_algorithms::voxel::Voxel;
    /// # use patchcloud_core::math::Point;
    /// # use patchcloud_core::nalgebra::Vector3;
    /// let mut voxel = Voxel::cube(&Vector3::new(0.0, 0.0, 0.0), 2.0);
    /// assert!(voxel.add(Point::new(0.5, -0.5, 1.0)));
    /// assert!(!voxel.add(Point::new(0.5, -0.5, 1.5)));
    /// assert_eq!(1, voxel.len());
    /// ```
    pub fn add(&mut self, point: Point) -> bool {
        if !self.shape.contains(&point.position, DEFAULT_GAP) {
            return false;
        }
        self.insert(point);
        true
    }

    fn insert(&mut self, point: Point) {
        let position = point.position;
        if self.cloud.add(point) {
            let count = self.cloud.len() as f64;
            self.mean = Some(match self.mean {
                Some(mean) => mean + (position - mean) / count,
                None => position,
            });
        }
    }

    /// Splits this voxel into up to 8 child voxels, one per corner, and moves every point into the first child
    /// that contains it. Empty children are dropped.
    ///
    /// # Panics
    ///
    /// If a point fits into none of the children, or if no child receives a point. Both indicate a broken
    /// containment test
    pub fn split(self) -> Vec<Voxel> {
        let mut children = self
            .shape
            .split()
            .iter()
            .map(|shape| Voxel::new(*shape))
            .collect::<Vec<_>>();
        for point in self.cloud.into_points() {
            match children
                .iter_mut()
                .find(|child| child.shape.contains(&point.position, DEFAULT_GAP))
            {
                Some(child) => child.insert(point),
                None => panic!(
                    "Voxel::split: Point {:?} fits into none of the child voxels of {:?}",
                    point.position, self.shape
                ),
            }
        }
        children.retain(|child| !child.is_empty());
        if children.is_empty() {
            panic!(
                "Voxel::split: Splitting voxel {:?} produced no children",
                self.shape
            );
        }
        children
    }

    /// Typical spacing between neighbouring points if the points were spread evenly over the voxel:
    /// twice the edge length of the cube that each point would occupy. Returns `None` for an empty voxel
    pub fn optimal_point_space(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some((self.shape.volume() / self.len() as f64).cbrt() * 2.0)
    }

    /// Normal similarity threshold estimated from the spread of normals in this voxel: a fixed fraction of the
    /// standard deviation of the distances between each normal and the mean normal. Returns `None` if no point
    /// has a normal
    pub fn optimal_normal_threshold(&self, comparison: NormalComparison) -> Option<f64> {
        let mean = self.cloud.mean_normal(comparison)?;
        let distances = self
            .cloud
            .iter()
            .filter_map(|point| point.normal.as_ref())
            .map(|normal| (comparison.apply(normal) - mean).norm())
            .collect::<Vec<_>>();
        let count = distances.len() as f64;
        let average = distances.iter().sum::<f64>() / count;
        let variance = distances
            .iter()
            .map(|d| (d - average) * (d - average))
            .sum::<f64>()
            / count;
        Some(variance.sqrt() * NORMAL_DEVIATION_FACTOR)
    }
}

/// A collection of voxels, typically the leaves of an [Octree](crate::octree::Octree)
#[derive(Debug, Clone, Default)]
pub struct Voxels {
    voxels: Vec<Voxel>,
}

impl Voxels {
    pub fn new(voxels: Vec<Voxel>) -> Self {
        Self { voxels }
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Voxel> {
        self.voxels.iter()
    }

    pub fn as_slice(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Total number of points over all voxels
    pub fn point_count(&self) -> usize {
        self.voxels.iter().map(Voxel::len).sum()
    }

    /// Removes all voxels that hold fewer than 2 points and returns the points they held
    pub fn remove_alone(&mut self) -> Vec<Point> {
        let (alone, kept): (Vec<Voxel>, Vec<Voxel>) = std::mem::take(&mut self.voxels)
            .into_iter()
            .partition(|voxel| voxel.len() < 2);
        self.voxels = kept;
        alone
            .into_iter()
            .flat_map(|voxel| voxel.into_cloud().into_points())
            .collect()
    }
}

impl IntoIterator for Voxels {
    type Item = Voxel;
    type IntoIter = std::vec::IntoIter<Voxel>;

    fn into_iter(self) -> Self::IntoIter {
        self.voxels.into_iter()
    }
}

impl<'a> IntoIterator for &'a Voxels {
    type Item = &'a Voxel;
    type IntoIter = std::slice::Iter<'a, Voxel>;

    fn into_iter(self) -> Self::IntoIter {
        self.voxels.iter()
    }
}

impl std::iter::FromIterator<Voxel> for Voxels {
    fn from_iter<T: IntoIterator<Item = Voxel>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_voxel(count: usize, seed: u64) -> Voxel {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut voxel = Voxel::cube(&Vector3::new(1.0, 2.0, 3.0), 4.0);
        for _ in 0..count {
            let point = Point::new(
                rng.gen_range(-1.0..3.0),
                rng.gen_range(0.0..4.0),
                rng.gen_range(1.0..5.0),
            );
            assert!(voxel.add(point));
        }
        voxel
    }

    #[test]
    fn test_running_mean() {
        let mut voxel = Voxel::cube(&Vector3::zeros(), 10.0);
        assert!(voxel.mean().is_none());
        voxel.add(Point::new(1.0, 0.0, 0.0));
        voxel.add(Point::new(3.0, 2.0, 0.0));
        voxel.add(Point::new(3.0, 2.0, 0.0));
        voxel.add(Point::new(-1.0, 1.0, 3.0));
        let mean = voxel.mean().unwrap();
        assert_approx_eq!(1.0, mean.x, 1e-12);
        assert_approx_eq!(1.0, mean.y, 1e-12);
        assert_approx_eq!(1.0, mean.z, 1e-12);
    }

    #[test]
    fn test_split_conserves_points() {
        let voxel = random_voxel(500, 1);
        let count = voxel.len();
        let children = voxel.split();
        assert!(children.len() <= 8);
        assert_eq!(count, children.iter().map(Voxel::len).sum::<usize>());
        for (idx, child) in children.iter().enumerate() {
            for point in child.cloud().iter() {
                assert!(child.shape().contains(&point.position, DEFAULT_GAP));
                for other in children[idx + 1..].iter() {
                    assert!(!other.cloud().contains(point));
                }
            }
        }
    }

    #[test]
    fn test_split_drops_empty_children() {
        let mut voxel = Voxel::cube(&Vector3::zeros(), 2.0);
        voxel.add(Point::new(0.5, 0.5, 0.5));
        voxel.add(Point::new(0.6, 0.4, 0.7));
        let children = voxel.split();
        assert_eq!(1, children.len());
        assert_eq!(2, children[0].len());
    }

    #[test]
    fn test_optimal_point_space() {
        let mut voxel = Voxel::cube(&Vector3::zeros(), 1.0);
        for x in [-0.25, 0.25].iter() {
            for y in [-0.25, 0.25].iter() {
                for z in [-0.25, 0.25].iter() {
                    voxel.add(Point::new(*x, *y, *z));
                }
            }
        }
        assert_approx_eq!(1.0, voxel.optimal_point_space().unwrap(), 1e-9);
        assert!(Voxel::cube(&Vector3::zeros(), 1.0)
            .optimal_point_space()
            .is_none());
    }

    #[test]
    fn test_optimal_normal_threshold() {
        let mut voxel = Voxel::cube(&Vector3::zeros(), 10.0);
        assert!(voxel
            .optimal_normal_threshold(NormalComparison::Unsigned)
            .is_none());
        voxel.add(Point::new(0.0, 0.0, 0.0).with_normal(Vector3::new(0.0, 0.0, 1.0)));
        voxel.add(Point::new(1.0, 0.0, 0.0).with_normal(Vector3::new(0.0, 0.0, -1.0)));
        assert_approx_eq!(
            0.0,
            voxel
                .optimal_normal_threshold(NormalComparison::Unsigned)
                .unwrap(),
            1e-12
        );

        voxel.add(Point::new(2.0, 0.0, 0.0).with_normal(Vector3::new(1.0, 0.0, 0.0)));
        assert!(
            voxel
                .optimal_normal_threshold(NormalComparison::Unsigned)
                .unwrap()
                > 0.0
        );
    }

    #[test]
    fn test_remove_alone() {
        let mut voxels = Voxels::new(vec![random_voxel(1, 2), random_voxel(5, 3), Voxel::cube(&Vector3::zeros(), 1.0)]);
        let alone = voxels.remove_alone();
        assert_eq!(1, alone.len());
        assert_eq!(1, voxels.len());
        assert_eq!(5, voxels.point_count());
    }
}
