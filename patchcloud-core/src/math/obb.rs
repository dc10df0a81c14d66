use nalgebra::{Matrix3, SymmetricEigen, Vector2, Vector3};

use super::{min_area_bounding_rectangle, Hexahedron, AABB};

/// Clouds with at most this many points get an axis-aligned box instead of an oriented one
pub const MIN_POINTS_FOR_OBB: usize = 4;

/// Oriented bounding box of a set of positions.
///
/// The box carries two descriptions of the same point set: the principal axes of the point distribution
/// together with the extents along these axes (`width >= height >= depth`), and the 8 corners of the
/// minimal-area rectangle around the XY projection, extruded over the Z range of the points. The corners are
/// what [distance](OrientedBoundingBox::distance) works on.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBoundingBox {
    centroid: Vector3<f64>,
    axes: Matrix3<f64>,
    extents: Vector3<f64>,
    shape: Hexahedron,
}

impl OrientedBoundingBox {
    /// Computes the oriented bounding box of the given positions. Returns `None` if `positions` is empty.
    ///
    /// For [MIN_POINTS_FOR_OBB] or fewer positions the box degenerates to the axis-aligned bounding box of
    /// the positions with the coordinate axes as principal axes
    /// ```
    /// # use patchcloud_core::math::OrientedBoundingBox;
    /// # use nalgebra::Vector3;
    /// let positions = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 1.0, 3.0)];
    /// let obb = OrientedBoundingBox::from_positions(&positions).unwrap();
    /// assert_eq!(Vector3::new(1.0, 0.5, 1.5), *obb.centroid());
    /// assert_eq!(6.0, obb.volume());
    /// assert!(OrientedBoundingBox::from_positions(&[]).is_none());
    /// ```
    pub fn from_positions(positions: &[Vector3<f64>]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let centroid = positions.iter().sum::<Vector3<f64>>() / positions.len() as f64;

        if positions.len() <= MIN_POINTS_FOR_OBB {
            let bounds = AABB::from_positions(positions.iter())?;
            return Some(Self {
                centroid,
                axes: Matrix3::identity(),
                extents: bounds.extent(),
                shape: Hexahedron::from_diagonal(&bounds.min().coords, &bounds.max().coords),
            });
        }

        let (axes, extents) = principal_axes(positions, &centroid);

        let projected = positions
            .iter()
            .map(|p| Vector2::new(p.x - centroid.x, p.y - centroid.y))
            .collect::<Vec<_>>();
        let rectangle = min_area_bounding_rectangle(&projected)?;
        let mut base = rectangle.corners;
        for corner in base.iter_mut() {
            *corner += centroid.xy();
        }
        let (z_min, z_max) = positions
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
                (min.min(p.z), max.max(p.z))
            });

        Some(Self {
            centroid,
            axes,
            extents,
            shape: Hexahedron::from_base(&base, z_min, z_max),
        })
    }

    pub fn centroid(&self) -> &Vector3<f64> {
        &self.centroid
    }

    /// Principal axes as the columns of a rotation matrix, sorted by decreasing variance
    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    /// Extent along the first principal axis
    pub fn width(&self) -> f64 {
        self.extents.x
    }

    /// Extent along the second principal axis
    pub fn height(&self) -> f64 {
        self.extents.y
    }

    /// Extent along the third principal axis
    pub fn depth(&self) -> f64 {
        self.extents.z
    }

    /// The 8 corners of the box
    pub fn shape(&self) -> &Hexahedron {
        &self.shape
    }

    /// Length of the first edge of the box in the XY plane
    pub fn dx(&self) -> f64 {
        (self.shape.corner(2) - self.shape.corner(0)).norm()
    }

    /// Length of the second edge of the box in the XY plane
    pub fn dy(&self) -> f64 {
        (self.shape.corner(1) - self.shape.corner(0)).norm()
    }

    /// Height of the box along Z
    pub fn dz(&self) -> f64 {
        (self.shape.corner(4) - self.shape.corner(0)).norm()
    }

    /// Area of the box footprint in the XY plane
    pub fn area(&self) -> f64 {
        self.dx() * self.dy()
    }

    pub fn volume(&self) -> f64 {
        self.area() * self.dz()
    }

    /// Minimum distance between this box and `other`, see [Hexahedron::distance]
    pub fn distance(&self, other: &OrientedBoundingBox) -> f64 {
        self.shape.distance(&other.shape)
    }
}

/// Eigen decomposition of the covariance matrix of `positions`. Returns the eigenvectors as columns sorted
/// by decreasing eigenvalue, and the extents of the positions along them
fn principal_axes(positions: &[Vector3<f64>], centroid: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let covariance = positions
        .iter()
        .map(|p| {
            let d = p - centroid;
            d * d.transpose()
        })
        .sum::<Matrix3<f64>>();
    let eigen = SymmetricEigen::new(covariance);

    let mut order = [0, 1, 2];
    order.sort_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]));
    let axes = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);

    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for p in positions.iter() {
        let local = axes.transpose() * (p - centroid);
        min = min.inf(&local);
        max = max.sup(&local);
    }
    (axes, max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Rotation3;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn diagonal_positions(values: &[f64]) -> Vec<Vector3<f64>> {
        values.iter().map(|v| Vector3::new(*v, *v, *v)).collect()
    }

    #[test]
    fn test_distance_between_diagonal_clusters() {
        let near = OrientedBoundingBox::from_positions(&diagonal_positions(&[0.0, 1.0, 0.5, 0.4, 0.2])).unwrap();
        let far = OrientedBoundingBox::from_positions(&diagonal_positions(&[10.0, 10.5, 10.4, 10.2])).unwrap();
        let spanning =
            OrientedBoundingBox::from_positions(&diagonal_positions(&[0.5, 0.4, 0.2, 10.0, 10.5])).unwrap();

        assert_approx_eq!(15.58, near.distance(&far), 0.01);
        assert_approx_eq!(0.0, spanning.distance(&far), 0.01);
        assert_approx_eq!(0.0, spanning.distance(&near), 0.01);
    }

    #[test]
    fn test_principal_axes_of_rotated_slab() {
        let rotation = Rotation3::from_euler_angles(0.2, -0.3, 0.5);
        let mut rng = StdRng::seed_from_u64(5);
        let positions = (0..2000)
            .map(|_| {
                let local = Vector3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-0.5..0.5),
                );
                rotation * local + Vector3::new(3.0, 4.0, 5.0)
            })
            .collect::<Vec<_>>();
        let obb = OrientedBoundingBox::from_positions(&positions).unwrap();

        assert!(obb.width() >= obb.height());
        assert!(obb.height() >= obb.depth());
        assert_approx_eq!(10.0, obb.width(), 0.3);
        assert_approx_eq!(4.0, obb.height(), 0.3);
        assert_approx_eq!(1.0, obb.depth(), 0.3);

        let first_axis = obb.axes().column(0).into_owned();
        let expected = rotation * Vector3::x();
        assert_approx_eq!(1.0, first_axis.dot(&expected).abs(), 0.01);
    }

    #[test]
    fn test_shape_encloses_positions() {
        let mut rng = StdRng::seed_from_u64(9);
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.6);
        let positions = (0..500)
            .map(|_| {
                rotation
                    * Vector3::new(
                        rng.gen_range(0.0..8.0),
                        rng.gen_range(0.0..3.0),
                        rng.gen_range(-1.0..1.0),
                    )
            })
            .collect::<Vec<_>>();
        let obb = OrientedBoundingBox::from_positions(&positions).unwrap();
        for p in positions.iter() {
            assert!(obb.shape().contains(p, 0.01));
        }
        assert!(obb.volume() <= 8.0 * 3.0 * 2.0 + 0.5);
        assert_approx_eq!(obb.centroid().z, (obb.shape().min().z + obb.shape().max().z) / 2.0, 0.2);
    }
}
