use nalgebra::{Point3, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl AABB {
    /// Creates a new AABB from the given minimum and maximum coordinates. Panics if the minimum position is
    /// not less than or equal to the maximum position
    /// ```
    /// # use patchcloud_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("AABB::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Computes the tightest AABB around the given positions. Returns `None` if there are no positions
    /// ```
    /// # use patchcloud_core::math::AABB;
    /// # use nalgebra::{Point3, Vector3};
    /// let positions = vec![Vector3::new(1.0, -1.0, 0.0), Vector3::new(-1.0, 2.0, 0.5)];
    /// let bounds = AABB::from_positions(positions.iter()).unwrap();
    /// assert_eq!(Point3::new(-1.0, -1.0, 0.0), *bounds.min());
    /// assert_eq!(Point3::new(1.0, 2.0, 0.5), *bounds.max());
    /// assert!(AABB::from_positions(std::iter::empty::<&Vector3<f64>>()).is_none());
    /// ```
    pub fn from_positions<'a, I: IntoIterator<Item = &'a Vector3<f64>>>(positions: I) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first = Point3::from(*iter.next()?);
        let initial = Self {
            min: first,
            max: first,
        };
        Some(iter.fold(initial, |bounds, position| {
            bounds.extend_with_point(&Point3::from(*position))
        }))
    }

    /// Returns the minimum point of this AABB
    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    /// Returns the maximum point of this AABB
    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    /// Returns the extent of this AABB, i.e. the spans `(dx, dy, dz)` along the three axes
    /// ```
    /// # use patchcloud_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Returns the center point of this AABB
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns the largest of the three spans of this AABB
    pub fn largest_span(&self) -> f64 {
        self.extent().max()
    }

    /// Returns true if the given point is contained within this AABB. Points right on the boundary
    /// of this AABB (e.g. point.x == self.max.x or self.min.x) will return true as well.
    /// ```
    /// # use patchcloud_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert!(bounds.contains(&nalgebra::Point3::new(0.5, 0.5, 0.5)));
    /// assert!(!bounds.contains(&nalgebra::Point3::new(1.5, 0.5, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Computes the union of the given bounding boxes, i.e. the smallest AABB that fully contains both
    pub fn union(a: &AABB, b: &AABB) -> Self {
        Self {
            min: a.min.inf(&b.min),
            max: a.max.sup(&b.max),
        }
    }

    /// Returns a copy of this AABB that is extended so that it contains the given point
    pub fn extend_with_point(&self, point: &Point3<f64>) -> AABB {
        Self {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_extend() {
        let a = AABB::from_min_max(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = AABB::from_min_max(Point3::new(2.0, -1.0, 0.5), Point3::new(3.0, 0.0, 0.75));
        let union = AABB::union(&a, &b);
        assert_eq!(Point3::new(0.0, -1.0, 0.0), *union.min());
        assert_eq!(Point3::new(3.0, 1.0, 1.0), *union.max());

        let extended = a.extend_with_point(&Point3::new(-2.0, 0.5, 4.0));
        assert_eq!(Point3::new(-2.0, 0.0, 0.0), *extended.min());
        assert_eq!(Point3::new(1.0, 1.0, 4.0), *extended.max());
        assert_eq!(5.0, extended.largest_span());
        assert_eq!(Point3::new(-0.5, 0.5, 2.0), extended.center());
    }

    #[test]
    #[should_panic]
    fn test_from_min_max_rejects_inverted_bounds() {
        AABB::from_min_max(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
    }
}
