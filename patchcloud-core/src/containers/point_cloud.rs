use std::{collections::HashMap, iter::FromIterator, sync::OnceLock};

use nalgebra::Vector3;

use crate::math::{Color, NormalComparison, OrientedBoundingBox, Point, PointKey, AABB};

use super::PointSource;

/// Lazily computed properties of a [PointCloud]. Every property is computed at most once until the cache is
/// reset
#[derive(Debug, Clone, Default)]
struct PropertyCache {
    centroid: OnceLock<Option<Vector3<f64>>>,
    mean_normal: OnceLock<Option<Vector3<f64>>>,
    mean_unsigned_normal: OnceLock<Option<Vector3<f64>>>,
    mean_color: OnceLock<Option<Color>>,
    bounds: OnceLock<Option<AABB>>,
    obb: OnceLock<Option<OrientedBoundingBox>>,
}

/// A de-duplicating collection of [Point]s. Points are identified by their [PointKey], adding a point whose
/// key is already present is a no-op.
///
/// Derived geometric properties (centroid, mean normal, mean color, bounds, oriented bounding box) are computed
/// on first access and cached. All mutating operations invalidate the cache, [reset](PointCloud::reset) does
/// so explicitly.
/// ```
/// # use patchcloud_core::containers::PointCloud;
/// # use patchcloud_core::math::Point;
/// # use nalgebra::Vector3;
/// let mut cloud = PointCloud::new();
/// assert!(cloud.add(Point::new(0.0, 0.0, 0.0)));
/// assert!(cloud.add(Point::new(2.0, 0.0, 0.0)));
/// assert!(!cloud.add(Point::new(2.00001, 0.0, 0.0)));
/// assert_eq!(2, cloud.len());
/// assert_eq!(Some(Vector3::new(1.0, 0.0, 0.0)), cloud.centroid());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<Point>,
    index: HashMap<PointKey, usize>,
    cache: PropertyCache,
}

impl PointCloud {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            cache: Default::default(),
        }
    }

    /// Adds `point` to this cloud. Returns `false` if a point with the same key was already present, in which
    /// case the cloud is left unchanged
    pub fn add(&mut self, point: Point) -> bool {
        let key = point.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.points.len());
        self.points.push(point);
        self.reset();
        true
    }

    /// Removes the point with the given key and returns it
    pub fn remove(&mut self, key: &PointKey) -> Option<Point> {
        let position = self.index.remove(key)?;
        let removed = self.points.swap_remove(position);
        if let Some(moved) = self.points.get(position) {
            self.index.insert(moved.key(), position);
        }
        self.reset();
        Some(removed)
    }

    pub fn get(&self, key: &PointKey) -> Option<&Point> {
        self.index.get(key).map(|position| &self.points[*position])
    }

    /// Returns true if a point with the same key as `point` is part of this cloud
    pub fn contains(&self, point: &Point) -> bool {
        self.index.contains_key(&point.key())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Vector3<f64>> + '_ {
        self.points.iter().map(|point| &point.position)
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Moves all points of `other` into this cloud
    pub fn append(&mut self, other: PointCloud) {
        self.extend(other.into_points());
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.index.clear();
        self.reset();
    }

    /// Assigns `color` to every point of this cloud
    pub fn set_color(&mut self, color: Color) {
        for point in self.points.iter_mut() {
            point.color = Some(color);
        }
        self.reset();
    }

    /// Drops all cached properties so that they are recomputed on next access
    pub fn reset(&mut self) {
        self.cache = Default::default();
    }

    /// Mean position of all points, or `None` for an empty cloud
    pub fn centroid(&self) -> Option<Vector3<f64>> {
        *self.cache.centroid.get_or_init(|| {
            if self.is_empty() {
                return None;
            }
            Some(self.positions().sum::<Vector3<f64>>() / self.len() as f64)
        })
    }

    /// Mean of the normals of all points that have one, compared with the given [NormalComparison]. Returns
    /// `None` if no point has a normal
    pub fn mean_normal(&self, comparison: NormalComparison) -> Option<Vector3<f64>> {
        let slot = match comparison {
            NormalComparison::Signed => &self.cache.mean_normal,
            NormalComparison::Unsigned => &self.cache.mean_unsigned_normal,
        };
        *slot.get_or_init(|| {
            let (sum, count) = self
                .points
                .iter()
                .filter_map(|point| point.normal.as_ref())
                .fold((Vector3::zeros(), 0usize), |(sum, count), normal| {
                    (sum + comparison.apply(normal), count + 1)
                });
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        })
    }

    /// Channel-wise mean of the colors of all points that have one. Returns `None` if no point has a color
    pub fn mean_color(&self) -> Option<Color> {
        *self.cache.mean_color.get_or_init(|| {
            let (sum, count) = self
                .points
                .iter()
                .filter_map(|point| point.color)
                .fold(([0u64; 3], 0u64), |(sum, count), color| {
                    (
                        [
                            sum[0] + color.red as u64,
                            sum[1] + color.green as u64,
                            sum[2] + color.blue as u64,
                        ],
                        count + 1,
                    )
                });
            if count == 0 {
                return None;
            }
            let channel = |total: u64| ((total as f64 / count as f64).round()) as u8;
            Some(Color::new(channel(sum[0]), channel(sum[1]), channel(sum[2])))
        })
    }

    /// A point at the centroid carrying the mean color and the mean (signed) normal of this cloud
    pub fn mean_point(&self) -> Option<Point> {
        let centroid = self.centroid()?;
        Some(Point {
            position: centroid,
            color: self.mean_color(),
            normal: self.mean_normal(NormalComparison::Signed),
        })
    }

    /// Hash key of the mean point. This is the identifier of a patch
    pub fn key(&self) -> Option<PointKey> {
        self.centroid().map(|centroid| PointKey::from_position(&centroid))
    }

    /// Axis-aligned bounds of this cloud
    pub fn bounds(&self) -> Option<AABB> {
        *self
            .cache
            .bounds
            .get_or_init(|| AABB::from_positions(self.positions()))
    }

    /// Spans `(dx, dy, dz)` of the axis-aligned bounds
    pub fn spans(&self) -> Option<Vector3<f64>> {
        self.bounds().map(|bounds| bounds.extent())
    }

    /// Minimum and maximum Z coordinate
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.bounds()
            .map(|bounds| (bounds.min().z, bounds.max().z))
    }

    /// Oriented bounding box of this cloud, see [OrientedBoundingBox::from_positions]
    pub fn obb(&self) -> Option<&OrientedBoundingBox> {
        self.cache
            .obb
            .get_or_init(|| {
                let positions = self.positions().copied().collect::<Vec<_>>();
                OrientedBoundingBox::from_positions(&positions)
            })
            .as_ref()
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        let mut cloud = PointCloud::new();
        cloud.extend(iter);
        cloud
    }
}

impl Extend<Point> for PointCloud {
    fn extend<T: IntoIterator<Item = Point>>(&mut self, iter: T) {
        for point in iter {
            let key = point.key();
            if !self.index.contains_key(&key) {
                self.index.insert(key, self.points.len());
                self.points.push(point);
            }
        }
        self.reset();
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl IntoIterator for PointCloud {
    type Item = Point;
    type IntoIter = std::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl PointSource for PointCloud {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        Box::new(self.points.iter())
    }
}
