use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};
use float_ord::FloatOrd;
use nalgebra::Vector3;

use super::Color;

/// Coordinate tolerance under which two points are considered to be the same point. This is also the
/// quantization step used for [PointKey]
pub const ACCURACY: f64 = 1e-4;

/// Quantized coordinates of a [Point]. Coordinates are rounded to multiples of [ACCURACY], so points that
/// are equal up to the quantization step share the same key. This is the de-duplication key of a
/// [PointCloud](crate::containers::PointCloud) and the identifier of patches.
///
/// The string form is `x_y_z` with each component given in multiples of [ACCURACY]:
/// ```
/// # use patchcloud_core::math::{Point, PointKey};
/// let key = Point::new(1.0, -0.5, 0.00004).key();
/// assert_eq!(key.to_string(), "10000_-5000_0");
/// assert_eq!("10000_-5000_0".parse::<PointKey>().unwrap(), key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointKey {
    x: i64,
    y: i64,
    z: i64,
}

impl PointKey {
    /// Computes the key of the given position
    pub fn from_position(position: &Vector3<f64>) -> Self {
        Self {
            x: quantize(position.x),
            y: quantize(position.y),
            z: quantize(position.z),
        }
    }

    /// Returns the position that this key represents, i.e. the quantized coordinates
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(
            self.x as f64 * ACCURACY,
            self.y as f64 * ACCURACY,
            self.z as f64 * ACCURACY,
        )
    }
}

fn quantize(value: f64) -> i64 {
    (value / ACCURACY).round() as i64
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.x, self.y, self.z)
    }
}

impl FromStr for PointKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut components = s.trim().split('_');
        let mut next = |name: &str| -> Result<i64> {
            let component = components
                .next()
                .ok_or_else(|| anyhow!("Point key {} has no {} component", s, name))?;
            component
                .parse::<i64>()
                .with_context(|| format!("Invalid {} component in point key {}", name, s))
        };
        let key = Self {
            x: next("x")?,
            y: next("y")?,
            z: next("z")?,
        };
        if components.next().is_some() {
            return Err(anyhow!("Point key {} has more than three components", s));
        }
        Ok(key)
    }
}

/// How surface normals are compared during segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NormalComparison {
    /// Compare the absolute values of the normal components. Opposite facing normals are identical
    /// under this comparison
    Unsigned,
    /// Compare the normals as they are
    Signed,
}

impl NormalComparison {
    /// Brings the given normal into the form in which it is compared
    pub fn apply(&self, normal: &Vector3<f64>) -> Vector3<f64> {
        match self {
            NormalComparison::Unsigned => normal.abs(),
            NormalComparison::Signed => *normal,
        }
    }
}

impl Default for NormalComparison {
    fn default() -> Self {
        NormalComparison::Unsigned
    }
}

/// A single 3D point with optional color and optional surface normal.
///
/// Two points are equal if all their coordinates differ by at most [ACCURACY]. Color and normal do
/// not take part in the comparison.
/// ```
/// # use patchcloud_core::math::Point;
/// assert_eq!(Point::new(1.0, 2.0, 3.0), Point::new(1.00005, 2.0, 2.99995));
/// assert_ne!(Point::new(1.0, 2.0, 3.0), Point::new(1.001, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub position: Vector3<f64>,
    pub color: Option<Color>,
    pub normal: Option<Vector3<f64>>,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::from_position(Vector3::new(x, y, z))
    }

    pub fn from_position(position: Vector3<f64>) -> Self {
        Self {
            position,
            color: None,
            normal: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_normal(mut self, normal: Vector3<f64>) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }

    /// Returns the hash key of this point
    pub fn key(&self) -> PointKey {
        PointKey::from_position(&self.position)
    }

    /// Euclidean distance between the positions of this point and `other`
    pub fn distance(&self, other: &Point) -> f64 {
        (self.position - other.position).norm()
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        (self.position.x - other.position.x).abs() <= ACCURACY
            && (self.position.y - other.position.y).abs() <= ACCURACY
            && (self.position.z - other.position.z).abs() <= ACCURACY
    }
}

impl From<Vector3<f64>> for Point {
    fn from(position: Vector3<f64>) -> Self {
        Self::from_position(position)
    }
}

/// Lexicographic order of two positions by X, then Y, then Z
pub fn cmp_xyz(a: &Vector3<f64>, b: &Vector3<f64>) -> Ordering {
    FloatOrd(a.x)
        .cmp(&FloatOrd(b.x))
        .then(FloatOrd(a.y).cmp(&FloatOrd(b.y)))
        .then(FloatOrd(a.z).cmp(&FloatOrd(b.z)))
}

/// Lexicographic order of two positions by Z, then X, then Y
pub fn cmp_zxy(a: &Vector3<f64>, b: &Vector3<f64>) -> Ordering {
    FloatOrd(a.z)
        .cmp(&FloatOrd(b.z))
        .then(FloatOrd(a.x).cmp(&FloatOrd(b.x)))
        .then(FloatOrd(a.y).cmp(&FloatOrd(b.y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_point_equality_uses_accuracy() {
        let p = Point::new(0.25, 0.5, 0.75);
        assert_eq!(p, Point::new(0.25 + 0.9 * ACCURACY, 0.5, 0.75 - 0.9 * ACCURACY));
        assert_ne!(p, Point::new(0.25 + 2.0 * ACCURACY, 0.5, 0.75));
        assert_ne!(p, Point::new(0.25, 0.5, 0.75 + 1.5 * ACCURACY));
    }

    #[test]
    fn test_equal_points_share_key() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            // Stay away from the rounding boundaries so that equality and quantization agree
            let base = Vector3::new(
                rng.gen_range(-1000..1000) as f64 * ACCURACY * 10.0,
                rng.gen_range(-1000..1000) as f64 * ACCURACY * 10.0,
                rng.gen_range(-1000..1000) as f64 * ACCURACY * 10.0,
            );
            let jitter = Vector3::new(
                rng.gen_range(-0.4..0.4) * ACCURACY,
                rng.gen_range(-0.4..0.4) * ACCURACY,
                rng.gen_range(-0.4..0.4) * ACCURACY,
            );
            let p = Point::from_position(base);
            let q = Point::from_position(base + jitter);
            assert_eq!(p, q);
            assert_eq!(p.key(), q.key());
        }
    }

    #[test]
    fn test_key_roundtrip_through_string() {
        let key = Point::new(-12.3456, 0.0, 987.6543).key();
        let parsed: PointKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
        assert!("1_2".parse::<PointKey>().is_err());
        assert!("1_2_3_4".parse::<PointKey>().is_err());
        assert!("a_2_3".parse::<PointKey>().is_err());
    }

    #[test]
    fn test_orderings() {
        let a = Vector3::new(0.0, 1.0, 2.0);
        let b = Vector3::new(1.0, 0.0, 1.0);
        assert_eq!(Ordering::Less, cmp_xyz(&a, &b));
        assert_eq!(Ordering::Greater, cmp_zxy(&a, &b));
        assert_eq!(Ordering::Equal, cmp_xyz(&a, &a));
    }

    #[test]
    fn test_unsigned_normal_comparison() {
        let n = Vector3::new(-0.6, 0.8, 0.0);
        assert_eq!(
            Vector3::new(0.6, 0.8, 0.0),
            NormalComparison::Unsigned.apply(&n)
        );
        assert_eq!(n, NormalComparison::Signed.apply(&n));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_point_serde() {
        let point = Point::new(1.5, -2.0, 0.25)
            .with_color(Color::new(10, 20, 30))
            .with_normal(Vector3::new(0.0, 0.0, 1.0));
        let json = serde_json::to_string(&point).unwrap();
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(point, back);
        assert_eq!(point.color, back.color);
        assert_eq!(point.normal, back.normal);

        let key_json = serde_json::to_string(&point.key()).unwrap();
        let key: PointKey = serde_json::from_str(&key_json).unwrap();
        assert_eq!(point.key(), key);
    }
}
