use nalgebra::{Rotation2, Vector2};

/// Coordinates are scaled by this factor and rounded to integers before the hull is computed, so that the
/// orientation tests are exact
pub const HULL_SCALE: f64 = 1000.0;

/// Rectangle in the XY plane, given as a loop of four corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub corners: [Vector2<f64>; 4],
    /// Rotation of the first edge against the X axis, in radians
    pub angle: f64,
}

impl Rectangle {
    /// Length of the edge from corner 0 to corner 1
    pub fn width(&self) -> f64 {
        (self.corners[1] - self.corners[0]).norm()
    }

    /// Length of the edge from corner 1 to corner 2
    pub fn height(&self) -> f64 {
        (self.corners[2] - self.corners[1]).norm()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// Computes the convex hull of the given 2D points with the monotone chain algorithm. The points are
/// quantized to multiples of `1 / HULL_SCALE` first. The hull is returned in counter-clockwise order without
/// collinear points; fewer than three distinct points are returned as they are
/// ```
/// # use patchcloud_core::math::convex_hull_2d;
/// # use nalgebra::Vector2;
/// let points = vec![
///     Vector2::new(0.0, 0.0),
///     Vector2::new(1.0, 0.0),
///     Vector2::new(0.5, 0.5),
///     Vector2::new(1.0, 1.0),
///     Vector2::new(0.0, 1.0),
///     Vector2::new(0.5, 0.0),
/// ];
/// let hull = convex_hull_2d(&points);
/// assert_eq!(4, hull.len());
/// assert!(!hull.contains(&Vector2::new(0.5, 0.5)));
/// ```
pub fn convex_hull_2d(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut scaled = points
        .iter()
        .map(|p| {
            (
                (p.x * HULL_SCALE).round() as i64,
                (p.y * HULL_SCALE).round() as i64,
            )
        })
        .collect::<Vec<_>>();
    scaled.sort_unstable();
    scaled.dedup();

    let unscale = |p: &(i64, i64)| Vector2::new(p.0 as f64 / HULL_SCALE, p.1 as f64 / HULL_SCALE);
    if scaled.len() < 3 {
        return scaled.iter().map(unscale).collect();
    }

    let mut lower: Vec<(i64, i64)> = Vec::with_capacity(scaled.len());
    for p in scaled.iter() {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<(i64, i64)> = Vec::with_capacity(scaled.len());
    for p in scaled.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.iter().chain(upper.iter()).map(unscale).collect()
}

/// z component of `(a - o) x (b - o)`, positive for a counter-clockwise turn
fn cross(o: &(i64, i64), a: &(i64, i64), b: &(i64, i64)) -> i128 {
    let (ax, ay) = ((a.0 - o.0) as i128, (a.1 - o.1) as i128);
    let (bx, by) = ((b.0 - o.0) as i128, (b.1 - o.1) as i128);
    ax * by - ay * bx
}

/// Finds the rectangle of minimal area enclosing the given convex hull with the rotating calipers method:
/// for every hull edge, the hull is rotated so that the edge is parallel to the X axis and its axis-aligned
/// bounds are measured. Returns `None` for an empty hull
pub fn min_area_rectangle(hull: &[Vector2<f64>]) -> Option<Rectangle> {
    let first = hull.first()?;
    if hull.len() == 1 {
        return Some(Rectangle {
            corners: [*first; 4],
            angle: 0.0,
        });
    }

    let mut best: Option<(f64, Rectangle)> = None;
    for (idx, origin) in hull.iter().enumerate() {
        let edge = hull[(idx + 1) % hull.len()] - origin;
        if edge.norm() == 0.0 {
            continue;
        }
        let angle = edge.y.atan2(edge.x);
        let to_edge_frame = Rotation2::new(-angle);

        let (mut min, mut max) = (
            Vector2::repeat(f64::INFINITY),
            Vector2::repeat(f64::NEG_INFINITY),
        );
        for p in hull.iter() {
            let local = to_edge_frame * (p - origin);
            min = min.inf(&local);
            max = max.sup(&local);
        }
        let area = (max.x - min.x) * (max.y - min.y);
        if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
            let to_world = Rotation2::new(angle);
            let corner = |x: f64, y: f64| to_world * Vector2::new(x, y) + origin;
            let rectangle = Rectangle {
                corners: [
                    corner(min.x, min.y),
                    corner(max.x, min.y),
                    corner(max.x, max.y),
                    corner(min.x, max.y),
                ],
                angle,
            };
            best = Some((area, rectangle));
        }
    }
    best.map(|(_, rectangle)| rectangle)
}

/// Minimal area rectangle around the convex hull of `points`
pub fn min_area_bounding_rectangle(points: &[Vector2<f64>]) -> Option<Rectangle> {
    min_area_rectangle(&convex_hull_2d(points))
}
