use float_ord::FloatOrd;
use itertools::Itertools;
use nalgebra::{Vector2, Vector3};

use super::cmp_xyz;

/// Default tolerance of [Hexahedron::contains]
pub const DEFAULT_GAP: f64 = 1e-4;

/// Determinant below which two segments are treated as parallel
const SMALL_NUM: f64 = 1e-8;
/// Relative tolerance for two box edges to count as orthogonal
const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;
/// Edges shorter than this do not define a local axis
const DEGENERATE_EDGE: f64 = 1e-12;

/// Corner indices of the six faces, each given as a closed loop of four corners
const FACES: [[usize; 4]; 6] = [
    [0, 2, 3, 1],
    [2, 6, 7, 3],
    [6, 4, 5, 7],
    [4, 0, 1, 5],
    [1, 3, 7, 5],
    [0, 4, 6, 2],
];

/// A box given by its 8 corners. The box is not required to be axis-aligned, all geometric queries derive
/// the local axes of the box from its corners.
///
/// The corner layout is fixed: corner 0 and corner 7 are opposite to each other and the faces are the
/// loops `[0, 2, 3, 1]`, `[2, 6, 7, 3]`, `[6, 4, 5, 7]`, `[4, 0, 1, 5]`, `[1, 3, 7, 5]` and `[0, 4, 6, 2]`.
/// All constructors produce this layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hexahedron {
    corners: [Vector3<f64>; 8],
}

/// Local coordinate frame of a [Hexahedron]: three orthonormal axes and the edge length along each axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub axes: [Vector3<f64>; 3],
    pub lengths: [f64; 3],
}

impl Hexahedron {
    /// Creates an axis-aligned box from two opposite corners. `a` becomes corner 0, `b` becomes corner 7
    /// ```
    /// # use patchcloud_core::math::Hexahedron;
    /// # use nalgebra::Vector3;
    /// let unit = Hexahedron::from_diagonal(&Vector3::new(0.0, 0.0, 0.0), &Vector3::new(1.0, 1.0, 1.0));
    /// assert_eq!(Vector3::new(0.0, 1.0, 0.0), *unit.corner(1));
    /// assert_eq!(Vector3::new(1.0, 0.0, 1.0), *unit.corner(6));
    /// assert!((unit.volume() - 1.0).abs() < 1e-12);
    /// ```
    pub fn from_diagonal(a: &Vector3<f64>, b: &Vector3<f64>) -> Self {
        Self {
            corners: [
                Vector3::new(a.x, a.y, a.z),
                Vector3::new(a.x, b.y, a.z),
                Vector3::new(b.x, a.y, a.z),
                Vector3::new(b.x, b.y, a.z),
                Vector3::new(a.x, a.y, b.z),
                Vector3::new(a.x, b.y, b.z),
                Vector3::new(b.x, a.y, b.z),
                Vector3::new(b.x, b.y, b.z),
            ],
        }
    }

    /// Creates an axis-aligned box with the given center and sizes along X, Y and Z
    pub fn from_center_size(center: &Vector3<f64>, width: f64, height: f64, length: f64) -> Self {
        let half = Vector3::new(width, height, length) * 0.5;
        Self::from_diagonal(&(center - half), &(center + half))
    }

    /// Creates a box from 8 arbitrary corners. The corners are sorted lexicographically by X, Y and Z, which
    /// yields the fixed corner layout for boxes whose axes are not rotated against the coordinate axes by
    /// more than 45 degrees
    ///
    /// In debug builds, this panics if the sorted corners do not form the fixed layout
    pub fn from_corners(mut corners: [Vector3<f64>; 8]) -> Self {
        corners.sort_by(cmp_xyz);
        let hexahedron = Self { corners };
        debug_assert!(
            hexahedron.has_fixed_layout(),
            "Hexahedron::from_corners: Sorted corners {:?} do not form the fixed corner layout",
            hexahedron.corners
        );
        hexahedron
    }

    /// True if the edges from corner 0 to corners 1, 2 and 4 are mutually orthogonal. Degenerate edges are
    /// ignored
    pub fn has_fixed_layout(&self) -> bool {
        let edges = [1, 2, 4]
            .iter()
            .map(|idx| self.corners[*idx] - self.corners[0])
            .filter(|edge| edge.norm() > DEGENERATE_EDGE)
            .collect::<Vec<_>>();
        edges.iter().tuple_combinations().all(|(a, b)| {
            a.dot(b).abs() <= ORTHOGONALITY_TOLERANCE * a.norm() * b.norm()
        })
    }

    /// Creates a box by extruding a rectangle in the XY plane from `z_min` to `z_max`. The four
    /// `base` corners must be given as a loop around the rectangle
    pub fn from_base(base: &[Vector2<f64>; 4], z_min: f64, z_max: f64) -> Self {
        let at = |corner: &Vector2<f64>, z: f64| Vector3::new(corner.x, corner.y, z);
        Self {
            corners: [
                at(&base[0], z_min),
                at(&base[3], z_min),
                at(&base[1], z_min),
                at(&base[2], z_min),
                at(&base[0], z_max),
                at(&base[3], z_max),
                at(&base[1], z_max),
                at(&base[2], z_max),
            ],
        }
    }

    pub fn corners(&self) -> &[Vector3<f64>; 8] {
        &self.corners
    }

    /// Returns the corner with the given index
    ///
    /// # Panics
    ///
    /// If `index` is not in `0..8`
    pub fn corner(&self, index: usize) -> &Vector3<f64> {
        self.corners.get(index).unwrap_or_else(|| {
            panic!(
                "Hexahedron::corner: Index {} is outside of the 8 corners of a box",
                index
            )
        })
    }

    /// Geometric center of this box, i.e. the midpoint of the diagonal from corner 0 to corner 7
    pub fn center(&self) -> Vector3<f64> {
        (self.corners[0] + self.corners[7]) * 0.5
    }

    /// Component-wise minimum over all corners
    pub fn min(&self) -> Vector3<f64> {
        self.corners[1..]
            .iter()
            .fold(self.corners[0], |min, corner| min.inf(corner))
    }

    /// Component-wise maximum over all corners
    pub fn max(&self) -> Vector3<f64> {
        self.corners[1..]
            .iter()
            .fold(self.corners[0], |max, corner| max.sup(corner))
    }

    /// Derives the local frame of this box from corner 0 and its three nearest, mutually orthogonal
    /// neighbours. Axes of degenerate (flat) boxes are completed to an orthonormal basis with a length of zero
    pub fn local_frame(&self) -> LocalFrame {
        let origin = self.corners[0];
        let mut candidates = self.corners[1..]
            .iter()
            .map(|corner| corner - origin)
            .filter(|edge| edge.norm() > DEGENERATE_EDGE)
            .collect::<Vec<_>>();
        candidates.sort_by_key(|edge| FloatOrd(edge.norm()));

        let mut edges: Vec<Vector3<f64>> = Vec::with_capacity(3);
        for candidate in candidates {
            let orthogonal = edges.iter().all(|edge| {
                edge.dot(&candidate).abs()
                    <= ORTHOGONALITY_TOLERANCE * edge.norm() * candidate.norm()
            });
            if orthogonal {
                edges.push(candidate);
                if edges.len() == 3 {
                    break;
                }
            }
        }

        let mut axes = [Vector3::x(), Vector3::y(), Vector3::z()];
        let mut lengths = [0.0; 3];
        for (idx, edge) in edges.iter().enumerate() {
            axes[idx] = edge.normalize();
            lengths[idx] = edge.norm();
        }
        match edges.len() {
            0 | 3 => {}
            1 => {
                let helper = if axes[0].x.abs() < 0.9 {
                    Vector3::x()
                } else {
                    Vector3::y()
                };
                axes[1] = axes[0].cross(&helper).normalize();
                axes[2] = axes[0].cross(&axes[1]).normalize();
            }
            _ => {
                axes[2] = axes[0].cross(&axes[1]).normalize();
            }
        }
        LocalFrame { axes, lengths }
    }

    /// Tests whether `point` lies inside this box. The point is projected onto the local axes of the box and
    /// is inside if twice the projected offset from the center, minus `gap`, does not exceed the edge length
    /// along every axis
    /// ```
    /// # use patchcloud_core::math::{Hexahedron, DEFAULT_GAP};
    /// # use nalgebra::Vector3;
    /// let unit = Hexahedron::from_diagonal(&Vector3::new(0.0, 0.0, 0.0), &Vector3::new(1.0, 1.0, 1.0));
    /// assert!(unit.contains(&Vector3::new(0.5, 0.5, 0.5), DEFAULT_GAP));
    /// assert!(unit.contains(&Vector3::new(1.0, 1.0, 1.0), DEFAULT_GAP));
    /// assert!(!unit.contains(&Vector3::new(1.1, 0.5, 0.5), DEFAULT_GAP));
    /// ```
    pub fn contains(&self, point: &Vector3<f64>, gap: f64) -> bool {
        let frame = self.local_frame();
        let offset = point - self.center();
        frame
            .axes
            .iter()
            .zip(frame.lengths.iter())
            .all(|(axis, length)| 2.0 * offset.dot(axis).abs() - gap <= *length)
    }

    /// Volume of this box
    pub fn volume(&self) -> f64 {
        self.local_frame().lengths.iter().product()
    }

    /// Splits this box into 8 boxes, one per corner, each spanning from its corner to the center of this
    /// box. The children keep the corner layout and orientation of this box
    pub fn split(&self) -> [Hexahedron; 8] {
        let mut children = [*self; 8];
        for (child, anchor) in children.iter_mut().zip(self.corners.iter()) {
            for (corner, parent_corner) in child.corners.iter_mut().zip(self.corners.iter()) {
                *corner = (anchor + parent_corner) * 0.5;
            }
        }
        children
    }

    /// The six faces of this box, each as a loop of four corners
    pub fn faces(&self) -> [[Vector3<f64>; 4]; 6] {
        let mut faces = [[Vector3::zeros(); 4]; 6];
        for (face, indices) in faces.iter_mut().zip(FACES.iter()) {
            for (corner, index) in face.iter_mut().zip(indices.iter()) {
                *corner = self.corners[*index];
            }
        }
        faces
    }

    /// Minimum distance between this box and `other`. Every face is decomposed into its four edges and its two
    /// diagonals, the result is the minimum segment-to-segment distance over all face pairs
    /// ```
    /// # use patchcloud_core::math::Hexahedron;
    /// # use nalgebra::Vector3;
    /// let a = Hexahedron::from_diagonal(&Vector3::new(0.0, 0.0, 0.0), &Vector3::new(1.0, 1.0, 1.0));
    /// let b = Hexahedron::from_diagonal(&Vector3::new(3.0, 0.0, 0.0), &Vector3::new(4.0, 1.0, 1.0));
    /// assert!((a.distance(&b) - 2.0).abs() < 1e-9);
    /// ```
    pub fn distance(&self, other: &Hexahedron) -> f64 {
        let own_segments = self.face_segments();
        let other_segments = other.face_segments();
        own_segments
            .iter()
            .cartesian_product(other_segments.iter())
            .map(|((a0, a1), (b0, b1))| segment_distance(a0, a1, b0, b1))
            .fold(f64::INFINITY, f64::min)
    }

    fn face_segments(&self) -> Vec<(Vector3<f64>, Vector3<f64>)> {
        self.faces()
            .iter()
            .flat_map(|face| {
                vec![
                    (face[0], face[1]),
                    (face[1], face[2]),
                    (face[2], face[3]),
                    (face[3], face[0]),
                    (face[0], face[2]),
                    (face[1], face[3]),
                ]
            })
            .collect()
    }
}

/// Minimum distance between the segment `a0-a1` and the segment `b0-b1`. Solves for the parameters `(s, t)`
/// minimizing `|a(s) - b(t)|` on `[0, 1]^2`. If the segments are (nearly) parallel, `s` is fixed to zero
/// before clamping
/// ```
/// # use patchcloud_core::math::segment_distance;
/// # use nalgebra::Vector3;
/// let d = segment_distance(
///     &Vector3::new(0.0, 0.0, 0.0),
///     &Vector3::new(1.0, 0.0, 0.0),
///     &Vector3::new(0.5, -1.0, 2.0),
///     &Vector3::new(0.5, 1.0, 2.0),
/// );
/// assert!((d - 2.0).abs() < 1e-12);
/// ```
pub fn segment_distance(
    a0: &Vector3<f64>,
    a1: &Vector3<f64>,
    b0: &Vector3<f64>,
    b1: &Vector3<f64>,
) -> f64 {
    let u = a1 - a0;
    let v = b1 - b0;
    let w = a0 - b0;
    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);
    let det = a * c - b * b;

    let (mut s_n, mut s_d, mut t_n, t_d) = if det < SMALL_NUM {
        (0.0, 1.0, e, c)
    } else {
        let s_n = b * e - c * d;
        let t_n = a * e - b * d;
        if s_n < 0.0 {
            (0.0, det, e, c)
        } else if s_n > det {
            (det, det, e + b, c)
        } else {
            (s_n, det, t_n, det)
        }
    };

    if t_n < 0.0 {
        t_n = 0.0;
        if -d < 0.0 {
            s_n = 0.0;
        } else if -d > a {
            s_n = s_d;
        } else {
            s_n = -d;
            s_d = a;
        }
    } else if t_n > t_d {
        t_n = t_d;
        if (-d + b) < 0.0 {
            s_n = 0.0;
        } else if (-d + b) > a {
            s_n = s_d;
        } else {
            s_n = -d + b;
            s_d = a;
        }
    }

    let s_c = if s_n.abs() < SMALL_NUM { 0.0 } else { s_n / s_d };
    let t_c = if t_n.abs() < SMALL_NUM { 0.0 } else { t_n / t_d };
    (w + u * s_c - v * t_c).norm()
}
