use log::{debug, warn};
use patchcloud_core::{
    containers::PointSource,
    math::{Hexahedron, AABB, ACCURACY},
    nalgebra::Vector3,
};
use rayon::prelude::*;

use crate::voxel::{Voxel, Voxels};

/// Default number of split rounds after which refinement stops regardless of the leaf sizes
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Smallest side length of the root voxel, used when all points coincide in at least one dimension
const MIN_ROOT_SIDE: f64 = 10.0 * ACCURACY;

/// Index of a node within an [Octree]
pub type NodeId = usize;

/// A node of an [Octree]. Nodes are stored in an arena and refer to their parent and children by index
#[derive(Debug, Clone)]
pub struct OctreeNode {
    shape: Hexahedron,
    depth: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    point_count: usize,
}

impl OctreeNode {
    pub fn shape(&self) -> &Hexahedron {
        &self.shape
    }

    /// Number of split rounds between the root and this node
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of points that this node held when it was created
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Octree over a point cloud. The root is a cubic voxel around the centroid of the cloud with twice the
/// largest span of the cloud as side length. Refinement happens in rounds: every round splits all current
/// leaves, in parallel, and the points of a leaf move into its children.
///
/// ```
/// # use patchcloud_algorithms::octree::Octree;
/// # use patchcloud_core::{containers::PointCloud, math::Point};
/// let cloud = (0..100)
///     .map(|i| Point::new((i % 10) as f64, (i / 10) as f64, 0.0))
///     .collect::<PointCloud>();
/// let voxels = Octree::new(&cloud).voxels_at_max_size(10);
/// assert_eq!(100, voxels.point_count());
/// assert!(voxels.iter().all(|voxel| voxel.len() <= 10));
/// ```
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    leaves: Vec<(NodeId, Voxel)>,
    depth: usize,
    max_depth: usize,
}

impl Octree {
    /// Builds the root of an octree over all points of `source` with [DEFAULT_MAX_DEPTH]
    ///
    /// # Panics
    ///
    /// If a point does not fit into the root voxel
    pub fn new<S: PointSource + ?Sized>(source: &S) -> Self {
        Self::with_max_depth(source, DEFAULT_MAX_DEPTH)
    }

    /// Builds the root of an octree over all points of `source`. Refinement never goes deeper than
    /// `max_depth` split rounds.
    ///
    /// Points that share a [key](patchcloud_core::math::PointKey) are stored once, so a source with
    /// duplicates yields fewer points in the tree than `source.len()`
    ///
    /// # Panics
    ///
    /// If a point does not fit into the root voxel
    pub fn with_max_depth<S: PointSource + ?Sized>(source: &S, max_depth: usize) -> Self {
        let root = match AABB::from_positions(source.points().map(|point| &point.position)) {
            Some(bounds) => {
                let count = source.len() as f64;
                let centroid = source
                    .points()
                    .map(|point| point.position)
                    .sum::<Vector3<f64>>()
                    / count;
                let side = (bounds.largest_span() * 2.0).max(MIN_ROOT_SIDE);
                let mut root = Voxel::cube(&centroid, side);
                for point in source.points() {
                    if !root.add(*point) {
                        panic!(
                            "Octree: Point {:?} does not fit into the root voxel {:?}",
                            point.position,
                            root.shape()
                        );
                    }
                }
                let duplicates = source.len() - root.len();
                if duplicates > 0 {
                    debug!(
                        "Octree: Dropped {} duplicate points of {}",
                        duplicates,
                        source.len()
                    );
                }
                root
            }
            None => Voxel::cube(&Vector3::zeros(), MIN_ROOT_SIDE),
        };

        Self {
            nodes: vec![OctreeNode {
                shape: *root.shape(),
                depth: 0,
                parent: None,
                children: vec![],
                point_count: root.len(),
            }],
            leaves: vec![(0, root)],
            depth: 0,
            max_depth,
        }
    }

    pub fn root(&self) -> &OctreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    /// Current leaves with their node ids
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &Voxel)> + '_ {
        self.leaves.iter().map(|(id, voxel)| (*id, voxel))
    }

    /// Number of split rounds performed so far
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Splits every current leaf once. The leaves are split in parallel, the resulting children become the new
    /// leaves
    ///
    /// # Panics
    ///
    /// If a leaf produces no children, or if the children of a leaf hold fewer points than the leaf held
    pub fn split(&mut self) {
        let splits = std::mem::take(&mut self.leaves)
            .into_par_iter()
            .map(|(id, voxel)| {
                let count = voxel.len();
                (id, count, voxel.split())
            })
            .collect::<Vec<_>>();

        self.depth += 1;
        for (parent, count, children) in splits {
            if children.is_empty() {
                panic!("Octree::split: Node {} produced no children", parent);
            }
            let child_count = children.iter().map(Voxel::len).sum::<usize>();
            if child_count < count {
                panic!(
                    "Octree::split: Children of node {} hold {} points, but the node held {}",
                    parent, child_count, count
                );
            }
            for child in children {
                let id = self.nodes.len();
                self.nodes.push(OctreeNode {
                    shape: *child.shape(),
                    depth: self.depth,
                    parent: Some(parent),
                    children: vec![],
                    point_count: child.len(),
                });
                self.nodes[parent].children.push(id);
                self.leaves.push((id, child));
            }
        }
        debug!(
            "Octree split round {}: {} leaves, {} nodes",
            self.depth,
            self.leaves.len(),
            self.nodes.len()
        );
    }

    /// Splits rounds of leaves until every leaf holds at most `max_points` points, or until the maximum depth
    /// is reached
    pub fn refine(&mut self, max_points: usize) {
        while self.leaves.iter().any(|(_, voxel)| voxel.len() > max_points) {
            if self.depth >= self.max_depth {
                warn!(
                    "Octree reached its maximum depth of {} with leaves larger than {} points",
                    self.max_depth, max_points
                );
                break;
            }
            self.split();
        }
    }

    /// Extracts the non-empty leaves, dropping the tree
    pub fn into_voxels(self) -> Voxels {
        self.leaves
            .into_iter()
            .map(|(_, voxel)| voxel)
            .filter(|voxel| !voxel.is_empty())
            .collect()
    }

    /// Refines this octree until no leaf holds more than `max_points` points (see [refine](Octree::refine)) and
    /// returns its leaves
    pub fn voxels_at_max_size(mut self, max_points: usize) -> Voxels {
        self.refine(max_points);
        self.into_voxels()
    }
}

/// Buckets all points of `source` into octree leaves with at most `max_points` points each
pub fn raw_voxels<S: PointSource + ?Sized>(source: &S, max_points: usize, max_depth: usize) -> Voxels {
    Octree::with_max_depth(source, max_depth).voxels_at_max_size(max_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchcloud_core::{
        containers::PointCloud,
        math::{Point, DEFAULT_GAP},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn random_cloud(count: usize, seed: u64) -> PointCloud {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Point::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(0.0..10.0),
                    rng.gen_range(-1.0..1.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_leaves_conserve_points() {
        let cloud = random_cloud(5000, 17);
        for max_points in [1usize, 7, 100, 10_000].iter() {
            let voxels = Octree::new(&cloud).voxels_at_max_size(*max_points);
            assert_eq!(cloud.len(), voxels.point_count());

            let mut seen = HashSet::new();
            for voxel in voxels.iter() {
                assert!(voxel.len() <= *max_points);
                for point in voxel.cloud().iter() {
                    assert!(seen.insert(point.key()));
                    assert!(voxel.shape().contains(&point.position, DEFAULT_GAP));
                }
            }
            assert_eq!(cloud.len(), seen.len());
        }
    }

    #[test]
    fn test_arena_links_are_consistent() {
        let cloud = random_cloud(1000, 23);
        let mut octree = Octree::new(&cloud);
        octree.refine(50);
        assert_eq!(cloud.len(), octree.root().point_count());
        for (id, node) in octree.nodes().iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let child_points = node
                .children()
                .iter()
                .map(|child| octree.node(*child).unwrap().point_count())
                .sum::<usize>();
            assert_eq!(node.point_count(), child_points);
            for child in node.children() {
                let child = octree.node(*child).unwrap();
                assert_eq!(Some(id), child.parent());
                assert_eq!(node.depth() + 1, child.depth());
            }
        }
        assert!(octree
            .leaves()
            .all(|(id, _)| octree.node(id).unwrap().is_leaf()));
    }

    #[test]
    fn test_max_depth_stops_refinement() {
        let cloud = random_cloud(1000, 5);
        let mut octree = Octree::with_max_depth(&cloud, 2);
        octree.refine(1);
        assert_eq!(2, octree.depth());
        let voxels = octree.into_voxels();
        assert_eq!(cloud.len(), voxels.point_count());
        assert!(voxels.iter().any(|voxel| voxel.len() > 1));
    }

    #[test]
    fn test_duplicates_are_stored_once() {
        let mut points = (0..10)
            .map(|i| Point::new(i as f64, 0.0, 0.0))
            .collect::<Vec<_>>();
        points.push(Point::new(3.0, 0.0, 0.0));
        points.push(Point::new(7.00001, 0.0, 0.0));
        let octree = Octree::new(&points);
        assert_eq!(10, octree.root().point_count());
        assert_eq!(10, octree.voxels_at_max_size(2).point_count());
    }

    #[test]
    fn test_degenerate_clouds() {
        let empty = PointCloud::new();
        assert!(Octree::new(&empty).voxels_at_max_size(10).is_empty());

        let single = vec![Point::new(3.0, 4.0, 5.0)];
        let voxels = Octree::new(&single).voxels_at_max_size(10);
        assert_eq!(1, voxels.len());
        assert_eq!(1, voxels.point_count());

        let line = (0..64)
            .map(|i| Point::new(i as f64 * 0.5, 2.0, 2.0))
            .collect::<PointCloud>();
        let voxels = raw_voxels(&line, 4, DEFAULT_MAX_DEPTH);
        assert_eq!(64, voxels.point_count());
        assert!(voxels.iter().all(|voxel| voxel.len() <= 4));
    }
}
