use std::collections::BTreeSet;

use float_ord::FloatOrd;
use patchcloud_core::{
    containers::{PointCloud, PointSource},
    math::{NormalComparison, Point, DEFAULT_COLOR_ACCURACY},
    nalgebra::Vector3,
};
use rayon::prelude::*;
use uuid::Uuid;

/// Index of a [Region] within [Regions]
pub type RegionId = usize;

/// A cluster of points taking part in region growing. Regions start out with a single point, are linked to
/// compatible neighbours, and are absorbed into a merged region once their connected component is merged
#[derive(Debug, Clone)]
pub struct Region {
    id: Uuid,
    cloud: PointCloud,
    closed: bool,
    adjoined: BTreeSet<RegionId>,
}

impl Region {
    /// Creates a new open region owning the given points
    pub fn new(cloud: PointCloud) -> Self {
        Self {
            id: Uuid::new_v4(),
            cloud,
            closed: false,
            adjoined: BTreeSet::new(),
        }
    }

    pub fn from_point(point: Point) -> Self {
        let mut cloud = PointCloud::with_capacity(1);
        cloud.add(point);
        Self::new(cloud)
    }

    pub fn id(&self) -> &Uuid {
        &self.id
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

    /// A closed region has been absorbed into a merge already
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Regions that this region can merge with
    pub fn adjoined(&self) -> &BTreeSet<RegionId> {
        &self.adjoined
    }
}

/// Decides which regions grow together. Two regions are merged if they are close and similar.
pub trait MergeCriterion: Sync {
    /// Necessary condition for [is_close](MergeCriterion::is_close) that only looks at the X coordinate. Regions
    /// are swept in X order and the sweep stops at the first region that is not close in X
    fn is_close_x(&self, a: &PointCloud, b: &PointCloud) -> bool;

    fn is_close(&self, a: &PointCloud, b: &PointCloud) -> bool;

    fn is_similar(&self, a: &PointCloud, b: &PointCloud) -> bool;

    fn can_merge(&self, a: &PointCloud, b: &PointCloud) -> bool {
        self.is_close(a, b) && self.is_similar(a, b)
    }
}

fn centroid_offset(a: &PointCloud, b: &PointCloud) -> Option<Vector3<f64>> {
    Some(a.centroid()? - b.centroid()?)
}

fn within_x(a: &PointCloud, b: &PointCloud, distance: f64) -> bool {
    centroid_offset(a, b).map_or(false, |offset| offset.x.abs() <= distance)
}

fn within(a: &PointCloud, b: &PointCloud, distance: f64) -> bool {
    centroid_offset(a, b).map_or(false, |offset| offset.norm() <= distance)
}

/// Regions merge if their centroids are within `distance` of each other
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanCriterion {
    pub distance: f64,
}

impl EuclideanCriterion {
    pub fn new(distance: f64) -> Self {
        Self { distance }
    }
}

impl MergeCriterion for EuclideanCriterion {
    fn is_close_x(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within_x(a, b, self.distance)
    }

    fn is_close(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within(a, b, self.distance)
    }

    fn is_similar(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within(a, b, self.distance)
    }
}

/// Regions merge if their centroids are within `distance` of each other and their mean colors fall into
/// the same perceptual buckets of size `accuracy`. Regions without any colored point count as one color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCriterion {
    pub distance: f64,
    pub accuracy: u8,
}

impl ColorCriterion {
    pub fn new(distance: f64, accuracy: u8) -> Self {
        Self { distance, accuracy }
    }

    pub fn with_default_accuracy(distance: f64) -> Self {
        Self::new(distance, DEFAULT_COLOR_ACCURACY)
    }
}

impl MergeCriterion for ColorCriterion {
    fn is_close_x(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within_x(a, b, self.distance)
    }

    fn is_close(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within(a, b, self.distance)
    }

    fn is_similar(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within(a, b, self.distance)
            && a.mean_color().map(|c| c.as_human_perception(self.accuracy))
                == b.mean_color().map(|c| c.as_human_perception(self.accuracy))
    }
}

/// Regions merge if their centroids are within `distance` of each other and their mean normals differ by at
/// most `normal_threshold`. Regions without normals are never similar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalCriterion {
    pub distance: f64,
    pub normal_threshold: f64,
    pub comparison: NormalComparison,
}

impl NormalCriterion {
    pub fn new(distance: f64, normal_threshold: f64) -> Self {
        Self {
            distance,
            normal_threshold,
            comparison: NormalComparison::default(),
        }
    }

    pub fn with_comparison(mut self, comparison: NormalComparison) -> Self {
        self.comparison = comparison;
        self
    }
}

impl MergeCriterion for NormalCriterion {
    fn is_close_x(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within_x(a, b, self.distance)
    }

    fn is_close(&self, a: &PointCloud, b: &PointCloud) -> bool {
        within(a, b, self.distance)
    }

    fn is_similar(&self, a: &PointCloud, b: &PointCloud) -> bool {
        if !within(a, b, self.distance) {
            return false;
        }
        match (
            a.mean_normal(self.comparison),
            b.mean_normal(self.comparison),
        ) {
            (Some(na), Some(nb)) => (na - nb).norm() <= self.normal_threshold,
            _ => false,
        }
    }
}

/// Arena of [Region]s together with the [MergeCriterion] that links them.
///
/// Adjacency is stored as sets of region ids. Region ids are positions in the arena, they are only stable
/// between two calls of [calculate_adjacent_regions](Regions::calculate_adjacent_regions), which reorders the
/// arena.
#[derive(Debug, Clone)]
pub struct Regions<C> {
    regions: Vec<Region>,
    criterion: C,
}

impl<C: MergeCriterion> Regions<C> {
    pub fn new(criterion: C) -> Self {
        Self::from_regions(vec![], criterion)
    }

    pub fn from_regions(regions: Vec<Region>, criterion: C) -> Self {
        Self { regions, criterion }
    }

    /// Creates one region per point of `source`
    pub fn from_points<S: PointSource + ?Sized>(source: &S, criterion: C) -> Self {
        let regions = source
            .points()
            .map(|point| Region::from_point(*point))
            .collect();
        Self::from_regions(regions, criterion)
    }

    /// Adds `region` to the arena and returns its id
    pub fn push(&mut self, region: Region) -> RegionId {
        self.regions.push(region);
        self.regions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn criterion(&self) -> &C {
        &self.criterion
    }

    pub fn into_regions(self) -> Vec<Region> {
        self.regions
    }

    pub fn into_clouds(self) -> Vec<PointCloud> {
        self.regions.into_iter().map(Region::into_cloud).collect()
    }

    /// Links the two regions in both directions
    ///
    /// # Panics
    ///
    /// If one of the ids is not part of this arena
    pub fn add_adjoined(&mut self, a: RegionId, b: RegionId) {
        if a == b {
            return;
        }
        let len = self.regions.len();
        if a >= len || b >= len {
            panic!(
                "Regions::add_adjoined: Region {} or {} is not part of an arena of {} regions",
                a, b, len
            );
        }
        self.regions[a].adjoined.insert(b);
        self.regions[b].adjoined.insert(a);
    }

    /// Sorts the regions by the X coordinate of their centroid and links every pair of regions that can merge.
    /// For every region, the regions following it in X order are scanned until the first one that is not
    /// close in X. Candidate pairs are evaluated in parallel, links are recorded afterwards.
    ///
    /// Any previous adjacency is discarded.
    pub fn calculate_adjacent_regions(&mut self) {
        self.regions.sort_by_cached_key(|region| {
            FloatOrd(region.cloud.centroid().map_or(f64::INFINITY, |c| c.x))
        });
        for region in self.regions.iter_mut() {
            region.adjoined.clear();
        }

        let regions = &self.regions;
        let criterion = &self.criterion;
        let edges = (0..regions.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let a = &regions[i].cloud;
                regions[i + 1..]
                    .iter()
                    .enumerate()
                    .take_while(move |(_, b)| criterion.is_close_x(a, &b.cloud))
                    .filter(move |(_, b)| criterion.can_merge(a, &b.cloud))
                    .map(move |(offset, _)| (i, i + 1 + offset))
            })
            .collect::<Vec<_>>();

        for (a, b) in edges {
            self.add_adjoined(a, b);
        }
    }

    /// Merges the connected component of `start` into a new region. Every region of the component is closed and
    /// gives up its points. Returns `None` if `start` is closed already
    ///
    /// # Panics
    ///
    /// If the component holds points but the merged region is empty
    pub fn merge_linked_region(&mut self, start: RegionId) -> Option<Region> {
        if self.regions.get(start)?.closed {
            return None;
        }

        self.regions[start].closed = true;
        let mut stack = vec![start];
        let mut component = vec![];
        while let Some(id) = stack.pop() {
            component.push(id);
            let neighbours = self.regions[id].adjoined.iter().copied().collect::<Vec<_>>();
            for neighbour in neighbours {
                if !self.regions[neighbour].closed {
                    self.regions[neighbour].closed = true;
                    stack.push(neighbour);
                }
            }
        }

        let expected = component
            .iter()
            .map(|id| self.regions[*id].len())
            .sum::<usize>();
        let mut cloud = PointCloud::with_capacity(expected);
        for id in component.iter() {
            cloud.append(std::mem::take(&mut self.regions[*id].cloud));
        }
        if expected > 0 && cloud.is_empty() {
            panic!(
                "Regions::merge_linked_region: Merging {} regions with {} points produced an empty region",
                component.len(),
                expected
            );
        }
        Some(Region::new(cloud))
    }

    /// Links all regions and merges every connected component into one region
    pub fn merges(mut self) -> Regions<C> {
        self.calculate_adjacent_regions();
        let merged = (0..self.regions.len())
            .filter_map(|id| self.merge_linked_region(id))
            .collect();
        Regions::from_regions(merged, self.criterion)
    }

    /// Merges only the regions with at least `min_size` points, see [merges](Regions::merges). Smaller regions are
    /// passed through unchanged
    pub fn merge(self, min_size: usize) -> Regions<C> {
        let (big, small): (Vec<Region>, Vec<Region>) = self
            .regions
            .into_iter()
            .partition(|region| region.len() >= min_size);
        let merged = Regions::from_regions(big, self.criterion).merges();
        let mut regions = small
            .into_iter()
            .map(|region| Region::new(region.cloud))
            .collect::<Vec<_>>();
        regions.extend(merged.regions);
        Regions::from_regions(regions, merged.criterion)
    }

    /// Repeats [merges](Regions::merges) until the number of regions stops decreasing. Merged regions have new
    /// centroids, so regions that were too far apart in one pass may become mergeable in the next
    pub fn merge_all(self) -> Regions<C> {
        let mut current = self.merges();
        loop {
            let count = current.len();
            current = current.merges();
            if current.len() >= count {
                return current;
            }
        }
    }
}
