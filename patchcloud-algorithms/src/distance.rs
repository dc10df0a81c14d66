//! Minimum distances between the patches of a [PatchCloud].
//!
//! Patches are approximated by their [OrientedBoundingBox]. Candidate pairs are generated by sweeping over the
//! patches sorted by the X coordinate of their centroids, and the distance of every candidate pair is computed
//! as an independent unit of work on the rayon thread pool.
use std::{
    panic::{self, AssertUnwindSafe},
    time::{Duration, Instant},
};

use float_ord::FloatOrd;
use log::{error, info};
use patchcloud_core::{
    containers::{PatchCloud, PointCloud},
    math::{OrientedBoundingBox, PointKey},
};
use rayon::prelude::*;

/// Default maximum distance between the centroid X coordinates of two patches whose distance is computed
pub const DEFAULT_MAX_DISTANCE: f64 = 1.0;

/// Default time after which distance computations that have not started yet are given up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1000 * 24 * 60 * 60);

/// Minimum distance between two patches. `first` is always smaller than `second`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchDistance {
    pub first: PointKey,
    pub second: PointKey,
    pub distance: f64,
}

impl PatchDistance {
    pub fn new(a: PointKey, b: PointKey, distance: f64) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            distance,
        }
    }
}

/// How candidate pairs of patches are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PairStrategy {
    /// Only pairs whose centroids are at most `max_distance` apart in X
    Sweep,
    /// All pairs
    BruteForce,
}

impl Default for PairStrategy {
    fn default() -> Self {
        PairStrategy::Sweep
    }
}

/// Result of a distance estimation: the distances of all pairs that were computed, and the pairs whose task
/// failed or did not finish in time
#[derive(Debug, Clone, Default)]
pub struct DistanceEstimation {
    distances: Vec<PatchDistance>,
    failures: Vec<(PointKey, PointKey)>,
}

impl DistanceEstimation {
    /// Distances sorted by their pair of keys
    pub fn distances(&self) -> &[PatchDistance] {
        &self.distances
    }

    pub fn failures(&self) -> &[(PointKey, PointKey)] {
        &self.failures
    }

    /// True if the distance of every candidate pair was computed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of candidate pairs, computed or failed
    pub fn pair_count(&self) -> usize {
        self.distances.len() + self.failures.len()
    }

    pub fn get(&self, a: &PointKey, b: &PointKey) -> Option<f64> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        self.distances
            .binary_search_by(|entry| (&entry.first, &entry.second).cmp(&(first, second)))
            .ok()
            .map(|index| self.distances[index].distance)
    }

    pub fn into_distances(self) -> Vec<PatchDistance> {
        self.distances
    }
}

/// Minimum distance between the oriented bounding boxes of two patches, or `None` if one of them is empty
pub fn min_patch_distance(a: &PointCloud, b: &PointCloud) -> Option<f64> {
    Some(a.obb()?.distance(b.obb()?))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PairResult {
    Done(f64),
    Panicked,
    /// The deadline had passed before the pair was started
    Expired,
}

/// Evaluates `distance` for every pair in parallel. The calling thread joins through work stealing, so this
/// is safe to call from within a rayon worker. A `None` deadline never expires
fn compute_pairs<F>(pairs: &[(usize, usize)], deadline: Option<Instant>, distance: F) -> Vec<PairResult>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    pairs
        .par_iter()
        .map(|&(a, b)| {
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                return PairResult::Expired;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| distance(a, b))) {
                Ok(value) => PairResult::Done(value),
                Err(_) => {
                    error!("Distance task for pair ({}, {}) panicked", a, b);
                    PairResult::Panicked
                }
            }
        })
        .collect()
}

struct PatchBox {
    key: PointKey,
    centroid_x: f64,
    obb: OrientedBoundingBox,
}

/// Estimates the minimum distances between the patches of a [PatchCloud]
///
/// ```
/// # use patchcloud_algorithms::distance::PatchesDistanceEstimation;
/// # use patchcloud_core::{containers::{PatchCloud, PointCloud}, math::Point};
/// let mut patches = PatchCloud::new();
/// patches.add((0..3).map(|i| Point::new(i as f64, 0.0, 0.0)).collect::<PointCloud>());
/// patches.add((0..3).map(|i| Point::new(i as f64, 2.0, 0.0)).collect::<PointCloud>());
/// let estimation = PatchesDistanceEstimation::new().estimate(&patches);
/// assert!(estimation.is_complete());
/// assert_eq!(1, estimation.distances().len());
/// assert!((estimation.distances()[0].distance - 2.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchesDistanceEstimation {
    pub max_distance: f64,
    pub timeout: Duration,
    pub strategy: PairStrategy,
}

impl Default for PatchesDistanceEstimation {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            timeout: DEFAULT_TIMEOUT,
            strategy: PairStrategy::Sweep,
        }
    }
}

impl PatchesDistanceEstimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: PairStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Candidate pairs as indices into `boxes`, which must be sorted by `centroid_x`
    fn pairs(&self, boxes: &[PatchBox]) -> Vec<(usize, usize)> {
        let mut pairs = vec![];
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if self.strategy == PairStrategy::Sweep
                    && (boxes[i].centroid_x - boxes[j].centroid_x).abs() > self.max_distance
                {
                    break;
                }
                pairs.push((i, j));
            }
        }
        pairs
    }

    /// Computes the distances of all candidate pairs of patches in parallel on the rayon thread pool. Pairs
    /// whose computation panics, or that have not started once the timeout has elapsed, are reported as
    /// failures
    pub fn estimate(&self, patches: &PatchCloud) -> DistanceEstimation {
        let mut boxes = patches
            .patches()
            .par_iter()
            .filter_map(|(key, patch)| {
                Some(PatchBox {
                    key: *key,
                    centroid_x: patch.centroid()?.x,
                    obb: patch.obb()?.clone(),
                })
            })
            .collect::<Vec<_>>();
        boxes.sort_by_key(|patch_box| FloatOrd(patch_box.centroid_x));

        let pairs = self.pairs(&boxes);
        let deadline = Instant::now().checked_add(self.timeout);
        let results = compute_pairs(&pairs, deadline, |a, b| boxes[a].obb.distance(&boxes[b].obb));
        let expired = results
            .iter()
            .filter(|result| **result == PairResult::Expired)
            .count();
        if expired > 0 {
            error!(
                "Distance estimation timed out after {:?} with {} of {} pairs not started",
                self.timeout,
                expired,
                pairs.len()
            );
        }

        let mut estimation = DistanceEstimation::default();
        for (&(a, b), result) in pairs.iter().zip(results) {
            let (key_a, key_b) = (boxes[a].key, boxes[b].key);
            match result {
                PairResult::Done(distance) => estimation
                    .distances
                    .push(PatchDistance::new(key_a, key_b, distance)),
                PairResult::Panicked | PairResult::Expired => {
                    estimation.failures.push(if key_a <= key_b {
                        (key_a, key_b)
                    } else {
                        (key_b, key_a)
                    })
                }
            }
        }
        estimation
            .distances
            .sort_by(|a, b| (a.first, a.second).cmp(&(b.first, b.second)));
        estimation.failures.sort();

        if !estimation.is_complete() {
            error!(
                "Distance estimation failed for {} of {} pairs",
                estimation.failures.len(),
                estimation.pair_count()
            );
        }
        info!(
            "Estimated {} distances between {} patches",
            estimation.distances.len(),
            boxes.len()
        );
        estimation
    }

    /// Estimates all distances (see [estimate](PatchesDistanceEstimation::estimate)) and hands them to
    /// `post_processing` together with the patches they belong to
    pub fn run<F, R>(&self, patches: &PatchCloud, post_processing: F) -> R
    where
        F: FnOnce(DistanceEstimation, &PatchCloud) -> R,
    {
        post_processing(self.estimate(patches), patches)
    }
}
