use std::collections::{btree_map, BTreeMap, BTreeSet};

use anyhow::{anyhow, bail, Result};
use log::warn;

use crate::math::{Color, Point, PointKey};

use super::{PointCloud, PointSource};

/// Classification of a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatchKind {
    /// Coherent by surface normal similarity
    Regular,
    /// Coherent by proximity and color
    Irregular,
    /// Unstructured leftover points
    Isolated,
}

impl PatchKind {
    pub const ALL: [PatchKind; 3] = [PatchKind::Regular, PatchKind::Irregular, PatchKind::Isolated];

    /// Single character tag used for this kind in index lines of ASCII files
    pub fn tag(&self) -> char {
        match self {
            PatchKind::Regular => 'r',
            PatchKind::Irregular => 'i',
            PatchKind::Isolated => 's',
        }
    }

    pub fn from_tag(tag: char) -> Option<PatchKind> {
        PatchKind::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// Color used to visualize patches of this kind
    pub fn color(&self) -> Color {
        match self {
            PatchKind::Regular => Color::GREEN,
            PatchKind::Irregular => Color::BLUE,
            PatchKind::Isolated => Color::RED,
        }
    }
}

/// Patch manager: a mapping from patch key to patch, and three disjoint sets of keys holding the regular,
/// irregular and isolated patches.
///
/// Every key in one of the three sets is a key of the mapping, and no key is in more than one set. Patches
/// that are not (yet) classified are in none of the sets.
/// ```
/// # use patchcloud_core::containers::{PatchCloud, PatchKind, PointCloud};
/// # use patchcloud_core::math::Point;
/// let mut patches = PatchCloud::new();
/// let patch = vec![Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)]
///     .into_iter()
///     .collect::<PointCloud>();
/// let key = patches.add_classified(patch, PatchKind::Regular).unwrap();
/// assert_eq!(Some(PatchKind::Regular), patches.kind_of(&key));
/// assert_eq!(2, patches.point_count());
/// assert!(patches.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatchCloud {
    patches: BTreeMap<PointKey, PointCloud>,
    regular: BTreeSet<PointKey>,
    irregular: BTreeSet<PointKey>,
    isolated: BTreeSet<PointKey>,
}

impl PatchCloud {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts `patch` under an explicit `key` without classifying it. Returns the patch previously stored
    /// under `key`, which keeps its classification
    pub fn insert(&mut self, key: PointKey, patch: PointCloud) -> Option<PointCloud> {
        self.patches.insert(key, patch)
    }

    /// Adds `patch` keyed by the hash key of its mean point and returns that key. If a patch with the same key
    /// exists already, the points of `patch` are absorbed into it. Returns `None` for an empty patch
    pub fn add(&mut self, patch: PointCloud) -> Option<PointKey> {
        let key = patch.key()?;
        match self.patches.entry(key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(patch);
            }
            btree_map::Entry::Occupied(mut entry) => {
                warn!(
                    "Patch key {} is already taken, merging {} points into the existing patch",
                    key,
                    patch.len()
                );
                entry.get_mut().append(patch);
            }
        }
        Some(key)
    }

    /// Like [add](PatchCloud::add), but also classifies the patch. A patch that is absorbed into an existing
    /// classified patch keeps the classification of the existing patch
    pub fn add_classified(&mut self, patch: PointCloud, kind: PatchKind) -> Option<PointKey> {
        let key = self.add(patch)?;
        if self.kind_of(&key).is_none() {
            self.keys_mut(kind).insert(key);
        }
        Some(key)
    }

    pub fn get(&self, key: &PointKey) -> Option<&PointCloud> {
        self.patches.get(key)
    }

    pub fn contains_key(&self, key: &PointKey) -> bool {
        self.patches.contains_key(key)
    }

    /// Removes the patch with the given key, including its classification
    pub fn remove(&mut self, key: &PointKey) -> Option<PointCloud> {
        for kind in PatchKind::ALL.iter() {
            self.keys_mut(*kind).remove(key);
        }
        self.patches.remove(key)
    }

    /// Number of patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Total number of points over all patches
    pub fn point_count(&self) -> usize {
        self.patches.values().map(PointCloud::len).sum()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PointKey, PointCloud> {
        self.patches.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, PointKey, PointCloud> {
        self.patches.keys()
    }

    pub fn patches(&self) -> &BTreeMap<PointKey, PointCloud> {
        &self.patches
    }

    pub fn regular(&self) -> &BTreeSet<PointKey> {
        &self.regular
    }

    pub fn irregular(&self) -> &BTreeSet<PointKey> {
        &self.irregular
    }

    pub fn isolated(&self) -> &BTreeSet<PointKey> {
        &self.isolated
    }

    /// The set of keys of the given kind
    pub fn keys_of(&self, kind: PatchKind) -> &BTreeSet<PointKey> {
        match kind {
            PatchKind::Regular => &self.regular,
            PatchKind::Irregular => &self.irregular,
            PatchKind::Isolated => &self.isolated,
        }
    }

    fn keys_mut(&mut self, kind: PatchKind) -> &mut BTreeSet<PointKey> {
        match kind {
            PatchKind::Regular => &mut self.regular,
            PatchKind::Irregular => &mut self.irregular,
            PatchKind::Isolated => &mut self.isolated,
        }
    }

    /// Classification of the patch with the given key, or `None` if it is unclassified or does not exist
    pub fn kind_of(&self, key: &PointKey) -> Option<PatchKind> {
        PatchKind::ALL
            .iter()
            .copied()
            .find(|kind| self.keys_of(*kind).contains(key))
    }

    /// Classifies the patch with the given key, replacing any previous classification
    pub fn set_kind(&mut self, key: PointKey, kind: PatchKind) -> Result<()> {
        if !self.patches.contains_key(&key) {
            bail!("Can't classify patch {}: No such patch", key);
        }
        for other in PatchKind::ALL.iter() {
            self.keys_mut(*other).remove(&key);
        }
        self.keys_mut(kind).insert(key);
        Ok(())
    }

    /// Keys of all patches that are in none of the three sets
    pub fn unclassified(&self) -> impl Iterator<Item = &PointKey> + '_ {
        self.patches
            .keys()
            .filter(move |key| self.kind_of(key).is_none())
    }

    /// Collects the points of all patches into one cloud
    pub fn points(&self) -> PointCloud {
        self.patches
            .values()
            .flat_map(|patch| patch.iter().copied())
            .collect()
    }

    /// Removes all patches and classifications, returning the points of all patches
    pub fn take_points(&mut self) -> Vec<Point> {
        self.regular.clear();
        self.irregular.clear();
        self.isolated.clear();
        std::mem::take(&mut self.patches)
            .into_iter()
            .flat_map(|(_, patch)| patch.into_points())
            .collect()
    }

    /// Colors every classified patch with the color of its kind
    pub fn colorize_by_kind(&mut self) {
        for kind in PatchKind::ALL.iter() {
            let keys = self.keys_of(*kind).iter().copied().collect::<Vec<_>>();
            for key in keys {
                if let Some(patch) = self.patches.get_mut(&key) {
                    patch.set_color(kind.color());
                }
            }
        }
    }

    /// Checks that every classified key refers to an existing patch and that no key is in more than one
    /// set
    pub fn validate(&self) -> Result<()> {
        for kind in PatchKind::ALL.iter() {
            if let Some(missing) = self
                .keys_of(*kind)
                .iter()
                .find(|key| !self.patches.contains_key(*key))
            {
                return Err(anyhow!(
                    "Patch {} is classified as {:?} but does not exist",
                    missing,
                    kind
                ));
            }
        }
        if let Some(shared) = self.regular.intersection(&self.irregular).next() {
            bail!("Patch {} is both regular and irregular", shared);
        }
        if let Some(shared) = self.regular.intersection(&self.isolated).next() {
            bail!("Patch {} is both regular and isolated", shared);
        }
        if let Some(shared) = self.irregular.intersection(&self.isolated).next() {
            bail!("Patch {} is both irregular and isolated", shared);
        }
        Ok(())
    }

    /// Adds `key` to the set of `kind` without any checks. Used by readers that restore a classification
    /// before all patches are known; call [validate](PatchCloud::validate) afterwards
    pub fn classify_unchecked(&mut self, key: PointKey, kind: PatchKind) {
        self.keys_mut(kind).insert(key);
    }
}

impl PointSource for PatchCloud {
    fn len(&self) -> usize {
        self.point_count()
    }

    fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        Box::new(self.patches.values().flat_map(|patch| patch.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn patch_at(x: f64, count: usize) -> PointCloud {
        (0..count)
            .map(|i| Point::new(x, i as f64 * 0.1, 0.0))
            .collect()
    }

    #[test]
    fn test_set_kind_moves_between_sets() {
        let mut patches = PatchCloud::new();
        let key = patches.add(patch_at(0.0, 3)).unwrap();
        assert!(patches.kind_of(&key).is_none());
        assert_eq!(vec![&key], patches.unclassified().collect::<Vec<_>>());

        patches.set_kind(key, PatchKind::Isolated).unwrap();
        patches.set_kind(key, PatchKind::Irregular).unwrap();
        assert_eq!(Some(PatchKind::Irregular), patches.kind_of(&key));
        assert!(patches.isolated().is_empty());
        assert!(patches.validate().is_ok());

        let unknown = Point::new(100.0, 0.0, 0.0).key();
        assert!(patches.set_kind(unknown, PatchKind::Regular).is_err());
    }

    #[test]
    fn test_colliding_patches_are_merged() {
        let mut patches = PatchCloud::new();
        let a = vec![Point::new(-1.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)]
            .into_iter()
            .collect::<PointCloud>();
        let b = vec![Point::new(0.0, -1.0, 0.0), Point::new(0.0, 1.0, 0.0)]
            .into_iter()
            .collect::<PointCloud>();
        let key_a = patches.add_classified(a, PatchKind::Regular).unwrap();
        let key_b = patches.add_classified(b, PatchKind::Isolated).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(1, patches.len());
        assert_eq!(4, patches.point_count());
        assert_eq!(Some(PatchKind::Regular), patches.kind_of(&key_a));
        assert!(patches.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_broken_invariants() {
        let mut patches = PatchCloud::new();
        let key = patches.add(patch_at(0.0, 2)).unwrap();
        patches.classify_unchecked(key, PatchKind::Regular);
        patches.classify_unchecked(key, PatchKind::Isolated);
        assert!(patches.validate().is_err());

        let mut dangling = PatchCloud::new();
        dangling.classify_unchecked(Point::new(1.0, 1.0, 1.0).key(), PatchKind::Irregular);
        assert!(dangling.validate().is_err());
    }

    #[test]
    fn test_colorize_and_take_points() {
        let mut patches = PatchCloud::new();
        patches.add_classified(patch_at(0.0, 2), PatchKind::Regular);
        patches.add_classified(patch_at(5.0, 3), PatchKind::Isolated);
        patches.colorize_by_kind();
        let colors = patches
            .iter()
            .map(|(_, patch)| patch.mean_color().unwrap())
            .collect::<HashSet<_>>();
        assert!(colors.contains(&Color::GREEN));
        assert!(colors.contains(&Color::RED));

        assert_eq!(5, PointSource::len(&patches));
        let points = patches.take_points();
        assert_eq!(5, points.len());
        assert!(patches.is_empty());
        assert!(patches.regular().is_empty());
    }
}
