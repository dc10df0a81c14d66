use anyhow::{Context, Result};
use log::{info, warn};
use patchcloud_algorithms::classification::{classify, PatchParameters};
use patchcloud_core::{
    containers::{PatchCloud, PatchKind, PointCloud},
    math::PointKey,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::AsciiLine;
use crate::base::PatchReader;

/// `PatchReader` implementation for ASCII files.
///
/// Every line holds a point `x y z [r g b [nx ny nz [key]]]`, a comment starting with `#` or `/`, or an index
/// line `% <tag> <key>...` that lists the keys of all regular (`r`), irregular (`i`) or isolated (`s`) patches.
/// Points are grouped into patches by their key column. If the file holds at most one patch, the points are
/// split into patches and classified with the [PatchParameters] of this reader.
pub struct AsciiReader<R: BufRead> {
    reader: R,
    params: PatchParameters,
}

impl<R: BufRead> AsciiReader<R> {
    pub fn from_read(read: R) -> Self {
        Self {
            reader: read,
            params: PatchParameters::default(),
        }
    }

    /// Parameters used to classify files that hold at most one patch
    pub fn with_parameters(mut self, params: PatchParameters) -> Self {
        self.params = params;
        self
    }

    pub fn parameters(&self) -> &PatchParameters {
        &self.params
    }
}

impl AsciiReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Ok(Self::from_read(file))
    }
}

impl<R: BufRead> PatchReader for AsciiReader<R> {
    fn read(&mut self) -> Result<PatchCloud> {
        let mut keyed = BTreeMap::<PointKey, PointCloud>::new();
        let mut unkeyed = PointCloud::new();
        let mut index = BTreeMap::<PointKey, PatchKind>::new();

        for (number, line) in (&mut self.reader).lines().enumerate() {
            let line = line.with_context(|| format!("Could not read line {}", number + 1))?;
            let parsed =
                AsciiLine::parse(&line).with_context(|| format!("Invalid line {}", number + 1))?;
            match parsed {
                AsciiLine::Empty | AsciiLine::Comment => {}
                AsciiLine::Index(None, _) => {
                    warn!("Skipping index line {} with an unknown tag", number + 1);
                }
                AsciiLine::Index(Some(kind), keys) => {
                    for key in keys {
                        if let Some(previous) = index.insert(key, kind) {
                            if previous != kind {
                                warn!(
                                    "Patch {} is listed as {:?} and as {:?}, keeping {:?}",
                                    key, previous, kind, kind
                                );
                            }
                        }
                    }
                }
                AsciiLine::Point(point, Some(key)) => {
                    keyed.entry(key).or_default().add(point);
                }
                AsciiLine::Point(point, None) => {
                    unkeyed.add(point);
                }
            }
        }

        let patch_count = keyed.len() + usize::from(!unkeyed.is_empty());
        if patch_count <= 1 {
            let points = keyed
                .into_values()
                .chain(std::iter::once(unkeyed))
                .flat_map(PointCloud::into_points)
                .collect::<PointCloud>();
            info!("Classifying {} points read as a single patch", points.len());
            return Ok(classify(&points, &self.params));
        }

        let mut patches = PatchCloud::new();
        for (key, patch) in keyed {
            patches.insert(key, patch);
        }
        if !unkeyed.is_empty() {
            warn!(
                "{} points have no patch key, adding them as a new patch",
                unkeyed.len()
            );
            patches.add(unkeyed);
        }
        for (key, kind) in index {
            if !patches.contains_key(&key) {
                warn!("Skipping index entry {} without points", key);
                continue;
            }
            patches.classify_unchecked(key, kind);
        }
        let unclassified = patches.unclassified().copied().collect::<Vec<_>>();
        for key in unclassified {
            warn!("Patch {} is not classified, marking it as isolated", key);
            patches.set_kind(key, PatchKind::Isolated)?;
        }
        patches.validate()?;
        Ok(patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::test_data_patches;
    use patchcloud_core::math::Color;
    use std::io::Cursor;

    fn read_str(text: &str) -> Result<PatchCloud> {
        AsciiReader::from_read(Cursor::new(text.as_bytes())).read()
    }

    #[test]
    fn test_read_classified_patches() -> Result<()> {
        let text = "\
# two patches
0\t0\t0\t255\t0\t0\t0\t0\t1\t1_1_1
0.1\t0\t0\t255\t0\t0\t0\t0\t1\t1_1_1
5\t5\t5\t0\t0\t255\t0\t0\t0\t2_2_2
%\tr\t1_1_1
%\ts\t2_2_2
";
        let patches = read_str(text)?;
        let first = "1_1_1".parse::<PointKey>()?;
        let second = "2_2_2".parse::<PointKey>()?;
        assert_eq!(2, patches.len());
        assert_eq!(2, patches.get(&first).map(PointCloud::len).unwrap_or(0));
        assert_eq!(Some(PatchKind::Regular), patches.kind_of(&first));
        assert_eq!(Some(PatchKind::Isolated), patches.kind_of(&second));
        let point = patches.get(&second).unwrap().as_slice()[0];
        assert_eq!(Some(Color::BLUE), point.color);
        assert_eq!(None, point.normal);
        Ok(())
    }

    #[test]
    fn test_unlisted_patches_become_isolated() -> Result<()> {
        let text = "1 2 3 0 0 0 0 0 1 1_0_0\n4 5 6 0 0 0 0 0 1 2_0_0\n%\ti\t1_0_0\n";
        let patches = read_str(text)?;
        assert_eq!(Some(PatchKind::Irregular), patches.kind_of(&"1_0_0".parse()?));
        assert_eq!(Some(PatchKind::Isolated), patches.kind_of(&"2_0_0".parse()?));
        Ok(())
    }

    #[test]
    fn test_single_patch_is_classified() -> Result<()> {
        let text = (0..30)
            .map(|i| format!("{} {} 0", i % 6, i / 6))
            .collect::<Vec<_>>()
            .join("\n");
        let patches = read_str(&text)?;
        patches.validate()?;
        assert_eq!(30, patches.point_count());
        assert_eq!(0, patches.unclassified().count());
        Ok(())
    }

    #[test]
    fn test_invalid_line_reports_line_number() {
        let error = read_str("0 0 0\n1 x 1\n").unwrap_err();
        assert!(format!("{:#}", error).contains("Invalid line 2"));
    }

    #[test]
    fn test_read_written_patches() -> Result<()> {
        let expected = test_data_patches();
        let mut text = Vec::new();
        {
            use crate::{ascii::AsciiWriter, base::PatchWriter};
            let mut writer = AsciiWriter::from_write(&mut text);
            writer.write(&expected)?;
            writer.flush()?;
        }
        let actual = AsciiReader::from_read(Cursor::new(text)).read()?;
        assert_eq!(expected.len(), actual.len());
        for (key, patch) in expected.iter() {
            assert_eq!(expected.kind_of(key), actual.kind_of(key));
            let read = actual.get(key).unwrap();
            assert_eq!(patch.len(), read.len());
            for point in patch.iter() {
                assert!(read.contains(point));
            }
        }
        Ok(())
    }
}
