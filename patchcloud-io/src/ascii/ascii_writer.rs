use anyhow::{Context, Result};
use patchcloud_core::containers::{PatchCloud, PatchKind};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{format_index, format_point};
use crate::base::PatchWriter;

/// Order in which the index lines are written
const INDEX_ORDER: [PatchKind; 3] = [
    PatchKind::Irregular,
    PatchKind::Regular,
    PatchKind::Isolated,
];

/// `PatchWriter` implementation for ASCII files. Writes one tab separated line `x y z r g b nx ny nz key` per
/// point, grouped by patch, followed by one index line per non-empty patch kind. Points without a color are
/// written white, points without a normal get a zero normal
pub struct AsciiWriter<W: Write> {
    writer: W,
    precision: Option<usize>,
}

impl<W: Write> AsciiWriter<W> {
    pub fn from_write(write: W) -> Self {
        Self {
            writer: write,
            precision: None,
        }
    }

    /// Number of decimals of coordinates and normals. With `None`, values are written with as many decimals as
    /// are needed to read them back unchanged
    pub fn set_precision(&mut self, precision: Option<usize>) {
        self.precision = precision;
    }

    pub fn precision(&self) -> Option<usize> {
        self.precision
    }

    /// Flushes this writer and returns the underlying `Write`
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl AsciiWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(Self::from_write(file))
    }
}

impl<W: Write> PatchWriter for AsciiWriter<W> {
    fn write(&mut self, patches: &PatchCloud) -> Result<()> {
        for (key, patch) in patches.iter() {
            for point in patch.iter() {
                writeln!(self.writer, "{}", format_point(point, key, self.precision))
                    .with_context(|| format!("Could not write point of patch {}", key))?;
            }
        }
        for kind in INDEX_ORDER.iter() {
            if let Some(line) = format_index(*kind, patches.keys_of(*kind)) {
                writeln!(self.writer, "{}", line)
                    .with_context(|| format!("Could not write the index of {:?} patches", kind))?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::test_data_patches;
    use patchcloud_core::{
        containers::PointCloud,
        math::{Color, Point},
    };

    #[test]
    fn test_write_lines() -> Result<()> {
        let mut patches = PatchCloud::new();
        let patch = vec![Point::new(1.0, 2.0, 3.0).with_color(Color::GREEN)]
            .into_iter()
            .collect::<PointCloud>();
        let key = patches
            .add_classified(patch, PatchKind::Regular)
            .ok_or_else(|| anyhow::anyhow!("empty patch"))?;

        let mut writer = AsciiWriter::from_write(Vec::new());
        writer.write(&patches)?;
        let text = String::from_utf8(writer.into_inner()?)?;
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            vec![
                format!("1\t2\t3\t0\t255\t0\t0\t0\t0\t{}", key),
                format!("%\tr\t{}", key),
            ],
            lines
        );
        Ok(())
    }

    #[test]
    fn test_index_lines_follow_points() -> Result<()> {
        let patches = test_data_patches();
        let mut writer = AsciiWriter::from_write(Vec::new());
        writer.set_precision(Some(5));
        writer.write(&patches)?;
        let text = String::from_utf8(writer.into_inner()?)?;
        let lines = text.lines().collect::<Vec<_>>();
        let index_lines = lines.iter().filter(|line| line.starts_with('%')).count();
        assert_eq!(3, index_lines);
        assert_eq!(patches.point_count() + 3, lines.len());
        assert!(lines[..patches.point_count()]
            .iter()
            .all(|line| line.split('\t').count() == 10));
        assert!(lines[patches.point_count()].starts_with("%\ti"));
        Ok(())
    }
}
