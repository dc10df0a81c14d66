use anyhow::{bail, Context, Result};
use patchcloud_algorithms::classification::PatchParameters;
use patchcloud_core::containers::PatchCloud;
use std::path::Path;

mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;

use crate::ascii::{AsciiReader, AsciiWriter};

/// File extensions of the ASCII format
pub const ASCII_EXTENSIONS: [&str; 4] = ["txt", "xyz", "asc", "pts"];

fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_lowercase());
    match extension {
        Some(extension) if ASCII_EXTENSIONS.contains(&extension.as_str()) => Ok(()),
        Some(extension) => bail!(
            "Unsupported file extension '{}' of file {}",
            extension,
            path.display()
        ),
        None => bail!("File {} has no extension", path.display()),
    }
}

/// Reads all patches of the point cloud file at `path`. The file format is determined from the file extension.
/// Files that hold at most one patch are classified with `params`
pub fn read_all<P: AsRef<Path>>(path: P, params: &PatchParameters) -> Result<PatchCloud> {
    let path = path.as_ref();
    check_extension(path)?;
    let mut reader = AsciiReader::from_path(path)
        .context(format!("Could not open point cloud file {}", path.display()))?
        .with_parameters(*params);
    reader
        .read()
        .context(format!("Could not read point cloud file {}", path.display()))
}

/// Writes all patches of `patches` into the file at `path`. The file format is determined from the file extension
pub fn write_all<P: AsRef<Path>>(patches: &PatchCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    check_extension(path)?;
    let mut writer = AsciiWriter::from_path(path)
        .context(format!("Could not create point cloud file {}", path.display()))?;
    writer.write(patches).context("Failed to write patches")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert!(check_extension(Path::new("cloud.txt")).is_ok());
        assert!(check_extension(Path::new("dir/cloud.XYZ")).is_ok());
        assert!(check_extension(Path::new("cloud.las")).is_err());
        assert!(check_extension(Path::new("cloud")).is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_all("does/not/exist.txt", &PatchParameters::default());
        assert!(result.is_err());
    }
}
