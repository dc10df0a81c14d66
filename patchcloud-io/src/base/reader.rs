use anyhow::Result;
use patchcloud_core::containers::PatchCloud;

/// Base trait for all types that support reading patch clouds
pub trait PatchReader {
    /// Reads all remaining patches from this `PatchReader`. The classification of the returned patches is
    /// complete, i.e. every patch is regular, irregular or isolated
    fn read(&mut self) -> Result<PatchCloud>;
}
