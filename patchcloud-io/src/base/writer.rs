use anyhow::Result;
use patchcloud_core::containers::PatchCloud;

/// Base trait for all types that support writing patch clouds
pub trait PatchWriter {
    /// Write all patches of `patches` together with their classification
    fn write(&mut self, patches: &PatchCloud) -> Result<()>;
    /// Flush this `PatchWriter`, ensuring that all patches are written to their destination
    fn flush(&mut self) -> Result<()>;
}
