//! Volume registry for the driver binding layer.
//!
//! The hosting environment installs a volume when it discovers a block
//! device carrying a supported filesystem, and uninstalls it when the device
//! goes away. The registry owns every installed [`Volume`]; the volumes
//! themselves never look at each other.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::DriverConfig;
use crate::core::{FileError, FileResult};
use crate::engine::{BlockIo, FsEngine};
use crate::volume::Volume;

/// Identifier of an installed volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId(u64);

impl VolumeId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Check the first block of `disk` for the configured filesystem signature.
///
/// Returns `Unsupported` when the signature does not match; transport
/// errors are passed through.
pub fn probe_signature<D: BlockIo>(disk: &mut D, config: &DriverConfig) -> FileResult<()> {
    let mut block_size = disk.block_size() as usize;
    if block_size == 0 {
        block_size = config.fallback_block_size as usize;
    }
    let mut block = vec![0u8; block_size];
    disk.read_blocks(0, &mut block)?;

    let signature = config.signature.as_bytes();
    let start = config.signature_offset;
    let found = start
        .checked_add(signature.len())
        .and_then(|end| block.get(start..end));
    match found {
        Some(found) if found == signature => Ok(()),
        _ => Err(FileError::Unsupported),
    }
}

/// All installed volumes.
pub struct VolumeRegistry<E: FsEngine, D: BlockIo> {
    volumes: BTreeMap<VolumeId, Volume<E, D>>,
    next_id: u64,
    config: DriverConfig,
}

impl<E: FsEngine, D: BlockIo> VolumeRegistry<E, D> {
    /// Create an empty registry. Every volume installed later gets a copy of
    /// `config`.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            volumes: BTreeMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Probe `disk` and, if it carries a supported filesystem, expose it.
    ///
    /// Nothing is mounted yet; that waits for the first `open_volume`.
    pub fn install(&mut self, engine: E, mut disk: D) -> FileResult<VolumeId> {
        probe_signature(&mut disk, &self.config)?;

        let id = VolumeId(self.next_id);
        self.next_id += 1;
        log::info!("FSInstall: volume {}", id.0);
        self.volumes
            .insert(id, Volume::new(engine, disk, self.config.clone()));
        Ok(id)
    }

    /// Remove a volume, forcing an unmount if handles are still open.
    ///
    /// Data of operations in flight on those handles may be lost; the
    /// forced unmount is logged as a warning.
    pub fn uninstall(&mut self, id: VolumeId) -> FileResult<Volume<E, D>> {
        let mut volume = self.volumes.remove(&id).ok_or(FileError::NotFound)?;
        log::info!("FSUninstall: volume {}", id.0);
        volume.force_unmount();
        Ok(volume)
    }

    pub fn get(&self, id: VolumeId) -> Option<&Volume<E, D>> {
        self.volumes.get(&id)
    }

    pub fn get_mut(&mut self, id: VolumeId) -> Option<&mut Volume<E, D>> {
        self.volumes.get_mut(&id)
    }

    /// Identifiers of every installed volume, in install order.
    pub fn ids(&self) -> Vec<VolumeId> {
        self.volumes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}
