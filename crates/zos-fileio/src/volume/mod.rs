//! Volume lifecycle and the file protocol surface.
//!
//! A volume is mounted only while at least one handle is open on it. The
//! hosting environment can lose power at any moment without notice, so the
//! filesystem is kept mounted for as short a time as possible:
//!
//! ```text
//!   Unmounted ──open_volume──▶ Mounted ──last close/delete──▶ Unmounted
//! ```
//!
//! Every successful open (including a reopen of `.` and the root) adds one
//! reference to both the file object and the volume total; every close or
//! delete removes one from each. The total reaching zero unmounts.

mod dir;
mod ops;

use alloc::string::String;

use crate::config::DriverConfig;
use crate::core::{FileHandle, FileId, FileResult};
use crate::engine::{BlockIo, FsEngine, MountedVolume};
use crate::handle::{FileObject, FileTable};

pub use dir::{is_listed, DirEntries};
pub use ops::IoToken;

/// Position that seeks a file to its end.
pub const END_OF_FILE: u64 = u64::MAX;

/// One discovered volume and the handles open on it.
pub struct Volume<E: FsEngine, D: BlockIo> {
    engine: E,
    disk: D,
    config: DriverConfig,
    mounted: Option<MountedVolume<E::Volume>>,
    label: Option<String>,
    serial: u64,
    total_refs: usize,
    files: FileTable<E::Node>,
}

impl<E: FsEngine, D: BlockIo> Volume<E, D> {
    /// Wrap a discovered volume. Nothing is mounted until the root is
    /// requested.
    pub fn new(engine: E, disk: D, config: DriverConfig) -> Self {
        let files = FileTable::new(config.max_open_files);
        Self {
            engine,
            disk,
            config,
            mounted: None,
            label: None,
            serial: 0,
            total_refs: 0,
            files,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Sum of the reference counts of every object open on the volume.
    pub fn total_ref_count(&self) -> usize {
        self.total_refs
    }

    /// Label captured at mount time, refreshed by renames.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Number of live file objects.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// The file object behind a handle value.
    pub fn file(&self, handle: FileHandle) -> FileResult<&FileObject<E::Node>> {
        self.files.get(handle.file())
    }

    /// Whether writes are refused, by configuration or by the engine.
    pub fn is_read_only(&self) -> bool {
        self.config.force_read_only
            || self
                .mounted
                .as_ref()
                .is_some_and(|m| self.engine.is_read_only(&m.volume))
    }

    fn mount(&mut self) -> FileResult<()> {
        if self.mounted.is_some() {
            return Ok(());
        }
        let mounted = self
            .engine
            .mount(&mut self.disk)
            .inspect_err(|e| log::error!("Could not mount volume: {}", e))?;
        log::info!(
            "Mounted volume '{}' (serial {:016x})",
            mounted.label.as_deref().unwrap_or(""),
            mounted.serial
        );
        self.label = mounted.label.clone();
        self.serial = mounted.serial;
        self.mounted = Some(mounted);
        Ok(())
    }

    fn unmount(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            log::info!("Unmounting volume");
            self.engine.unmount(mounted.volume);
        }
    }

    /// Add one reference to `id` and to the volume total.
    fn retain(&mut self, id: FileId) -> FileResult<()> {
        self.files.get_mut(id)?.ref_count += 1;
        self.total_refs += 1;
        log::trace!("TotalRefCount = {}", self.total_refs);
        Ok(())
    }

    /// Drop one reference from the volume total, unmounting at zero.
    fn release_volume_ref(&mut self) {
        self.total_refs = self.total_refs.saturating_sub(1);
        log::trace!("TotalRefCount = {}", self.total_refs);
        if self.total_refs == 0 {
            log::info!("Last file instance: unmounting volume");
            self.unmount();
        }
    }

    /// Unmount regardless of open handles.
    ///
    /// Every engine node is released first; surviving handle values keep
    /// their objects but fail with `DeviceError` from then on. Returns the
    /// number of references that were still outstanding.
    pub fn force_unmount(&mut self) -> usize {
        let outstanding = self.total_refs;
        if outstanding > 0 {
            log::warn!(
                "Files are still open on this volume ({} references)! Forcing unmount...",
                outstanding
            );
        }
        if let Some(mounted) = self.mounted.as_mut() {
            for file in self.files.iter_mut() {
                if let Some(node) = file.node.take() {
                    self.engine.close(&mut mounted.volume, node);
                }
            }
        }
        self.unmount();
        outstanding
    }
}
