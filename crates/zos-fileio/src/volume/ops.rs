//! File protocol operations.

use alloc::string::String;

use super::{dir, Volume, END_OF_FILE};
use crate::core::{
    decode_volume_label, encode_volume_label, is_reserved_name, is_self_reference, parent_path,
    resolve, AccessMode, DeleteOutcome, FileAttributes, FileError, FileHandle, FileId, FileInfo,
    FileResult, FileSystemInfo, Guid, InfoKind, OpenMode,
};
use crate::engine::{BlockIo, FsEngine};

/// Completion token for the extended operation variants.
///
/// Operations run to completion before returning, so the token is always
/// signalled by the time the call comes back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoToken {
    status: Option<Result<(), FileError>>,
    transferred: usize,
}

impl IoToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_signaled(&self) -> bool {
        self.status.is_some()
    }

    /// Completion status, `None` until signalled.
    pub fn status(&self) -> Option<Result<(), FileError>> {
        self.status
    }

    /// Bytes transferred by the completed operation.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    fn complete(&mut self, result: Result<usize, FileError>) {
        self.transferred = *result.as_ref().unwrap_or(&0);
        self.status = Some(result.map(|_| ()));
    }
}

impl<E: FsEngine, D: BlockIo> Volume<E, D> {
    /// Mount if needed and return a read-write handle on the root directory.
    pub fn open_volume(&mut self) -> FileResult<FileHandle> {
        log::info!("OpenVolume");
        self.mount()?;

        let opened = self.open_root().and_then(|id| {
            self.retain(id)?;
            Ok(id)
        });
        match opened {
            Ok(id) => Ok(FileHandle::new(id, AccessMode::ReadWrite)),
            Err(e) => {
                log::error!("Could not open root directory: {}", e);
                if self.total_refs == 0 {
                    self.unmount();
                }
                Err(e)
            }
        }
    }

    fn open_root(&mut self) -> FileResult<FileId> {
        if let Some(id) = self.files.find_by_path("/") {
            return Ok(id);
        }
        let id = self.files.allocate()?;
        match self.attach(id, String::from("/"), OpenMode::READ, FileAttributes::empty()) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.files.free(id);
                Err(e)
            }
        }
    }

    /// Open or create `name` relative to the directory `parent`.
    pub fn open(
        &mut self,
        parent: FileHandle,
        name: &str,
        mode: OpenMode,
        attributes: FileAttributes,
    ) -> FileResult<FileHandle> {
        let read_only = self.is_read_only();
        let file = self.files.get(parent.file())?;
        log::info!(
            "Open({:?}{}, \"{}\", Mode {:x})",
            parent.file(),
            if file.is_root() { " <ROOT>" } else { "" },
            name,
            mode.bits()
        );

        if !file.has_node() {
            return Err(FileError::DeviceError);
        }
        if read_only && mode != OpenMode::READ {
            log::info!("Invalid mode for read-only media");
            return Err(FileError::WriteProtected);
        }
        if name == ".." && file.is_root() {
            log::info!("Trying to open <ROOT>'s parent");
            return Err(FileError::NotFound);
        }
        if !file.is_directory() {
            log::warn!("Parent is not a directory");
            return Err(FileError::NotFound);
        }
        if !mode.is_valid() {
            return Err(FileError::InvalidParameter);
        }
        if mode.contains(OpenMode::CREATE) && is_reserved_name(name) {
            return Err(FileError::AccessDenied);
        }

        if is_self_reference(name) {
            log::info!(
                "  Reopening {}",
                if file.is_root() { "<ROOT>" } else { file.path() }
            );
            self.retain(parent.file())?;
            return Ok(parent.with_mode(mode.access()));
        }

        let path = resolve(file.path(), name, self.config.path_max)?;

        let fresh = self.files.allocate()?;
        match self.attach(fresh, path, mode, attributes) {
            Ok(id) => {
                self.retain(id)?;
                let handle = FileHandle::new(id, mode.access());
                log::info!("  RET: {:?}", handle);
                Ok(handle)
            }
            Err(e) => {
                self.files.free(fresh);
                Err(e)
            }
        }
    }

    /// Extended open; completes `token` before returning.
    pub fn open_ex(
        &mut self,
        parent: FileHandle,
        name: &str,
        mode: OpenMode,
        attributes: FileAttributes,
        token: &mut IoToken,
    ) -> FileResult<FileHandle> {
        let result = self.open(parent, name, mode, attributes);
        token.complete(result.map(|_| 0));
        result
    }

    /// Bind the freshly allocated object `fresh` to `path`.
    ///
    /// If the path is already open the existing object is returned and
    /// `fresh` is released, so one path never has two reference counts.
    fn attach(
        &mut self,
        fresh: FileId,
        path: String,
        mode: OpenMode,
        attributes: FileAttributes,
    ) -> FileResult<FileId> {
        let create = mode.contains(OpenMode::CREATE);
        if create && path == "/" {
            return Err(FileError::AccessDenied);
        }
        if let Some(existing) = self.files.find_by_path(&path) {
            self.files.free(fresh);
            return Ok(existing);
        }

        let mounted = self.mounted.as_mut().ok_or(FileError::DeviceError)?;
        let file = self.files.get_mut(fresh)?;
        file.set_path(path);

        if create {
            let is_dir = attributes.contains(FileAttributes::DIRECTORY);
            log::info!(
                "Creating {} '{}'",
                if is_dir { "dir" } else { "file" },
                file.path()
            );
            let node = self.engine.create(&mut mounted.volume, file.path(), is_dir)?;
            file.node = Some(node);
            file.set_directory(is_dir);
        } else {
            let opened = self
                .engine
                .open(&mut mounted.volume, file.path())
                .inspect_err(|e| {
                    if !e.is_not_found() {
                        log::error!("Could not open file '{}': {}", file.path(), e);
                    }
                })?;
            file.node = Some(opened.node);
            file.set_directory(opened.is_directory);
        }
        Ok(fresh)
    }

    /// Release one reference. Never fails for a live handle value.
    pub fn close(&mut self, handle: FileHandle) -> FileResult<()> {
        let id = handle.file();
        let file = self.files.get_mut(id)?;
        log::info!(
            "Close({:?}|'{}') {}",
            id,
            file.path(),
            if file.is_root() { "<ROOT>" } else { "" }
        );

        file.ref_count = file.ref_count.saturating_sub(1);
        if file.ref_count == 0 {
            if let (Some(node), Some(mounted)) = (file.node.take(), self.mounted.as_mut()) {
                self.engine.close(&mut mounted.volume, node);
            }
            self.files.free(id);
        }

        self.release_volume_ref();
        Ok(())
    }

    /// Close the handle and, if it held the last reference, remove the
    /// entry.
    ///
    /// The close half always happens once the handle is accepted;
    /// `WarnDeleteFailure` reports that the removal half did not.
    pub fn delete(&mut self, handle: FileHandle) -> FileResult<DeleteOutcome> {
        let id = handle.file();
        let read_only = self.is_read_only();
        let file = self.files.get_mut(id)?;
        log::info!(
            "Delete({:?}|'{}') {}",
            id,
            file.path(),
            if file.is_root() { "<ROOT>" } else { "" }
        );

        if file.is_root() || !file.has_node() {
            return Err(FileError::AccessDenied);
        }

        file.ref_count -= 1;
        let outcome = if file.ref_count > 0 {
            DeleteOutcome::WarnDeleteFailure
        } else {
            let mut outcome = DeleteOutcome::WarnDeleteFailure;
            if let (Some(node), Some(mounted)) = (file.node.take(), self.mounted.as_mut()) {
                if read_only {
                    log::error!("Cannot delete '{}': volume is read-only", file.path());
                    self.engine.close(&mut mounted.volume, node);
                } else {
                    match self.engine.delete(&mut mounted.volume, node) {
                        Ok(()) => outcome = DeleteOutcome::Deleted,
                        Err(e) => log::error!("Could not delete '{}': {}", file.path(), e),
                    }
                }
            }
            self.files.free(id);
            outcome
        };

        self.release_volume_ref();
        Ok(outcome)
    }

    /// Read file bytes at the current offset, or one directory entry.
    ///
    /// Returns the number of bytes placed in `buf`; for a directory, 0 once
    /// every entry has been returned.
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> FileResult<usize> {
        let file = self.files.get_mut(handle.file())?;
        log::debug!(
            "Read({:?}|'{}', {}) {}",
            handle.file(),
            file.path(),
            buf.len(),
            if file.is_directory() { "<DIR>" } else { "" }
        );

        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        let mounted = self.mounted.as_mut().ok_or(FileError::DeviceError)?;

        if file.is_directory() {
            return dir::read_next(&self.engine, &mounted.volume, node, &mut file.dir_pos, buf);
        }

        let read = self
            .engine
            .read(&mut mounted.volume, node, file.offset, buf)?;
        file.offset += read as u64;
        Ok(read)
    }

    /// Extended read; completes `token` before returning.
    pub fn read_ex(
        &mut self,
        handle: FileHandle,
        buf: &mut [u8],
        token: &mut IoToken,
    ) -> FileResult<usize> {
        let result = self.read(handle, buf);
        token.complete(result);
        result
    }

    /// Write `data` at the current offset.
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> FileResult<usize> {
        let read_only = self.is_read_only();
        let file = self.files.get_mut(handle.file())?;
        log::debug!(
            "Write({:?}|'{}', {}) {}",
            handle.file(),
            file.path(),
            data.len(),
            if file.is_directory() { "<DIR>" } else { "" }
        );

        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        if handle.is_read_only() {
            return Err(FileError::AccessDenied);
        }
        if read_only {
            return Err(FileError::WriteProtected);
        }
        if file.is_directory() {
            return Err(FileError::Unsupported);
        }

        let mounted = self.mounted.as_mut().ok_or(FileError::DeviceError)?;
        let written = self
            .engine
            .write(&mut mounted.volume, node, file.offset, data)?;
        file.offset += written as u64;
        Ok(written)
    }

    /// Extended write; completes `token` before returning.
    pub fn write_ex(
        &mut self,
        handle: FileHandle,
        data: &[u8],
        token: &mut IoToken,
    ) -> FileResult<usize> {
        let result = self.write(handle, data);
        token.complete(result);
        result
    }

    /// Move the file offset, [`END_OF_FILE`] seeking to the end.
    ///
    /// Directories only accept 0, which restarts enumeration.
    pub fn set_position(&mut self, handle: FileHandle, position: u64) -> FileResult<()> {
        let file = self.files.get_mut(handle.file())?;
        log::info!(
            "SetPosition({:?}|'{}', {}) {}",
            handle.file(),
            file.path(),
            position,
            if file.is_directory() { "<DIR>" } else { "" }
        );

        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        if file.is_directory() {
            if position != 0 {
                return Err(FileError::Unsupported);
            }
            file.dir_pos = 0;
            return Ok(());
        }

        let mounted = self.mounted.as_ref().ok_or(FileError::DeviceError)?;
        let size = self.engine.file_size(&mounted.volume, node);
        let position = if position == END_OF_FILE { size } else { position };
        if position > size {
            log::error!(
                "'{}': Cannot seek to #{:x} of {:x}",
                file.path(),
                position,
                size
            );
            return Err(FileError::Unsupported);
        }

        file.offset = position;
        log::debug!("'{}': Position set to {:x}", file.path(), position);
        Ok(())
    }

    /// Current file offset. Not available on directories.
    pub fn get_position(&self, handle: FileHandle) -> FileResult<u64> {
        let file = self.files.get(handle.file())?;
        log::info!("GetPosition({:?}|'{}')", handle.file(), file.path());

        if !file.has_node() {
            return Err(FileError::DeviceError);
        }
        if file.is_directory() {
            return Err(FileError::Unsupported);
        }
        Ok(file.offset)
    }

    /// Encode the information of kind `info_type` into `buf`.
    ///
    /// An undersized buffer yields `BufferTooSmall` with the exact size to
    /// retry with, and `buf` is left as it was.
    pub fn get_info(
        &self,
        handle: FileHandle,
        info_type: &Guid,
        buf: &mut [u8],
    ) -> FileResult<usize> {
        let read_only = self.is_read_only();
        let file = self.files.get(handle.file())?;
        log::info!(
            "GetInfo({:?}|'{}', {}) {}",
            handle.file(),
            file.path(),
            buf.len(),
            if file.is_directory() { "<DIR>" } else { "" }
        );

        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        let mounted = self.mounted.as_ref().ok_or(FileError::DeviceError)?;
        let label = self.label.as_deref().unwrap_or("");

        match InfoKind::from_guid(info_type) {
            Some(InfoKind::File) => {
                log::trace!("Get regular file information");
                let required = FileInfo::encoded_len(file.base_name());
                if buf.len() < required {
                    return Err(FileError::BufferTooSmall { required });
                }
                let meta = self
                    .engine
                    .metadata(&mounted.volume, node, None, file.is_directory())
                    .inspect_err(|e| log::error!("Could not get file info: {}", e))?;
                FileInfo::from_metadata(file.base_name(), meta).encode(buf)
            }
            Some(InfoKind::FileSystem) => {
                log::trace!("Get file system information");
                let required = FileSystemInfo::encoded_len(label);
                if buf.len() < required {
                    return Err(FileError::BufferTooSmall { required });
                }

                let mut block_size = self.disk.block_size();
                if block_size == 0 {
                    log::warn!("Corrected media block size");
                    block_size = self.config.fallback_block_size;
                }
                let volume_size = self
                    .disk
                    .last_block()
                    .checked_add(1)
                    .and_then(|blocks| blocks.checked_mul(u64::from(block_size)))
                    .ok_or_else(|| {
                        log::error!("Media geometry out of range");
                        FileError::DeviceError
                    })?;
                let info = FileSystemInfo {
                    read_only,
                    volume_size,
                    free_space: self.engine.free_space(&mounted.volume),
                    block_size,
                    volume_label: String::from(label),
                };
                info.encode(buf)
            }
            Some(InfoKind::VolumeLabel) => {
                log::trace!("Get volume label");
                if !file.is_root() {
                    return Err(FileError::AccessDenied);
                }
                encode_volume_label(label, buf)
            }
            None => {
                log::error!(
                    "'{}': Cannot get information of type {:?}",
                    file.path(),
                    info_type
                );
                Err(FileError::Unsupported)
            }
        }
    }

    /// Apply information of kind `info_type` decoded from `data`.
    pub fn set_info(
        &mut self,
        handle: FileHandle,
        info_type: &Guid,
        data: &[u8],
    ) -> FileResult<()> {
        let read_only = self.is_read_only();
        let file = self.files.get_mut(handle.file())?;
        log::info!(
            "SetInfo({:?}|'{}', {}) {}",
            handle.file(),
            file.path(),
            data.len(),
            if file.is_directory() { "<DIR>" } else { "" }
        );

        if read_only {
            return Err(FileError::WriteProtected);
        }
        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        if handle.is_read_only() {
            return Err(FileError::AccessDenied);
        }
        let mounted = self.mounted.as_mut().ok_or(FileError::DeviceError)?;

        let label = match InfoKind::from_guid(info_type) {
            Some(InfoKind::File) => {
                log::trace!("Set regular file information");
                let info = FileInfo::decode(data)?;
                if !info.attribute.is_valid() {
                    return Err(FileError::InvalidParameter);
                }

                let new_path = if info.file_name.is_empty() || info.file_name == file.base_name()
                {
                    None
                } else if file.is_root() {
                    return Err(FileError::AccessDenied);
                } else {
                    let target =
                        resolve(parent_path(file.path()), &info.file_name, self.config.path_max)?;
                    (target != file.path()).then_some(target)
                };

                self.engine
                    .set_metadata(&mut mounted.volume, node, &info, new_path.as_deref())
                    .inspect_err(|e| log::error!("Could not set file info: {}", e))?;
                if let Some(path) = new_path {
                    if file.is_directory() {
                        let old = String::from(file.path());
                        self.files.rename_subtree(&old, &path);
                    }
                    self.files.get_mut(handle.file())?.set_path(path);
                }
                return Ok(());
            }
            Some(InfoKind::FileSystem) => {
                log::trace!("Set volume label (FS)");
                if !file.is_root() {
                    return Err(FileError::AccessDenied);
                }
                FileSystemInfo::decode(data)?.volume_label
            }
            Some(InfoKind::VolumeLabel) => {
                log::trace!("Set volume label (VL)");
                if !file.is_root() {
                    return Err(FileError::AccessDenied);
                }
                decode_volume_label(data)?
            }
            None => {
                log::error!(
                    "'{}': Cannot set information of type {:?}",
                    file.path(),
                    info_type
                );
                return Err(FileError::Unsupported);
            }
        };

        self.engine.rename_volume(&mut mounted.volume, &label)?;
        self.label = Some(label);
        Ok(())
    }

    /// Push pending modifications to disk.
    pub fn flush(&mut self, handle: FileHandle) -> FileResult<()> {
        let read_only = self.is_read_only();
        let file = self.files.get(handle.file())?;
        log::info!("Flush({:?}|'{}')", handle.file(), file.path());

        let node = file.node.as_ref().ok_or(FileError::DeviceError)?;
        if handle.is_read_only() {
            return Err(FileError::AccessDenied);
        }
        if read_only {
            return Ok(());
        }

        let mounted = self.mounted.as_mut().ok_or(FileError::DeviceError)?;
        self.engine.flush(&mut mounted.volume, node)
    }

    /// Extended flush; completes `token` before returning.
    pub fn flush_ex(&mut self, handle: FileHandle, token: &mut IoToken) -> FileResult<()> {
        let result = self.flush(handle);
        token.complete(result.map(|()| 0));
        result
    }
}
