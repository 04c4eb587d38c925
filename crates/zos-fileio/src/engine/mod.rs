//! Collaborator interfaces: the filesystem engine and the block transport.
//!
//! The handle layer owns no on-disk knowledge. Inode lookup, extents,
//! journaling and directory traversal all live behind [`FsEngine`]; raw
//! sector access lives behind [`BlockIo`]. Both are injected by the hosting
//! environment.

use alloc::string::String;

use crate::core::{FileInfo, FileResult, NodeMetadata};

/// Inode number of the filesystem root directory.
pub const FILE_ROOT: u64 = 5;

/// First inode number that belongs to user data rather than filesystem
/// metadata.
pub const FILE_FIRST_USER: u64 = 16;

/// Longest entry name the on-disk format allows, in UTF-16 code units.
pub const MAX_NAME_LEN: usize = 255;

/// Block device transport.
pub trait BlockIo {
    /// Size of one block in bytes. Some transports report 0.
    fn block_size(&self) -> u32;

    /// Index of the last addressable block.
    fn last_block(&self) -> u64;

    /// Read whole blocks starting at `lba` into `buf`.
    fn read_blocks(&mut self, lba: u64, buf: &mut [u8]) -> FileResult<()>;
}

/// State returned by a successful mount.
pub struct MountedVolume<V> {
    /// Engine-owned volume object, valid until handed back to `unmount`
    pub volume: V,
    /// Volume label, if the volume has one
    pub label: Option<String>,
    /// Volume serial number
    pub serial: u64,
}

/// A node opened by the engine.
pub struct OpenedNode<N> {
    pub node: N,
    pub is_directory: bool,
}

/// One raw directory entry as visited by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirRecord {
    /// Entry name
    pub name: String,
    /// Inode number the entry points to
    pub inode: u64,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Enumeration position just past this entry
    pub next_position: u64,
}

/// Filesystem engine primitives.
///
/// Node objects are owned by the caller between `open`/`create` and the
/// matching `close`/`delete`, which consume them.
pub trait FsEngine {
    /// Engine-owned state of a mounted volume.
    type Volume;

    /// Engine-owned state of an open file or directory.
    type Node;

    /// Mount the volume found on `disk`.
    fn mount(&mut self, disk: &mut dyn BlockIo) -> FileResult<MountedVolume<Self::Volume>>;

    /// Unmount, flushing anything the engine still holds.
    fn unmount(&mut self, volume: Self::Volume);

    /// Open an existing entry by absolute path.
    fn open(&mut self, volume: &mut Self::Volume, path: &str) -> FileResult<OpenedNode<Self::Node>>;

    /// Create an entry by absolute path, or open it if it already exists.
    fn create(
        &mut self,
        volume: &mut Self::Volume,
        path: &str,
        is_directory: bool,
    ) -> FileResult<Self::Node>;

    /// Release a node.
    fn close(&mut self, volume: &mut Self::Volume, node: Self::Node);

    /// Remove the entry behind `node`. The node is released either way.
    fn delete(&mut self, volume: &mut Self::Volume, node: Self::Node) -> FileResult<()>;

    /// Read file bytes at `offset`, returning how many were read.
    fn read(
        &mut self,
        volume: &mut Self::Volume,
        node: &Self::Node,
        offset: u64,
        buf: &mut [u8],
    ) -> FileResult<usize>;

    /// Write file bytes at `offset`, returning how many were written.
    fn write(
        &mut self,
        volume: &mut Self::Volume,
        node: &Self::Node,
        offset: u64,
        data: &[u8],
    ) -> FileResult<usize>;

    /// Push pending modifications of `node` to disk.
    fn flush(&mut self, volume: &mut Self::Volume, node: &Self::Node) -> FileResult<()>;

    /// Visit the directory entry at `position`, `None` past the last one.
    fn read_dir(
        &self,
        volume: &Self::Volume,
        node: &Self::Node,
        position: u64,
    ) -> FileResult<Option<DirRecord>>;

    /// Metadata of `node` itself, or of the entry `inode` inside directory
    /// `node`. `is_directory` tells the engine which kind to report.
    fn metadata(
        &self,
        volume: &Self::Volume,
        node: &Self::Node,
        inode: Option<u64>,
        is_directory: bool,
    ) -> FileResult<NodeMetadata>;

    /// Apply caller-supplied size, attributes and times. `new_path` is set
    /// when the entry should also move.
    ///
    /// Only called through a read-write handle value on a writable volume.
    fn set_metadata(
        &mut self,
        volume: &mut Self::Volume,
        node: &Self::Node,
        info: &FileInfo,
        new_path: Option<&str>,
    ) -> FileResult<()>;

    /// Current size of the file behind `node`.
    fn file_size(&self, volume: &Self::Volume, node: &Self::Node) -> u64;

    /// Free bytes on the volume.
    fn free_space(&self, volume: &Self::Volume) -> u64;

    /// Whether the volume refuses writes.
    fn is_read_only(&self, volume: &Self::Volume) -> bool;

    /// Change the volume label.
    fn rename_volume(&mut self, volume: &mut Self::Volume, label: &str) -> FileResult<()>;
}
