//! Core types for the file access layer.
//!
//! Defines open modes, file attributes, and the handle values given out to
//! callers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Mode requested when opening a file.
    ///
    /// The only valid combinations are `READ`, `READ | WRITE` and
    /// `CREATE | READ | WRITE`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OpenMode: u64 {
        const READ = 0x0000_0000_0000_0001;
        const WRITE = 0x0000_0000_0000_0002;
        const CREATE = 0x8000_0000_0000_0000;
    }
}

impl OpenMode {
    /// Check that the mode is one of the three accepted combinations.
    pub fn is_valid(self) -> bool {
        self == OpenMode::READ
            || self == OpenMode::READ | OpenMode::WRITE
            || self == OpenMode::CREATE | OpenMode::READ | OpenMode::WRITE
    }

    /// Access mode granted to a handle opened with this mode.
    pub fn access(self) -> AccessMode {
        if self.contains(OpenMode::WRITE) {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        }
    }
}

bitflags! {
    /// File attribute bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileAttributes: u64 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const RESERVED = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

impl FileAttributes {
    /// Attribute bits a caller may set through SetInfo.
    pub const VALID: FileAttributes = FileAttributes::READ_ONLY
        .union(FileAttributes::HIDDEN)
        .union(FileAttributes::SYSTEM)
        .union(FileAttributes::DIRECTORY)
        .union(FileAttributes::ARCHIVE);

    /// Check that no bit outside [`FileAttributes::VALID`] is set.
    pub fn is_valid(self) -> bool {
        FileAttributes::VALID.contains(self)
    }
}

/// Whether a handle value grants read-only or read-write access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read, seek and query only
    ReadOnly,
    /// Full access
    ReadWrite,
}

/// Identifier of a file object inside its volume's handle table.
///
/// Identifiers are never reused for the lifetime of a volume, so a value
/// that outlives its object is detected instead of aliasing a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub(crate) u64);

impl FileId {
    /// Raw identifier value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A handle value as given out to callers.
///
/// One file object may be reachable through two values at once, one per
/// access mode. Both resolve to the same object, path and reference count;
/// the mode travels with the value so that write checks need no extra
/// parameter. Values only come from a successful open; there is no public
/// way to build one or to change the mode of an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FileHandle {
    file: FileId,
    mode: AccessMode,
}

impl FileHandle {
    pub(crate) fn new(file: FileId, mode: AccessMode) -> Self {
        Self { file, mode }
    }

    /// The file object this value refers to.
    pub fn file(&self) -> FileId {
        self.file
    }

    /// Access mode this value was opened with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether this value only grants read access.
    pub fn is_read_only(&self) -> bool {
        self.mode == AccessMode::ReadOnly
    }

    /// The other value addressing the same object with the given mode.
    pub(crate) fn with_mode(&self, mode: AccessMode) -> Self {
        Self::new(self.file, mode)
    }
}
