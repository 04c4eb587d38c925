//! File objects and the per-volume handle table.
//!
//! A file object is allocated empty, filled in by the open path, and lives
//! until its reference count drops back to zero. Objects are only ever
//! removed through [`FileTable::free`], which refuses while references
//! remain.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

use crate::core::{base_name_offset, FileError, FileId, FileResult, PATH_CHAR};

/// One open file or directory.
pub struct FileObject<N> {
    path: String,
    base: usize,
    is_dir: bool,
    is_root: bool,
    pub(crate) offset: u64,
    pub(crate) dir_pos: u64,
    pub(crate) ref_count: usize,
    pub(crate) node: Option<N>,
}

impl<N> FileObject<N> {
    fn new() -> Self {
        Self {
            path: String::new(),
            base: 0,
            is_dir: false,
            is_root: false,
            offset: 0,
            dir_pos: 0,
            ref_count: 0,
            node: None,
        }
    }

    /// Canonical absolute path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the path, borrowed from it. Empty for the root.
    pub fn base_name(&self) -> &str {
        &self.path[self.base..]
    }

    pub fn is_directory(&self) -> bool {
        self.is_dir
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Number of handle references held on this object.
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Byte offset of the next file read or write.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the engine node behind this object still exists.
    pub fn has_node(&self) -> bool {
        self.node.is_some()
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.base = base_name_offset(&path);
        self.is_root = path == "/";
        self.path = path;
    }

    pub(crate) fn set_directory(&mut self, is_dir: bool) {
        self.is_dir = is_dir;
    }
}

/// Table of the file objects open on one volume.
pub struct FileTable<N> {
    files: BTreeMap<FileId, FileObject<N>>,
    next_id: u64,
    capacity: usize,
}

impl<N> FileTable<N> {
    /// Create a table holding at most `capacity` objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            files: BTreeMap::new(),
            next_id: 1,
            capacity,
        }
    }

    /// Allocate an empty object with a reference count of zero.
    pub fn allocate(&mut self) -> FileResult<FileId> {
        if self.files.len() >= self.capacity {
            log::error!("Could not allocate file object: {} open", self.files.len());
            return Err(FileError::OutOfResources);
        }
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(id, FileObject::new());
        Ok(id)
    }

    /// Destroy an object whose reference count is zero.
    ///
    /// Returns whether the object was removed. Freeing an object that is
    /// still referenced, or already gone, does nothing.
    pub fn free(&mut self, id: FileId) -> bool {
        match self.files.get(&id) {
            Some(file) if file.ref_count == 0 => {
                self.files.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Look up an object, `InvalidParameter` for a stale identifier.
    pub fn get(&self, id: FileId) -> FileResult<&FileObject<N>> {
        self.files.get(&id).ok_or(FileError::InvalidParameter)
    }

    pub fn get_mut(&mut self, id: FileId) -> FileResult<&mut FileObject<N>> {
        self.files.get_mut(&id).ok_or(FileError::InvalidParameter)
    }

    /// Find the opened object already tracking `path`.
    pub fn find_by_path(&self, path: &str) -> Option<FileId> {
        self.files
            .iter()
            .find(|(_, file)| file.node.is_some() && file.path == path)
            .map(|(id, _)| *id)
    }

    /// Move every object below the directory `old` under `new`, after the
    /// directory itself was renamed.
    pub(crate) fn rename_subtree(&mut self, old: &str, new: &str) {
        for file in self.files.values_mut() {
            let moved = file
                .path
                .strip_prefix(old)
                .filter(|rest| rest.starts_with(PATH_CHAR))
                .map(|rest| format!("{}{}", new, rest));
            if let Some(path) = moved {
                log::debug!("'{}' moved to '{}'", file.path, path);
                file.set_path(path);
            }
        }
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileObject<N>> {
        self.files.values_mut()
    }
}
