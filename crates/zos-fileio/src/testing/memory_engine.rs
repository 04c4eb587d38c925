//! In-memory filesystem engine with NTFS-style inode numbering.
//!
//! Inodes below 16 are reserved for filesystem metadata; the root directory
//! is inode 5. Every directory enumerates `.` and `..` before its children,
//! which come back in name order.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::core::{FileAttributes, FileError, FileInfo, FileResult, NodeMetadata, Time};
use crate::engine::{
    BlockIo, DirRecord, FsEngine, MountedVolume, OpenedNode, FILE_FIRST_USER, FILE_ROOT,
    MAX_NAME_LEN,
};

const CLUSTER_SIZE: u64 = 4096;

/// Metadata files present on every fresh volume, root excluded.
const SYSTEM_FILES: [(u64, &str); 11] = [
    (0, "$MFT"),
    (1, "$MFTMirr"),
    (2, "$LogFile"),
    (3, "$Volume"),
    (4, "$AttrDef"),
    (6, "$Bitmap"),
    (7, "$Boot"),
    (8, "$BadClus"),
    (9, "$Secure"),
    (10, "$UpCase"),
    (11, "$Extend"),
];

struct MemNode {
    name: String,
    parent: u64,
    is_dir: bool,
    data: Vec<u8>,
    attribute: FileAttributes,
    create_time: Time,
    last_access_time: Time,
    modification_time: Time,
    children: BTreeMap<String, u64>,
}

impl MemNode {
    fn new(name: &str, parent: u64, is_dir: bool) -> Self {
        let mut attribute = FileAttributes::ARCHIVE;
        attribute.set(FileAttributes::DIRECTORY, is_dir);
        Self {
            name: String::from(name),
            parent,
            is_dir,
            data: Vec::new(),
            attribute,
            create_time: Time::default(),
            last_access_time: Time::default(),
            modification_time: Time::default(),
            children: BTreeMap::new(),
        }
    }
}

/// Engine state of a mounted [`MemoryEngine`] volume.
#[derive(Debug)]
pub struct MemMount {
    serial: u64,
}

impl MemMount {
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Engine node handed out by [`MemoryEngine`].
#[derive(Debug, PartialEq, Eq)]
pub struct MemNodeRef {
    inode: u64,
}

impl MemNodeRef {
    pub fn inode(&self) -> u64 {
        self.inode
    }
}

/// Filesystem engine keeping every node in memory.
pub struct MemoryEngine {
    nodes: BTreeMap<u64, MemNode>,
    next_inode: u64,
    capacity: u64,
    read_only: bool,
    label: Option<String>,
    serial: u64,
    mount_failure: Option<FileError>,
    delete_failure: Option<FileError>,
    mounted: bool,
    mounts: usize,
    unmounts: usize,
    open_nodes: usize,
    flushes: usize,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create an empty volume holding only the metadata files.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        let mut root = MemNode::new("", FILE_ROOT, true);
        root.attribute |= FileAttributes::HIDDEN | FileAttributes::SYSTEM;
        for (inode, name) in SYSTEM_FILES {
            let mut node = MemNode::new(name, FILE_ROOT, false);
            node.attribute |= FileAttributes::HIDDEN | FileAttributes::SYSTEM;
            root.children.insert(String::from(name), inode);
            nodes.insert(inode, node);
        }
        nodes.insert(FILE_ROOT, root);

        Self {
            nodes,
            next_inode: FILE_FIRST_USER,
            capacity: 64 * 1024 * 1024,
            read_only: false,
            label: None,
            serial: 0x1234_5678_9abc_def0,
            mount_failure: None,
            delete_failure: None,
            mounted: false,
            mounts: 0,
            unmounts: 0,
            open_nodes: 0,
            flushes: 0,
        }
    }

    /// Add a file with `contents`, creating missing parent directories.
    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        let inode = self.insert_all(path, false);
        if let Some(node) = self.nodes.get_mut(&inode) {
            node.data = contents.to_vec();
        }
        self
    }

    /// Add a directory, creating missing parents.
    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert_all(path, true);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(String::from(label));
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Make the next mounts fail with `error`, or succeed again with `None`.
    pub fn set_mount_failure(&mut self, error: Option<FileError>) {
        self.mount_failure = error;
    }

    /// Make deletes fail with `error` after releasing the node.
    pub fn set_delete_failure(&mut self, error: Option<FileError>) {
        self.delete_failure = error;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn mount_count(&self) -> usize {
        self.mounts
    }

    pub fn unmount_count(&self) -> usize {
        self.unmounts
    }

    /// Nodes opened and not yet closed or deleted.
    pub fn open_node_count(&self) -> usize {
        self.open_nodes
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Whether `path` names an existing entry.
    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Contents of the file at `path`.
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        let node = self.nodes.get(&self.lookup(path)?)?;
        (!node.is_dir).then_some(node.data.as_slice())
    }

    fn components(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|c| !c.is_empty())
    }

    fn lookup(&self, path: &str) -> Option<u64> {
        let mut inode = FILE_ROOT;
        for name in Self::components(path) {
            inode = *self.nodes.get(&inode)?.children.get(name)?;
        }
        Some(inode)
    }

    fn split(path: &str) -> (&str, &str) {
        let path = path.trim_end_matches('/');
        match path.rfind('/') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => ("", path),
        }
    }

    /// Link a new node named `name` under the directory `parent`.
    fn link(&mut self, parent: u64, name: &str, is_dir: bool) -> FileResult<u64> {
        if name.encode_utf16().count() > MAX_NAME_LEN {
            return Err(FileError::InvalidParameter);
        }
        let inode = self.next_inode;
        let dir = self
            .nodes
            .get_mut(&parent)
            .filter(|n| n.is_dir)
            .ok_or(FileError::NotFound)?;
        dir.children.insert(String::from(name), inode);
        self.nodes.insert(inode, MemNode::new(name, parent, is_dir));
        self.next_inode += 1;
        Ok(inode)
    }

    fn insert_all(&mut self, path: &str, is_dir: bool) -> u64 {
        let names: Vec<&str> = Self::components(path).collect();
        let mut inode = FILE_ROOT;
        for (i, name) in names.iter().enumerate() {
            let last = i + 1 == names.len();
            let existing = self
                .nodes
                .get(&inode)
                .and_then(|n| n.children.get(*name).copied());
            inode = match existing {
                Some(child) => child,
                None => match self.link(inode, name, is_dir || !last) {
                    Ok(child) => child,
                    Err(_) => return inode,
                },
            };
        }
        inode
    }

    fn node(&self, inode: u64) -> FileResult<&MemNode> {
        self.nodes.get(&inode).ok_or(FileError::VolumeCorrupted)
    }

    fn used_space(&self) -> u64 {
        self.nodes
            .values()
            .map(|n| (n.data.len() as u64).div_ceil(CLUSTER_SIZE) * CLUSTER_SIZE)
            .sum()
    }

    fn move_node(&mut self, inode: u64, new_path: &str) -> FileResult<()> {
        if self.lookup(new_path).is_some() {
            return Err(FileError::AccessDenied);
        }
        let (dir, name) = Self::split(new_path);
        let new_parent = self
            .lookup(dir)
            .filter(|p| self.nodes.get(p).is_some_and(|n| n.is_dir))
            .ok_or(FileError::NotFound)?;

        let node = self.nodes.get_mut(&inode).ok_or(FileError::VolumeCorrupted)?;
        let old_parent = node.parent;
        let old_name = core::mem::replace(&mut node.name, String::from(name));
        node.parent = new_parent;

        if let Some(p) = self.nodes.get_mut(&old_parent) {
            p.children.remove(&old_name);
        }
        if let Some(p) = self.nodes.get_mut(&new_parent) {
            p.children.insert(String::from(name), inode);
        }
        Ok(())
    }
}

impl FsEngine for MemoryEngine {
    type Volume = MemMount;
    type Node = MemNodeRef;

    fn mount(&mut self, disk: &mut dyn BlockIo) -> FileResult<MountedVolume<MemMount>> {
        if let Some(e) = self.mount_failure {
            return Err(e);
        }
        let block_size = match disk.block_size() {
            0 => 512,
            bs => bs as usize,
        };
        let mut boot = vec![0u8; block_size];
        disk.read_blocks(0, &mut boot)?;

        self.mounted = true;
        self.mounts += 1;
        Ok(MountedVolume {
            volume: MemMount {
                serial: self.serial,
            },
            label: self.label.clone(),
            serial: self.serial,
        })
    }

    fn unmount(&mut self, _volume: MemMount) {
        self.mounted = false;
        self.unmounts += 1;
    }

    fn open(&mut self, _volume: &mut MemMount, path: &str) -> FileResult<OpenedNode<MemNodeRef>> {
        let inode = self.lookup(path).ok_or(FileError::NotFound)?;
        let is_directory = self.node(inode)?.is_dir;
        self.open_nodes += 1;
        Ok(OpenedNode {
            node: MemNodeRef { inode },
            is_directory,
        })
    }

    fn create(
        &mut self,
        volume: &mut MemMount,
        path: &str,
        is_directory: bool,
    ) -> FileResult<MemNodeRef> {
        if self.lookup(path).is_some() {
            return self.open(volume, path).map(|opened| opened.node);
        }
        if self.read_only {
            return Err(FileError::WriteProtected);
        }
        let (dir, name) = Self::split(path);
        let parent = self.lookup(dir).ok_or(FileError::NotFound)?;
        let inode = self.link(parent, name, is_directory)?;
        self.open_nodes += 1;
        Ok(MemNodeRef { inode })
    }

    fn close(&mut self, _volume: &mut MemMount, _node: MemNodeRef) {
        self.open_nodes -= 1;
    }

    fn delete(&mut self, _volume: &mut MemMount, node: MemNodeRef) -> FileResult<()> {
        self.open_nodes -= 1;
        if let Some(e) = self.delete_failure {
            return Err(e);
        }
        let target = self.node(node.inode)?;
        if !target.children.is_empty() {
            return Err(FileError::AccessDenied);
        }
        let parent = target.parent;
        if let Some(removed) = self.nodes.remove(&node.inode) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.remove(&removed.name);
            }
        }
        Ok(())
    }

    fn read(
        &mut self,
        _volume: &mut MemMount,
        node: &MemNodeRef,
        offset: u64,
        buf: &mut [u8],
    ) -> FileResult<usize> {
        let file = self.node(node.inode)?;
        if file.is_dir {
            return Err(FileError::Unsupported);
        }
        let start = (offset as usize).min(file.data.len());
        let count = buf.len().min(file.data.len() - start);
        buf[..count].copy_from_slice(&file.data[start..start + count]);
        Ok(count)
    }

    fn write(
        &mut self,
        _volume: &mut MemMount,
        node: &MemNodeRef,
        offset: u64,
        data: &[u8],
    ) -> FileResult<usize> {
        if self.read_only {
            return Err(FileError::WriteProtected);
        }
        let file = self
            .nodes
            .get_mut(&node.inode)
            .ok_or(FileError::VolumeCorrupted)?;
        if file.is_dir {
            return Err(FileError::Unsupported);
        }
        let start = offset as usize;
        let end = start + data.len();
        if file.data.len() < end {
            file.data.resize(end, 0);
        }
        file.data[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self, _volume: &mut MemMount, _node: &MemNodeRef) -> FileResult<()> {
        self.flushes += 1;
        Ok(())
    }

    fn read_dir(
        &self,
        _volume: &MemMount,
        node: &MemNodeRef,
        position: u64,
    ) -> FileResult<Option<DirRecord>> {
        let dir = self.node(node.inode)?;
        if !dir.is_dir {
            return Err(FileError::Unsupported);
        }
        let entry = match position {
            0 => Some((String::from("."), node.inode)),
            1 => Some((String::from(".."), dir.parent)),
            n => dir
                .children
                .iter()
                .nth((n - 2) as usize)
                .map(|(name, inode)| (name.clone(), *inode)),
        };
        entry
            .map(|(name, inode)| {
                Ok(DirRecord {
                    name,
                    inode,
                    is_directory: self.node(inode)?.is_dir,
                    next_position: position + 1,
                })
            })
            .transpose()
    }

    fn metadata(
        &self,
        _volume: &MemMount,
        node: &MemNodeRef,
        inode: Option<u64>,
        is_directory: bool,
    ) -> FileResult<NodeMetadata> {
        let target = self.node(inode.unwrap_or(node.inode))?;
        let mut attribute = target.attribute;
        attribute.set(FileAttributes::DIRECTORY, is_directory);
        if self.read_only {
            attribute |= FileAttributes::READ_ONLY;
        }
        let file_size = target.data.len() as u64;
        Ok(NodeMetadata {
            file_size,
            physical_size: file_size.div_ceil(CLUSTER_SIZE) * CLUSTER_SIZE,
            create_time: target.create_time,
            last_access_time: target.last_access_time,
            modification_time: target.modification_time,
            attribute,
        })
    }

    fn set_metadata(
        &mut self,
        _volume: &mut MemMount,
        node: &MemNodeRef,
        info: &FileInfo,
        new_path: Option<&str>,
    ) -> FileResult<()> {
        if let Some(path) = new_path {
            self.move_node(node.inode, path)?;
        }

        let file = self
            .nodes
            .get_mut(&node.inode)
            .ok_or(FileError::VolumeCorrupted)?;
        if !file.is_dir {
            file.data.resize(info.file_size as usize, 0);
        }
        let mut attribute = info.attribute;
        attribute.set(FileAttributes::DIRECTORY, file.is_dir);
        file.attribute = attribute;
        file.create_time = info.create_time;
        file.last_access_time = info.last_access_time;
        file.modification_time = info.modification_time;
        Ok(())
    }

    fn file_size(&self, _volume: &MemMount, node: &MemNodeRef) -> u64 {
        self.nodes
            .get(&node.inode)
            .map_or(0, |n| n.data.len() as u64)
    }

    fn free_space(&self, _volume: &MemMount) -> u64 {
        self.capacity.saturating_sub(self.used_space())
    }

    fn is_read_only(&self, _volume: &MemMount) -> bool {
        self.read_only
    }

    fn rename_volume(&mut self, _volume: &mut MemMount, label: &str) -> FileResult<()> {
        if self.read_only {
            return Err(FileError::WriteProtected);
        }
        self.label = Some(String::from(label));
        Ok(())
    }
}
