//! Directory enumeration, one entry per read.

use crate::core::{FileError, FileInfo, FileResult};
use crate::engine::{DirRecord, FsEngine, FILE_FIRST_USER, FILE_ROOT, MAX_NAME_LEN};

/// Whether an entry pointing at `inode` is shown to callers.
///
/// Filesystem metadata files are hidden; the root directory is the one
/// low inode that is always listed.
pub fn is_listed(inode: u64) -> bool {
    inode >= FILE_FIRST_USER || inode == FILE_ROOT
}

/// Listed entries of a directory, starting from an enumeration position.
///
/// Each item carries the position of the entry itself, so that a caller can
/// come back to it. The sequence ends at the end of the directory or after
/// the first engine error.
pub struct DirEntries<'a, E: FsEngine> {
    engine: &'a E,
    volume: &'a E::Volume,
    node: &'a E::Node,
    position: u64,
    done: bool,
}

impl<'a, E: FsEngine> DirEntries<'a, E> {
    pub fn new(engine: &'a E, volume: &'a E::Volume, node: &'a E::Node, position: u64) -> Self {
        Self {
            engine,
            volume,
            node,
            position,
            done: false,
        }
    }
}

impl<E: FsEngine> Iterator for DirEntries<'_, E> {
    type Item = FileResult<(u64, DirRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let here = self.position;
            match self.engine.read_dir(self.volume, self.node, here) {
                Ok(Some(record)) => {
                    self.position = record.next_position;
                    if is_listed(record.inode) {
                        return Some(Ok((here, record)));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Encode the next listed entry at `*position` into `buf`.
///
/// Returns the encoded size, or 0 once the directory is exhausted. The
/// position only moves past an entry that was actually delivered; on
/// `BufferTooSmall` the same entry comes back on the next call.
pub(crate) fn read_next<E: FsEngine>(
    engine: &E,
    volume: &E::Volume,
    node: &E::Node,
    position: &mut u64,
    buf: &mut [u8],
) -> FileResult<usize> {
    let (here, record) = match DirEntries::new(engine, volume, node, *position).next() {
        None => return Ok(0),
        Some(entry) => entry.inspect_err(|e| log::error!("Directory listing failed: {}", e))?,
    };
    *position = here;

    assert!(
        record.name.encode_utf16().count() <= MAX_NAME_LEN,
        "directory entry name exceeds {} code units",
        MAX_NAME_LEN
    );

    let required = FileInfo::encoded_len(&record.name);
    if buf.len() < required {
        return Err(FileError::BufferTooSmall { required });
    }

    let meta = engine
        .metadata(volume, node, Some(record.inode), record.is_directory)
        .inspect_err(|e| log::error!("Could not get directory entry info: {}", e))?;
    let written = FileInfo::from_metadata(&record.name, meta).encode(buf)?;

    *position = record.next_position;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDisk, MemoryEngine};
    use alloc::string::String;
    use alloc::vec::Vec;

    #[test]
    fn test_listing_rule() {
        let listed: Vec<u64> = (0..20).filter(|i| is_listed(*i)).collect();
        assert_eq!(listed, [5, 16, 17, 18, 19]);
    }

    #[test]
    fn test_dir_entries_carry_positions() {
        let mut engine = MemoryEngine::new().with_file("/a", b"");
        let mut disk = MemoryDisk::ntfs(512, 8);
        let mut vol = engine.mount(&mut disk).unwrap().volume;
        let root = engine.open(&mut vol, "/").unwrap().node;

        let entries: Vec<(u64, String)> = DirEntries::new(&engine, &vol, &root, 0)
            .map(|e| e.map(|(pos, rec)| (pos, rec.name)))
            .collect::<FileResult<_>>()
            .unwrap();
        // the eleven metadata files sit at positions 2..13
        assert_eq!(
            entries,
            [(0, String::from(".")), (1, String::from("..")), (13, String::from("a"))]
        );
    }

    #[test]
    fn test_read_next_end_of_directory() {
        let mut engine = MemoryEngine::new();
        let mut disk = MemoryDisk::ntfs(512, 8);
        let mut vol = engine.mount(&mut disk).unwrap().volume;
        let root = engine.open(&mut vol, "/").unwrap().node;

        let mut position = 13;
        let mut buf = [0u8; 256];
        assert_eq!(read_next(&engine, &vol, &root, &mut position, &mut buf), Ok(0));
        assert_eq!(position, 13);
    }
}
