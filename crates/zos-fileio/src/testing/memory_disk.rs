//! In-memory block device.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::DriverConfig;
use crate::core::{FileError, FileResult};
use crate::engine::BlockIo;

/// Zero-filled block device backed by a byte vector.
pub struct MemoryDisk {
    data: Vec<u8>,
    block_size: u32,
    reported_block_size: u32,
    reported_last_block: Option<u64>,
    reads: usize,
}

impl MemoryDisk {
    /// Disk whose first block carries the NTFS OEM identifier.
    pub fn ntfs(block_size: u32, blocks: u64) -> Self {
        let mut disk = Self::blank(block_size, blocks);
        let signature = DriverConfig::NTFS_SIGNATURE.as_bytes();
        disk.data[3..3 + signature.len()].copy_from_slice(signature);
        disk
    }

    /// Disk with no recognizable filesystem.
    pub fn blank(block_size: u32, blocks: u64) -> Self {
        Self {
            data: vec![0; block_size as usize * blocks as usize],
            block_size,
            reported_block_size: block_size,
            reported_last_block: None,
            reads: 0,
        }
    }

    /// Make the transport report `block_size` instead of the real one.
    pub fn with_reported_block_size(mut self, block_size: u32) -> Self {
        self.reported_block_size = block_size;
        self
    }

    /// Make the transport report `last_block` instead of the real one.
    pub fn with_reported_last_block(mut self, last_block: u64) -> Self {
        self.reported_last_block = Some(last_block);
        self
    }

    /// Number of `read_blocks` calls served.
    pub fn read_count(&self) -> usize {
        self.reads
    }
}

impl BlockIo for MemoryDisk {
    fn block_size(&self) -> u32 {
        self.reported_block_size
    }

    fn last_block(&self) -> u64 {
        if let Some(last) = self.reported_last_block {
            return last;
        }
        match self.block_size {
            0 => 0,
            bs => (self.data.len() as u64 / u64::from(bs)).saturating_sub(1),
        }
    }

    fn read_blocks(&mut self, lba: u64, buf: &mut [u8]) -> FileResult<()> {
        let start = lba as usize * self.block_size as usize;
        let src = self
            .data
            .get(start..start + buf.len())
            .ok_or(FileError::DeviceError)?;
        buf.copy_from_slice(src);
        self.reads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        let disk = MemoryDisk::ntfs(512, 64);
        assert_eq!(disk.block_size(), 512);
        assert_eq!(disk.last_block(), 63);

        let disk = disk.with_reported_block_size(0);
        assert_eq!(disk.block_size(), 0);
        assert_eq!(disk.last_block(), 63);
    }

    #[test]
    fn test_read_out_of_range() {
        let mut disk = MemoryDisk::blank(512, 2);
        let mut buf = [0u8; 512];
        assert!(disk.read_blocks(1, &mut buf).is_ok());
        assert_eq!(disk.read_blocks(2, &mut buf), Err(FileError::DeviceError));
        assert_eq!(disk.read_count(), 1);
    }
}
