//! Driver configuration.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::core::{FileError, FileResult};

/// Tunables for volume discovery and the file handle layer.
///
/// Every field has a default, so a configuration document only needs to
/// name what it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Report every volume as read-only, whatever the engine says
    pub force_read_only: bool,

    /// Identifier expected in the first block of a supported volume
    pub signature: String,

    /// Byte offset of [`DriverConfig::signature`] inside the first block
    pub signature_offset: usize,

    /// Longest absolute path accepted, in UTF-16 code units
    pub path_max: usize,

    /// Capacity of a volume's handle table
    pub max_open_files: usize,

    /// Block size reported when the transport claims a block size of zero
    pub fallback_block_size: u32,
}

impl DriverConfig {
    /// OEM identifier of an NTFS boot sector.
    pub const NTFS_SIGNATURE: &'static str = "NTFS    ";

    /// Load a configuration from a JSON document.
    pub fn from_json(json: &str) -> FileResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            log::error!("Invalid driver configuration: {}", e);
            FileError::InvalidParameter
        })
    }

    /// Load a configuration from a JSON stream.
    #[cfg(feature = "std")]
    pub fn from_reader<R: std::io::Read>(reader: R) -> FileResult<Self> {
        serde_json::from_reader(reader).map_err(|e| {
            log::error!("Invalid driver configuration: {}", e);
            FileError::InvalidParameter
        })
    }

    /// Same configuration with read-only forced on or off.
    pub fn with_force_read_only(mut self, force: bool) -> Self {
        self.force_read_only = force;
        self
    }

    /// Same configuration with a different handle table capacity.
    pub fn with_max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            force_read_only: false,
            signature: String::from(Self::NTFS_SIGNATURE),
            signature_offset: 3,
            path_max: 32768,
            max_open_files: 1024,
            fallback_block_size: 512,
        }
    }
}
