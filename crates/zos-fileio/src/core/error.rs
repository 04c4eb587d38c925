//! Error types for the file access layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High bit that marks a firmware status value as an error.
pub const STATUS_ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// Firmware status value for plain success.
pub const STATUS_SUCCESS: usize = 0;

/// Firmware warning status returned when the close half of a delete succeeded
/// but the file itself was not removed.
pub const STATUS_WARN_DELETE_FAILURE: usize = 2;

/// Result type used throughout the crate.
pub type FileResult<T> = Result<T, FileError>;

/// Errors returned by handle and volume operations.
///
/// Errors coming from the filesystem engine are surfaced largely unchanged;
/// the only translation the layer performs is turning "end of directory"
/// into a zero-length read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FileError {
    /// The path does not exist, or the parent is not a directory
    #[error("not found")]
    NotFound,

    /// The operation is not allowed on this handle or entry
    #[error("access denied")]
    AccessDenied,

    /// The volume is read-only
    #[error("write protected")]
    WriteProtected,

    /// Malformed request (bad mode combination, bad attributes, stale handle)
    #[error("invalid parameter")]
    InvalidParameter,

    /// The supplied buffer cannot hold the structure it claims to contain
    #[error("bad buffer size")]
    BadBufferSize,

    /// The supplied buffer is too small; retry with `required` bytes
    #[error("buffer too small ({required} bytes required)")]
    BufferTooSmall {
        /// Exact buffer size needed for the call to succeed
        required: usize,
    },

    /// The underlying object is gone
    #[error("device error")]
    DeviceError,

    /// The operation is not meaningful for this object kind or state
    #[error("unsupported")]
    Unsupported,

    /// Allocation failed
    #[error("out of resources")]
    OutOfResources,

    /// The engine found the on-disk structures inconsistent
    #[error("volume corrupted")]
    VolumeCorrupted,

    /// The medium changed under an open volume
    #[error("media changed")]
    MediaChanged,
}

impl FileError {
    /// Firmware status value for this error (error bit set).
    pub fn status(&self) -> usize {
        let code = match self {
            FileError::InvalidParameter => 2,
            FileError::Unsupported => 3,
            FileError::BadBufferSize => 4,
            FileError::BufferTooSmall { .. } => 5,
            FileError::DeviceError => 7,
            FileError::WriteProtected => 8,
            FileError::OutOfResources => 9,
            FileError::VolumeCorrupted => 10,
            FileError::MediaChanged => 13,
            FileError::NotFound => 14,
            FileError::AccessDenied => 15,
        };
        STATUS_ERROR_BIT | code
    }

    /// Size the caller should retry with, for `BufferTooSmall`.
    pub fn required_size(&self) -> Option<usize> {
        match self {
            FileError::BufferTooSmall { required } => Some(*required),
            _ => None,
        }
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FileError::NotFound)
    }
}

/// Successful outcome of a delete.
///
/// Delete always closes the handle value it was given. Whether the entry was
/// also removed is reported separately, since callers depend on telling the
/// two apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// The handle was closed and the entry removed
    Deleted,
    /// The handle was closed but the entry was left in place
    WarnDeleteFailure,
}

impl DeleteOutcome {
    /// Firmware status value for this outcome.
    pub fn status(&self) -> usize {
        match self {
            DeleteOutcome::Deleted => STATUS_SUCCESS,
            DeleteOutcome::WarnDeleteFailure => STATUS_WARN_DELETE_FAILURE,
        }
    }

    /// Whether the entry was actually removed.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FileError::NotFound.status(), STATUS_ERROR_BIT | 14);
        assert_eq!(FileError::AccessDenied.status(), STATUS_ERROR_BIT | 15);
        assert_eq!(
            FileError::BufferTooSmall { required: 10 }.status(),
            STATUS_ERROR_BIT | 5
        );
        assert_ne!(FileError::DeviceError.status() & STATUS_ERROR_BIT, 0);
    }

    #[test]
    fn test_delete_outcome_is_not_an_error_status() {
        assert_eq!(DeleteOutcome::Deleted.status(), STATUS_SUCCESS);
        let warn = DeleteOutcome::WarnDeleteFailure.status();
        assert_eq!(warn, STATUS_WARN_DELETE_FAILURE);
        assert_eq!(warn & STATUS_ERROR_BIT, 0);
        assert!(!DeleteOutcome::WarnDeleteFailure.is_deleted());
    }

    #[test]
    fn test_required_size() {
        assert_eq!(
            FileError::BufferTooSmall { required: 92 }.required_size(),
            Some(92)
        );
        assert_eq!(FileError::NotFound.required_size(), None);
        assert!(FileError::NotFound.is_not_found());
    }
}
