//! Core types, errors, path resolution and info layouts

mod error;
mod info;
mod path;
mod types;

pub use error::{
    DeleteOutcome, FileError, FileResult, STATUS_ERROR_BIT, STATUS_SUCCESS,
    STATUS_WARN_DELETE_FAILURE,
};
pub use info::{
    decode_volume_label, encode_volume_label, utf16_size, FileInfo, FileSystemInfo, Guid,
    InfoKind, NodeMetadata, Time, FILE_INFO_SIZE, FILE_SYSTEM_INFO_SIZE,
};
pub use path::{
    base_name_offset, clean_path, is_path_delimiter, is_reserved_name, is_self_reference,
    parent_path, resolve, DOS_PATH_CHAR, PATH_CHAR,
};
pub use types::{AccessMode, FileAttributes, FileHandle, FileId, OpenMode};
