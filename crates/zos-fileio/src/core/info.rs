//! Information structures exchanged through GetInfo/SetInfo and directory
//! reads.
//!
//! Callers hand over raw byte buffers; the structures are laid out in the
//! firmware's little-endian format with a trailing NUL-terminated UTF-16
//! string. Encoding into an undersized buffer reports the exact size needed
//! and leaves the buffer untouched.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use super::error::{FileError, FileResult};
use super::types::FileAttributes;

/// Size of the fixed part of a file info structure.
pub const FILE_INFO_SIZE: usize = 80;

/// Size of the fixed part of a file system info structure.
pub const FILE_SYSTEM_INFO_SIZE: usize = 36;

const CHAR16_SIZE: usize = 2;
const TIME_SIZE: usize = 16;

/// 128-bit identifier naming an information type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Per-file information.
    pub const FILE_INFO: Guid = Guid::new(
        0x0957_6e92,
        0x6d3f,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// Whole file system information.
    pub const FILE_SYSTEM_INFO: Guid = Guid::new(
        0x0957_6e93,
        0x6d3f,
        0x11d2,
        [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
    );

    /// Volume label only.
    pub const VOLUME_LABEL: Guid = Guid::new(
        0xdb47_d7d3,
        0xfe81,
        0x11d3,
        [0x9a, 0x35, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d],
    );

    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }
}

/// The information kinds this layer understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoKind {
    File,
    FileSystem,
    VolumeLabel,
}

impl InfoKind {
    /// Map an information type identifier, `None` if it is not supported.
    pub fn from_guid(guid: &Guid) -> Option<Self> {
        match *guid {
            Guid::FILE_INFO => Some(InfoKind::File),
            Guid::FILE_SYSTEM_INFO => Some(InfoKind::FileSystem),
            Guid::VOLUME_LABEL => Some(InfoKind::VolumeLabel),
            _ => None,
        }
    }

    /// Identifier of this kind.
    pub fn guid(&self) -> Guid {
        match self {
            InfoKind::File => Guid::FILE_INFO,
            InfoKind::FileSystem => Guid::FILE_SYSTEM_INFO,
            InfoKind::VolumeLabel => Guid::VOLUME_LABEL,
        }
    }
}

/// Calendar timestamp in the firmware layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanosecond: u32,
    pub time_zone: i16,
    pub daylight: u8,
}

impl Time {
    fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.year.to_le_bytes());
        out[2] = self.month;
        out[3] = self.day;
        out[4] = self.hour;
        out[5] = self.minute;
        out[6] = self.second;
        out[7] = 0;
        out[8..12].copy_from_slice(&self.nanosecond.to_le_bytes());
        out[12..14].copy_from_slice(&self.time_zone.to_le_bytes());
        out[14] = self.daylight;
        out[15] = 0;
    }

    fn decode(data: &[u8]) -> Self {
        Self {
            year: u16::from_le_bytes([data[0], data[1]]),
            month: data[2],
            day: data[3],
            hour: data[4],
            minute: data[5],
            second: data[6],
            nanosecond: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            time_zone: i16::from_le_bytes([data[12], data[13]]),
            daylight: data[14],
        }
    }
}

/// Metadata the engine reports for one node, without its name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub file_size: u64,
    pub physical_size: u64,
    pub create_time: Time,
    pub last_access_time: Time,
    pub modification_time: Time,
    pub attribute: FileAttributes,
}

/// Per-file information.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_size: u64,
    pub physical_size: u64,
    pub create_time: Time,
    pub last_access_time: Time,
    pub modification_time: Time,
    pub attribute: FileAttributes,
    pub file_name: String,
}

impl FileInfo {
    /// Combine engine metadata with an entry name.
    pub fn from_metadata(name: &str, meta: NodeMetadata) -> Self {
        Self {
            file_size: meta.file_size,
            physical_size: meta.physical_size,
            create_time: meta.create_time,
            last_access_time: meta.last_access_time,
            modification_time: meta.modification_time,
            attribute: meta.attribute,
            file_name: String::from(name),
        }
    }

    /// Encoded size of a file info structure carrying `name`.
    pub fn encoded_len(name: &str) -> usize {
        FILE_INFO_SIZE + utf16_size(name)
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> FileResult<usize> {
        let required = Self::encoded_len(&self.file_name);
        if buf.len() < required {
            return Err(FileError::BufferTooSmall { required });
        }

        put_u64(buf, 0, required as u64);
        put_u64(buf, 8, self.file_size);
        put_u64(buf, 16, self.physical_size);
        self.create_time.encode(&mut buf[24..24 + TIME_SIZE]);
        self.last_access_time.encode(&mut buf[40..40 + TIME_SIZE]);
        self.modification_time.encode(&mut buf[56..56 + TIME_SIZE]);
        put_u64(buf, 72, self.attribute.bits());
        write_utf16z(&mut buf[FILE_INFO_SIZE..], &self.file_name);
        Ok(required)
    }

    /// Decode a caller-supplied structure.
    ///
    /// Fails with `BadBufferSize` if the buffer cannot hold the fixed part
    /// plus a terminated name.
    pub fn decode(buf: &[u8]) -> FileResult<Self> {
        if buf.len() < FILE_INFO_SIZE + CHAR16_SIZE {
            return Err(FileError::BadBufferSize);
        }
        let file_name = read_utf16z(&buf[FILE_INFO_SIZE..]).ok_or(FileError::BadBufferSize)?;

        Ok(Self {
            file_size: get_u64(buf, 8),
            physical_size: get_u64(buf, 16),
            create_time: Time::decode(&buf[24..24 + TIME_SIZE]),
            last_access_time: Time::decode(&buf[40..40 + TIME_SIZE]),
            modification_time: Time::decode(&buf[56..56 + TIME_SIZE]),
            attribute: FileAttributes::from_bits_retain(get_u64(buf, 72)),
            file_name,
        })
    }
}

/// Whole file system information.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    pub read_only: bool,
    pub volume_size: u64,
    pub free_space: u64,
    pub block_size: u32,
    pub volume_label: String,
}

impl FileSystemInfo {
    /// Encoded size of a file system info structure carrying `label`.
    pub fn encoded_len(label: &str) -> usize {
        FILE_SYSTEM_INFO_SIZE + utf16_size(label)
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> FileResult<usize> {
        let required = Self::encoded_len(&self.volume_label);
        if buf.len() < required {
            return Err(FileError::BufferTooSmall { required });
        }

        buf[..FILE_SYSTEM_INFO_SIZE].fill(0);
        put_u64(buf, 0, required as u64);
        buf[8] = u8::from(self.read_only);
        put_u64(buf, 16, self.volume_size);
        put_u64(buf, 24, self.free_space);
        buf[32..36].copy_from_slice(&self.block_size.to_le_bytes());
        write_utf16z(&mut buf[FILE_SYSTEM_INFO_SIZE..], &self.volume_label);
        Ok(required)
    }

    /// Decode a caller-supplied structure.
    pub fn decode(buf: &[u8]) -> FileResult<Self> {
        if buf.len() < FILE_SYSTEM_INFO_SIZE + CHAR16_SIZE {
            return Err(FileError::BadBufferSize);
        }
        let volume_label =
            read_utf16z(&buf[FILE_SYSTEM_INFO_SIZE..]).ok_or(FileError::BadBufferSize)?;

        Ok(Self {
            read_only: buf[8] != 0,
            volume_size: get_u64(buf, 16),
            free_space: get_u64(buf, 24),
            block_size: u32::from_le_bytes([buf[32], buf[33], buf[34], buf[35]]),
            volume_label,
        })
    }
}

/// Encode a bare volume label structure.
pub fn encode_volume_label(label: &str, buf: &mut [u8]) -> FileResult<usize> {
    let required = utf16_size(label);
    if buf.len() < required {
        return Err(FileError::BufferTooSmall { required });
    }
    write_utf16z(buf, label);
    Ok(required)
}

/// Decode a bare volume label structure.
pub fn decode_volume_label(buf: &[u8]) -> FileResult<String> {
    if buf.len() < CHAR16_SIZE {
        return Err(FileError::BadBufferSize);
    }
    read_utf16z(buf).ok_or(FileError::BadBufferSize)
}

/// Size in bytes of `s` as a NUL-terminated UTF-16 string.
pub fn utf16_size(s: &str) -> usize {
    (s.encode_utf16().count() + 1) * CHAR16_SIZE
}

/// Write `s` as NUL-terminated UTF-16. `out` must hold `utf16_size(s)` bytes.
fn write_utf16z(out: &mut [u8], s: &str) {
    let mut pos = 0;
    for unit in s.encode_utf16().chain(core::iter::once(0)) {
        out[pos..pos + CHAR16_SIZE].copy_from_slice(&unit.to_le_bytes());
        pos += CHAR16_SIZE;
    }
}

/// Read a NUL-terminated UTF-16 string, `None` if no terminator fits.
fn read_utf16z(data: &[u8]) -> Option<String> {
    let units: Vec<u16> = data
        .chunks_exact(CHAR16_SIZE)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    if (units.len() + 1) * CHAR16_SIZE > data.len() {
        return None;
    }
    Some(
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}

fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn get_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
