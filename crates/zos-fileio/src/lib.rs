//! Zero OS File Access Layer
//!
//! Exposes a mounted on-disk volume to boot-time code through a synchronous,
//! handle-based file interface:
//!
//! - **Core**: handle values, open modes, attributes, errors, info layouts
//! - **Path**: resolution of caller names against a parent directory
//! - **Handle**: the per-volume table of file objects and their reference counts
//! - **Volume**: mount lifecycle driven by reference counts, and the file operations
//! - **Registry**: volume install/uninstall as block devices come and go
//! - **Engine**: the filesystem engine and block transport this layer sits on
//!
//! # Design Principles
//!
//! 1. **Mounted only while used**: the host may lose power without notice,
//!    so the volume is unmounted as soon as the last handle closes
//! 2. **One object per path**: opening an already open path shares its object
//! 3. **Handle values carry their access mode**: a read-only and a read-write
//!    value may refer to the same object
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          File Access Layer                                  │
//! │                                                                             │
//! │  ┌───────────────────────────────────────────────────────────────────────┐  │
//! │  │                         VolumeRegistry                                │  │
//! │  │  • Signature probe      • Forced unmount on uninstall                 │  │
//! │  └────────────────────────────────┬──────────────────────────────────────┘  │
//! │                                   │                                         │
//! │                                   ▼                                         │
//! │  ┌───────────────────────────────────────────────────────────────────────┐  │
//! │  │                            Volume                                     │  │
//! │  │  • Open / Close / Delete  • Read / Write / Position                   │  │
//! │  │  • GetInfo / SetInfo      • FileTable (refcounts, path aliasing)      │  │
//! │  └────────────────────────────────┬──────────────────────────────────────┘  │
//! │                                   │                                         │
//! │                                   ▼                                         │
//! │  ┌─────────────────────────┐  ┌─────────────────────────┐                   │
//! │  │   FsEngine              │  │   BlockIo               │                   │
//! │  │  • Inodes, extents      │  │  • Raw block reads      │                   │
//! │  │  • Directory traversal  │  │  • Media geometry       │                   │
//! │  └─────────────────────────┘  └─────────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod core;
pub mod engine;
pub mod handle;
pub mod registry;
pub mod testing;
pub mod volume;

// Convenient re-exports at crate root
pub use crate::config::DriverConfig;
pub use crate::core::{
    AccessMode, DeleteOutcome, FileAttributes, FileError, FileHandle, FileId, FileInfo,
    FileResult, FileSystemInfo, Guid, InfoKind, OpenMode,
};
pub use crate::engine::{BlockIo, FsEngine};
pub use crate::registry::{probe_signature, VolumeId, VolumeRegistry};
pub use crate::testing::{MemoryDisk, MemoryEngine};
pub use crate::volume::{IoToken, Volume, END_OF_FILE};
