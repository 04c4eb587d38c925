//! In-memory collaborators for tests.
//!
//! [`MemoryEngine`] stands in for the filesystem engine and [`MemoryDisk`]
//! for the block transport. Both count what they are asked to do so that
//! tests can check the mount lifecycle from the outside.

mod memory_disk;
mod memory_engine;

pub use memory_disk::MemoryDisk;
pub use memory_engine::{MemMount, MemNodeRef, MemoryEngine};
