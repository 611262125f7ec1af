//! Prefix-compressed, block-structured, disk-resident B-tree index.
//!
//! A PBTree maps lexicographically sorted byte-string keys to
//! fixed-width binary values. It is built in a single streaming pass
//! over pre-sorted input ([`builder::PBTreeWriter`]) and later queried
//! through random access over a memory map ([`reader::PBTreeReader`]):
//! exact lookup, prefix range scans, and full iteration.
//!
//! # On-disk layout
//!
//! ```text
//! offset 0      : u32 LE  block_size
//! offset 4      : u32 LE  index_block_count  (N_idx)
//! offset 8      : index region : N_idx blocks of block_size bytes
//!                   block 0 is the root; descendants appear in
//!                   root-first order with absolute block numbers.
//! offset 8+...  : data region  : leaf blocks of block_size bytes
//! ```
//!
//! Index block (`block_size` bytes):
//!
//! ```text
//! leftmost_child_ptr : u32 LE           # absolute block number
//! repeated:
//!   separator_key     : bytes (no terminator)
//!   terminator        : 1 byte
//!   child_ptr         : u32 LE          # absolute block number
//! trailing pad        : terminator bytes to block_size
//! ```
//!
//! Leaf block (`block_size` bytes):
//!
//! ```text
//! repeated:
//!   key               : bytes (no terminator)
//!   terminator        : 1 byte
//!   value             : value_size bytes (opaque to this module)
//! trailing pad        : terminator bytes to block_size
//! ```
//!
//! # Sub-modules
//!
//! - [`builder`] — [`builder::DataWriter`], [`builder::IndexWriter`], and the
//!   [`builder::PBTreeWriter`] façade that drives both from a single sorted
//!   `add` stream.
//! - [`iterator`] — [`iterator::LeafBlockIter`] and the shared index-block
//!   parser used by both the builder's finalize pass and the reader's descent.
//! - [`reader`] — [`reader::PBTreeReader`] for seek-by-key and prefix iteration.
//!
//! # Concurrency model
//!
//! The writer is single-threaded and append-only. The reader borrows an
//! immutable memory map and never mutates it, so multiple independent
//! reader instances over the same file (or threads sharing one) are safe.
//! There is no in-place update, delete, or crash-recovery story — a PBTree
//! file is either fully written via [`builder::PBTreeWriter::commit`] or
//! must be discarded.

pub mod builder;
pub mod iterator;
pub mod reader;

#[cfg(test)]
mod tests;

pub use builder::{
    DataWriter, IndexWriter, PBTreeWriter, PBTreeWriterOptions, RecordPBTreeWriter,
    ScalarPBTreeWriter,
};
pub use iterator::{IndexEntries, LeafBlockIter};
pub use reader::{PBTreeItems, PBTreeReader};

use std::io;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Default terminator byte separating keys from values and padding
/// block trailers. Must not appear in any key.
pub const DEFAULT_TERMINATOR: u8 = 0x00;

/// Width, in bytes, of a pointer (a block number) on disk.
pub const POINTER_SIZE: usize = 4;

/// Width, in bytes, of the two-word file header.
pub const HEADER_SIZE: usize = 2 * POINTER_SIZE;

/// Default `block_size` for a bare [`builder::PBTreeWriter`] (1 MiB).
///
/// The URL-index use case this format was built for overrides this to
/// 64 KiB; since `block_size` is stored in the header, files are
/// self-describing regardless of which default a writer used.
pub const DEFAULT_WRITER_BLOCK_SIZE: u32 = 1024 * 1024;

/// Chunk size used when streaming the spilled data segment onto the
/// final output during [`builder::PBTreeWriter::commit`].
pub const DISK_BLOCK_SIZE: usize = 4 * 1024;

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Errors produced while building or reading a PBTree file.
#[derive(Debug, Error)]
pub enum PBTreeError {
    /// Underlying I/O error (spill file, output sink, or memory map).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid writer/reader configuration, rejected at construction.
    #[error("bad configuration: {0}")]
    Config(String),

    /// A `(key, value)` pair does not fit in a single block even when
    /// the block is otherwise empty.
    #[error("item exceeds block size: key {0:?}")]
    ItemExceedsBlockSize(Vec<u8>),

    /// The on-disk file is structurally invalid: a pointer beyond the
    /// file end, a zero `block_size`, a truncated block, or an index
    /// level that did not come out block-aligned.
    #[error("corrupt PBTree file: {0}")]
    Corrupt(String),
}

// ------------------------------------------------------------------------------------------------
// Header helpers
// ------------------------------------------------------------------------------------------------

/// Reads a little-endian `u32` from the first 4 bytes of `buf`.
pub(crate) fn read_u32_le(buf: &[u8]) -> Result<u32, PBTreeError> {
    let slice = buf
        .get(0..POINTER_SIZE)
        .ok_or_else(|| PBTreeError::Corrupt("truncated u32".into()))?;
    let arr: [u8; POINTER_SIZE] = slice
        .try_into()
        .map_err(|_| PBTreeError::Corrupt("truncated u32".into()))?;
    Ok(u32::from_le_bytes(arr))
}
