//! # pbtree
//!
//! A prefix-compressed, block-structured, disk-resident B-tree index
//! mapping sorted byte-string keys to fixed-width values. Built in a
//! single streaming pass over pre-sorted input; queried via
//! memory-mapped random access.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    PBTreeWriter                      │
//! │  ┌────────────┐              ┌──────────────┐       │
//! │  │ DataWriter  │──on overflow─▶│ IndexWriter  │      │
//! │  │ (spill file)│  first key    │ (cascading    │      │
//! │  │             │               │  levels)      │      │
//! │  └─────┬───────┘              └──────┬───────┘       │
//! │        │ commit(): index region, then data region    │
//! │        ▼                             ▼                │
//! │              single output file (header + blocks)     │
//! └──────────────────────────────────────────────────────┘
//!                           │
//!                           ▼ memory map
//! ┌──────────────────────────────────────────────────────┐
//! │                    PBTreeReader                       │
//! │  bisect index levels root-first → leaf block → scan   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pbtree`] | The index itself — writer, reader, and block iteration |
//! | [`value`] | Fixed-width value codecs (`ScalarFormat`, `RecordFormat`) |
//! | [`prefix`] | Shortest-prefix separator computation for the index layer |
//! | [`encoding`] | Little-endian primitive encode/decode used by the value codecs |
//!
//! ## Key Properties
//!
//! - **Single streaming pass** — the writer never seeks backward over
//!   the data it is building except to patch the two-word header; keys
//!   must arrive in ascending order.
//! - **Prefix-compressed index** — interior nodes store only the
//!   shortest separator that still routes correctly, not full keys.
//! - **Fixed block size, fixed value width** — every leaf and index
//!   block is exactly `block_size` bytes, and every value is exactly
//!   the codec's `packed_size()` bytes, making block-local offsets
//!   computable without a separate index of entry lengths.
//! - **Read-only, concurrency-free reads** — [`pbtree::PBTreeReader`]
//!   sits over an immutable `memmap2::Mmap`; no locks, no write path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use pbtree::pbtree::{PBTreeWriter, PBTreeWriterOptions, PBTreeReader};
//! use pbtree::value::ScalarFormat;
//!
//! let file = File::create("/tmp/example.pbtree").unwrap();
//! let mut writer = PBTreeWriter::new(
//!     file,
//!     ScalarFormat::default(),
//!     PBTreeWriterOptions::default(),
//! ).unwrap();
//!
//! writer.add(b"alpha", &1).unwrap();
//! writer.add(b"beta", &2).unwrap();
//! writer.commit().unwrap();
//!
//! let reader = PBTreeReader::open(
//!     "/tmp/example.pbtree",
//!     ScalarFormat::default(),
//!     0,
//! ).unwrap();
//! assert_eq!(reader.get(b"alpha").unwrap(), Some(1));
//! let all: Vec<_> = reader.items(b"").unwrap().collect::<Result<Vec<_>, _>>().unwrap();
//! assert_eq!(all.len(), 2);
//! ```

#![allow(dead_code)]

pub mod encoding;
pub mod pbtree;
pub mod prefix;
pub mod value;
