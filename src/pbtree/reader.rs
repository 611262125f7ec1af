//! Random-access reads over a memory-mapped PBTree file.
//!
//! Opens and maps the file once, then answers lookups and scans as
//! pure functions over its bytes: descend the index bisecting each
//! block's separator list, then linearly scan the target leaf.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::warn;

use crate::pbtree::iterator::{LeafBlockIter, parse_index_block};
use crate::pbtree::{HEADER_SIZE, PBTreeError, POINTER_SIZE, read_u32_le};
use crate::value::ValueCodec;

/// Opens a PBTree file for reading.
///
/// Holds an immutable memory map; all lookups and scans are pure
/// functions over its bytes, so a `PBTreeReader` is `Send + Sync`
/// whenever `C` is, and many readers (or threads sharing one) can
/// query the same file concurrently.
pub struct PBTreeReader<C: ValueCodec> {
    mmap: Mmap,
    block_size: usize,
    index_block_count: u32,
    terminator: u8,
    codec: C,
}

impl<C: ValueCodec> PBTreeReader<C> {
    /// Opens and memory-maps `path`.
    pub fn open(path: impl AsRef<Path>, codec: C, terminator: u8) -> Result<Self, PBTreeError> {
        let file = File::open(path)?;
        // Safety: the file is not expected to be mutated concurrently
        // while mapped; the writer side never reopens a committed file.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_mmap(mmap, codec, terminator)
    }

    /// Builds a reader over an already-mapped file, e.g. one shared
    /// via `Arc<Mmap>` elsewhere in a process.
    pub fn from_mmap(mmap: Mmap, codec: C, terminator: u8) -> Result<Self, PBTreeError> {
        if mmap.len() < HEADER_SIZE {
            return Err(PBTreeError::Corrupt(
                "file shorter than the two-word header".into(),
            ));
        }
        let block_size = read_u32_le(&mmap[0..])? as usize;
        if block_size == 0 {
            return Err(PBTreeError::Corrupt("block_size is zero".into()));
        }
        let index_block_count = read_u32_le(&mmap[POINTER_SIZE..])?;

        Ok(Self {
            mmap,
            block_size,
            index_block_count,
            terminator,
            codec,
        })
    }

    /// Absolute byte offset of block number `n`.
    fn block_offset(&self, n: u32) -> u64 {
        HEADER_SIZE as u64 + n as u64 * self.block_size as u64
    }

    fn block_bytes(&self, n: u32) -> Result<&[u8], PBTreeError> {
        let start = self.block_offset(n) as usize;
        let end = start + self.block_size;
        self.mmap
            .get(start..end)
            .ok_or_else(|| PBTreeError::Corrupt(format!("block {n} out of range")))
    }

    fn leaf_iter_for_block(&self, n: u32) -> Result<Option<LeafBlockIter<'_>>, PBTreeError> {
        let start = self.block_offset(n) as usize;
        if start >= self.mmap.len() {
            return Ok(None);
        }
        let end = start + self.block_size;
        let bytes = self
            .mmap
            .get(start..end)
            .ok_or_else(|| PBTreeError::Corrupt(format!("data block {n} out of range")))?;
        Ok(Some(LeafBlockIter::new(
            bytes,
            self.codec.packed_size(),
            self.terminator,
        )))
    }

    /// Descends through the index, bisecting each block's separator
    /// list, returning the data block number `key` would live in.
    pub fn find_starting_data_block(&self, key: &[u8]) -> Result<u32, PBTreeError> {
        let mut block_number = 0u32;
        loop {
            let bytes = self.block_bytes(block_number)?;
            let parsed = parse_index_block(bytes, self.terminator)?;
            let next = parsed.find(key);
            if next >= self.index_block_count {
                return Ok(next);
            }
            block_number = next;
        }
    }

    /// Byte offset of `key`'s lexicographic insertion point: if `key`
    /// is present, the start of its entry; otherwise where it would be
    /// inserted to keep the file sorted. An empty `key` fast-paths to
    /// the start of the data region.
    pub fn expected_location(&self, key: &[u8]) -> Result<u64, PBTreeError> {
        if key.is_empty() {
            return Ok(self.block_offset(self.index_block_count));
        }

        let block_number = self.find_starting_data_block(key)?;
        let bytes = self.block_bytes(block_number)?;
        let mut pos = 0usize;
        loop {
            let Some(rest) = bytes.get(pos..) else {
                return Ok(self.block_offset(block_number) + bytes.len() as u64);
            };
            let term_rel = match rest.iter().position(|&b| b == self.terminator) {
                None => return Ok(self.block_offset(block_number) + bytes.len() as u64),
                Some(p) => p,
            };
            if term_rel == 0 {
                return Ok(self.block_offset(block_number) + pos as u64);
            }
            let stored = &rest[..term_rel];
            if key <= stored {
                return Ok(self.block_offset(block_number) + pos as u64);
            }
            let value_start = pos + term_rel + 1;
            let value_end = value_start + self.codec.packed_size();
            if value_end > bytes.len() {
                return Ok(self.block_offset(block_number) + bytes.len() as u64);
            }
            pos = value_end;
        }
    }

    /// Exact lookup. `None` if `key` is absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<C::Value>, PBTreeError> {
        if key.is_empty() {
            return Ok(None);
        }
        let block_number = self.find_starting_data_block(key)?;
        let Some(iter) = self.leaf_iter_for_block(block_number)? else {
            return Ok(None);
        };
        for (stored_key, value_bytes) in iter {
            if stored_key == key {
                return Ok(Some(self.codec.unpack(value_bytes)));
            }
            if stored_key > key {
                break;
            }
        }
        Ok(None)
    }

    /// Iterates all `(key, value)` pairs whose key starts with `prefix`
    /// (an empty prefix iterates the whole file), walking contiguous
    /// data blocks since no sibling pointers are stored.
    pub fn items<'r>(&'r self, prefix: &[u8]) -> Result<PBTreeItems<'r, C>, PBTreeError> {
        let block_number = self.find_starting_data_block(prefix)?;
        Ok(PBTreeItems {
            reader: self,
            block_number,
            current: None,
            prefix: prefix.to_vec(),
            started: false,
            finished: false,
        })
    }

    /// Like [`PBTreeReader::items`], yielding only the keys.
    pub fn keys<'r>(
        &'r self,
        prefix: &[u8],
    ) -> Result<impl Iterator<Item = Result<Vec<u8>, PBTreeError>> + 'r, PBTreeError> {
        Ok(self.items(prefix)?.map(|r| r.map(|(k, _)| k)))
    }

    /// Like [`PBTreeReader::items`], yielding only the values.
    pub fn values<'r>(
        &'r self,
        prefix: &[u8],
    ) -> Result<impl Iterator<Item = Result<C::Value, PBTreeError>> + 'r, PBTreeError> {
        Ok(self.items(prefix)?.map(|r| r.map(|(_, v)| v)))
    }

    /// Diagnostic: the number of index levels between the root and the
    /// data region, following the leftmost child at each step.
    pub fn count_levels(&self) -> Result<usize, PBTreeError> {
        let mut block_number = 0u32;
        let mut levels = 1usize;
        loop {
            let bytes = self.block_bytes(block_number)?;
            let parsed = parse_index_block(bytes, self.terminator)?;
            if parsed.leading_pointer >= self.index_block_count {
                return Ok(levels);
            }
            block_number = parsed.leading_pointer;
            levels += 1;
        }
    }
}

/// Prefix-bounded iterator over `(key, value)` pairs, produced by
/// [`PBTreeReader::items`].
pub struct PBTreeItems<'r, C: ValueCodec> {
    reader: &'r PBTreeReader<C>,
    block_number: u32,
    current: Option<LeafBlockIter<'r>>,
    prefix: Vec<u8>,
    started: bool,
    finished: bool,
}

impl<'r, C: ValueCodec> Iterator for PBTreeItems<'r, C> {
    type Item = Result<(Vec<u8>, C::Value), PBTreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.current.is_none() {
                match self.reader.leaf_iter_for_block(self.block_number) {
                    Ok(Some(iter)) => self.current = Some(iter),
                    Ok(None) => {
                        self.finished = true;
                        return None;
                    }
                    Err(e) => {
                        self.finished = true;
                        warn!(error = %e, "failed to load data block during scan");
                        return Some(Err(e));
                    }
                }
            }

            let entry = self.current.as_mut().and_then(Iterator::next);
            match entry {
                Some((key, value_bytes)) => {
                    if key.starts_with(self.prefix.as_slice()) {
                        self.started = true;
                        let value = self.reader.codec.unpack(value_bytes);
                        return Some(Ok((key.to_vec(), value)));
                    } else if self.started {
                        self.finished = true;
                        return None;
                    }
                    // Prefix not reached yet; keep scanning this block.
                }
                None => {
                    self.block_number += 1;
                    self.current = None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::pbtree::builder::{PBTreeWriter, PBTreeWriterOptions};
    use crate::value::ScalarFormat;

    fn build(entries: &[(&[u8], u64)], block_size: u32) -> Vec<u8> {
        let output = Cursor::new(Vec::new());
        let mut writer = PBTreeWriter::new(
            output,
            ScalarFormat::default(),
            PBTreeWriterOptions {
                block_size,
                terminator: 0,
            },
        )
        .unwrap();
        for (key, value) in entries {
            writer.add(key, value).unwrap();
        }
        writer.commit().unwrap().into_inner()
    }

    fn reader(bytes: Vec<u8>) -> PBTreeReader<ScalarFormat> {
        // Exercise the non-mmap constructor directly over owned bytes
        // via a temp file, since `Mmap` needs a real fd.
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();
        let mmap = unsafe { Mmap::map(&file).unwrap() };
        PBTreeReader::from_mmap(mmap, ScalarFormat::default(), 0).unwrap()
    }

    #[test]
    fn get_finds_every_inserted_key() {
        let entries: Vec<(&[u8], u64)> = vec![
            (b"alpha", 1),
            (b"beta", 2),
            (b"gamma", 3),
            (b"delta", 4),
        ];
        let mut sorted = entries.clone();
        sorted.sort_by_key(|(k, _)| *k);

        let bytes = build(&sorted, 64);
        let r = reader(bytes);
        for (key, value) in &sorted {
            assert_eq!(r.get(key).unwrap(), Some(*value));
        }
        assert_eq!(r.get(b"missing").unwrap(), None);
    }

    #[test]
    fn items_scans_matching_prefix_across_blocks() {
        let sorted: Vec<(&[u8], u64)> = vec![
            (b"app", 1),
            (b"apple", 2),
            (b"application", 3),
            (b"banana", 4),
        ];
        let bytes = build(&sorted, 32);
        let r = reader(bytes);

        let found: Vec<_> = r
            .items(b"app")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].0, b"app");
        assert_eq!(found[2].0, b"application");
    }

    #[test]
    fn items_with_empty_prefix_enumerates_everything_in_order() {
        let sorted: Vec<(&[u8], u64)> = vec![(b"a", 1), (b"b", 2), (b"c", 3)];
        let bytes = build(&sorted, 24);
        let r = reader(bytes);

        let found: Vec<_> = r
            .items(b"")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let keys: Vec<_> = found.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn expected_location_of_empty_key_is_start_of_data_region() {
        let sorted: Vec<(&[u8], u64)> = vec![(b"a", 1)];
        let bytes = build(&sorted, 64);
        let r = reader(bytes);
        let loc = r.expected_location(b"").unwrap();
        assert_eq!(loc, r.block_offset(r.index_block_count));
    }

    #[test]
    fn count_levels_reports_a_single_level_for_one_leaf_block() {
        let sorted: Vec<(&[u8], u64)> = vec![(b"a", 1), (b"b", 2)];
        let bytes = build(&sorted, 4096);
        let r = reader(bytes);
        assert_eq!(r.count_levels().unwrap(), 1);
    }
}
