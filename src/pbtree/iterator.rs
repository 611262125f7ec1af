//! Block-local iteration.
//!
//! Two shapes: [`LeafBlockIter`] walks one data block's `(key, value)`
//! entries; [`parse_index_block`] and [`IndexEntries`] decode one index
//! block, used by both the builder's finalize pass and the reader's
//! descent.

use crate::pbtree::{PBTreeError, POINTER_SIZE, read_u32_le};

/// Iterates `(key, raw value bytes)` pairs out of one leaf block.
///
/// A zero-length key — the terminator byte appearing with nothing in
/// front of it — marks the end of real entries; everything from there
/// to the end of the block is padding and is not yielded.
#[derive(Debug, Clone)]
pub struct LeafBlockIter<'a> {
    data: &'a [u8],
    cursor: usize,
    value_size: usize,
    terminator: u8,
    done: bool,
}

impl<'a> LeafBlockIter<'a> {
    /// Build an iterator over one block's raw bytes. `value_size` is
    /// the codec's fixed packed width.
    pub fn new(data: &'a [u8], value_size: usize, terminator: u8) -> Self {
        Self {
            data,
            cursor: 0,
            value_size,
            terminator,
            done: false,
        }
    }
}

impl<'a> Iterator for LeafBlockIter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.cursor..];
        let term_pos = match rest.iter().position(|&b| b == self.terminator) {
            Some(p) => p,
            None => {
                self.done = true;
                return None;
            }
        };
        if term_pos == 0 {
            self.done = true;
            return None;
        }
        let key = &rest[..term_pos];
        let value_start = self.cursor + term_pos + 1;
        let value_end = value_start + self.value_size;
        if value_end > self.data.len() {
            self.done = true;
            return None;
        }
        let value = &self.data[value_start..value_end];
        self.cursor = value_end;
        Some((key, value))
    }
}

/// One index block, decoded: the leftmost child pointer plus the
/// ordered `(separator, child pointer)` entries that follow it.
///
/// `separator` never includes the trailing terminator byte — that
/// byte is consumed during parsing, not part of the comparable key.
#[derive(Debug, Clone)]
pub struct IndexEntries {
    /// Block number routed to for any key less than the first separator.
    pub leading_pointer: u32,
    /// `(separator, child_pointer)`, ascending: `child_pointer` is the
    /// block for keys `<= separator` and `> ` the previous separator.
    pub entries: Vec<(Vec<u8>, u32)>,
}

impl IndexEntries {
    /// Bisects the entries for `key`, returning the block number to
    /// descend into. Bisect-right semantics: a key equal to a
    /// separator follows that separator's own pointer.
    pub fn find(&self, key: &[u8]) -> u32 {
        let idx = self
            .entries
            .partition_point(|(separator, _)| separator.as_slice() <= key);
        if idx == 0 {
            self.leading_pointer
        } else {
            self.entries[idx - 1].1
        }
    }
}

/// Decodes one `block_size`-byte index block.
///
/// Parsing stops at the first zero-length key (the pad sentinel); any
/// bytes, padding or otherwise, beyond that point are not inspected.
/// A malformed block (odd-length pointer, dangling key with no
/// terminator) is treated as "no more real entries" rather than an
/// error — callers only ever see this on corrupt input, where the
/// more informative failure is a subsequent out-of-range pointer.
pub(crate) fn parse_index_block(
    block: &[u8],
    terminator: u8,
) -> Result<IndexEntries, PBTreeError> {
    let leading_pointer = read_u32_le(block)?;
    let mut pos = POINTER_SIZE;
    let mut entries = Vec::new();

    loop {
        if pos >= block.len() {
            break;
        }
        let term_rel = match block[pos..].iter().position(|&b| b == terminator) {
            Some(p) => p,
            None => break,
        };
        if term_rel == 0 {
            break;
        }
        let separator = block[pos..pos + term_rel].to_vec();
        let ptr_start = pos + term_rel + 1;
        if ptr_start + POINTER_SIZE > block.len() {
            break;
        }
        let child_pointer = read_u32_le(&block[ptr_start..])?;
        entries.push((separator, child_pointer));
        pos = ptr_start + POINTER_SIZE;
    }

    Ok(IndexEntries {
        leading_pointer,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_iter_yields_entries_in_order() {
        let mut block = Vec::new();
        block.extend_from_slice(b"alpha\x00");
        block.extend_from_slice(&1u32.to_le_bytes());
        block.extend_from_slice(b"beta\x00");
        block.extend_from_slice(&2u32.to_le_bytes());
        block.resize(64, 0);

        let items: Vec<_> = LeafBlockIter::new(&block, 4, 0).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, b"alpha");
        assert_eq!(u32::from_le_bytes(items[0].1.try_into().unwrap()), 1);
        assert_eq!(items[1].0, b"beta");
        assert_eq!(u32::from_le_bytes(items[1].1.try_into().unwrap()), 2);
    }

    #[test]
    fn leaf_iter_stops_at_pad() {
        let block = vec![0u8; 16];
        let items: Vec<_> = LeafBlockIter::new(&block, 4, 0).collect();
        assert!(items.is_empty());
    }

    #[test]
    fn index_entries_bisect_matches_spec_scenario() {
        // Mirrors the two-key, one-key-per-block scenario: root block
        // routes keys <= "c" through pointer 2, anything less through
        // the leading pointer 1.
        let entries = IndexEntries {
            leading_pointer: 1,
            entries: vec![(b"c".to_vec(), 2)],
        };
        assert_eq!(entries.find(b"a"), 1);
        assert_eq!(entries.find(b"c"), 2);
        assert_eq!(entries.find(b"z"), 2);
    }

    #[test]
    fn parse_index_block_round_trips_entries() {
        let mut block = Vec::new();
        block.extend_from_slice(&7u32.to_le_bytes());
        block.extend_from_slice(b"m\x00");
        block.extend_from_slice(&9u32.to_le_bytes());
        block.resize(32, 0);

        let parsed = parse_index_block(&block, 0).unwrap();
        assert_eq!(parsed.leading_pointer, 7);
        assert_eq!(parsed.entries, vec![(b"m".to_vec(), 9)]);
    }
}
