//! Single-pass streaming construction of a PBTree file.
//!
//! Three layers, bottom-up: [`DataWriter`] packs leaves, [`IndexWriter`]
//! builds the index above them, and [`PBTreeWriter`] is the façade that
//! drives both from one ascending `add(key, value)` stream.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::pbtree::iterator::parse_index_block;
use crate::pbtree::{DISK_BLOCK_SIZE, PBTreeError, POINTER_SIZE};
use crate::prefix::significant;
use crate::value::{RecordFormat, ScalarFormat, ValueCodec};

// ------------------------------------------------------------------------------------------------
// DataWriter
// ------------------------------------------------------------------------------------------------

/// Packs sorted `(key, packed_value)` pairs into fixed-size leaf blocks.
///
/// `add` returns the first key of a newly opened block whenever the
/// previous one had to be flushed, so a caller building an index above
/// this writer knows exactly when, and with what key, to add a
/// separator — without `DataWriter` needing to know an index exists at
/// all.
pub struct DataWriter<W: Write + Seek> {
    sink: W,
    block_size: usize,
    terminator: u8,
    remaining: usize,
    buffer: Vec<u8>,
}

impl<W: Write + Seek> DataWriter<W> {
    /// Wrap `sink`. `block_size` must be large enough to hold at least
    /// one entry of the caller's expected maximum size; that is
    /// enforced per-entry by [`DataWriter::add`], not here.
    pub fn new(sink: W, block_size: usize, terminator: u8) -> Self {
        Self {
            sink,
            block_size,
            terminator,
            remaining: block_size,
            buffer: Vec::with_capacity(block_size),
        }
    }

    /// Appends one entry. Returns `Ok(Some(key.to_vec()))` when this
    /// entry forced the previous block to flush — `key` is then the
    /// first key of the block that was just opened.
    pub fn add(
        &mut self,
        key: &[u8],
        packed_value: &[u8],
    ) -> Result<Option<Vec<u8>>, PBTreeError> {
        let size = key.len() + 1 + packed_value.len();
        if size > self.block_size {
            return Err(PBTreeError::ItemExceedsBlockSize(key.to_vec()));
        }

        let mut opened_new_block = None;
        if size > self.remaining {
            let pad = self.remaining;
            self.buffer
                .extend(std::iter::repeat(self.terminator).take(pad));
            self.sink.write_all(&self.buffer)?;
            self.buffer.clear();
            self.remaining = self.block_size;
            opened_new_block = Some(key.to_vec());
            trace!(key = ?String::from_utf8_lossy(key), "data block flushed");
        }

        self.buffer.extend_from_slice(key);
        self.buffer.push(self.terminator);
        self.buffer.extend_from_slice(packed_value);
        self.remaining -= size;
        Ok(opened_new_block)
    }

    /// Flushes the final partial block (padded to `block_size`) and
    /// rewinds the sink to its start. Safe to call more than once —
    /// later calls are no-ops once the buffer has been drained.
    pub fn finish(&mut self) -> Result<(), PBTreeError> {
        if !self.buffer.is_empty() {
            self.buffer
                .extend(std::iter::repeat(self.terminator).take(self.remaining));
            self.sink.write_all(&self.buffer)?;
            self.buffer.clear();
            self.remaining = self.block_size;
        }
        self.sink.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Unwraps the underlying sink, e.g. to splice a finished spill
    /// file onto another stream.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

// ------------------------------------------------------------------------------------------------
// IndexWriter
// ------------------------------------------------------------------------------------------------

struct IndexLevel {
    sink: std::fs::File,
    pointer_count: u32,
    remaining: usize,
}

/// Builds the multi-level index above a leaf stream.
///
/// Each level spools to its own temporary file as it is built, adding
/// a new block and cascading a separator upward whenever the current
/// one overflows; [`IndexWriter::finish`] then rewrites every level,
/// root-first, onto the real output sink with pointers rebased to
/// their final absolute block numbers.
pub struct IndexWriter<W: Write + Seek> {
    output: W,
    block_size: usize,
    terminator: u8,
    levels: Vec<IndexLevel>,
}

impl<W: Write + Seek> IndexWriter<W> {
    /// Creates a writer with one (empty) level already open, writing
    /// its final index region to `output`.
    pub fn new(output: W, block_size: usize, terminator: u8) -> Result<Self, PBTreeError> {
        if block_size <= POINTER_SIZE + 1 {
            return Err(PBTreeError::Config(format!(
                "block_size {block_size} too small to hold a pointer and a single-byte key"
            )));
        }
        let mut writer = Self {
            output,
            block_size,
            terminator,
            levels: Vec::new(),
        };
        writer.push_level()?;
        Ok(writer)
    }

    fn push_level(&mut self) -> Result<(), PBTreeError> {
        let mut sink = tempfile::tempfile()?;
        sink.write_all(&0u32.to_le_bytes())?;
        self.levels.push(IndexLevel {
            sink,
            pointer_count: 0,
            remaining: self.block_size - POINTER_SIZE,
        });
        debug!(level = self.levels.len() - 1, "index level opened");
        Ok(())
    }

    /// Adds a separator `key` at `level`, cascading to `level + 1` with
    /// a leading pointer to the newly opened block whenever `level`
    /// overflows. `level` 0 is immediately above the leaf layer.
    pub fn add(&mut self, level: usize, key: &[u8]) -> Result<(), PBTreeError> {
        let size = key.len() + 1 + POINTER_SIZE;
        while level >= self.levels.len() {
            self.push_level()?;
        }
        if size > self.block_size - POINTER_SIZE {
            return Err(PBTreeError::ItemExceedsBlockSize(key.to_vec()));
        }

        if size > self.levels[level].remaining {
            let pad = self.levels[level].remaining;
            self.levels[level]
                .sink
                .write_all(&vec![self.terminator; pad])?;
            let leading = self.levels[level].pointer_count;
            self.levels[level].sink.write_all(&leading.to_le_bytes())?;

            let next_level = level + 1;
            if next_level >= self.levels.len() {
                self.push_level()?;
            }
            self.add(next_level, key)?;
            self.levels[level].remaining = self.block_size - POINTER_SIZE;
        }

        let lvl = &mut self.levels[level];
        lvl.pointer_count += 1;
        lvl.sink.write_all(key)?;
        lvl.sink.write_all(&[self.terminator])?;
        lvl.sink.write_all(&lvl.pointer_count.to_le_bytes())?;
        lvl.remaining -= size;
        Ok(())
    }

    /// Writes the header and the fully rebased index region to the
    /// output sink, leaving it positioned at the end (ready for a data
    /// segment to be appended). Returns the number of index blocks
    /// written, i.e. the header's `index_block_count` word.
    pub fn finish(&mut self) -> Result<u32, PBTreeError> {
        self.output
            .write_all(&(self.block_size as u32).to_le_bytes())?;
        self.output.write_all(&0u32.to_le_bytes())?;

        let mut blocks_written: u32 = 0;
        for level in self.levels.iter_mut().rev() {
            level
                .sink
                .write_all(&vec![self.terminator; level.remaining])?;

            let level_len = level.sink.stream_position()?;
            if level_len as usize % self.block_size != 0 {
                return Err(PBTreeError::Corrupt(
                    "index level did not come out block-aligned".into(),
                ));
            }
            let blocks_to_write = (level_len as usize / self.block_size) as u32;
            let offset = blocks_written + blocks_to_write;

            level.sink.seek(SeekFrom::Start(0))?;
            let mut buf = vec![0u8; self.block_size];
            loop {
                match read_full_block(&mut level.sink, &mut buf)? {
                    false => break,
                    true => {
                        let parsed = parse_index_block(&buf, self.terminator)?;
                        self.output
                            .write_all(&(parsed.leading_pointer + offset).to_le_bytes())?;
                        let mut written = POINTER_SIZE;
                        for (separator, pointer) in &parsed.entries {
                            self.output.write_all(separator)?;
                            self.output.write_all(&[self.terminator])?;
                            self.output.write_all(&(pointer + offset).to_le_bytes())?;
                            written += separator.len() + 1 + POINTER_SIZE;
                        }
                        if written < self.block_size {
                            self.output
                                .write_all(&vec![self.terminator; self.block_size - written])?;
                        }
                    }
                }
            }
            blocks_written += blocks_to_write;
        }

        self.output.seek(SeekFrom::Start(POINTER_SIZE as u64))?;
        self.output.write_all(&blocks_written.to_le_bytes())?;
        self.output.seek(SeekFrom::End(0))?;

        debug!(blocks_written, "index region finalized");
        Ok(blocks_written)
    }

    /// Unwraps the output sink.
    pub fn into_inner(self) -> W {
        self.output
    }
}

/// Reads exactly `buf.len()` bytes, or confirms the stream is at EOF.
/// Returns `Ok(false)` only when zero bytes were available; a partial
/// read that then hits EOF is corruption, not a clean end.
fn read_full_block(r: &mut impl Read, buf: &mut [u8]) -> Result<bool, PBTreeError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(PBTreeError::Corrupt("truncated index block".into()));
        }
        filled += n;
    }
    Ok(true)
}

// ------------------------------------------------------------------------------------------------
// PBTreeWriter façade
// ------------------------------------------------------------------------------------------------

/// Construction knobs for [`PBTreeWriter`].
#[derive(Debug, Clone, Copy)]
pub struct PBTreeWriterOptions {
    /// Fixed size, in bytes, of every leaf and index block.
    pub block_size: u32,
    /// Byte separating keys from values and padding block trailers.
    pub terminator: u8,
}

impl Default for PBTreeWriterOptions {
    fn default() -> Self {
        Self {
            block_size: crate::pbtree::DEFAULT_WRITER_BLOCK_SIZE,
            terminator: crate::pbtree::DEFAULT_TERMINATOR,
        }
    }
}

/// Drives a [`DataWriter`] (spilled to a temp file) and an
/// [`IndexWriter`] (writing straight to `output`) from one ascending
/// stream of `add` calls, then concatenates index region and data
/// region on [`PBTreeWriter::commit`].
pub struct PBTreeWriter<W: Write + Seek, C: ValueCodec> {
    data_writer: DataWriter<std::fs::File>,
    index_writer: IndexWriter<W>,
    codec: C,
    last_key: Vec<u8>,
}

impl<W: Write + Seek, C: ValueCodec> PBTreeWriter<W, C> {
    /// Creates a writer over `output`, validating `options` against
    /// `codec`'s packed width eagerly rather than failing mid-stream.
    pub fn new(output: W, codec: C, options: PBTreeWriterOptions) -> Result<Self, PBTreeError> {
        if options.block_size == 0 {
            return Err(PBTreeError::Config("block_size must be positive".into()));
        }
        let value_size = codec.packed_size();
        if value_size == 0 {
            return Err(PBTreeError::Config(
                "value codec must pack at least one byte".into(),
            ));
        }
        let block_size = options.block_size as usize;
        if value_size + 2 > block_size {
            return Err(PBTreeError::Config(format!(
                "block_size {block_size} too small for a {value_size}-byte value plus a 1-byte key"
            )));
        }

        let spill = tempfile::tempfile()?;
        let data_writer = DataWriter::new(spill, block_size, options.terminator);
        let index_writer = IndexWriter::new(output, block_size, options.terminator)?;

        Ok(Self {
            data_writer,
            index_writer,
            codec,
            last_key: Vec::new(),
        })
    }

    /// Adds one `(key, value)` pair. Keys must arrive in strictly
    /// ascending order; this is a caller contract that is not checked
    /// here (see `DESIGN.md`).
    pub fn add(&mut self, key: &[u8], value: &C::Value) -> Result<(), PBTreeError> {
        let packed = self.codec.pack(value);
        if let Some(first_key_of_new_block) = self.data_writer.add(key, &packed)? {
            let prefix = significant(&self.last_key, &first_key_of_new_block);
            self.index_writer.add(0, prefix)?;
        }
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        Ok(())
    }

    /// Finalizes the index, then the data segment, then streams the
    /// data segment onto the output sink in [`DISK_BLOCK_SIZE`] chunks.
    /// Returns the completed output.
    pub fn commit(mut self) -> Result<W, PBTreeError> {
        self.index_writer.finish()?;
        self.data_writer.finish()?;

        let mut output = self.index_writer.into_inner();
        let mut data = self.data_writer.into_inner();

        let mut buf = vec![0u8; DISK_BLOCK_SIZE];
        loop {
            let n = data.read(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
        }
        Ok(output)
    }
}

/// A [`PBTreeWriter`] packing a single little-endian integer per key.
pub type ScalarPBTreeWriter<W> = PBTreeWriter<W, ScalarFormat>;

/// A [`PBTreeWriter`] packing an ordered tuple of named integer fields
/// per key.
pub type RecordPBTreeWriter<W> = PBTreeWriter<W, RecordFormat>;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn data_writer_single_entry_has_expected_byte_layout() {
        let sink = Cursor::new(Vec::new());
        let mut writer = DataWriter::new(sink, 4096, 0);
        let opened = writer.add(b"blah", &1u64.to_le_bytes()).unwrap();
        assert!(opened.is_none());
        writer.finish().unwrap();

        let bytes = writer.into_inner().into_inner();
        assert_eq!(&bytes[0..4], b"blah");
        assert_eq!(bytes[4], 0);
        assert_eq!(&bytes[5..13], &1u64.to_le_bytes());
        assert_eq!(bytes.len(), 4096);
    }

    #[test]
    fn data_writer_flushes_and_reports_new_block() {
        let sink = Cursor::new(Vec::new());
        let mut writer = DataWriter::new(sink, 16, 0);
        // "b\01234567890" -> 1+1+10 = 12 bytes, remaining 4 after first add.
        assert!(writer.add(b"b", &[0u8; 10]).unwrap().is_none());
        // second add needs 1+1+10=12 > remaining(4) -> flush, new block opens with "c".
        let opened = writer.add(b"c", &[0u8; 10]).unwrap();
        assert_eq!(opened, Some(b"c".to_vec()));
    }

    #[test]
    fn data_writer_rejects_oversized_item() {
        let sink = Cursor::new(Vec::new());
        let mut writer = DataWriter::new(sink, 8, 0);
        let err = writer.add(b"toolongkey", &[0u8; 4]).unwrap_err();
        assert!(matches!(err, PBTreeError::ItemExceedsBlockSize(_)));
    }

    #[test]
    fn index_writer_two_keys_one_per_block() {
        let output = Cursor::new(Vec::new());
        let mut writer = IndexWriter::new(output, 10, 0).unwrap();
        writer.add(0, b"b").unwrap();
        writer.add(0, b"c").unwrap();
        let blocks_written = writer.finish().unwrap();
        assert_eq!(blocks_written, 3);

        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len(), 8 + 30);

        let region = &bytes[8..];
        let root = &region[0..10];
        assert_eq!(root, b"\x01\x00\x00\x00c\x00\x02\x00\x00\x00");
        let block_1 = &region[10..20];
        assert_eq!(block_1, b"\x03\x00\x00\x00b\x00\x04\x00\x00\x00");
        let block_2 = &region[20..30];
        assert_eq!(block_2, b"\x04\x00\x00\x00c\x00\x05\x00\x00\x00");
    }

    #[test]
    fn facade_roundtrip_single_key() {
        let output = Cursor::new(Vec::new());
        let mut writer =
            PBTreeWriter::new(output, ScalarFormat::default(), PBTreeWriterOptions::default())
                .unwrap();
        writer.add(b"only", &42).unwrap();
        let out = writer.commit().unwrap();
        let bytes = out.into_inner();
        assert!(bytes.len() > crate::pbtree::HEADER_SIZE);
    }
}
