//! Fixed-width value packers.
//!
//! The core format treats values as opaque, fixed-width bytes — only
//! the packed width matters to block layout (see
//! [`crate::pbtree`]'s on-disk layout docs). This module supplies the
//! two standard packers named in the format: a single little-endian
//! scalar, and an ordered tuple of named little-endian fields.

use std::collections::BTreeMap;

/// Encodes and decodes the fixed-width value half of a PBTree entry.
///
/// Implementations must be deterministic and must always produce
/// exactly `packed_size()` bytes from `pack`.
pub trait ValueCodec {
    /// The in-memory representation callers work with.
    type Value;

    /// Width in bytes of every packed value. Constant for the
    /// lifetime of a codec instance — the core relies on this to size
    /// blocks.
    fn packed_size(&self) -> usize;

    /// Serialize `value` into exactly `packed_size()` bytes.
    fn pack(&self, value: &Self::Value) -> Vec<u8>;

    /// Deserialize a value from a `packed_size()`-byte slice.
    ///
    /// `bytes` is guaranteed by callers to be exactly `packed_size()`
    /// bytes, sliced straight out of a leaf block.
    fn unpack(&self, bytes: &[u8]) -> Self::Value;
}

/// Width of a single little-endian unsigned integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarWidth {
    /// 1 byte.
    U8,
    /// 2 bytes, little-endian.
    U16,
    /// 4 bytes, little-endian.
    U32,
    /// 8 bytes, little-endian.
    U64,
}

impl ScalarWidth {
    fn size(self) -> usize {
        match self {
            ScalarWidth::U8 => 1,
            ScalarWidth::U16 => 2,
            ScalarWidth::U32 => 4,
            ScalarWidth::U64 => 8,
        }
    }
}

/// Packs a single little-endian unsigned integer per key, at a
/// configurable width.
#[derive(Debug, Clone, Copy)]
pub struct ScalarFormat {
    width: ScalarWidth,
}

impl ScalarFormat {
    /// Create a scalar codec of the given integer width.
    pub fn new(width: ScalarWidth) -> Self {
        Self { width }
    }
}

impl Default for ScalarFormat {
    /// Defaults to `u64`.
    fn default() -> Self {
        Self::new(ScalarWidth::U64)
    }
}

impl ValueCodec for ScalarFormat {
    type Value = u64;

    fn packed_size(&self) -> usize {
        self.width.size()
    }

    fn pack(&self, value: &u64) -> Vec<u8> {
        match self.width {
            ScalarWidth::U8 => vec![*value as u8],
            ScalarWidth::U16 => (*value as u16).to_le_bytes().to_vec(),
            ScalarWidth::U32 => (*value as u32).to_le_bytes().to_vec(),
            ScalarWidth::U64 => value.to_le_bytes().to_vec(),
        }
    }

    fn unpack(&self, bytes: &[u8]) -> u64 {
        match self.width {
            ScalarWidth::U8 => bytes[0] as u64,
            ScalarWidth::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u64,
            ScalarWidth::U32 => u32::from_le_bytes(bytes[..4].try_into().unwrap()) as u64,
            ScalarWidth::U64 => u64::from_le_bytes(bytes[..8].try_into().unwrap()),
        }
    }
}

/// Packs an ordered tuple of named little-endian integer fields.
///
/// The caller supplies a map of field name to value, and the codec
/// projects it into the fixed field order it was constructed with.
#[derive(Debug, Clone)]
pub struct RecordFormat {
    fields: Vec<(String, ScalarWidth)>,
}

impl RecordFormat {
    /// Build a record codec from an ordered list of `(field name,
    /// width)` pairs. Field order determines on-disk byte order.
    pub fn new(fields: Vec<(String, ScalarWidth)>) -> Self {
        Self { fields }
    }
}

impl ValueCodec for RecordFormat {
    type Value = BTreeMap<String, u64>;

    fn packed_size(&self) -> usize {
        self.fields.iter().map(|(_, w)| w.size()).sum()
    }

    fn pack(&self, value: &BTreeMap<String, u64>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.packed_size());
        for (name, width) in &self.fields {
            let v = value.get(name).copied().unwrap_or(0);
            let scalar = ScalarFormat::new(*width);
            buf.extend_from_slice(&scalar.pack(&v));
        }
        buf
    }

    fn unpack(&self, bytes: &[u8]) -> BTreeMap<String, u64> {
        let mut out = BTreeMap::new();
        let mut offset = 0;
        for (name, width) in &self.fields {
            let size = width.size();
            let scalar = ScalarFormat::new(*width);
            out.insert(name.clone(), scalar.unpack(&bytes[offset..offset + size]));
            offset += size;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_u64_roundtrip() {
        let codec = ScalarFormat::default();
        assert_eq!(codec.packed_size(), 8);
        let packed = codec.pack(&42);
        assert_eq!(packed, 42u64.to_le_bytes());
        assert_eq!(codec.unpack(&packed), 42);
    }

    #[test]
    fn scalar_narrow_widths_roundtrip() {
        let codec = ScalarFormat::new(ScalarWidth::U16);
        let packed = codec.pack(&1234);
        assert_eq!(packed.len(), 2);
        assert_eq!(codec.unpack(&packed), 1234);
    }

    #[test]
    fn record_roundtrip_preserves_field_order() {
        let codec = RecordFormat::new(vec![
            ("a".to_string(), ScalarWidth::U64),
            ("b".to_string(), ScalarWidth::U32),
        ]);
        assert_eq!(codec.packed_size(), 12);

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 7);
        value.insert("b".to_string(), 9);

        let packed = codec.pack(&value);
        assert_eq!(&packed[0..8], &7u64.to_le_bytes());
        assert_eq!(&packed[8..12], &9u32.to_le_bytes());

        assert_eq!(codec.unpack(&packed), value);
    }

    #[test]
    fn record_missing_field_defaults_to_zero() {
        let codec = RecordFormat::new(vec![("a".to_string(), ScalarWidth::U8)]);
        let value = BTreeMap::new();
        assert_eq!(codec.pack(&value), vec![0]);
    }
}
