use std::io::Cursor;

use memmap2::Mmap;

use crate::pbtree::{PBTreeWriter, PBTreeWriterOptions, PBTreeReader};
use crate::value::ScalarFormat;

fn write_and_reopen(keys: &[&str], block_size: u32) -> PBTreeReader<ScalarFormat> {
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

    for (i, key) in keys.iter().enumerate() {
        writer.add(key.as_bytes(), &(i as u64)).unwrap();
    }
    let bytes = writer.commit().unwrap().into_inner();

    let mut file = tempfile::tempfile().unwrap();
    std::io::Write::write_all(&mut file, &bytes).unwrap();
    let mmap = unsafe { Mmap::map(&file).unwrap() };
    PBTreeReader::from_mmap(mmap, ScalarFormat::default(), 0).unwrap()
}

#[test]
fn many_keys_force_a_multi_level_index() {
    let keys: Vec<String> = (0..500).map(|i| format!("key-{i:04}")).collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let reader = write_and_reopen(&key_refs, 64);

    assert!(reader.count_levels().unwrap() >= 2);

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(reader.get(key.as_bytes()).unwrap(), Some(i as u64));
    }
    assert_eq!(reader.get(b"not-present").unwrap(), None);
}

#[test]
fn full_scan_recovers_ascending_order() {
    let keys = ["apple", "banana", "cherry", "date", "elderberry"];
    let reader = write_and_reopen(&keys, 4096);

    let items: Vec<_> = reader
        .items(b"")
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let recovered: Vec<_> = items.iter().map(|(k, _)| k.clone()).collect();
    let expected: Vec<_> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
    assert_eq!(recovered, expected);

    for (i, (_, value)) in items.iter().enumerate() {
        assert_eq!(*value, i as u64);
    }
}

#[test]
fn single_key_file_is_readable() {
    let reader = write_and_reopen(&["solo"], 4096);
    assert_eq!(reader.get(b"solo").unwrap(), Some(0));
    assert_eq!(reader.count_levels().unwrap(), 1);
}
