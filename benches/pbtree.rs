//! Writer build throughput and reader point-lookup latency over a
//! generated sorted corpus.

use std::io::Cursor;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pbtree::pbtree::{PBTreeReader, PBTreeWriter, PBTreeWriterOptions};
use pbtree::value::ScalarFormat;
use rand::Rng;

fn sorted_corpus(n: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rng();
    let mut keys: Vec<Vec<u8>> = (0..n)
        .map(|_| {
            let len = rng.random_range(8..24);
            (0..len).map(|_| rng.random_range(b'a'..=b'z')).collect()
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn build_file(keys: &[Vec<u8>], block_size: u32) -> Vec<u8> {
    let mut writer = PBTreeWriter::new(
        Cursor::new(Vec::new()),
        ScalarFormat::default(),
        PBTreeWriterOptions {
            block_size,
            terminator: 0,
        },
    )
    .unwrap();
    for (i, key) in keys.iter().enumerate() {
        writer.add(key, &(i as u64)).unwrap();
    }
    writer.commit().unwrap().into_inner()
}

fn bench_build(c: &mut Criterion) {
    let keys = sorted_corpus(50_000);
    let mut group = c.benchmark_group("pbtree_build");
    group.bench_with_input(BenchmarkId::new("50k_keys", "4k_blocks"), &keys, |b, keys| {
        b.iter(|| build_file(keys, 4096));
    });
    group.finish();
}

fn bench_point_lookup(c: &mut Criterion) {
    let keys = sorted_corpus(50_000);
    let bytes = build_file(&keys, 4096);

    let mut file = tempfile::tempfile().unwrap();
    std::io::Write::write_all(&mut file, &bytes).unwrap();
    let mmap = unsafe { memmap2::Mmap::map(&file).unwrap() };
    let reader = PBTreeReader::from_mmap(mmap, ScalarFormat::default(), 0).unwrap();

    let mut rng = rand::rng();
    let mut group = c.benchmark_group("pbtree_get");
    group.bench_function("50k_keys", |b| {
        b.iter(|| {
            let key = &keys[rng.random_range(0..keys.len())];
            reader.get(key).unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_point_lookup);
criterion_main!(benches);
