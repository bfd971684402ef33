use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use dupesift_core::{FileEntry, NullProgress, ScanOptions, ScanType, Scanner};

const WORDS: &[&str] = &[
    "mountain", "holiday", "sunset", "beach", "party", "concert", "live", "remix", "final",
    "draft", "vacation", "birthday", "wedding", "screenshot", "invoice", "backup",
];

/// Lay out a synthetic corpus on disk; the existence filter stats real
/// paths, so the files have to be there.
fn build_corpus(tmp: &TempDir, count: usize) -> Vec<PathBuf> {
    let mut rng = SmallRng::seed_from_u64(0xd00d);
    let mut paths = Vec::with_capacity(count);
    for index in 0..count {
        let a = WORDS[rng.gen_range(0..WORDS.len())];
        let b = WORDS[rng.gen_range(0..WORDS.len())];
        let name = format!("{a} {b} {index}.txt");
        let path = tmp.path().join(name);
        // A handful of distinct sizes so the contents scan has real buckets.
        fs::write(&path, vec![0u8; rng.gen_range(1..32) * 16]).unwrap();
        paths.push(path);
    }
    paths
}

fn bench_scans(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let paths = build_corpus(&tmp, 1000);

    c.bench_function("filename_scan_1000", |b| {
        let scanner = Scanner::new(ScanOptions {
            scan_type: ScanType::Filename,
            min_match_percentage: 50,
            ..Default::default()
        });
        b.iter(|| {
            let files: Vec<FileEntry> = paths.iter().map(FileEntry::new).collect();
            scanner.get_dupe_groups(files, &NullProgress).unwrap()
        })
    });

    c.bench_function("filename_scan_similar_words_1000", |b| {
        let scanner = Scanner::new(ScanOptions {
            scan_type: ScanType::Filename,
            min_match_percentage: 50,
            match_similar_words: true,
            ..Default::default()
        });
        b.iter(|| {
            let files: Vec<FileEntry> = paths.iter().map(FileEntry::new).collect();
            scanner.get_dupe_groups(files, &NullProgress).unwrap()
        })
    });

    c.bench_function("contents_scan_1000", |b| {
        let scanner = Scanner::new(ScanOptions {
            scan_type: ScanType::Contents,
            ..Default::default()
        });
        b.iter(|| {
            let files: Vec<FileEntry> = paths.iter().map(FileEntry::new).collect();
            scanner.get_dupe_groups(files, &NullProgress).unwrap()
        })
    });
}

criterion_group!(benches, bench_scans);
criterion_main!(benches);
