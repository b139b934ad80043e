//! Performance benchmarks for compound archive access
//!
//! Run with: cargo bench

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::TempDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use earpatch::{
    Archive, ArchiveOptions, DirectoryOutput, GlobMatcher, Matcher, ReplacementSet, Verbosity,
};

fn create_zip(files: &[(String, Vec<u8>)], method: CompressionMethod) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default().compression_method(method);

    for (name, data) in files {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
    buffer
}

/// An EAR holding `num_jars` jars of `files_per_jar` files each, plus a RAR
/// with a descriptor.
fn create_compound_archive(
    num_jars: usize,
    files_per_jar: usize,
    bytes_per_file: usize,
) -> Vec<u8> {
    let file_data = vec![0u8; bytes_per_file];
    let mut entries = Vec::new();

    for j in 0..num_jars {
        let classes: Vec<_> = (0..files_per_jar)
            .map(|i| (format!("com/example/Class{:04}.class", i), file_data.clone()))
            .collect();
        entries.push((
            format!("lib/module_{:03}.jar", j),
            create_zip(&classes, CompressionMethod::Deflated),
        ));
    }

    let ra = b"<connector><resourceadapter/></connector>".to_vec();
    let rar = create_zip(&[("META-INF/ra.xml".to_string(), ra)], CompressionMethod::Deflated);
    entries.push(("lib/jms.rar".to_string(), rar));

    create_zip(&entries, CompressionMethod::Stored)
}

fn quiet_archive(path: PathBuf) -> Archive {
    Archive::with_options(
        path,
        ArchiveOptions {
            verbosity: Verbosity::Quiet,
            ..Default::default()
        },
    )
}

/// Benchmark lookup of one nested entry
fn bench_fetch_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_file");

    // ~10MB uncompressed: 20 jars x 50 files @ 10KB
    let zip_data = create_compound_archive(20, 50, 10 * 1024);
    group.throughput(Throughput::Bytes(zip_data.len() as u64));

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.ear");
    std::fs::write(&path, &zip_data).unwrap();
    let archive = quiet_archive(path);

    group.bench_function("nested_descriptor", |b| {
        b.iter(|| {
            let bytes = archive.fetch_file(black_box("lib/jms.rar#/META-INF/ra.xml")).unwrap();
            black_box(bytes);
        });
    });

    group.finish();
}

/// Benchmark a single-entry update; untouched jars are copied raw
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    group.sample_size(20);

    let zip_data = create_compound_archive(20, 50, 10 * 1024);
    group.throughput(Throughput::Bytes(zip_data.len() as u64));

    for (name, target) in [
        ("descriptor_in_small_rar", "lib/jms.rar#/META-INF/ra.xml"),
        ("inside_large_jar", "lib/module_000.jar#/com/example/Class0000.class"),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let temp_dir = TempDir::new().unwrap();
                    let path = temp_dir.path().join("app.ear");
                    std::fs::write(&path, &zip_data).unwrap();
                    (temp_dir, path)
                },
                |(_temp_dir, path)| {
                    let mut replacements = ReplacementSet::new();
                    replacements.add_bytes(target, b"<connector/>".to_vec(), true);
                    quiet_archive(path).update(black_box(&mut replacements)).unwrap();
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark recursive extraction of every entry
fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");
    group.sample_size(20);

    let zip_data = create_compound_archive(10, 100, 10 * 1024);
    group.throughput(Throughput::Bytes((10 * 100 * 10 * 1024) as u64));

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.ear");
    std::fs::write(&path, &zip_data).unwrap();
    let archive = quiet_archive(path);

    group.bench_function("10MB_1000_files", |b| {
        b.iter(|| {
            let out_dir = TempDir::new().unwrap();
            let mut out = DirectoryOutput::new(out_dir.path());
            archive.expand(&[], &mut out).unwrap();
        });
    });

    group.finish();
}

/// Benchmark glob matching over virtual paths (no I/O)
fn bench_glob_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob_match");

    let patterns = vec![
        ("simple_wildcard", "*.xml", "ra.xml"),
        ("recursive_wildcard", "**/*.xml", "app.ear#/lib/jms.rar#/META-INF/ra.xml"),
        ("question_mark", "lib/module_00?.jar", "lib/module_001.jar"),
        ("no_wildcard", "META-INF/ra.xml", "META-INF/ra.xml"),
    ];

    for (name, pattern, text) in patterns {
        let matcher = GlobMatcher::new(pattern);
        group.bench_with_input(BenchmarkId::from_parameter(name), &text, |b, &t| {
            b.iter(|| {
                black_box(matcher.matches(t));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fetch_file, bench_update, bench_expand, bench_glob_match);
criterion_main!(benches);
