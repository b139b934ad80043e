use std::fs;
use std::io::Read;

use zip::CompressionMethod;

use super::test_support::*;
use super::*;
use crate::matcher::GlobMatcher;
use crate::output::{DirectoryOutput, Entry};
use crate::path::UPDATE_EXTENSIONS;

fn quiet(path: impl Into<PathBuf>) -> Archive {
    Archive::with_options(
        path,
        ArchiveOptions {
            verbosity: Verbosity::Quiet,
            ..Default::default()
        },
    )
}

#[test]
fn test_expand_all_uses_virtual_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());

    let entries = snapshot(&quiet(path));
    let paths: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(
        paths,
        vec![
            "lib/other.jar#/z.txt",
            "lib/outer.jar#/META-INF/MANIFEST.MF",
            "lib/outer.jar#/a.txt",
            "lib/outer.jar#/inner.rar#/META-INF/ra.xml",
            "lib/outer.jar#/inner.rar#/x.txt",
            "readme.txt",
            "web.war#/WEB-INF/web.xml",
        ]
    );
    assert_eq!(entries["lib/outer.jar#/inner.rar#/x.txt"], b"old");
}

#[test]
fn test_expand_with_matchers_selects_leaves_only() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());

    let xml = GlobMatcher::new("**/*.xml");
    let mut collect = Collect::default();
    quiet(path).expand(&[&xml], &mut collect).unwrap();

    let paths: Vec<&str> = collect.0.keys().map(String::as_str).collect();
    assert_eq!(
        paths,
        vec!["lib/outer.jar#/inner.rar#/META-INF/ra.xml", "web.war#/WEB-INF/web.xml"]
    );
}

#[test]
fn test_expand_by_extension_treats_other_suffixes_as_leaves() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());

    let mut collect = Collect::default();
    quiet(path)
        .expand_by_extension(&[".war"], &[], &mut collect)
        .unwrap();

    assert!(collect.0.contains_key("lib/outer.jar"));
    assert!(collect.0.contains_key("web.war#/WEB-INF/web.xml"));
    assert!(!collect.0.keys().any(|k| k.starts_with("lib/outer.jar#/")));
}

#[test]
fn test_expand_into_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());
    let out_dir = temp_dir.path().join("out");

    let mut out = DirectoryOutput::new(&out_dir);
    quiet(path).expand(&[], &mut out).unwrap();

    assert_eq!(out.written(), 7);
    assert_eq!(
        fs::read(out_dir.join("lib/outer.jar/inner.rar/x.txt")).unwrap(),
        b"old"
    );
    assert_eq!(fs::read(out_dir.join("readme.txt")).unwrap(), b"read me");
}

#[test]
fn test_fetch_file_nested_missing_and_empty() {
    let temp_dir = tempfile::tempdir().unwrap();
    let jar = create_test_zip(&[("x.txt", b"X")]);
    let bytes = create_test_zip(&[("empty.txt", b""), ("lib/a.jar", &jar)]);
    let archive = quiet(write_archive(temp_dir.path(), "app.ear", &bytes));

    assert_eq!(archive.fetch_file("lib/a.jar#/x.txt").unwrap(), Some(b"X".to_vec()));
    assert_eq!(archive.fetch_file("empty.txt").unwrap(), Some(Vec::new()));
    assert_eq!(archive.fetch_file("nope.txt").unwrap(), None);
}

#[test]
fn test_fetch_file_is_suffix_based() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive = quiet(write_archive(temp_dir.path(), "app.ear", &nested_fixture()));

    let ra = archive.fetch_file("META-INF/ra.xml").unwrap().unwrap();
    assert_eq!(ra, b"<connector><resourceadapter/></connector>");
}

#[test]
fn test_fetch_file_memory_maps_large_archives() {
    let temp_dir = tempfile::tempdir().unwrap();
    let big: Vec<u8> = (0..2 * 1024 * 1024u64).map(|i| (i * 7919 % 251) as u8).collect();
    let bytes = create_test_zip_with(
        &[("big.bin", &big), ("small.txt", b"small")],
        CompressionMethod::Stored,
    );
    assert!(bytes.len() as u64 > read::MMAP_THRESHOLD);
    let archive = quiet(write_archive(temp_dir.path(), "big.zip", &bytes));

    assert_eq!(archive.fetch_file("small.txt").unwrap(), Some(b"small".to_vec()));
    assert_eq!(archive.fetch_file("big.bin").unwrap().unwrap(), big);
}

/// Overwrite the uncompressed size in every ZIP64 extra field that records `size`.
fn claim_zip64_size(bytes: &mut [u8], size: u64, claimed: u64) {
    let mut i = 0;
    while i + 12 <= bytes.len() {
        let is_zip64 = bytes[i..i + 2] == [0x01, 0x00];
        let len = u16::from_le_bytes([bytes[i + 2], bytes[i + 3]]);
        if is_zip64 && len >= 8 && bytes[i + 4..i + 12] == size.to_le_bytes() {
            bytes[i + 4..i + 12].copy_from_slice(&claimed.to_le_bytes());
            i += 12;
        } else {
            i += 1;
        }
    }
}

#[test]
fn test_fetch_file_survives_bogus_zip64_size() {
    let mut bytes = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut bytes));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        zip.start_file("x.txt", options).unwrap();
        std::io::Write::write_all(&mut zip, b"hello").unwrap();
        zip.finish().unwrap();
    }
    claim_zip64_size(&mut bytes, 5, 0x7fff_ffff_ffff_0000);

    let temp_dir = tempfile::tempdir().unwrap();
    let archive = quiet(write_archive(temp_dir.path(), "huge.zip", &bytes));

    // Either a format error or the real content; never an allocation abort
    if let Ok(found) = archive.fetch_file("x.txt") {
        assert_eq!(found.as_deref(), Some(&b"hello"[..]));
    }
}

#[test]
fn test_processor_failure_carries_breadcrumbs() {
    struct Failing;
    impl OutputProcessor for Failing {
        fn process(&mut self, _reader: &mut dyn Read, _entry: &Entry<'_>) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());
    let only_x = SuffixMatcher::new("x.txt");

    let err = quiet(&path).expand(&[&only_x], &mut Failing).unwrap_err();
    match &err {
        Error::Archive { archive, .. } => assert_eq!(archive, &path),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.breadcrumbs(),
        vec![
            "lib/outer.jar",
            "lib/outer.jar#/inner.rar",
            "lib/outer.jar#/inner.rar#/x.txt"
        ]
    );
    assert!(matches!(err.root_cause(), Error::Io(_)));
}

#[test]
fn test_update_with_no_replacements_round_trips() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());
    let archive = quiet(&path);
    let before = snapshot(&archive);

    let stats = archive.update(&mut ReplacementSet::new()).unwrap();

    assert_eq!(snapshot(&archive), before);
    assert_eq!(stats.replaced, 0);
    assert_eq!(stats.nested_rewritten, 0);
    assert_eq!(stats.directories_dropped, 1);
    assert!(!has_temp_files(temp_dir.path()));
}

#[test]
fn test_update_targets_doubly_nested_entry() {
    let temp_dir = tempfile::tempdir().unwrap();
    let original = nested_fixture();
    let path = write_archive(temp_dir.path(), "app.ear", &original);
    let archive = quiet(&path);
    let before = snapshot(&archive);

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("lib/outer.jar#/inner.rar#/x.txt", "new", true);
    let stats = archive.update(&mut replacements).unwrap();

    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.nested_rewritten, 2);
    assert_eq!(
        archive.fetch_file("lib/outer.jar#/inner.rar#/x.txt").unwrap(),
        Some(b"new".to_vec())
    );

    let mut expected = before;
    expected.insert("lib/outer.jar#/inner.rar#/x.txt".to_string(), b"new".to_vec());
    assert_eq!(snapshot(&archive), expected);

    // Untouched top-level siblings are copied without recompression
    let updated = fs::read(&path).unwrap();
    for name in ["readme.txt", "lib/other.jar", "web.war"] {
        assert_eq!(raw_entry(&original, name), raw_entry(&updated, name), "{name}");
    }
}

#[test]
fn test_update_many_replacements_in_one_pass() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());
    let archive = quiet(&path);

    let stats = archive
        .update_with_memory_payloads([
            ("readme.txt", b"top".to_vec()),
            ("web.war#/WEB-INF/web.xml", b"<web-app version=\"3.0\"/>".to_vec()),
            ("lib/outer.jar#/a.txt", b"AA".to_vec()),
        ])
        .unwrap();

    assert_eq!(stats.replaced, 3);
    let after = snapshot(&archive);
    assert_eq!(after["readme.txt"], b"top");
    assert_eq!(after["web.war#/WEB-INF/web.xml"], b"<web-app version=\"3.0\"/>");
    assert_eq!(after["lib/outer.jar#/a.txt"], b"AA");
    assert_eq!(after["lib/outer.jar#/inner.rar#/x.txt"], b"old");
}

#[test]
fn test_update_must_exist_violation_leaves_file_untouched() {
    let temp_dir = tempfile::tempdir().unwrap();
    let original = nested_fixture();
    let path = write_archive(temp_dir.path(), "app.ear", &original);

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("readme.txt", "changed", true);
    replacements.add_bytes("lib/outer.jar#/inner.rar#/missing.txt", "x", true);
    let err = quiet(&path).update(&mut replacements).unwrap_err();

    match err.root_cause() {
        Error::NotUpdated { path } => assert_eq!(path, "lib/outer.jar#/inner.rar#/missing.txt"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), original);
    assert!(!has_temp_files(temp_dir.path()));
}

#[test]
fn test_update_optional_missing_target_adds_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &nested_fixture());
    let archive = quiet(&path);
    let before = snapshot(&archive);

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("lib/outer.jar#/brand-new.txt", "x", false);
    archive.update(&mut replacements).unwrap();

    assert_eq!(snapshot(&archive), before);
    assert_eq!(replacements.consumed(), 0);
}

#[test]
fn test_update_failure_at_any_position_is_atomic() {
    let targets = [
        "readme.txt",
        "lib/outer.jar#/a.txt",
        "lib/outer.jar#/inner.rar#/x.txt",
        "web.war#/WEB-INF/web.xml",
    ];

    for target in targets {
        let temp_dir = tempfile::tempdir().unwrap();
        let original = nested_fixture();
        let path = write_archive(temp_dir.path(), "app.ear", &original);

        // A payload file that cannot be opened fails the pass at `target`
        let mut replacements = ReplacementSet::new();
        replacements.add_bytes("lib/other.jar#/z.txt", "first", false);
        replacements.add_file(target, temp_dir.path().join("does-not-exist"), true);
        let err = quiet(&path).update(&mut replacements).unwrap_err();

        assert_eq!(err.breadcrumbs().last().copied(), Some(target), "{target}");
        assert_eq!(fs::read(&path).unwrap(), original, "{target}");
        assert!(!has_temp_files(temp_dir.path()), "{target}");
    }
}

#[test]
fn test_update_after_lost_original_keeps_recovery_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let recovery = nested_fixture();
    let temp_path = write_archive(temp_dir.path(), "app.ear.tmp.zip", &recovery);
    let path = temp_dir.path().join("app.ear");

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("readme.txt", "changed", true);
    let err = quiet(&path).update(&mut replacements).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Io(_)));
    assert!(quiet(&path).recompress(9).is_err());

    assert_eq!(fs::read(&temp_path).unwrap(), recovery);
    assert!(!path.exists());
}

#[test]
fn test_update_refuses_to_clobber_leftover_temp_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let original = nested_fixture();
    let path = write_archive(temp_dir.path(), "app.ear", &original);
    let temp_path = write_archive(temp_dir.path(), "app.ear.tmp.zip", b"recovery copy");

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("readme.txt", "changed", true);
    let err = quiet(&path).update(&mut replacements).unwrap_err();

    match err.root_cause() {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), original);
    assert_eq!(fs::read(&temp_path).unwrap(), b"recovery copy");
}

#[test]
fn test_update_on_corrupt_archive_fails_cleanly() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "broken.ear", b"definitely not a zip file");

    let mut replacements = ReplacementSet::new();
    replacements.add_bytes("x.txt", "x", true);
    let err = quiet(&path).update(&mut replacements).unwrap_err();

    assert!(matches!(err, Error::Archive { .. }));
    assert!(matches!(err.root_cause(), Error::Zip(_)));
    assert_eq!(fs::read(&path).unwrap(), b"definitely not a zip file");
    assert!(!has_temp_files(temp_dir.path()));
}

#[test]
fn test_update_extension_set_is_exact() {
    let nested = create_test_zip(&[("x.txt", b"old")]);
    let bytes = create_test_zip(&[
        ("thing.war", &nested),
        ("thing.WAR", &nested),
        ("thing.warx", &nested),
        ("thing.ear", &nested),
    ]);
    assert!(!crate::path::is_container("thing.ear", UPDATE_EXTENSIONS));

    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.zip", &bytes);
    let archive = quiet(&path);

    // Only `.war` is opened during an update
    archive
        .update_with_memory_payloads([("thing.war#/x.txt", "new")])
        .unwrap();
    for leaf in ["thing.WAR#/x.txt", "thing.warx#/x.txt", "thing.ear#/x.txt"] {
        let mut replacements = ReplacementSet::new();
        replacements.add_bytes(leaf, "new", true);
        let err = archive.update(&mut replacements).unwrap_err();
        assert!(matches!(err.root_cause(), Error::NotUpdated { .. }), "{leaf}");
    }

    // The others are plain leaves and can be replaced wholesale
    archive
        .update_with_memory_payloads([("thing.WAR", "flat")])
        .unwrap();
    let mut collect = Collect::default();
    archive.expand_by_extension(UPDATE_EXTENSIONS, &[], &mut collect).unwrap();
    assert_eq!(collect.0["thing.war#/x.txt"], b"new");
    assert_eq!(collect.0["thing.WAR"], b"flat");
    assert_eq!(collect.0["thing.warx"], nested);
}

#[test]
fn test_update_preserves_timestamps_and_archive_comment() {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let dt = zip::DateTime::from_date_and_time(2019, 3, 4, 5, 6, 8).unwrap();
        let options = zip::write::SimpleFileOptions::default().last_modified_time(dt);
        zip.set_comment("built by ant");
        zip.start_file("conf.xml", options).unwrap();
        std::io::Write::write_all(&mut zip, b"<a/>").unwrap();
        zip.finish().unwrap();
    }

    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.jar", &buf);
    let archive = quiet(&path);
    archive.update_with_memory_payloads([("conf.xml", "<b/>")]).unwrap();

    let entries = archive.list().unwrap();
    let modified = entries[0].modified.unwrap();
    assert_eq!((modified.year(), modified.month(), modified.day()), (2019, 3, 4));
    assert_eq!((modified.hour(), modified.minute(), modified.second()), (5, 6, 8));

    let reread = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(reread.comment(), b"built by ant");
}

#[test]
fn test_recompress_shrinks_stored_archive() {
    let text = "lorem ipsum dolor sit amet ".repeat(2000);
    let nested = create_test_zip_with(&[("big.txt", text.as_bytes())], CompressionMethod::Stored);
    let bytes = create_test_zip_with(
        &[("notes.txt", text.as_bytes()), ("lib/a.jar", &nested), ("dir/", b"")],
        CompressionMethod::Stored,
    );

    let temp_dir = tempfile::tempdir().unwrap();
    let path = write_archive(temp_dir.path(), "app.ear", &bytes);
    let archive = quiet(&path);
    let before = snapshot(&archive);

    let report = archive.recompress(9).unwrap();

    assert_eq!(report.before, bytes.len() as u64);
    assert!(report.after < report.before / 4, "{report:?}");
    assert_eq!(report.stats.recompressed, 2);
    assert_eq!(report.stats.nested_rewritten, 1);
    assert_eq!(snapshot(&archive), before);
    assert!(!has_temp_files(temp_dir.path()));
}

#[test]
fn test_list_and_verify() {
    let temp_dir = tempfile::tempdir().unwrap();
    let archive = quiet(write_archive(temp_dir.path(), "app.ear", &nested_fixture()));

    let entries = archive.list().unwrap();
    assert_eq!(entries.len(), 7);
    let x = entries
        .iter()
        .find(|e| e.path == "lib/outer.jar#/inner.rar#/x.txt")
        .unwrap();
    assert_eq!(x.size, 3);
    assert_eq!(x.depth(), 2);
    assert_eq!(x.crc32, crc32fast::hash(b"old"));

    let report = archive.verify(&[]).unwrap();
    assert_eq!(report.tested, 7);
    assert!(report.is_ok());
}
