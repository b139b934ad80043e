//! Fixtures shared by archive and descriptor tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::archive::Archive;
use crate::error::Result;
use crate::output::{Entry, OutputProcessor};

pub(crate) fn create_test_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    create_test_zip_with(files, CompressionMethod::Deflated)
}

pub(crate) fn create_test_zip_with(files: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(method);

        for (name, content) in files {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
        }
        zip.finish().unwrap();
    }
    buf
}

/// An EAR-like archive two levels deep:
///
/// ```text
/// readme.txt
/// lib/                      (directory)
/// lib/outer.jar
///   a.txt
///   inner.rar
///     x.txt                 "old"
///     META-INF/ra.xml
///   META-INF/MANIFEST.MF
/// lib/other.jar
///   z.txt
/// web.war
///   WEB-INF/web.xml
/// ```
pub(crate) fn nested_fixture() -> Vec<u8> {
    let inner = create_test_zip(&[
        ("x.txt", b"old"),
        ("META-INF/", b""),
        ("META-INF/ra.xml", b"<connector><resourceadapter/></connector>"),
    ]);
    let outer = create_test_zip(&[
        ("a.txt", b"A"),
        ("inner.rar", &inner),
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
    ]);
    let other = create_test_zip(&[("z.txt", b"Z")]);
    let web = create_test_zip(&[("WEB-INF/web.xml", b"<web-app/>")]);

    create_test_zip(&[
        ("readme.txt", b"read me"),
        ("lib/", b""),
        ("lib/outer.jar", &outer),
        ("lib/other.jar", &other),
        ("web.war", &web),
    ])
}

pub(crate) fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Content of every leaf, keyed by virtual path.
pub(crate) fn snapshot(archive: &Archive) -> BTreeMap<String, Vec<u8>> {
    let mut collect = Collect::default();
    archive.expand(&[], &mut collect).unwrap();
    collect.0
}

/// Compressed bytes of a top-level entry as stored in `zip_data`.
pub(crate) fn raw_entry(zip_data: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(zip_data)).unwrap();
    for i in 0..archive.len() {
        let mut file = archive.by_index_raw(i).unwrap();
        if file.name() == name {
            let mut raw = Vec::new();
            file.read_to_end(&mut raw).unwrap();
            return raw;
        }
    }
    panic!("no entry named {name}");
}

/// Whether `dir` contains any leftover `*.tmp.zip` file.
pub(crate) fn has_temp_files(dir: &Path) -> bool {
    fs::read_dir(dir)
        .unwrap()
        .any(|e| e.unwrap().file_name().to_string_lossy().ends_with(".tmp.zip"))
}

#[derive(Default)]
pub(crate) struct Collect(pub(crate) BTreeMap<String, Vec<u8>>);

impl OutputProcessor for Collect {
    fn process(&mut self, reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.0.insert(entry.path.to_string(), bytes);
        Ok(())
    }
}
