//! Read traversal
//!
//! Entries are visited in central-directory order. Directories are skipped,
//! entries whose name ends with a nested-archive suffix are opened and walked
//! under the extended prefix, and every other entry is offered to the output
//! if a matcher accepts its virtual path.
//!
//! A nested archive is read fully into memory before it is walked, since the
//! ZIP central directory sits at the end of the data and a decompressing
//! reader cannot seek.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use memmap2::Mmap;
use zip::ZipArchive;

use super::Verbosity;
use crate::error::{Error, Result};
use crate::linux::{advise_archive_mapping, advise_archive_read};
use crate::matcher::{Matcher, any_matches};
use crate::output::{Entry, OutputProcessor};
use crate::path::{is_container, nested_prefix};

/// Files above this size are memory-mapped rather than read through a buffer.
pub(crate) const MMAP_THRESHOLD: u64 = 1024 * 1024;

pub(crate) struct Walk<'a> {
    pub(crate) extensions: &'a [&'a str],
    pub(crate) matchers: &'a [&'a dyn Matcher],
    pub(crate) verbosity: Verbosity,
}

/// Walk the physical archive at `path`.
pub(crate) fn walk_file(
    path: &Path,
    walk: &Walk<'_>,
    output: &mut dyn OutputProcessor,
) -> Result<()> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    advise_archive_read(&file, file_size);

    if file_size > MMAP_THRESHOLD {
        // SAFETY: the mapping is read-only and dropped before returning; the
        // archive must not be truncated by another process meanwhile, which is
        // the same requirement updates already place on callers
        let mmap = unsafe { Mmap::map(&file) }?;
        advise_archive_mapping(&mmap);

        let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))?;
        walk_archive(&mut archive, "", walk, output)
    } else {
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        walk_archive(&mut archive, "", walk, output)
    }
}

pub(crate) fn walk_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    prefix: &str,
    walk: &Walk<'_>,
    output: &mut dyn OutputProcessor,
) -> Result<()> {
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let path = format!("{prefix}{name}");

        if is_container(&name, walk.extensions) {
            entry_event!(walk.verbosity, path = %path, "descending into nested archive");
            let nested = nested_prefix(prefix, &name);
            walk_nested(&mut file, &nested, walk, output)
                .map_err(|e| Error::entry(&path, &name, e))?;
            continue;
        }

        if !any_matches(walk.matchers, &path) {
            continue;
        }

        let entry = Entry {
            path: &path,
            name: &name,
            size: file.size(),
            compressed_size: file.compressed_size(),
            crc32: file.crc32(),
            modified: file.last_modified(),
        };
        entry_event!(walk.verbosity, path = %path, size = entry.size, "processing entry");
        output
            .process(&mut file, &entry)
            .map_err(|e| Error::entry(&path, &name, e))?;
    }
    Ok(())
}

fn walk_nested(
    reader: &mut dyn Read,
    prefix: &str,
    walk: &Walk<'_>,
    output: &mut dyn OutputProcessor,
) -> Result<()> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let mut nested = ZipArchive::new(Cursor::new(bytes))?;
    walk_archive(&mut nested, prefix, walk, output)
}
