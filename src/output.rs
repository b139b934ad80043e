//! Sinks for entries selected by a read traversal
//!
//! Two sinks cover the common cases:
//!
//! - [`DirectoryOutput`] writes each entry below a root directory, mapping
//!   nesting separators (`#/`) to directory separators
//! - [`MemoryOutput`] accumulates everything routed to it in one buffer, which
//!   is how a single known file is collected
//!
//! # Examples
//!
//! ```no_run
//! use earpatch::{Archive, DirectoryOutput};
//! use earpatch::matcher::GlobMatcher;
//!
//! let archive = Archive::open("app.ear");
//! let mut out = DirectoryOutput::new("unpacked").overwrite(true);
//! archive.expand(&[&GlobMatcher::new("**/*.xml")], &mut out)?;
//! # Ok::<(), earpatch::Error>(())
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::linux::{drop_written_pages, reserve_for_entry};
use crate::path::NESTING_SEPARATOR;
use crate::utils::datetime_to_filetime;

/// Buffer size for file I/O (256KB for better throughput)
const BUFFER_SIZE: usize = 256 * 1024;

/// Metadata of a leaf entry handed to an [`OutputProcessor`].
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    /// Full virtual path, including nesting prefixes.
    pub path: &'a str,
    /// Entry name within its immediate container.
    pub name: &'a str,
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub modified: Option<zip::DateTime>,
}

/// Receives the decompressed content of every selected entry.
pub trait OutputProcessor {
    fn process(&mut self, reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()>;
}

/// Writes entries into a directory tree.
///
/// `outer.jar#/META-INF/ra.xml` lands at `<root>/outer.jar/META-INF/ra.xml`.
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    root: PathBuf,
    overwrite: bool,
    flatten: bool,
    preserve_timestamps: bool,
    written: usize,
    skipped: usize,
}

impl DirectoryOutput {
    /// Write below `root`, skipping existing files and restoring mtimes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overwrite: false,
            flatten: false,
            preserve_timestamps: true,
            written: 0,
            skipped: 0,
        }
    }

    /// Replace files that already exist. When off, existing files are skipped.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Drop directory structure and write every entry by its short name.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Set file mtimes from the entry headers (default on).
    pub fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    /// Files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Existing files left alone because overwrite is off.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Destination for `entry`, or an error if it would escape the root.
    pub fn destination(&self, entry: &Entry<'_>) -> Result<PathBuf> {
        let relative = if self.flatten {
            PathBuf::from(crate::path::short_name(entry.name))
        } else {
            entry
                .path
                .split(NESTING_SEPARATOR)
                .flat_map(|segment| segment.split('/'))
                .filter(|part| !part.is_empty())
                .collect::<PathBuf>()
        };

        let escapes = relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(Error::UnsafePath {
                path: entry.path.to_string(),
            });
        }

        Ok(self.root.join(relative))
    }
}

impl OutputProcessor for DirectoryOutput {
    fn process(&mut self, reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()> {
        let outpath = self.destination(entry)?;

        if !self.overwrite && outpath.exists() {
            tracing::debug!(path = entry.path, "skipping existing file");
            self.skipped += 1;
            return Ok(());
        }

        if let Some(parent) = outpath.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        write_file(reader, &outpath, entry)?;

        if self.preserve_timestamps
            && let Some(dt) = entry.modified
        {
            filetime::set_file_mtime(&outpath, datetime_to_filetime(dt)).ok();
        }

        tracing::debug!(path = entry.path, dest = %outpath.display(), "extracted");
        self.written += 1;
        Ok(())
    }
}

fn write_file(reader: &mut dyn Read, outpath: &Path, entry: &Entry<'_>) -> Result<u64> {
    let outfile = File::create(outpath)?;
    reserve_for_entry(&outfile, entry.size, entry.compressed_size);

    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, outfile);
    let written = std::io::copy(reader, &mut writer)?;
    let inner = writer.into_inner().map_err(|e| e.into_error())?;

    drop_written_pages(&inner, written);
    Ok(written)
}

/// Collects all selected entries into one buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutput {
    buffer: Vec<u8>,
    hits: usize,
}

impl MemoryOutput {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries routed here so far.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Everything collected, entries concatenated in traversal order.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl OutputProcessor for MemoryOutput {
    fn process(&mut self, reader: &mut dyn Read, entry: &Entry<'_>) -> Result<()> {
        // Header sizes are untrusted; read_to_end grows the buffer as needed
        self.buffer.reserve(entry.size.min(BUFFER_SIZE as u64) as usize);
        reader.read_to_end(&mut self.buffer)?;
        self.hits += 1;
        Ok(())
    }
}
