//! Compound archive access
//!
//! An [`Archive`] treats a ZIP-family file as a recursively nested virtual
//! filesystem. Entries inside nested archives are addressed by virtual paths
//! such as `app.ear#/lib/connector.rar#/META-INF/ra.xml` (see [`crate::path`]).
//!
//! # Operations
//!
//! - **Read** ([`expand`](Archive::expand), [`fetch_file`](Archive::fetch_file),
//!   [`list`](Archive::list), [`verify`](Archive::verify)): a linear scan of the
//!   container that descends into every nested archive of the expansion set and
//!   hands selected leaf entries to an [`OutputProcessor`]
//! - **Write** ([`update`](Archive::update), [`recompress`](Archive::recompress)):
//!   the container is rewritten entry by entry into `<file>.tmp.zip`, which is
//!   renamed over the original only after the whole pass succeeded
//!
//! # Atomicity
//!
//! Readers of the physical file observe either the old or the new archive,
//! never a partial one. There is no locking between writers: callers must not
//! run two updates on the same file concurrently.
//!
//! # Examples
//!
//! ```no_run
//! use earpatch::{Archive, ReplacementSet};
//!
//! let archive = Archive::open("app.ear");
//! let ra = archive.fetch_file("lib/connector.rar#/META-INF/ra.xml")?;
//!
//! let mut replacements = ReplacementSet::new();
//! replacements.add_bytes("lib/connector.rar#/META-INF/ra.xml", b"<connector/>".to_vec(), true);
//! archive.update(&mut replacements)?;
//! # Ok::<(), earpatch::Error>(())
//! ```

/// Per-entry decision event, promoted to `info` when the archive is verbose.
macro_rules! entry_event {
    ($verbosity:expr, $($arg:tt)+) => {
        match $verbosity {
            $crate::archive::Verbosity::Verbose => tracing::info!($($arg)+),
            $crate::archive::Verbosity::Normal => tracing::debug!($($arg)+),
            $crate::archive::Verbosity::Quiet => {},
        }
    };
}

/// Summary event, suppressed when the archive is quiet.
macro_rules! summary_event {
    ($verbosity:expr, $($arg:tt)+) => {
        if $verbosity != $crate::archive::Verbosity::Quiet {
            tracing::info!($($arg)+);
        }
    };
}

mod commit;
mod read;
mod rewrite;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::linux::sync_before_rename;
use crate::list::{EntryInfo, Listing};
use crate::matcher::{Matcher, SuffixMatcher};
use crate::output::{MemoryOutput, OutputProcessor};
use crate::path::EXPAND_EXTENSIONS;
use crate::replacement::ReplacementSet;
use crate::verify::{CrcVerifier, VerifyReport};

use commit::TempFile;
pub use rewrite::RewriteStats;
use rewrite::{Mode, Rewriter};

/// Default deflate level for rewritten entries.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// How much an [`Archive`] logs about its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// No events at all.
    Quiet,
    /// Summaries at `info`, per-entry decisions at `debug`.
    #[default]
    Normal,
    /// Per-entry decisions at `info`.
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub verbosity: Verbosity,
    /// 0 stores entries, 1..=9 deflates them.
    pub compression_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Sizes of an archive before and after [`Archive::recompress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecompressReport {
    pub before: u64,
    pub after: u64,
    pub stats: RewriteStats,
}

/// A physical ZIP-family file. Holds no parsed state between calls.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    options: ArchiveOptions,
}

impl Archive {
    /// Archive at `path` with default options.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, ArchiveOptions::default())
    }

    /// Archive at `path` with explicit verbosity and compression level.
    pub fn with_options(path: impl Into<PathBuf>, options: ArchiveOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Physical file backing this archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options every operation on this archive uses.
    pub fn options(&self) -> ArchiveOptions {
        self.options
    }

    /// Hand every selected leaf entry to `output`, descending into nested
    /// archives of the default expansion set. An empty `matchers` slice selects
    /// everything.
    pub fn expand(
        &self,
        matchers: &[&dyn Matcher],
        output: &mut dyn OutputProcessor,
    ) -> Result<()> {
        self.expand_by_extension(EXPAND_EXTENSIONS, matchers, output)
    }

    /// [`expand`](Self::expand) with a caller-chosen set of nested-archive suffixes.
    pub fn expand_by_extension(
        &self,
        extensions: &[&str],
        matchers: &[&dyn Matcher],
        output: &mut dyn OutputProcessor,
    ) -> Result<()> {
        let walk = read::Walk {
            extensions,
            matchers,
            verbosity: self.options.verbosity,
        };
        read::walk_file(&self.path, &walk, output).map_err(|e| Error::archive(&self.path, e))
    }

    /// Content of every entry whose virtual path ends with `path`.
    ///
    /// Returns `None` when nothing matched, so a missing entry is distinct from
    /// an empty one. When several entries match, their contents are concatenated
    /// in traversal order; pass a full virtual path to select exactly one.
    pub fn fetch_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let matcher = SuffixMatcher::new(path);
        let mut output = MemoryOutput::new();
        self.expand(&[&matcher], &mut output)?;
        if output.hits() == 0 {
            entry_event!(self.options.verbosity, path, "no entry matched");
            return Ok(None);
        }
        Ok(Some(output.into_inner()))
    }

    /// Every leaf entry at every nesting level, in traversal order.
    pub fn list(&self) -> Result<Vec<EntryInfo>> {
        let mut listing = Listing::default();
        self.expand(&[], &mut listing)?;
        Ok(listing.into_entries())
    }

    /// Decompress every leaf entry and compare its CRC-32 with the stored one.
    pub fn verify(&self, matchers: &[&dyn Matcher]) -> Result<VerifyReport> {
        let mut verifier = CrcVerifier::default();
        self.expand(matchers, &mut verifier)?;
        let report = verifier.into_report();
        summary_event!(
            self.options.verbosity,
            tested = report.tested,
            failures = report.failures.len(),
            "verified {}",
            self.path.display()
        );
        Ok(report)
    }

    /// Rewrite the archive applying `replacements` in a single pass, then
    /// commit atomically.
    ///
    /// Fails with [`Error::NotUpdated`] if a `must_exist` replacement found no
    /// target; the file on disk is then left untouched. Replacements are
    /// overwrite-only: a `must_exist = false` replacement without a target is
    /// dropped and nothing is added.
    pub fn update(&self, replacements: &mut ReplacementSet) -> Result<RewriteStats> {
        let level = self.options.compression_level;
        let stats = self.rewrite(Mode::Update(replacements), level)?;
        summary_event!(
            self.options.verbosity,
            replaced = stats.replaced,
            copied = stats.copied,
            nested = stats.nested_rewritten,
            "updated {}",
            self.path.display()
        );
        Ok(stats)
    }

    /// [`update`](Self::update) with in-memory payloads that must all exist.
    pub fn update_with_memory_payloads<I, P, B>(&self, payloads: I) -> Result<RewriteStats>
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let mut replacements = ReplacementSet::new();
        for (path, bytes) in payloads {
            replacements.add_bytes(path, bytes, true);
        }
        self.update(&mut replacements)
    }

    /// Rewrite every entry with compression `level`, descending into every
    /// nested archive of the update set.
    pub fn recompress(&self, level: u32) -> Result<RecompressReport> {
        let before = fs::metadata(&self.path)
            .map_err(|e| Error::archive(&self.path, e.into()))?
            .len();
        let stats = self.rewrite(Mode::Recompress, level)?;
        let after = fs::metadata(&self.path)?.len();
        summary_event!(
            self.options.verbosity,
            before,
            after,
            "recompressed {}",
            self.path.display()
        );
        Ok(RecompressReport {
            before,
            after,
            stats,
        })
    }

    /// Shared write path: stream into the temp file, validate the finished
    /// pass, then commit. Any failure before the commit removes the temp file.
    ///
    /// The source is opened before the temp file is created, and an existing
    /// temp file is an error: after a failed commit it is the only copy left.
    fn rewrite(&self, mode: Mode<'_>, level: u32) -> Result<RewriteStats> {
        let annotate = |e| Error::archive(&self.path, e);
        let source = self.open_source().map_err(annotate)?;
        let temp_path = commit::temp_path_for(&self.path).map_err(annotate)?;
        let (temp, file) = TempFile::create(temp_path).map_err(annotate)?;

        let mut rewriter = Rewriter::new(mode, level, self.options.verbosity);
        Self::stream_into(source, file, &mut rewriter).map_err(annotate)?;
        let stats = rewriter.finish()?;

        temp.commit(&self.path)?;
        Ok(stats)
    }

    fn open_source(&self) -> Result<ZipArchive<BufReader<File>>> {
        let source = File::open(&self.path)?;
        Ok(ZipArchive::new(BufReader::new(source))?)
    }

    fn stream_into(
        mut source: ZipArchive<BufReader<File>>,
        temp: File,
        rewriter: &mut Rewriter<'_>,
    ) -> Result<()> {
        let mut writer = ZipWriter::new(BufWriter::new(temp));
        writer.set_raw_comment(source.comment().into());
        rewriter.rewrite(&mut source, &mut writer, "")?;

        let file = writer
            .finish()?
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        sync_before_rename(&file)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests;
