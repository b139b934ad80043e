//! Write traversal shared by update and recompress
//!
//! Each source entry is handled exactly once, in order:
//!
//! 1. directories are dropped
//! 2. nested archives of the update set are either rewritten recursively or
//!    copied through untouched, depending on the mode and on whether any
//!    pending replacement lies beneath them
//! 3. leaves are substituted (update with a matching replacement), decompressed
//!    and recompressed (recompress), or copied through untouched
//!
//! Untouched entries go through `raw_copy_file`, so their compressed bytes,
//! CRC, timestamp and comment are kept and nothing is recompressed. Rewritten
//! entries keep their timestamp and Unix mode.

use std::io::{self, Cursor, Read, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::Verbosity;
use crate::error::{Error, Result};
use crate::path::{UPDATE_EXTENSIONS, is_container, nested_prefix};
use crate::replacement::ReplacementSet;
use crate::utils::entry_options;

#[derive(Debug)]
pub(crate) enum Mode<'a> {
    Update(&'a mut ReplacementSet),
    Recompress,
}

/// Counters for one rewrite pass, summed over all nesting levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Entries copied through without decompression.
    pub copied: usize,
    /// Leaves whose content was substituted.
    pub replaced: usize,
    /// Leaves decompressed and written again.
    pub recompressed: usize,
    /// Nested archives opened and rebuilt.
    pub nested_rewritten: usize,
    /// Directory entries left out of the output.
    pub directories_dropped: usize,
}

#[derive(Clone, Copy)]
struct SourceMeta {
    modified: Option<zip::DateTime>,
    unix_mode: Option<u32>,
    size: u64,
}

impl SourceMeta {
    fn options(self, level: u32, size: u64) -> SimpleFileOptions {
        entry_options(level, self.modified, self.unix_mode, size)
    }
}

pub(crate) struct Rewriter<'a> {
    mode: Mode<'a>,
    level: u32,
    verbosity: Verbosity,
    stats: RewriteStats,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn new(mode: Mode<'a>, level: u32, verbosity: Verbosity) -> Self {
        Self {
            mode,
            level,
            verbosity,
            stats: RewriteStats::default(),
        }
    }

    /// Validate the finished pass and return its counters.
    pub(crate) fn finish(self) -> Result<RewriteStats> {
        if let Mode::Update(replacements) = &self.mode {
            replacements.check()?;
        }
        Ok(self.stats)
    }

    pub(crate) fn rewrite<R: Read + Seek, W: Write + Seek>(
        &mut self,
        source: &mut ZipArchive<R>,
        writer: &mut ZipWriter<W>,
        prefix: &str,
    ) -> Result<()> {
        for i in 0..source.len() {
            let (name, is_dir, meta) = {
                let file = source.by_index_raw(i)?;
                let meta = SourceMeta {
                    modified: file.last_modified(),
                    unix_mode: file.unix_mode(),
                    size: file.size(),
                };
                (file.name().to_string(), file.is_dir(), meta)
            };

            if is_dir {
                self.stats.directories_dropped += 1;
                continue;
            }

            let path = format!("{prefix}{name}");
            self.rewrite_entry(source, i, writer, prefix, &name, &path, meta)
                .map_err(|e| Error::entry(&path, &name, e))?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn rewrite_entry<R: Read + Seek, W: Write + Seek>(
        &mut self,
        source: &mut ZipArchive<R>,
        index: usize,
        writer: &mut ZipWriter<W>,
        prefix: &str,
        name: &str,
        path: &str,
        meta: SourceMeta,
    ) -> Result<()> {
        if is_container(name, UPDATE_EXTENSIONS) {
            let nested = nested_prefix(prefix, name);
            let descend = match &self.mode {
                Mode::Update(replacements) => replacements.has_pending_under(&nested),
                Mode::Recompress => true,
            };

            if !descend {
                entry_event!(self.verbosity, path, "copying nested archive unchanged");
                writer.raw_copy_file(source.by_index_raw(index)?)?;
                self.stats.copied += 1;
                return Ok(());
            }

            entry_event!(self.verbosity, path, "rewriting nested archive");
            let data = self.rewrite_nested(source, index, &nested)?;
            writer.start_file(name, meta.options(self.level, data.len() as u64))?;
            writer.write_all(&data)?;
            self.stats.nested_rewritten += 1;
            return Ok(());
        }

        match &mut self.mode {
            Mode::Update(replacements) => match replacements.pending_for(path) {
                Some(replacement) => {
                    entry_event!(self.verbosity, path, "replacing entry");
                    let size = replacement.payload_len().unwrap_or(meta.size);
                    writer.start_file(name, meta.options(self.level, size))?;
                    replacement.write(writer)?;
                    self.stats.replaced += 1;
                },
                None => {
                    writer.raw_copy_file(source.by_index_raw(index)?)?;
                    self.stats.copied += 1;
                },
            },
            Mode::Recompress => {
                let mut file = source.by_index(index)?;
                writer.start_file(name, meta.options(self.level, meta.size))?;
                io::copy(&mut file, writer)?;
                self.stats.recompressed += 1;
            },
        }
        Ok(())
    }

    /// Rebuild the nested archive at `index` in memory and return its bytes.
    fn rewrite_nested<R: Read + Seek>(
        &mut self,
        source: &mut ZipArchive<R>,
        index: usize,
        prefix: &str,
    ) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        source.by_index(index)?.read_to_end(&mut bytes)?;

        let mut nested = ZipArchive::new(Cursor::new(bytes))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.set_raw_comment(nested.comment().into());
        self.rewrite(&mut nested, &mut writer, prefix)?;
        Ok(writer.finish()?.into_inner())
    }
}
