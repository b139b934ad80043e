//! Pending overwrites for a single rewrite pass
//!
//! A [`ReplacementSet`] is built before [`Archive::update`](crate::Archive::update)
//! and consumed during it. The rewrite asks two questions of it:
//!
//! - does any pending replacement live under a nested-archive prefix? If not,
//!   the nested archive is copied through without being opened
//! - is there a pending replacement for exactly this leaf path? If so, its
//!   payload is written instead of the original bytes
//!
//! A replacement is consumed the moment its target is found, so when an
//! archive holds duplicate entry names only the first one is substituted.
//! After the pass, [`ReplacementSet::check`] fails for every `must_exist`
//! replacement that never found its target.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Source of the new content for an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl Payload {
    /// Size in bytes, if known without reading.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            Payload::Memory(bytes) => Some(bytes.len() as u64),
            Payload::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
        }
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<u64> {
        match self {
            Payload::Memory(bytes) => {
                out.write_all(bytes)?;
                Ok(bytes.len() as u64)
            },
            Payload::File(path) => {
                let mut file = File::open(path).map_err(|e| {
                    io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
                })?;
                io::copy(&mut file, out)
            },
        }
    }
}

/// One pending overwrite, keyed by exact virtual path.
#[derive(Debug, Clone)]
pub struct Replacement {
    path: String,
    payload: Option<Payload>,
    must_exist: bool,
}

impl Replacement {
    /// Overwrite the entry at exact virtual path `path` with `payload`.
    ///
    /// With `must_exist`, the update fails unless the entry is found.
    pub fn new(path: impl Into<String>, payload: Payload, must_exist: bool) -> Self {
        Self {
            path: path.into(),
            payload: Some(payload),
            must_exist,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn must_exist(&self) -> bool {
        self.must_exist
    }

    /// Whether the payload has been written into the output.
    pub fn is_consumed(&self) -> bool {
        self.payload.is_none()
    }

    /// Size of the pending payload, if known without reading it.
    pub fn payload_len(&self) -> Option<u64> {
        self.payload.as_ref().and_then(Payload::len_hint)
    }

    /// Write the payload and mark the replacement consumed.
    ///
    /// The payload is released even if writing fails; a replacement is never
    /// applied twice.
    pub fn write(&mut self, out: &mut dyn Write) -> Result<u64> {
        let payload = self.payload.take().ok_or_else(|| {
            Error::Io(io::Error::other(format!("{} was already written", self.path)))
        })?;
        Ok(payload.write_to(out)?)
    }
}

/// Ordered collection of replacements for one rewrite pass.
#[derive(Debug, Clone, Default)]
pub struct ReplacementSet {
    replacements: Vec<Replacement>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `replacement` behind the existing ones.
    pub fn push(&mut self, replacement: Replacement) -> &mut Self {
        self.replacements.push(replacement);
        self
    }

    /// Queue an in-memory payload for `path`.
    pub fn add_bytes(
        &mut self,
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        must_exist: bool,
    ) -> &mut Self {
        self.push(Replacement::new(path, Payload::Memory(bytes.into()), must_exist))
    }

    /// Queue the content of a file on disk for `path`.
    pub fn add_file(
        &mut self,
        path: impl Into<String>,
        source: impl Into<PathBuf>,
        must_exist: bool,
    ) -> &mut Self {
        self.push(Replacement::new(path, Payload::File(source.into()), must_exist))
    }

    /// Number of queued replacements, consumed ones included.
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
        self.replacements.iter()
    }

    /// Whether an unconsumed replacement targets something under `prefix`
    /// (a nested-archive prefix ending in `#/`).
    pub fn has_pending_under(&self, prefix: &str) -> bool {
        self.replacements
            .iter()
            .any(|r| !r.is_consumed() && r.path.starts_with(prefix))
    }

    /// The first unconsumed replacement for exactly `path`.
    pub fn pending_for(&mut self, path: &str) -> Option<&mut Replacement> {
        self.replacements
            .iter_mut()
            .find(|r| !r.is_consumed() && r.path == path)
    }

    /// Replacements already written into an output archive.
    pub fn consumed(&self) -> usize {
        self.replacements.iter().filter(|r| r.is_consumed()).count()
    }

    /// Fail with [`Error::NotUpdated`] for the first `must_exist` replacement
    /// that was never consumed.
    pub fn check(&self) -> Result<()> {
        match self
            .replacements
            .iter()
            .find(|r| r.must_exist && !r.is_consumed())
        {
            Some(r) => Err(Error::NotUpdated {
                path: r.path.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl FromIterator<Replacement> for ReplacementSet {
    fn from_iter<I: IntoIterator<Item = Replacement>>(iter: I) -> Self {
        Self {
            replacements: iter.into_iter().collect(),
        }
    }
}
