//! Error types for archive traversal, rewriting and descriptor patching.
//!
//! Every failure inside a traversal is wrapped with the virtual path of the
//! entry being processed at that nesting level, so a failure deep inside
//! `app.ear#/lib/connector.rar#/META-INF/ra.xml` reads as a breadcrumb trail
//! rather than a bare I/O error:
//!
//! ```text
//! failed to process archive app.ear
//!   caused by: lib/connector.rar (lib/connector.rar)
//!   caused by: lib/connector.rar#/META-INF/ra.xml (META-INF/ra.xml)
//!   caused by: invalid Zip archive: ...
//! ```

use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid ZIP data: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failure while handling one entry; `path` is the full virtual path.
    #[error("{path} ({name})")]
    Entry {
        path: String,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Failure during a traversal of the physical file `archive`.
    #[error("failed to process archive {}", archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// A replacement flagged `must_exist` never found its target entry.
    #[error("{path} was not updated: no such entry in the archive")]
    NotUpdated { path: String },

    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The original file has been removed but the rewritten archive could not
    /// be moved into its place. The rewritten content survives at `temp`.
    #[error(
        "{} was removed but {} could not be renamed over it; recover from the temporary file",
        original.display(),
        temp.display()
    )]
    Commit {
        original: PathBuf,
        temp: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("entry {path} would be written outside of the output directory")]
    UnsafePath { path: String },

    #[error("malformed XML in {path}: {message}")]
    Xml { path: String, message: String },

    #[error("descriptor {path} not found in archive")]
    DescriptorMissing { path: String },

    #[error("element not found: {criteria}")]
    ElementNotFound { criteria: String },
}

impl Error {
    pub(crate) fn entry(path: &str, name: &str, source: Error) -> Self {
        Error::Entry {
            path: path.to_string(),
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn archive(archive: impl Into<PathBuf>, source: Error) -> Self {
        Error::Archive {
            archive: archive.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error after peeling off `Entry` and `Archive` breadcrumbs.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Entry { source, .. } | Error::Archive { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Virtual paths recorded along the breadcrumb chain, outermost first.
    pub fn breadcrumbs(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut current = self;
        loop {
            match current {
                Error::Entry { path, source, .. } => {
                    trail.push(path.as_str());
                    current = source;
                },
                Error::Archive { source, .. } => current = source,
                _ => return trail,
            }
        }
    }
}
