//! Read and patch nested JAR/WAR/EAR/RAR archives and their XML deployment descriptors
//!
//! # Overview
//!
//! - [`Archive`] treats a ZIP-family file as a recursive virtual filesystem:
//!   entries of nested archives are addressed as `outer.ear#/lib/x.rar#/ra.xml`
//! - [`ReplacementSet`] collects overwrites that [`Archive::update`] applies in
//!   one streaming pass, committed atomically through a temporary sibling file
//! - [`descriptor::EmbeddedDescriptor`] parses XML descriptors out of an archive,
//!   edits their configuration properties, and writes them all back at once

pub mod archive;
pub mod args;
pub mod commands;
pub mod descriptor;
pub mod error;
mod linux;
pub mod list;
pub mod matcher;
pub mod output;
pub mod path;
pub mod replacement;
pub mod utils;
pub mod verify;

pub use archive::{Archive, ArchiveOptions, RecompressReport, RewriteStats, Verbosity};
pub use descriptor::EmbeddedDescriptor;
pub use error::{Error, Result};
pub use list::{EntryInfo, display_listing};
pub use matcher::{GlobMatcher, Matcher, SuffixMatcher};
pub use output::{DirectoryOutput, Entry, MemoryOutput, OutputProcessor};
pub use replacement::{Payload, Replacement, ReplacementSet};
pub use utils::format_size;
pub use verify::VerifyReport;
