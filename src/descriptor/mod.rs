//! XML deployment descriptors inside compound archives
//!
//! An [`EmbeddedDescriptor`] fetches descriptors through an [`Archive`],
//! keeps the parsed trees while the caller edits them, and writes every
//! edited descriptor back in a single archive rewrite.
//!
//! # Examples
//!
//! ```no_run
//! use earpatch::Archive;
//! use earpatch::descriptor::{Configurable, ConnectorSettings, EmbeddedDescriptor};
//!
//! let mut descriptor = EmbeddedDescriptor::new(Archive::open("app.ear"));
//! let ra = descriptor.document("lib/jms.rar#/META-INF/ra.xml")?;
//! let mut settings = ConnectorSettings::new(Configurable::resource_adapter(ra)?);
//! settings.set_connection_url("tcp://broker:61616")?;
//! descriptor.update()?;
//! # Ok::<(), earpatch::Error>(())
//! ```

mod config;
mod dom;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::archive::{Archive, RewriteStats};
use crate::error::{Error, Result};

pub use config::{
    ACTIVATION_CONFIG_PROPERTY, ActivationSettings, CONFIG_PROPERTY, Configurable,
    ConnectorSettings, DEFAULT_PROPERTY_TYPE, PropertyLayout, Scan,
};
pub use dom::{Document, Element, ElementPath, Node};

/// Descriptor cache bound to one archive.
///
/// Documents are only reachable through `&mut` borrows of the descriptor, so
/// none can outlive the [`update`](Self::update) that invalidates them.
#[derive(Debug)]
pub struct EmbeddedDescriptor {
    archive: Archive,
    cache: BTreeMap<String, Document>,
}

impl EmbeddedDescriptor {
    /// Wrap `archive` with an empty document cache.
    pub fn new(archive: Archive) -> Self {
        Self {
            archive,
            cache: BTreeMap::new(),
        }
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// The parsed descriptor at `path`, fetched and parsed on first use.
    ///
    /// `path` should be a full virtual path: it is matched as a suffix when
    /// fetching, but written back to exactly that path by `update`.
    pub fn document(&mut self, path: &str) -> Result<&mut Document> {
        match self.cache.entry(path.to_string()) {
            Entry::Occupied(cached) => Ok(cached.into_mut()),
            Entry::Vacant(slot) => {
                let bytes = self
                    .archive
                    .fetch_file(path)?
                    .ok_or_else(|| Error::DescriptorMissing {
                        path: path.to_string(),
                    })?;
                let document = Document::parse(path, &bytes)?;
                tracing::debug!(path, bytes = bytes.len(), "parsed descriptor");
                Ok(slot.insert(document))
            },
        }
    }

    /// Paths of the descriptors parsed so far.
    pub fn cached(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }

    /// Serialize every cached descriptor and write them all in one rewrite.
    ///
    /// The cache is cleared only when the rewrite succeeded, so a failed update
    /// can be retried with the edits intact.
    pub fn update(&mut self) -> Result<RewriteStats> {
        if self.cache.is_empty() {
            return Ok(RewriteStats::default());
        }

        let payloads = self
            .cache
            .iter()
            .map(|(path, document)| Ok((path.clone(), document.to_pretty_bytes()?)))
            .collect::<Result<Vec<_>>>()?;

        let stats = self.archive.update_with_memory_payloads(payloads)?;
        self.cache.clear();
        Ok(stats)
    }

    /// Give the archive back, discarding unsaved edits.
    pub fn into_archive(self) -> Archive {
        self.archive
    }
}
