//! Archive registry
//!
//! Opens archive containers on first reference and keeps exactly one open
//! instance per archive name until [`ArchiveRegistry::clear`]. Failed opens
//! are not remembered, so the next reference retries.

use crate::archive::{Archive, ArchiveOpener};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Normalized archive name
///
/// Backslashes become forward slashes. Lookups are case-insensitive; the
/// spelling given (after separator normalization) is what gets opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveName {
    name: String,
    key: String,
}

impl ArchiveName {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.replace('\\', "/");
        if name.is_empty() {
            return Err(BridgeError::InvalidArchiveName(name));
        }
        let key = name.to_lowercase();
        Ok(Self { name, key })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Cache key used for deduplication
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Owner of every open archive
pub struct ArchiveRegistry {
    base_path: String,
    opener: Arc<dyn ArchiveOpener>,
    archives: Mutex<HashMap<String, Arc<dyn Archive>>>,
}

impl ArchiveRegistry {
    /// `base_path` is used verbatim as the prefix of every archive path
    pub fn new(base_path: impl Into<String>, opener: Arc<dyn ArchiveOpener>) -> Self {
        Self {
            base_path: base_path.into(),
            opener,
            archives: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Return the open archive for `name`, opening it on first use
    ///
    /// The registry lock is held across the open, so concurrent callers
    /// missing on the same name never open it twice.
    pub fn ensure_open(&self, name: &ArchiveName) -> Result<Arc<dyn Archive>> {
        let mut archives = self.archives.lock();
        if let Some(archive) = archives.get(name.key()) {
            return Ok(archive.clone());
        }

        let path = format!("{}{}", self.base_path, name);
        let archive = self.opener.open(&path).map_err(|e| {
            debug!("Failed to open archive {}: {}", path, e);
            e
        })?;

        debug!("Opened archive {}", path);
        archives.insert(name.key().to_string(), archive.clone());
        Ok(archive)
    }

    /// Open every name best-effort; returns how many are open afterwards
    pub fn preload<S: AsRef<str>>(&self, names: &[S]) -> usize {
        let mut loaded = 0;
        for name in names {
            let result = ArchiveName::new(name.as_ref()).and_then(|name| self.ensure_open(&name));
            match result {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping preload of {}: {}", name.as_ref(), e),
            }
        }
        loaded
    }

    /// Already-open archive, without opening
    pub fn get(&self, name: &ArchiveName) -> Option<Arc<dyn Archive>> {
        self.archives.lock().get(name.key()).cloned()
    }

    pub fn contains(&self, name: &ArchiveName) -> bool {
        self.archives.lock().contains_key(name.key())
    }

    pub fn len(&self) -> usize {
        self.archives.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.lock().is_empty()
    }

    /// Drop every open archive
    ///
    /// Outstanding handles only hold weak references, so they stop resolving
    /// once the last strong reference goes away here.
    pub fn clear(&self) {
        let drained: Vec<_> = self.archives.lock().drain().collect();
        debug!("Released {} archives", drained.len());
    }
}
