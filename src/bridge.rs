//! Path resolution and typed node access
//!
//! [`NxBridge`] ties the registry, the path splitter and the handle table
//! together. Every operation returns a `Result`; the C boundary in
//! [`crate::ffi`] is the only place errors become sentinel values.
//!
//! # Example
//!
//! ```
//! use nx_bridge::{BridgeConfig, MemoryArchive, MemoryNode, MemoryOpener, NodeType, NxBridge};
//! use std::sync::Arc;
//!
//! let opener = Arc::new(MemoryOpener::new());
//! opener.insert(
//!     "/data/Map.nx",
//!     MemoryArchive::new(MemoryNode::new("").with_child(
//!         MemoryNode::new("Obj").with_child(MemoryNode::vector("origin", 12, -5)),
//!     )),
//! );
//!
//! let bridge = NxBridge::initialize(BridgeConfig::new("/data"), opener);
//! let origin = bridge.resolve("Map.nx/Obj/origin")?;
//! assert_eq!(bridge.node_type(origin)?, NodeType::Vector);
//! assert_eq!(bridge.get_vector(origin)?.map(|v| (v.x, v.y)), Some((12, -5)));
//! # Ok::<(), nx_bridge::BridgeError>(())
//! ```

use crate::archive::{Archive, ArchiveOpener, Audio, Bitmap, NodeRef, NodeType, Vector2};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::handle::{HandleTable, NodeHandle};
use crate::path::{self, ResolvedPath};
use crate::registry::{ArchiveName, ArchiveRegistry};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Child name holding a node's origin vector
pub const ORIGIN_CHILD: &str = "origin";

/// Child name holding a cross-archive link
pub const OUTLINK_CHILD: &str = "_outlink";

/// What a handle points at
///
/// Holds the archive weakly: the registry owns archives, handles only
/// refer into them.
struct NodeEntry {
    archive: Weak<dyn Archive>,
    archive_name: String,
    node: NodeRef,
}

/// One bridge session: open archives plus outstanding handles
pub struct NxBridge {
    config: BridgeConfig,
    registry: ArchiveRegistry,
    handles: Mutex<HandleTable<NodeEntry>>,
}

impl NxBridge {
    /// Create a session without preloading anything
    pub fn new(config: BridgeConfig, opener: Arc<dyn ArchiveOpener>) -> Self {
        let registry = ArchiveRegistry::new(config.base_path.clone(), opener);
        Self {
            config,
            registry,
            handles: Mutex::new(HandleTable::new()),
        }
    }

    /// Create a session and warm the configured preload set
    ///
    /// Preload failures are logged and skipped.
    pub fn initialize(config: BridgeConfig, opener: Arc<dyn ArchiveOpener>) -> Self {
        let bridge = Self::new(config, opener);
        let loaded = bridge.registry.preload(&bridge.config.preload);
        info!(
            "Initialized NX bridge at {:?}: {}/{} archives preloaded",
            bridge.config.base_path,
            loaded,
            bridge.config.preload.len()
        );
        bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    /// Number of archives currently open
    pub fn open_archive_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of handles not yet released
    pub fn live_handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    fn allocate(
        &self,
        archive: &Arc<dyn Archive>,
        archive_name: &str,
        node: NodeRef,
    ) -> NodeHandle {
        self.handles.lock().insert(NodeEntry {
            archive: Arc::downgrade(archive),
            archive_name: archive_name.to_string(),
            node,
        })
    }

    fn lookup(&self, handle: NodeHandle) -> Result<(Arc<dyn Archive>, String, NodeRef)> {
        let (archive, archive_name, node) = {
            let handles = self.handles.lock();
            let entry = handles.get(handle).ok_or(BridgeError::InvalidHandle)?;
            (entry.archive.clone(), entry.archive_name.clone(), entry.node)
        };
        let archive = archive.upgrade().ok_or(BridgeError::InvalidHandle)?;
        Ok((archive, archive_name, node))
    }

    fn walk<'a>(
        archive: &dyn Archive,
        archive_name: &str,
        start: NodeRef,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<NodeRef> {
        let mut current = start;
        for segment in segments {
            current = archive
                .child(current, segment)?
                .ok_or_else(|| BridgeError::NodeNotFound {
                    archive: archive_name.to_string(),
                    segment: segment.to_string(),
                })?;
        }
        Ok(current)
    }

    /// Resolve a combined path such as `"Map.nx/Obj/guide.img/common/post/0"`
    ///
    /// Opens the archive on first use. Every call returns a new handle, even
    /// for a path resolved before.
    pub fn resolve(&self, combined: &str) -> Result<NodeHandle> {
        let resolved = ResolvedPath::parse(combined);
        let name = ArchiveName::new(&resolved.archive)?;
        let archive = self.registry.ensure_open(&name)?;

        let node = Self::walk(
            archive.as_ref(),
            name.as_str(),
            archive.root(),
            resolved.segments.iter().map(String::as_str),
        )?;
        Ok(self.allocate(&archive, name.as_str(), node))
    }

    /// Resolve `/`-separated segments below an existing handle
    pub fn resolve_from(&self, handle: NodeHandle, subpath: &str) -> Result<NodeHandle> {
        let (archive, archive_name, start) = self.lookup(handle)?;
        let node = Self::walk(archive.as_ref(), &archive_name, start, path::segments(subpath))?;
        Ok(self.allocate(&archive, &archive_name, node))
    }

    /// Release one handle; false if it was already invalid
    pub fn release(&self, handle: NodeHandle) -> bool {
        self.handles.lock().remove(handle).is_some()
    }

    pub fn node_name(&self, handle: NodeHandle) -> Result<String> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.name(node)
    }

    pub fn node_type(&self, handle: NodeHandle) -> Result<NodeType> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.node_type(node)
    }

    pub fn child_count(&self, handle: NodeHandle) -> Result<usize> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.child_count(node)
    }

    /// Integer payload, or the archive's coercion/default for other types
    pub fn get_int(&self, handle: NodeHandle) -> Result<i64> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.integer(node)
    }

    /// Real payload, or the archive's coercion/default for other types
    pub fn get_real(&self, handle: NodeHandle) -> Result<f64> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.real(node)
    }

    /// String payload, or the archive's coercion/default for other types
    pub fn get_string(&self, handle: NodeHandle) -> Result<String> {
        let (archive, _, node) = self.lookup(handle)?;
        archive.string(node)
    }

    /// Vector payload; `None` unless the node is declared Vector
    pub fn get_vector(&self, handle: NodeHandle) -> Result<Option<Vector2>> {
        let (archive, _, node) = self.lookup(handle)?;
        if archive.node_type(node)? != NodeType::Vector {
            return Ok(None);
        }
        archive.vector(node)
    }

    /// Fully decoded bitmap; `None` unless the node is declared Bitmap
    pub fn get_bitmap(&self, handle: NodeHandle) -> Result<Option<Bitmap>> {
        let (archive, _, node) = self.lookup(handle)?;
        if archive.node_type(node)? != NodeType::Bitmap {
            return Ok(None);
        }
        archive.bitmap(node)
    }

    /// Bitmap width and height; `None` unless the node is declared Bitmap
    pub fn get_bitmap_size(&self, handle: NodeHandle) -> Result<Option<(u16, u16)>> {
        let (archive, _, node) = self.lookup(handle)?;
        if archive.node_type(node)? != NodeType::Bitmap {
            return Ok(None);
        }
        archive.bitmap_size(node)
    }

    /// Audio payload; `None` unless the node is declared Audio
    pub fn get_audio(&self, handle: NodeHandle) -> Result<Option<Audio>> {
        let (archive, _, node) = self.lookup(handle)?;
        if archive.node_type(node)? != NodeType::Audio {
            return Ok(None);
        }
        archive.audio(node)
    }

    /// New handle for the child named `name`
    pub fn get_child(&self, handle: NodeHandle, name: &str) -> Result<NodeHandle> {
        let (archive, archive_name, node) = self.lookup(handle)?;
        let child = Self::walk(archive.as_ref(), &archive_name, node, [name])?;
        Ok(self.allocate(&archive, &archive_name, child))
    }

    /// New handle for the child at `index` in native enumeration order
    ///
    /// This walks the children from the start; it is not random access.
    pub fn get_child_by_index(&self, handle: NodeHandle, index: usize) -> Result<NodeHandle> {
        let (archive, archive_name, node) = self.lookup(handle)?;
        let child = archive
            .children(node)?
            .nth(index)
            .ok_or_else(|| BridgeError::NodeNotFound {
                archive: archive_name.clone(),
                segment: format!("#{}", index),
            })?;
        Ok(self.allocate(&archive, &archive_name, child))
    }

    /// Whether a child named `name` exists
    pub fn has_child(&self, handle: NodeHandle, name: &str) -> Result<bool> {
        let (archive, _, node) = self.lookup(handle)?;
        Ok(archive.child(node, name)?.is_some())
    }

    /// Value of the `origin` child, when it exists and is a vector
    ///
    /// Reads through the archive directly; no handle is allocated.
    pub fn get_origin(&self, handle: NodeHandle) -> Result<Option<Vector2>> {
        let (archive, _, node) = self.lookup(handle)?;
        match archive.child(node, ORIGIN_CHILD)? {
            Some(origin) if archive.node_type(origin)? == NodeType::Vector => {
                archive.vector(origin)
            }
            _ => Ok(None),
        }
    }

    /// Follow an `_outlink` child to the node it names
    ///
    /// Nodes without a usable link resolve to themselves (as a new handle).
    /// A link whose target cannot be resolved is an error.
    pub fn resolve_outlink(&self, handle: NodeHandle) -> Result<NodeHandle> {
        let (archive, archive_name, node) = self.lookup(handle)?;

        let target = match archive.child(node, OUTLINK_CHILD)? {
            Some(link) if archive.node_type(link)? == NodeType::String => archive.string(link)?,
            _ => String::new(),
        };

        if target.is_empty() || !target.contains('/') {
            return Ok(self.allocate(&archive, &archive_name, node));
        }

        debug!("Following outlink {} -> {}", archive_name, target);
        self.resolve(&target)
    }

    /// Invalidate every handle and drop every open archive
    ///
    /// Bitmap and audio buffers already handed out are unaffected. The
    /// session stays usable; archives reopen lazily on the next resolve.
    pub fn teardown(&self) {
        let released = self.handles.lock().clear();
        let archives = self.registry.len();
        self.registry.clear();
        info!(
            "NX bridge teardown: released {} handles and {} archives",
            released, archives
        );
    }
}
