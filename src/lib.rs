//! nx-bridge: path-addressed access to NX archives behind a stable C ABI
//!
//! This library sits between a host program and an NX archive decoder,
//! combining:
//! - A registry that opens each archive at most once per session
//! - Combined path resolution (`"Map.nx/Obj/guide.img/common/post/0"`)
//! - Never-reissued node handles that survive the C boundary
//! - Typed value reads (integer, real, string, vector, bitmap, audio)
//!
//! The decoder itself plugs in through [`ArchiveOpener`]; [`MemoryOpener`]
//! serves in-memory node trees.
//!
//! # Example
//!
//! ```
//! use nx_bridge::{BridgeConfig, MemoryArchive, MemoryNode, MemoryOpener, NxBridge};
//! use std::sync::Arc;
//!
//! let opener = Arc::new(MemoryOpener::new());
//! opener.insert(
//!     "/data/String.nx",
//!     MemoryArchive::new(
//!         MemoryNode::new("").with_child(
//!             MemoryNode::new("Eqp.img").with_child(MemoryNode::string("name", "Sword")),
//!         ),
//!     ),
//! );
//!
//! let bridge = NxBridge::initialize(BridgeConfig::new("/data"), opener);
//! let node = bridge.resolve("String/Eqp.img/name")?;
//! assert_eq!(bridge.get_string(node)?, "Sword");
//! bridge.teardown();
//! # Ok::<(), nx_bridge::BridgeError>(())
//! ```

// Core modules
pub mod archive;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handle;
pub mod path;
pub mod registry;

// C boundary
pub mod ffi;

// Re-export commonly used types
pub use archive::{
    Archive, ArchiveOpener, Audio, Bitmap, MemoryArchive, MemoryNode, MemoryOpener, NodeRef,
    NodeType, Vector2,
};
pub use bridge::NxBridge;
pub use config::{BridgeConfig, DEFAULT_PRELOAD};
pub use error::{BridgeError, Result};
pub use handle::{HandleTable, NodeHandle};
pub use path::{split_path, ResolvedPath, ARCHIVE_EXTENSION};
pub use registry::{ArchiveName, ArchiveRegistry};
