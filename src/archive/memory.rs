//! In-memory archive backend
//!
//! Trees are built with [`MemoryNode`] (or deserialized from JSON) and
//! flattened into a node table where every node's children sit in one
//! contiguous run, the same shape an NX node table has. Bitmap payloads are
//! kept LZ4-compressed and decoded on every read.
//!
//! # Example
//!
//! ```
//! use nx_bridge::archive::{Archive, MemoryArchive, MemoryNode, NodeType};
//!
//! let archive = MemoryArchive::new(
//!     MemoryNode::new("")
//!         .with_child(MemoryNode::new("Obj").with_child(MemoryNode::integer("z", 4))),
//! );
//! let obj = archive.child(archive.root(), "Obj")?.unwrap();
//! let z = archive.child(obj, "z")?.unwrap();
//! assert_eq!(archive.node_type(z)?, NodeType::Integer);
//! assert_eq!(archive.integer(z)?, 4);
//! # Ok::<(), nx_bridge::BridgeError>(())
//! ```

use crate::archive::{Archive, ArchiveOpener, Audio, Bitmap, NodeRef, NodeType, Vector2};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;

/// Payload of a [`MemoryNode`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MemoryValue {
    #[default]
    None,
    Integer(i64),
    Real(f64),
    String(String),
    Vector(Vector2),
    Bitmap {
        width: u16,
        height: u16,
        pixels: Vec<u8>,
    },
    Audio(Vec<u8>),
}

impl MemoryValue {
    pub fn node_type(&self) -> NodeType {
        match self {
            MemoryValue::None => NodeType::None,
            MemoryValue::Integer(_) => NodeType::Integer,
            MemoryValue::Real(_) => NodeType::Real,
            MemoryValue::String(_) => NodeType::String,
            MemoryValue::Vector(_) => NodeType::Vector,
            MemoryValue::Bitmap { .. } => NodeType::Bitmap,
            MemoryValue::Audio(_) => NodeType::Audio,
        }
    }
}

/// Builder for one node of an in-memory tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub name: String,

    #[serde(default)]
    pub value: MemoryValue,

    #[serde(default)]
    pub children: Vec<MemoryNode>,
}

impl MemoryNode {
    /// Create a container node with no payload
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MemoryValue::None,
            children: Vec::new(),
        }
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name).with_value(MemoryValue::Integer(value))
    }

    pub fn real(name: impl Into<String>, value: f64) -> Self {
        Self::new(name).with_value(MemoryValue::Real(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name).with_value(MemoryValue::String(value.into()))
    }

    pub fn vector(name: impl Into<String>, x: i32, y: i32) -> Self {
        Self::new(name).with_value(MemoryValue::Vector(Vector2::new(x, y)))
    }

    pub fn bitmap(name: impl Into<String>, width: u16, height: u16, pixels: Vec<u8>) -> Self {
        Self::new(name).with_value(MemoryValue::Bitmap {
            width,
            height,
            pixels,
        })
    }

    pub fn audio(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(name).with_value(MemoryValue::Audio(data))
    }

    pub fn with_value(mut self, value: MemoryValue) -> Self {
        self.value = value;
        self
    }

    /// Append a child; enumeration order is insertion order
    pub fn with_child(mut self, child: MemoryNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = MemoryNode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Payload as held by the flattened table
#[derive(Debug, Clone)]
enum StoredValue {
    None,
    Integer(i64),
    Real(f64),
    String(String),
    Vector(Vector2),
    Bitmap {
        width: u16,
        height: u16,
        compressed: Vec<u8>,
    },
    Audio(Vec<u8>),
}

impl From<MemoryValue> for StoredValue {
    fn from(value: MemoryValue) -> Self {
        match value {
            MemoryValue::None => StoredValue::None,
            MemoryValue::Integer(v) => StoredValue::Integer(v),
            MemoryValue::Real(v) => StoredValue::Real(v),
            MemoryValue::String(v) => StoredValue::String(v),
            MemoryValue::Vector(v) => StoredValue::Vector(v),
            MemoryValue::Bitmap {
                width,
                height,
                pixels,
            } => StoredValue::Bitmap {
                width,
                height,
                compressed: lz4_flex::compress_prepend_size(&pixels),
            },
            MemoryValue::Audio(v) => StoredValue::Audio(v),
        }
    }
}

impl StoredValue {
    fn node_type(&self) -> NodeType {
        match self {
            StoredValue::None => NodeType::None,
            StoredValue::Integer(_) => NodeType::Integer,
            StoredValue::Real(_) => NodeType::Real,
            StoredValue::String(_) => NodeType::String,
            StoredValue::Vector(_) => NodeType::Vector,
            StoredValue::Bitmap { .. } => NodeType::Bitmap,
            StoredValue::Audio(_) => NodeType::Audio,
        }
    }
}

#[derive(Debug, Clone)]
struct FlatNode {
    name: String,
    value: StoredValue,
    first_child: u32,
    child_count: u32,
}

impl FlatNode {
    fn placeholder() -> Self {
        Self {
            name: String::new(),
            value: StoredValue::None,
            first_child: 0,
            child_count: 0,
        }
    }

    fn child_range(&self) -> std::ops::Range<u32> {
        self.first_child..self.first_child + self.child_count
    }
}

/// Archive held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    nodes: Vec<FlatNode>,
}

impl MemoryArchive {
    /// Flatten a tree breadth-first so every child run is contiguous
    pub fn new(root: MemoryNode) -> Self {
        let mut nodes = vec![FlatNode::placeholder()];
        let mut queue = VecDeque::from([(root, 0usize)]);

        while let Some((node, index)) = queue.pop_front() {
            let MemoryNode {
                name,
                value,
                children,
            } = node;
            let first_child = nodes.len();
            nodes.resize(first_child + children.len(), FlatNode::placeholder());

            nodes[index] = FlatNode {
                name,
                value: value.into(),
                first_child: first_child as u32,
                child_count: children.len() as u32,
            };

            for (offset, child) in children.into_iter().enumerate() {
                queue.push_back((child, first_child + offset));
            }
        }

        Self { nodes }
    }

    /// Build an archive from a JSON-serialized [`MemoryNode`] tree
    pub fn from_json(json: &str) -> Result<Self> {
        let root: MemoryNode = serde_json::from_str(json)?;
        Ok(Self::new(root))
    }

    /// Total number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, node: NodeRef) -> Result<&FlatNode> {
        self.nodes
            .get(node.0 as usize)
            .ok_or(BridgeError::InvalidNode(node.0))
    }
}

impl Archive for MemoryArchive {
    fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    fn child(&self, node: NodeRef, name: &str) -> Result<Option<NodeRef>> {
        let parent = self.node(node)?;
        Ok(parent
            .child_range()
            .find(|&index| self.nodes[index as usize].name == name)
            .map(NodeRef))
    }

    fn children(&self, node: NodeRef) -> Result<Box<dyn Iterator<Item = NodeRef> + '_>> {
        let parent = self.node(node)?;
        Ok(Box::new(parent.child_range().map(NodeRef)))
    }

    fn name(&self, node: NodeRef) -> Result<String> {
        Ok(self.node(node)?.name.clone())
    }

    fn node_type(&self, node: NodeRef) -> Result<NodeType> {
        Ok(self.node(node)?.value.node_type())
    }

    fn child_count(&self, node: NodeRef) -> Result<usize> {
        Ok(self.node(node)?.child_count as usize)
    }

    fn integer(&self, node: NodeRef) -> Result<i64> {
        match self.node(node)?.value {
            StoredValue::Integer(v) => Ok(v),
            _ => Ok(0),
        }
    }

    fn real(&self, node: NodeRef) -> Result<f64> {
        match self.node(node)?.value {
            StoredValue::Real(v) => Ok(v),
            _ => Ok(0.0),
        }
    }

    fn string(&self, node: NodeRef) -> Result<String> {
        match &self.node(node)?.value {
            StoredValue::String(v) => Ok(v.clone()),
            _ => Ok(String::new()),
        }
    }

    fn vector(&self, node: NodeRef) -> Result<Option<Vector2>> {
        match self.node(node)?.value {
            StoredValue::Vector(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn bitmap(&self, node: NodeRef) -> Result<Option<Bitmap>> {
        match &self.node(node)?.value {
            StoredValue::Bitmap {
                width,
                height,
                compressed,
            } => {
                let data = lz4_flex::decompress_size_prepended(compressed).map_err(|e| {
                    BridgeError::Decode(format!("LZ4 decompression failed: {}", e))
                })?;
                Ok(Some(Bitmap {
                    width: *width,
                    height: *height,
                    data,
                }))
            }
            _ => Ok(None),
        }
    }

    fn bitmap_size(&self, node: NodeRef) -> Result<Option<(u16, u16)>> {
        match self.node(node)?.value {
            StoredValue::Bitmap { width, height, .. } => Ok(Some((width, height))),
            _ => Ok(None),
        }
    }

    fn audio(&self, node: NodeRef) -> Result<Option<Audio>> {
        match &self.node(node)?.value {
            StoredValue::Audio(data) => Ok(Some(Audio { data: data.clone() })),
            _ => Ok(None),
        }
    }
}

/// Opener serving [`MemoryArchive`]s by path
///
/// Counts every open attempt per path so tests can check how often the
/// registry actually reached the backend. Every successful open hands out a
/// fresh copy, so the caller is the only owner of what it gets back.
#[derive(Default)]
pub struct MemoryOpener {
    archives: Mutex<HashMap<String, MemoryArchive>>,
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `archive` when `path` is opened
    pub fn insert(&self, path: impl Into<String>, archive: MemoryArchive) {
        let path = path.into();
        self.failing.lock().remove(&path);
        self.archives.lock().insert(path, archive);
    }

    /// Make opens of `path` fail as a malformed archive
    pub fn fail(&self, path: impl Into<String>) {
        self.failing.lock().insert(path.into());
    }

    /// Stop failing `path`
    pub fn heal(&self, path: &str) {
        self.failing.lock().remove(path);
    }

    /// Number of open attempts seen for `path`, failed ones included
    pub fn open_count(&self, path: &str) -> usize {
        self.attempts.lock().get(path).copied().unwrap_or(0)
    }

    /// Number of open attempts across all paths
    pub fn total_opens(&self) -> usize {
        self.attempts.lock().values().sum()
    }
}

impl ArchiveOpener for MemoryOpener {
    fn open(&self, path: &str) -> Result<Arc<dyn Archive>> {
        *self.attempts.lock().entry(path.to_string()).or_insert(0) += 1;

        if self.failing.lock().contains(path) {
            return Err(BridgeError::Decode(format!("malformed archive: {}", path)));
        }

        match self.archives.lock().get(path) {
            // Each open yields an independent container, like reopening a file
            Some(archive) => Ok(Arc::new(archive.clone()) as Arc<dyn Archive>),
            None => Err(BridgeError::ArchiveOpen {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such archive"),
            }),
        }
    }
}
