//! Archive-reading capability
//!
//! The bridge never decodes archive files itself. Anything that can open an
//! archive and walk its node tree plugs in through [`ArchiveOpener`] and
//! [`Archive`]; [`memory`] ships an in-memory implementation.

pub mod memory;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use memory::{MemoryArchive, MemoryNode, MemoryOpener};

/// Opaque reference to one node inside one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u32);

/// Declared type of a node's payload
///
/// The discriminants are part of the C boundary and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum NodeType {
    #[default]
    None = 0,
    Integer = 1,
    Real = 2,
    String = 3,
    Vector = 4,
    Bitmap = 5,
    Audio = 6,
}

impl NodeType {
    /// Decode a wire value; anything unknown is `None`
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Integer,
            2 => Self::Real,
            3 => Self::String,
            4 => Self::Vector,
            5 => Self::Bitmap,
            6 => Self::Audio,
            _ => Self::None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Two-component integer vector (origins, positions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: i32,
    pub y: i32,
}

impl Vector2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Vector2 {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Decoded raster payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u16,
    pub height: u16,
    /// Decoded pixel bytes, exactly as produced by the archive decoder
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Payload size in bytes (not pixels, not rows)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Raw audio payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audio {
    pub data: Vec<u8>,
}

/// One open archive container
///
/// Scalar accessors (`integer`, `real`, `string`) apply the implementation's
/// own coercion or default when the declared type does not match. The blob
/// and vector accessors return `Ok(None)` on a mismatch instead.
pub trait Archive: Send + Sync {
    fn root(&self) -> NodeRef;

    /// Exact, case-sensitive child lookup
    fn child(&self, node: NodeRef, name: &str) -> Result<Option<NodeRef>>;

    /// Children in the archive's native enumeration order
    fn children(&self, node: NodeRef) -> Result<Box<dyn Iterator<Item = NodeRef> + '_>>;

    fn name(&self, node: NodeRef) -> Result<String>;

    fn node_type(&self, node: NodeRef) -> Result<NodeType>;

    fn child_count(&self, node: NodeRef) -> Result<usize>;

    fn integer(&self, node: NodeRef) -> Result<i64>;

    fn real(&self, node: NodeRef) -> Result<f64>;

    fn string(&self, node: NodeRef) -> Result<String>;

    fn vector(&self, node: NodeRef) -> Result<Option<Vector2>>;

    /// Decode the full raster payload
    fn bitmap(&self, node: NodeRef) -> Result<Option<Bitmap>>;

    /// Width and height of a bitmap node
    ///
    /// The default decodes the payload; implementations that keep the
    /// dimensions in the node record should answer without decoding.
    fn bitmap_size(&self, node: NodeRef) -> Result<Option<(u16, u16)>> {
        Ok(self.bitmap(node)?.map(|bitmap| (bitmap.width, bitmap.height)))
    }

    fn audio(&self, node: NodeRef) -> Result<Option<Audio>>;
}

/// Opens archive containers by filesystem path
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, path: &str) -> Result<Arc<dyn Archive>>;
}
