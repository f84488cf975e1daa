//! Node handle table
//!
//! Handles are plain 64-bit values, so they can cross the C boundary, but
//! they never point at memory. Every insert draws a fresh id from one
//! process-wide counter, and an id is never issued twice. A released,
//! cleared, or foreign handle is therefore always a lookup miss: it cannot
//! come back to name a newer entry, in this table or in any other.
//!
//! The counter is 64 bits wide and only ever incremented; exhausting it
//! would take centuries of continuous allocation.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to one resolved node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(NonZeroU64);

impl NodeHandle {
    fn next() -> Self {
        loop {
            if let Some(id) = NonZeroU64::new(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)) {
                return NodeHandle(id);
            }
        }
    }

    /// Rebuild a handle from its wire value; 0 is the null handle
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(NodeHandle)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }
}

/// Map from live handles to values
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: HashMap<NodeHandle, T>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store `value` and return a fresh handle for it
    pub fn insert(&mut self, value: T) -> NodeHandle {
        let handle = NodeHandle::next();
        self.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Drop one entry; sibling handles are unaffected
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// Drop every entry; returns how many were live
    pub fn clear(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        released
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_insert_get() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");

        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_same_value_gets_distinct_handles() {
        let mut table = HandleTable::new();
        let a = table.insert(7);
        let b = table.insert(7);
        assert_ne!(a.into_raw(), b.into_raw());
    }

    #[test]
    fn test_remove_leaves_siblings() {
        let mut table = HandleTable::new();
        let a = table.insert(1);
        let b = table.insert(2);

        assert_eq!(table.remove(a), Some(1));
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some(&2));
        assert_eq!(table.remove(a), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_released_handle_never_aliases_after_heavy_reuse() {
        let mut table = HandleTable::new();
        let stale = table.insert(0u32);
        table.remove(stale);

        // Far more release/reissue cycles than any 16-bit counter could hold
        let mut seen = HashSet::new();
        for i in 1..=70_000u32 {
            let handle = table.insert(i);
            assert_ne!(handle, stale);
            assert!(seen.insert(handle.into_raw()));
            assert_eq!(table.get(stale), None);
            table.remove(handle);
        }

        let fresh = table.insert(u32::MAX);
        assert_ne!(fresh, stale);
        assert_eq!(table.get(stale), None);
        assert_eq!(table.get(fresh), Some(&u32::MAX));
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut table = HandleTable::new();
        let handles: Vec<_> = (0..10).map(|i| table.insert(i)).collect();
        table.remove(handles[3]);

        assert_eq!(table.clear(), 9);
        assert!(table.is_empty());
        assert!(handles.iter().all(|h| table.get(*h).is_none()));

        let fresh = table.insert(42);
        assert!(!handles.contains(&fresh));
        assert_eq!(table.get(fresh), Some(&42));
    }

    #[test]
    fn test_foreign_table_handles_miss() {
        let mut first = HandleTable::new();
        let mut second = HandleTable::new();
        let a = first.insert("first");
        let b = second.insert("second");

        assert_eq!(second.get(a), None);
        assert_eq!(first.get(b), None);
    }

    #[test]
    fn test_raw_roundtrip_and_null() {
        let mut table = HandleTable::new();
        let handle = table.insert(());
        assert_eq!(NodeHandle::from_raw(handle.into_raw()), Some(handle));
        assert_eq!(NodeHandle::from_raw(0), None);

        // Arbitrary values never resolve
        let bogus = NodeHandle::from_raw(u64::MAX).unwrap();
        assert_eq!(table.get(bogus), None);
        assert!(!table.contains(bogus));
    }
}
