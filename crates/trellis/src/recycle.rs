//! Pool of released keyed elements.
//!
//! An element built with the key attribute belongs to the slot that built it.
//! When that slot is destroyed the element is detached and released here under
//! `(key, tag)`; a later build asking for the same pair gets it back, children
//! cleared, instead of creating a fresh element. Live elements are never in
//! the pool.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::{Dom, NodeId};

type PoolKey = (Rc<str>, Rc<str>);

/// Keyed element owned by a template instance.
#[derive(Clone, Debug)]
pub(crate) struct KeyedElement {
    pub(crate) key: Rc<str>,
    pub(crate) tag: Rc<str>,
    pub(crate) node: NodeId,
}

pub(crate) struct RecyclePool {
    capacity: usize,
    entries: IndexMap<PoolKey, NodeId>,
}

impl RecyclePool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    /// Takes the element released under `(key, tag)`.
    pub(crate) fn take(&mut self, dom: &dyn Dom, key: &str, tag: &str) -> Option<NodeId> {
        let node = self.entries.shift_remove(&(Rc::from(key), Rc::from(tag)))?;
        // Attached again by the host since its release
        if dom.parent_of(node).is_some() {
            return None;
        }
        Some(node)
    }

    /// Pools a detached element. Whatever it displaces, and everything
    /// evicted beyond capacity, is released to the document.
    pub(crate) fn release(&mut self, dom: &dyn Dom, element: KeyedElement) {
        if self.capacity == 0 {
            dom.release(element.node);
            return;
        }
        let pool_key = (element.key, element.tag);
        if let Some(previous) = self.entries.shift_remove(&pool_key) {
            if previous != element.node {
                dom.release(previous);
            }
        }
        self.entries.insert(pool_key, element.node);
        while self.entries.len() > self.capacity {
            if let Some((_, evicted)) = self.entries.shift_remove_index(0) {
                dom.release(evicted);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
