//! Keyed list reconciliation.
//!
//! Items are records in a doubly linked list that mirrors their order in the
//! live tree, with a key index for lookup. An update makes one forward pass
//! over the new entries with a cursor on the old order:
//!
//! ```text
//! old: [a] [b] [c] [d]      new: c a e
//!       ^ cursor
//! c -> found after cursor    move c before a          [c] [a] [b] [d]
//! a -> found at cursor       update, cursor -> b
//! e -> cursor on b, d gone   destroy b and d          [c] [a]
//!      unknown key           create before end        [c] [a] [e]
//! ```
//!
//! Records at the cursor whose key is gone are destroyed as soon as the cursor
//! reaches them. Every surviving record keeps its nodes; only moved records
//! are re-inserted.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use log::{debug, warn};

use crate::context::RenderContext;
use crate::dom::{Namespace, NodeId};
use crate::error::RenderError;
use crate::recycle::KeyedElement;
use crate::slot::Slot;
use crate::value::{Key, Value};

type RecordId = usize;

struct Record {
    key: Key,
    slot: Slot,
    prev: Option<RecordId>,
    next: Option<RecordId>,
}

pub(crate) struct ListSlot {
    start: NodeId,
    end: NodeId,
    namespace: Namespace,
    records: Vec<Option<Record>>,
    free: Vec<RecordId>,
    head: Option<RecordId>,
    tail: Option<RecordId>,
    lookup: HashMap<Key, RecordId>,
}

impl ListSlot {
    pub(crate) fn create(
        ctx: &Rc<RenderContext>,
        parent: NodeId,
        before: Option<NodeId>,
        namespace: Namespace,
    ) -> Self {
        let dom = ctx.dom();
        let start = dom.insert_marker(parent, before);
        let end = dom.insert_marker(parent, before);
        Self::empty(start, end, namespace)
    }

    /// Wraps an existing slot as the first item, keyed by position 0.
    pub(crate) fn adopt(
        ctx: &Rc<RenderContext>,
        slot: Slot,
        parent: NodeId,
        namespace: Namespace,
    ) -> Self {
        let dom = ctx.dom();
        let start = dom.insert_marker(parent, Some(slot.start()));
        let end = dom.insert_marker(parent, dom.next_sibling_of(slot.end()));
        let mut list = Self::empty(start, end, namespace);
        list.link(Key::Index(0), slot, None);
        list
    }

    fn empty(start: NodeId, end: NodeId, namespace: Namespace) -> Self {
        Self {
            start,
            end,
            namespace,
            records: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            lookup: HashMap::new(),
        }
    }

    pub(crate) fn start(&self) -> NodeId {
        self.start
    }

    pub(crate) fn end(&self) -> NodeId {
        self.end
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Anything renderable as items; a scalar or template is a one-item list.
    pub(crate) fn matches(value: &Value) -> bool {
        !matches!(value, Value::Null | Value::Attributes(_) | Value::Slot(_)) && !value.is_async()
    }

    pub(crate) fn update(&mut self, ctx: &Rc<RenderContext>, value: Value) -> Result<(), RenderError> {
        let parent = ctx
            .dom()
            .parent_of(self.start)
            .ok_or(RenderError::Detached(self.start))?;
        let entries = dedupe(value.entries());
        let previous_len = self.lookup.len();
        let mut first_error = None;
        let mut cursor = self.head;

        for (key, value) in &entries {
            while let Some(id) = cursor {
                if entries.contains_key(&self.record(id).key) {
                    break;
                }
                cursor = self.record(id).next;
                self.remove(ctx, id);
            }

            let outcome = match self.lookup.get(key).copied() {
                Some(id) => {
                    let id = if cursor == Some(id) {
                        cursor = self.record(id).next;
                        id
                    } else {
                        self.move_before(ctx, id, cursor, parent)
                    };
                    self.update_record(ctx, id, value.clone(), parent)
                }
                None => self.insert_before(ctx, key.clone(), value.clone(), cursor, parent),
            };
            // One failing item leaves the rest of the list consistent
            if let Err(error) = outcome {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    ctx.report(error);
                }
            }
        }

        while let Some(id) = cursor {
            cursor = self.record(id).next;
            self.remove(ctx, id);
        }
        debug!(
            "[trellis] list reconciled, {previous_len} -> {} items",
            self.lookup.len()
        );
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn cancel_updates(&mut self) {
        for record in self.records.iter_mut().flatten() {
            record.slot.cancel_updates();
        }
    }

    pub(crate) fn collect_keyed(&self, out: &mut Vec<KeyedElement>) {
        for record in self.records.iter().flatten() {
            record.slot.collect_keyed(out);
        }
    }

    // --- Record operations ---

    /// Updates the record's slot in place, or replaces it when the value no
    /// longer matches. The old slot is gone before the new one is built; if
    /// building fails the record is dropped from the list.
    fn update_record(
        &mut self,
        ctx: &Rc<RenderContext>,
        id: RecordId,
        value: Value,
        parent: NodeId,
    ) -> Result<(), RenderError> {
        let record = self.record_mut(id);
        if record.slot.matches(&value) {
            return record.slot.update(ctx, value);
        }
        let next = record.next;
        let anchor = self.anchor(next);
        let previous = self.unlink(id);
        self.lookup.remove(&previous.key);
        previous.slot.destroy(ctx);

        let slot = Slot::create_item(ctx, value, parent, Some(anchor), self.namespace)?;
        self.link(previous.key, slot, next);
        Ok(())
    }

    fn insert_before(
        &mut self,
        ctx: &Rc<RenderContext>,
        key: Key,
        value: Value,
        cursor: Option<RecordId>,
        parent: NodeId,
    ) -> Result<(), RenderError> {
        let anchor = self.anchor(cursor);
        let slot = Slot::create_item(ctx, value, parent, Some(anchor), self.namespace)?;
        self.link(key, slot, cursor);
        Ok(())
    }

    /// Relocates a record before `cursor` and returns its new id.
    fn move_before(
        &mut self,
        ctx: &Rc<RenderContext>,
        id: RecordId,
        cursor: Option<RecordId>,
        parent: NodeId,
    ) -> RecordId {
        let anchor = self.anchor(cursor);
        let record = self.unlink(id);
        ctx.dom()
            .insert_sibling_run(record.slot.start(), record.slot.end(), parent, Some(anchor));
        self.link(record.key, record.slot, cursor)
    }

    fn remove(&mut self, ctx: &Rc<RenderContext>, id: RecordId) {
        let record = self.unlink(id);
        self.lookup.remove(&record.key);
        record.slot.destroy(ctx);
    }

    /// First node of the record at `cursor`, or the end marker.
    fn anchor(&self, cursor: Option<RecordId>) -> NodeId {
        cursor.map_or(self.end, |id| self.record(id).slot.start())
    }

    // --- Linked list ---

    fn record(&self, id: RecordId) -> &Record {
        match self.records.get(id) {
            Some(Some(record)) => record,
            _ => panic!("[trellis] list record {id} is not live"),
        }
    }

    fn record_mut(&mut self, id: RecordId) -> &mut Record {
        match self.records.get_mut(id) {
            Some(Some(record)) => record,
            _ => panic!("[trellis] list record {id} is not live"),
        }
    }

    /// Links a new record before `before`, or at the tail.
    fn link(&mut self, key: Key, slot: Slot, before: Option<RecordId>) -> RecordId {
        let prev = match before {
            Some(before) => self.record(before).prev,
            None => self.tail,
        };
        let record = Record {
            key: key.clone(),
            slot,
            prev,
            next: before,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.records[id] = Some(record);
                id
            }
            None => {
                self.records.push(Some(record));
                self.records.len() - 1
            }
        };
        match prev {
            Some(prev) => self.record_mut(prev).next = Some(id),
            None => self.head = Some(id),
        }
        match before {
            Some(before) => self.record_mut(before).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.lookup.insert(key, id);
        id
    }

    /// Unlinks a record, leaving its key index entry in place.
    fn unlink(&mut self, id: RecordId) -> Record {
        let Some(record) = self.records.get_mut(id).and_then(Option::take) else {
            panic!("[trellis] list record {id} is not live");
        };
        match record.prev {
            Some(prev) => self.record_mut(prev).next = record.next,
            None => self.head = record.next,
        }
        match record.next {
            Some(next) => self.record_mut(next).prev = record.prev,
            None => self.tail = record.prev,
        }
        self.free.push(id);
        record
    }
}

/// Keeps the first occurrence of every key.
fn dedupe(entries: Vec<(Key, Value)>) -> IndexMap<Key, Value> {
    let mut unique = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        match unique.entry(key) {
            Entry::Occupied(entry) => {
                warn!("[trellis] duplicate list key {}, keeping the first item", entry.key());
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    unique
}
