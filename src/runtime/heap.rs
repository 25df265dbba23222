//! The garbage-collected heap: slot arena, intrusive allocation list,
//! string intern table and the tri-color mark/sweep collector.

use std::collections::HashMap;

use crate::runtime::object::{HeapObj, ObjKind, StrObj};
use crate::runtime::value::Value;

/// A handle to a heap object. Handle identity is object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef(u32);

const INITIAL_GC_THRESHOLD: usize = 1024 * 1024;

/// FNV-1a over the string bytes.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    const FNV_OFFSET: u32 = 2166136261;
    const FNV_PRIME: u32 = 16777619;
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The heap. Objects live in recycled slots addressed by [`GcRef`]; every
/// live object is also threaded onto an allocation list through its header
/// so the sweep can visit the complete allocation set.
pub struct Heap {
    slots: Vec<Option<HeapObj>>,
    free_list: Vec<u32>,
    /// Head of the allocation list, newest object first.
    head: Option<GcRef>,
    /// Intern table: FNV-1a hash -> interned strings with that hash. The
    /// entries are weak; reachability must come from elsewhere.
    strings: HashMap<u32, Vec<GcRef>>,
    bytes_allocated: usize,
    next_gc: usize,
    gray: Vec<GcRef>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            head: None,
            strings: HashMap::new(),
            bytes_allocated: 0,
            next_gc: INITIAL_GC_THRESHOLD,
            gray: Vec::new(),
        }
    }

    // ===== Allocation =====

    /// Allocate a new object, prepending it to the allocation list.
    pub fn alloc(&mut self, kind: ObjKind) -> GcRef {
        self.bytes_allocated += object_size(&kind);
        let obj = HeapObj {
            marked: false,
            next: self.head,
            kind,
        };
        let r = if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(obj);
            GcRef(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(obj));
            GcRef(index)
        };
        self.head = Some(r);
        r
    }

    /// True when the next allocation should first run a collection.
    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    // ===== Access =====

    pub fn get(&self, r: GcRef) -> &HeapObj {
        self.slots[r.0 as usize].as_ref().unwrap()
    }

    pub fn get_mut(&mut self, r: GcRef) -> &mut HeapObj {
        self.slots[r.0 as usize].as_mut().unwrap()
    }

    /// True when the slot still holds a live object. Only meaningful in
    /// tests that probe the result of a collection.
    pub fn is_live(&self, r: GcRef) -> bool {
        self.slots
            .get(r.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn as_str(&self, r: GcRef) -> &str {
        match &self.get(r).kind {
            ObjKind::Str(s) => &s.chars,
            _ => unreachable!("object is not a string"),
        }
    }

    pub fn function(&self, r: GcRef) -> &crate::runtime::object::FunctionObj {
        match &self.get(r).kind {
            ObjKind::Function(f) => f,
            _ => unreachable!("object is not a function"),
        }
    }

    pub fn function_mut(&mut self, r: GcRef) -> &mut crate::runtime::object::FunctionObj {
        match &mut self.get_mut(r).kind {
            ObjKind::Function(f) => f,
            _ => unreachable!("object is not a function"),
        }
    }

    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    // ===== Interning =====

    /// Return the unique interned string with this content, allocating it
    /// if no reachable string with equal bytes exists.
    pub fn intern(&mut self, text: &str) -> GcRef {
        let hash = hash_bytes(text.as_bytes());
        if let Some(existing) = self.find_interned(text, hash) {
            return existing;
        }
        let r = self.alloc(ObjKind::Str(StrObj {
            chars: text.to_string(),
            hash,
        }));
        self.strings.entry(hash).or_default().push(r);
        r
    }

    /// Look up an interned string by (bytes, length, hash).
    pub fn find_interned(&self, text: &str, hash: u32) -> Option<GcRef> {
        let bucket = self.strings.get(&hash)?;
        bucket
            .iter()
            .copied()
            .find(|&r| match &self.get(r).kind {
                ObjKind::Str(s) => s.chars.len() == text.len() && s.chars == text,
                _ => false,
            })
    }

    // ===== Equality =====

    /// Same-variant structural equality; strings compare by byte content,
    /// all other heap objects by identity.
    pub fn values_equal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Obj(x), Value::Obj(y)) => {
                if x == y {
                    return true;
                }
                match (&self.get(x).kind, &self.get(y).kind) {
                    (ObjKind::Str(sa), ObjKind::Str(sb)) => sa.chars == sb.chars,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    // ===== Mark phase =====

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.mark_object(r);
        }
    }

    /// Set the mark bit and queue the object for tracing. Marking an
    /// already-marked object is a no-op.
    pub fn mark_object(&mut self, r: GcRef) {
        let obj = self.get_mut(r);
        if obj.marked {
            return;
        }
        obj.marked = true;
        self.gray.push(r);
    }

    /// Drain the gray stack, blackening one object at a time.
    pub fn trace_references(&mut self) {
        while let Some(r) = self.gray.pop() {
            for child in self.children(r) {
                self.mark_value(child);
            }
        }
    }

    /// Every outgoing reference of an object, as values.
    fn children(&self, r: GcRef) -> Vec<Value> {
        match &self.get(r).kind {
            ObjKind::Str(_) => Vec::new(),
            ObjKind::Function(f) => {
                let mut out = Vec::with_capacity(f.chunk.constants.len() + 1);
                if let Some(name) = f.name {
                    out.push(Value::Obj(name));
                }
                out.extend(f.chunk.constants.iter().copied());
                out
            }
            ObjKind::Array(elements) => elements.clone(),
            ObjKind::Class(class) => {
                let mut out = vec![Value::Obj(class.name)];
                for (&name, &value) in &class.methods {
                    out.push(Value::Obj(name));
                    out.push(value);
                }
                out
            }
            ObjKind::Instance(instance) => {
                let mut out = vec![Value::Obj(instance.class)];
                for (&name, &value) in &instance.fields {
                    out.push(Value::Obj(name));
                    out.push(value);
                }
                out
            }
            ObjKind::BoundMethod(bound) => {
                vec![bound.receiver, Value::Obj(bound.method)]
            }
        }
    }

    // ===== Sweep phase =====

    /// Drop intern-table entries whose strings were not marked. Must run
    /// before [`Heap::sweep`] frees them, or lookups through the table
    /// would reach recycled slots.
    pub fn prune_interned(&mut self) {
        let mut keep: HashMap<u32, Vec<GcRef>> = HashMap::new();
        for (hash, bucket) in std::mem::take(&mut self.strings) {
            let live: Vec<GcRef> = bucket
                .into_iter()
                .filter(|&r| {
                    self.slots[r.0 as usize]
                        .as_ref()
                        .is_some_and(|obj| obj.marked)
                })
                .collect();
            if !live.is_empty() {
                keep.insert(hash, live);
            }
        }
        self.strings = keep;
    }

    /// Walk the allocation list: free every unmarked object, clear the mark
    /// on the rest, then recompute the byte count and the next trigger.
    pub fn sweep(&mut self) {
        let mut previous: Option<GcRef> = None;
        let mut cursor = self.head;
        while let Some(r) = cursor {
            let next = self.get(r).next;
            if self.get(r).marked {
                self.get_mut(r).marked = false;
                previous = Some(r);
            } else {
                match previous {
                    Some(p) => self.get_mut(p).next = next,
                    None => self.head = next,
                }
                self.slots[r.0 as usize] = None;
                self.free_list.push(r.0);
            }
            cursor = next;
        }

        self.bytes_allocated = self
            .slots
            .iter()
            .flatten()
            .map(|obj| object_size(&obj.kind))
            .sum();
        self.next_gc = (self.bytes_allocated * 2).max(1024);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Approximate size in bytes of an object and its payload, used for the
/// collection trigger.
fn object_size(kind: &ObjKind) -> usize {
    let base = std::mem::size_of::<HeapObj>();
    let value = std::mem::size_of::<Value>();
    match kind {
        ObjKind::Str(s) => base + s.chars.len(),
        ObjKind::Function(f) => {
            base + f.chunk.code.len()
                + f.chunk.lines.len() * std::mem::size_of::<u32>()
                + f.chunk.constants.len() * value
        }
        ObjKind::Array(elements) => base + elements.len() * value,
        ObjKind::Class(class) => base + class.methods.len() * value * 2,
        ObjKind::Instance(instance) => base + instance.fields.len() * value * 2,
        ObjKind::BoundMethod(_) => base + value * 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_uniqueness() {
        let mut heap = Heap::new();
        // Two separately built strings with equal content are one object.
        let built = format!("f{}", "oo");
        let a = heap.intern(&built);
        let b = heap.intern("foo");
        assert_eq!(a, b);

        let hash = hash_bytes(b"foo");
        assert_eq!(heap.find_interned("foo", hash), Some(a));
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn test_distinct_contents_distinct_objects() {
        let mut heap = Heap::new();
        let a = heap.intern("foo");
        let b = heap.intern("bar");
        assert_ne!(a, b);
        assert_eq!(heap.object_count(), 2);
    }

    #[test]
    fn test_values_equal_strings_by_content() {
        let mut heap = Heap::new();
        let a = heap.intern("abc");
        let b = heap.intern("abc");
        assert!(heap.values_equal(Value::Obj(a), Value::Obj(b)));

        let c = heap.intern("abd");
        assert!(!heap.values_equal(Value::Obj(a), Value::Obj(c)));
    }

    #[test]
    fn test_collect_frees_unreachable() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep");
        let drop1 = heap.intern("drop1");
        let drop2 = heap.intern("drop2");

        heap.mark_value(Value::Obj(keep));
        heap.trace_references();
        heap.prune_interned();
        heap.sweep();

        assert!(heap.is_live(keep));
        assert!(!heap.is_live(drop1));
        assert!(!heap.is_live(drop2));
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn test_collect_traces_array_elements() {
        let mut heap = Heap::new();
        let inner = heap.intern("inside");
        let array = heap.alloc(ObjKind::Array(vec![Value::Obj(inner)]));

        heap.mark_object(array);
        heap.trace_references();
        heap.prune_interned();
        heap.sweep();

        assert!(heap.is_live(array));
        assert!(heap.is_live(inner));
    }

    #[test]
    fn test_intern_table_pruned_before_free() {
        let mut heap = Heap::new();
        let gone = heap.intern("gone");
        let hash = hash_bytes(b"gone");

        // Nothing marked: the string is swept and its table entry removed.
        heap.prune_interned();
        heap.sweep();

        assert!(!heap.is_live(gone));
        assert_eq!(heap.find_interned("gone", hash), None);

        // Re-interning the same content yields a fresh object.
        let again = heap.intern("gone");
        assert!(heap.is_live(again));
    }

    #[test]
    fn test_slot_reuse_after_sweep() {
        let mut heap = Heap::new();
        let _garbage = heap.intern("garbage");
        heap.prune_interned();
        heap.sweep();

        let fresh = heap.intern("fresh");
        assert!(heap.is_live(fresh));
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn test_threshold_after_collection() {
        let mut heap = Heap::new();
        heap.prune_interned();
        heap.sweep();
        // Empty heap: the floor applies.
        assert_eq!(heap.next_gc, 1024);
        assert_eq!(heap.bytes_allocated(), 0);
    }

    #[test]
    fn test_marks_cleared_after_sweep() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep");
        heap.mark_value(Value::Obj(keep));
        heap.trace_references();
        heap.prune_interned();
        heap.sweep();
        assert!(!heap.get(keep).marked);
    }
}
