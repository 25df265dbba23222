//! Heap object variants: strings, functions, arrays, classes, instances
//! and bound methods.

use indexmap::IndexMap;

use crate::runtime::heap::GcRef;
use crate::runtime::value::Value;
use crate::vm::chunk::Chunk;

/// An interned string: byte content plus its cached FNV-1a hash.
#[derive(Debug)]
pub struct StrObj {
    pub chars: String,
    pub hash: u32,
}

/// A compiled function.
#[derive(Debug)]
pub struct FunctionObj {
    /// Formal parameter count. Methods count the receiver slot.
    pub arity: u8,
    /// Size of the register window a frame for this function needs.
    pub register_count: usize,
    pub chunk: Chunk,
    /// Interned name; `None` for the top-level script.
    pub name: Option<GcRef>,
}

/// A class: its interned name and an ordered method table. Keys are
/// interned-string references, so key equality is reference identity.
#[derive(Debug)]
pub struct ClassObj {
    pub name: GcRef,
    pub methods: IndexMap<GcRef, Value>,
}

impl ClassObj {
    pub fn find_method(&self, name: GcRef) -> Option<Value> {
        self.methods.get(&name).copied()
    }
}

/// An instance: its class and an ordered field table.
#[derive(Debug)]
pub struct InstanceObj {
    pub class: GcRef,
    pub fields: IndexMap<GcRef, Value>,
}

/// A method read off an instance without being called: the captured
/// receiver plus the method function.
#[derive(Debug)]
pub struct BoundMethodObj {
    pub receiver: Value,
    pub method: GcRef,
}

/// The payload of a heap object.
#[derive(Debug)]
pub enum ObjKind {
    Str(StrObj),
    Function(FunctionObj),
    Array(Vec<Value>),
    Class(ClassObj),
    Instance(InstanceObj),
    BoundMethod(BoundMethodObj),
}

/// A heap object: mark bit, intrusive allocation-list link, payload.
#[derive(Debug)]
pub struct HeapObj {
    pub marked: bool,
    /// Next object in the heap's allocation list (newest first).
    pub next: Option<GcRef>,
    pub kind: ObjKind,
}
