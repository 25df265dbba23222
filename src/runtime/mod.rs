//! Runtime value representation and garbage-collected heap.

pub mod heap;
pub mod object;
pub mod value;

pub use heap::{GcRef, Heap};
pub use value::Value;
