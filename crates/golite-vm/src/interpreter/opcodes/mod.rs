//! Opcode handlers, one module per instruction family (spec §4.2–§4.3),
//! mirroring the teacher's `vm/interpreter/opcodes/{stack,control_flow,...}.rs`
//! split.

pub mod arrays;
pub mod calls;
pub mod concurrency;
pub mod control_flow;
pub mod scope;
pub mod stack;
