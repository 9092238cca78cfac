//! Bytecode data types (spec §4.2): the instruction set, its operand
//! encoding, and the immutable instruction stream the compiler hands to the
//! interpreter.
//!
//! `Instruction` derives `serde::{Serialize, Deserialize}` so a compiled
//! program can round-trip through a file between the (out-of-scope)
//! compiler and `golite-cli`, the way the teacher's own bytecode module
//! (`compiler/bytecode/module.rs`) serializes compiled units.

mod opcode;
mod program;

pub use opcode::{BinOp, Instruction, LexAddr, Literal, UnOp};
pub use program::Program;
