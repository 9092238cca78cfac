//! Error taxonomy (spec §7).
//!
//! Every variant here is fatal: there is no user-level exception mechanism
//! in this VM, so any `Err` that escapes an opcode handler propagates to
//! [`crate::Vm::run`] and stops the machine.

use crate::heap::Address;
use thiserror::Error;

pub type VmResult<T> = Result<T, VmError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("out of memory: heap exhausted after collection and resize")]
    OutOfMemory,

    #[error("type tag mismatch at address {address}: expected {expected}, found {found}")]
    TypeTagMismatch {
        address: Address,
        expected: &'static str,
        found: &'static str,
    },

    #[error("operand type error: {0}")]
    OperandTypeError(String),

    #[error("index {index} out of range (length {length})")]
    IndexOutOfRange { index: i64, length: u32 },

    #[error("use of unassigned binding {name:?} at (frame={frame}, slot={slot})")]
    UseBeforeAssign { name: String, frame: u32, slot: u32 },

    #[error("value at address {address} is not callable")]
    NotCallable { address: Address },

    #[error("address {address} is not a channel")]
    NotAChannel { address: Address },

    #[error("unknown builtin id {0}")]
    UnknownBuiltin(u32),

    #[error("runtime stack exhausted looking for a call frame")]
    MissingCallFrame,

    #[error("all {task_count} tasks are blocked or done: deadlock")]
    Deadlock { task_count: usize },
}
