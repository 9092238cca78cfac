//! `ACCESS_ADDRESS`, `ASSIGN_ADDRESS` (spec §4.2 "Indexed opcodes").
//!
//! Both take the target array and a numeric index off the operand stack;
//! `ASSIGN_ADDRESS` additionally takes the value to store, and leaves it on
//! the stack afterwards, matching `ASSIGN`'s expression convention.

use crate::error::{VmError, VmResult};
use crate::interpreter::task::{StepOutcome, Task};
use crate::interpreter::ExecCtx;

pub fn access_address(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    let index_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ACCESS_ADDRESS needs an index".into()))?;
    let array_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ACCESS_ADDRESS needs an array".into()))?;
    let index = ctx.heap.read_number(index_addr)? as i64;
    let value = ctx.heap.array_get(array_addr, index)?;
    task.operand_stack.push(value);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn assign_address(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    let value_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ASSIGN_ADDRESS needs a value".into()))?;
    let index_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ASSIGN_ADDRESS needs an index".into()))?;
    let array_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ASSIGN_ADDRESS needs an array".into()))?;
    let index = ctx.heap.read_number(index_addr)? as i64;
    ctx.heap.array_set(array_addr, index, value_addr)?;
    task.operand_stack.push(value_addr);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}
