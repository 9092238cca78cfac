//! `JOF`, `GOTO` (spec §4.2 "Control-flow opcodes").

use crate::error::{VmError, VmResult};
use crate::interpreter::task::{StepOutcome, Task};
use crate::interpreter::ExecCtx;

pub fn jof(task: &mut Task, ctx: &mut ExecCtx, addr: usize) -> VmResult<StepOutcome> {
    let cond = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("JOF on an empty operand stack".into()))?;
    if ctx.heap.is_truthy_jump(cond) {
        task.pc = addr;
    } else {
        task.pc += 1;
    }
    Ok(StepOutcome::Continue)
}

pub fn goto(task: &mut Task, _ctx: &mut ExecCtx, addr: usize) -> VmResult<StepOutcome> {
    task.pc = addr;
    Ok(StepOutcome::Continue)
}
