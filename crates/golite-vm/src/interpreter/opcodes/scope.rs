//! `ENTER_SCOPE`, `EXIT_SCOPE`, `LD`, `ASSIGN` (spec §4.2 "Environment opcodes").
//!
//! Every binding slot is addressed lexically as `(frames-back, slot)`
//! against the task's current environment (spec §4.1 "Environment
//! extension"). A slot holding the `UNALLOCATED` singleton has never been
//! written; reading one is a fatal `UseBeforeAssign`, matching the spec's
//! "declared but not yet assigned" `let`/`var` semantics.

use crate::bytecode::LexAddr;
use crate::error::VmResult;
use crate::heap::UNALLOCATED_ADDR;
use crate::interpreter::task::{StepOutcome, StepRoots, Task};
use crate::interpreter::ExecCtx;

pub fn enter_scope(task: &mut Task, ctx: &mut ExecCtx, slots: u32) -> VmResult<StepOutcome> {
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let frame = ctx.heap.allocate_frame(slots, &roots)?;

    task.working_set.push(frame);
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let block_frame = match ctx.heap.allocate_block_frame(task.env, &roots) {
        Ok(addr) => addr,
        Err(e) => {
            task.working_set.pop();
            return Err(e);
        }
    };
    task.working_set.pop();

    task.working_set.push(frame);
    task.working_set.push(block_frame);
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let new_env = ctx.heap.extend_environment(task.env, frame, &roots);
    task.working_set.truncate(task.working_set.len() - 2);
    let new_env = new_env?;

    task.runtime_stack.push(block_frame);
    task.env = new_env;
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn exit_scope(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    let block_frame = task
        .runtime_stack
        .pop()
        .ok_or(crate::error::VmError::MissingCallFrame)?;
    task.env = ctx.heap.block_frame_env(block_frame)?;
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

/// `ENVIRONMENT` nodes store frames oldest-first (each `ENTER_SCOPE`/`CALL`
/// appends the newest frame at the end, spec §4.1 "Environment extension"),
/// while a `LexAddr`'s `frame` counts scopes *back* from the innermost one.
/// Converts between the two.
fn resolve_frame(heap: &crate::heap::Heap, env: crate::heap::Address, frames_back: u32) -> VmResult<crate::heap::Address> {
    let count = heap.env_frame_count(env)?;
    let depth = count
        .checked_sub(1 + frames_back)
        .ok_or(crate::error::VmError::IndexOutOfRange {
            index: frames_back as i64,
            length: count,
        })?;
    heap.env_frame_at(env, depth)
}

pub fn ld(task: &mut Task, ctx: &mut ExecCtx, name: &str, addr: LexAddr) -> VmResult<StepOutcome> {
    let frame_addr = resolve_frame(ctx.heap, task.env, addr.frame)?;
    let value = ctx.heap.frame_get(frame_addr, addr.slot)?;
    if value == UNALLOCATED_ADDR {
        return Err(crate::error::VmError::UseBeforeAssign {
            name: name.to_string(),
            frame: addr.frame,
            slot: addr.slot,
        });
    }
    task.operand_stack.push(value);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

/// Writes the top of the operand stack into the addressed slot, leaving the
/// value on the stack: assignment is itself an expression, so callers that
/// only wanted the side effect follow `ASSIGN` with a `POP`.
pub fn assign(
    task: &mut Task,
    ctx: &mut ExecCtx,
    _name: &str,
    addr: LexAddr,
) -> VmResult<StepOutcome> {
    let value = *task
        .operand_stack
        .last()
        .ok_or_else(|| crate::error::VmError::OperandTypeError("ASSIGN on an empty operand stack".into()))?;
    let frame_addr = resolve_frame(ctx.heap, task.env, addr.frame)?;
    ctx.heap.frame_set(frame_addr, addr.slot, value)?;
    task.pc += 1;
    Ok(StepOutcome::Continue)
}
