//! `LDF`, `CALL`, `TCALL`, `RESET` (spec §4.2 "Call protocol").
//!
//! `CALL` pushes a `CALLFRAME` recording where to resume and extends the
//! environment with a fresh `FRAME` of arguments; `TCALL` reuses the
//! caller's existing `CALLFRAME` instead of pushing a new one, so a tail
//! call does not grow the runtime stack. `RESET` unwinds `BLOCKFRAME`s
//! until it finds the `CALLFRAME` to return through.
//!
//! Working-set note: arguments are popped off the operand stack into a
//! local buffer before the callee's `FRAME`/`ENVIRONMENT` exist to hold
//! them, so they're pushed onto the task's working set for the duration of
//! that construction — otherwise a GC triggered mid-call could reclaim an
//! argument no live root mentions yet. The callee itself is popped off the
//! operand stack before its tag, arity, entry pc, and (for a closure) its
//! captured environment are ever read, so it rides the working set across
//! `dispatch_call` too — every allocation in between (`build_call_frame`'s
//! `FRAME`/`ENVIRONMENT`, the `CALLFRAME`) can trigger `collect()`.

use crate::error::{VmError, VmResult};
use crate::heap::Tag;
use crate::interpreter::task::{StepOutcome, StepRoots, Task};
use crate::interpreter::ExecCtx;

pub fn ldf(task: &mut Task, ctx: &mut ExecCtx, arity: u16, entry: usize) -> VmResult<StepOutcome> {
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let closure = ctx
        .heap
        .allocate_closure(arity, entry as u16, task.env, &roots)?;
    task.operand_stack.push(closure);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

fn pop_args(task: &mut Task, n: usize) -> VmResult<Vec<crate::heap::Address>> {
    if task.operand_stack.len() < n {
        return Err(VmError::OperandTypeError(
            "CALL has fewer operands than its declared argument count".into(),
        ));
    }
    let split = task.operand_stack.len() - n;
    Ok(task.operand_stack.split_off(split))
}

pub fn call(task: &mut Task, ctx: &mut ExecCtx, n: u16) -> VmResult<StepOutcome> {
    let n = n as usize;
    let args = pop_args(task, n)?;
    let callee = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("CALL has no callee on the operand stack".into()))?;

    // `callee` is off the operand stack and reachable from nothing else yet
    // (not `new_env`, not `task.working_set`); `build_call_frame`'s
    // FRAME/ENVIRONMENT allocations and the CALLFRAME allocation below can
    // all trigger `collect()`, so `callee` rides the working set until its
    // tag and entry pc have actually been read.
    task.working_set.push(callee);
    let outcome = dispatch_call(task, ctx, callee, n, &args, true);
    task.working_set.pop();
    outcome
}

pub fn tcall(task: &mut Task, ctx: &mut ExecCtx, n: u16) -> VmResult<StepOutcome> {
    let n = n as usize;
    let args = pop_args(task, n)?;
    let callee = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("TCALL has no callee on the operand stack".into()))?;

    task.working_set.push(callee);
    let outcome = dispatch_call(task, ctx, callee, n, &args, false);
    task.working_set.pop();
    outcome
}

/// Shared `CALL`/`TCALL` body: resolves `callee` against its tag and either
/// enters a closure (pushing a `CALLFRAME` only when `push_call_frame` is
/// set, i.e. for `CALL`) or invokes a builtin directly.
fn dispatch_call(
    task: &mut Task,
    ctx: &mut ExecCtx,
    callee: crate::heap::Address,
    n: usize,
    args: &[crate::heap::Address],
    push_call_frame: bool,
) -> VmResult<StepOutcome> {
    match ctx.heap.tag_of(callee) {
        Tag::Closure => {
            let arity = ctx.heap.closure_arity(callee)? as usize;
            if arity != n {
                return Err(VmError::OperandTypeError(format!(
                    "closure expects {arity} argument(s), called with {n}"
                )));
            }
            let (new_env, return_pc) = build_call_frame(task, ctx, callee, args, task.pc + 1)?;
            if push_call_frame {
                let call_frame = {
                    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
                    ctx.heap.allocate_call_frame(task.env, return_pc, &roots)?
                };
                task.runtime_stack.push(call_frame);
            }
            task.env = new_env;
            task.pc = ctx.heap.closure_entry(callee)? as usize;
            Ok(StepOutcome::Continue)
        }
        Tag::Builtin => {
            let id = ctx.heap.builtin_id(callee)?;
            task.working_set.extend_from_slice(args);
            let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
            let result = ctx.builtins.call(id, ctx.heap, args, &roots);
            task.working_set.truncate(task.working_set.len() - args.len());
            task.operand_stack.push(result?);
            task.pc += 1;
            Ok(StepOutcome::Continue)
        }
        _ => Err(VmError::NotCallable { address: callee }),
    }
}

/// Builds the callee's argument `FRAME` and extends its closed-over
/// environment with it. Returns the new environment and the return pc the
/// caller would resume at (the caller decides whether to actually record
/// it, per `CALL` vs `TCALL`).
fn build_call_frame(
    task: &mut Task,
    ctx: &mut ExecCtx,
    callee: crate::heap::Address,
    args: &[crate::heap::Address],
    return_pc: usize,
) -> VmResult<(crate::heap::Address, u32)> {
    let closure_env = ctx.heap.closure_env(callee)?;

    task.working_set.extend_from_slice(args);
    let frame = {
        let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
        ctx.heap.allocate_frame(args.len() as u32, &roots)
    };
    task.working_set.truncate(task.working_set.len() - args.len());
    let frame = frame?;

    for (slot, addr) in args.iter().enumerate() {
        ctx.heap.frame_set(frame, slot as u32, *addr)?;
    }

    task.working_set.push(frame);
    let new_env = {
        let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
        ctx.heap.extend_environment(closure_env, frame, &roots)
    };
    task.working_set.pop();

    Ok((new_env?, return_pc as u32))
}

pub fn reset(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    loop {
        let frame = task.runtime_stack.pop().ok_or(VmError::MissingCallFrame)?;
        if ctx.heap.tag_of(frame) == Tag::CallFrame {
            task.env = ctx.heap.call_frame_env(frame)?;
            task.pc = ctx.heap.call_frame_return_pc(frame)? as usize;
            return Ok(StepOutcome::Continue);
        }
        // a BLOCKFRAME left over from an unfinished nested scope; discard it.
    }
}
