//! `LAUNCH_THREAD`, `SEND`, `RECEIVE`, `SOF`, `ROF`, `BLOCK`, `CLEAR_WAIT`,
//! `DONE` (spec §4.3 "Concurrency opcodes").
//!
//! Channels are rendezvous, one slot deep (spec §4.1's `CHAN` node: a
//! has-item flag plus a single item slot). `SEND` blocks while the slot is
//! occupied; `RECEIVE` blocks while it's empty. Neither pops its operands
//! until the operation can actually complete, so re-running the same
//! instruction after the scheduler lifts the block is safe and resumes
//! exactly where it left off.
//!
//! `SOF`/`ROF` ("send/receive-or-fail") are the non-blocking attempt used to
//! build `select`: on failure they append a wait token for their channel
//! (same as `SEND`/`RECEIVE`) *and* jump to the case's next-attempt address,
//! without marking the task blocked — a `select` tries every case in a round
//! and can end up with one token per failed case, so the scheduler's
//! rotation can unblock it the instant *any* of them turns favorable.
//! `BLOCK` is the generic cooperative yield a `select`'s retry loop falls
//! into when every case failed; `CLEAR_WAIT` drops whatever
//! `WAIT_SEND`/`WAIT_RECEIVE` tokens are registered, and is always emitted
//! right after a successful `SEND`/`RECEIVE` or at the end of a `select`.

use crate::error::VmError;
use crate::error::VmResult;
use crate::heap::Tag;
use crate::interpreter::task::{StepOutcome, StepRoots, Task};
use crate::interpreter::ExecCtx;

pub fn launch_thread(task: &mut Task, _ctx: &mut ExecCtx, addr: usize) -> VmResult<StepOutcome> {
    let entry = task.pc + 1;
    let env = task.env;
    task.pc = addr;
    Ok(StepOutcome::Spawn { entry, env })
}

pub fn send(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    let len = task.operand_stack.len();
    if len < 2 {
        return Err(VmError::OperandTypeError("SEND needs a channel and a value".into()));
    }
    let chan = task.operand_stack[len - 1];
    let value = task.operand_stack[len - 2];
    require_channel(ctx, chan)?;
    if ctx.heap.channel_is_full(chan)? {
        register_wait(task, ctx, chan, Tag::WaitSend)?;
        return Ok(StepOutcome::Blocked);
    }
    task.operand_stack.truncate(len - 2);
    ctx.heap.channel_push_item(chan, value)?;
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn receive(task: &mut Task, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    let chan = *task
        .operand_stack
        .last()
        .ok_or_else(|| VmError::OperandTypeError("RECEIVE needs a channel".into()))?;
    require_channel(ctx, chan)?;
    if ctx.heap.channel_is_empty(chan)? {
        register_wait(task, ctx, chan, Tag::WaitReceive)?;
        return Ok(StepOutcome::Blocked);
    }
    task.operand_stack.pop();
    let item = ctx.heap.channel_pop_item(chan)?;
    task.operand_stack.push(item);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

fn require_channel(ctx: &ExecCtx, chan: crate::heap::Address) -> VmResult<()> {
    if ctx.heap.tag_of(chan) == Tag::Chan {
        Ok(())
    } else {
        Err(VmError::NotAChannel { address: chan })
    }
}

/// Allocates a `WAIT_SEND`/`WAIT_RECEIVE` token for `chan` and appends it to
/// the waiting-set, unconditionally. `SEND`/`RECEIVE` guard this behind
/// "only if not already waiting" since they register at most one token per
/// block; `SOF`/`ROF` call it directly because a `select` accumulates one
/// token per case it tries in a round, so the waiting-set can hold several
/// tokens across several channels at once (spec §4.3 "rotation" unblocks on
/// *any* favorable token).
fn append_wait_token(task: &mut Task, ctx: &mut ExecCtx, chan: crate::heap::Address, kind: Tag) -> VmResult<()> {
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let token = match kind {
        Tag::WaitSend => ctx.heap.allocate_wait_send(chan, &roots)?,
        _ => ctx.heap.allocate_wait_receive(chan, &roots)?,
    };
    task.waiting_set.push(token);
    Ok(())
}

fn register_wait(task: &mut Task, ctx: &mut ExecCtx, chan: crate::heap::Address, kind: Tag) -> VmResult<()> {
    if !task.waiting_set.is_empty() {
        // already registered on a previous, still-blocked attempt at this pc.
        return Ok(());
    }
    append_wait_token(task, ctx, chan, kind)?;
    task.blocked = true;
    Ok(())
}

pub fn sof(task: &mut Task, ctx: &mut ExecCtx, addr: usize) -> VmResult<StepOutcome> {
    let len = task.operand_stack.len();
    if len < 2 {
        return Err(VmError::OperandTypeError("SOF needs a channel and a value".into()));
    }
    let chan = task.operand_stack[len - 1];
    let value = task.operand_stack[len - 2];
    require_channel(ctx, chan)?;
    task.operand_stack.truncate(len - 2);
    if ctx.heap.channel_is_full(chan)? {
        append_wait_token(task, ctx, chan, Tag::WaitSend)?;
        task.pc = addr;
    } else {
        ctx.heap.channel_push_item(chan, value)?;
        task.pc += 1;
    }
    Ok(StepOutcome::Continue)
}

pub fn rof(task: &mut Task, ctx: &mut ExecCtx, addr: usize) -> VmResult<StepOutcome> {
    let chan = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("ROF needs a channel".into()))?;
    require_channel(ctx, chan)?;
    if ctx.heap.channel_is_empty(chan)? {
        append_wait_token(task, ctx, chan, Tag::WaitReceive)?;
        task.pc = addr;
    } else {
        let item = ctx.heap.channel_pop_item(chan)?;
        task.operand_stack.push(item);
        task.pc += 1;
    }
    Ok(StepOutcome::Continue)
}

pub fn block(task: &mut Task, _ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    task.blocked = true;
    Ok(StepOutcome::Blocked)
}

pub fn clear_wait(task: &mut Task, _ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    task.waiting_set.clear();
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn done(task: &mut Task, _ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    task.done = true;
    Ok(StepOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use crate::bytecode::Program;
    use crate::heap::{Heap, NoRoots};
    use crate::interpreter::TaskId;

    fn ctx_parts() -> (Heap, Program, BuiltinRegistry, crate::heap::Address) {
        let mut heap = Heap::new(200, false);
        let env = heap.allocate_environment(0, &NoRoots).unwrap();
        (heap, Program::new(vec![]), BuiltinRegistry::new(), env)
    }

    #[test]
    fn send_on_a_full_channel_blocks_receive_drains_it() {
        let (mut heap, program, builtins, env) = ctx_parts();
        let chan = heap.allocate_channel(&NoRoots).unwrap();
        let n = heap.allocate_number(9.0, &NoRoots).unwrap();

        let mut sender = Task::new(TaskId(0), 0, env);
        sender.operand_stack.push(n);
        sender.operand_stack.push(chan);
        {
            let mut ctx = ExecCtx { heap: &mut heap, program: &program, builtins: &builtins, other_roots: &[], global_env: env };
            let outcome = send(&mut sender, &mut ctx).unwrap();
            assert_eq!(outcome, StepOutcome::Continue);
        }
        assert!(heap.channel_is_full(chan).unwrap());

        let mut receiver = Task::new(TaskId(1), 0, env);
        receiver.operand_stack.push(chan);
        {
            let mut ctx = ExecCtx { heap: &mut heap, program: &program, builtins: &builtins, other_roots: &[], global_env: env };
            receive(&mut receiver, &mut ctx).unwrap();
        }
        assert!(heap.channel_is_empty(chan).unwrap());
        assert_eq!(*receiver.operand_stack.last().unwrap(), n);
    }

    #[test]
    fn receive_on_an_empty_channel_blocks_and_registers_a_wait_token() {
        let (mut heap, program, builtins, env) = ctx_parts();
        let chan = heap.allocate_channel(&NoRoots).unwrap();
        let mut receiver = Task::new(TaskId(0), 0, env);
        receiver.operand_stack.push(chan);
        let mut ctx = ExecCtx { heap: &mut heap, program: &program, builtins: &builtins, other_roots: &[], global_env: env };
        let outcome = receive(&mut receiver, &mut ctx).unwrap();
        assert_eq!(outcome, StepOutcome::Blocked);
        assert!(receiver.blocked);
        assert_eq!(receiver.waiting_set.len(), 1);
    }

    #[test]
    fn sof_jumps_away_on_a_full_channel_instead_of_blocking() {
        let (mut heap, program, builtins, env) = ctx_parts();
        let chan = heap.allocate_channel(&NoRoots).unwrap();
        let first = heap.allocate_number(1.0, &NoRoots).unwrap();
        let second = heap.allocate_number(2.0, &NoRoots).unwrap();
        heap.channel_push_item(chan, first).unwrap();

        let mut task = Task::new(TaskId(0), 0, env);
        task.operand_stack.push(second);
        task.operand_stack.push(chan);
        let mut ctx = ExecCtx { heap: &mut heap, program: &program, builtins: &builtins, other_roots: &[], global_env: env };
        sof(&mut task, &mut ctx, 99).unwrap();
        assert_eq!(task.pc, 99);
    }
}
