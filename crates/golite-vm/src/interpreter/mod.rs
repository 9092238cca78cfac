//! The bytecode interpreter: one [`Task`] stepping one [`Instruction`] at a
//! time against a shared [`Heap`] (spec §4.2, §4.3).
//!
//! Modeled on the teacher's `vm/interpreter/mod.rs` dispatch loop, narrowed
//! from its multi-threaded `Arc<Mutex<Task>>` worker-pool execution down to
//! plain `&mut Task` steps a single-threaded [`crate::scheduler::Scheduler`]
//! drives one instruction at a time.

mod opcodes;
pub mod task;

pub use task::{StepOutcome, StepRoots, Task, TaskId};

use crate::builtins::BuiltinRegistry;
use crate::bytecode::{Instruction, Program};
use crate::error::VmResult;
use crate::heap::{Address, Heap};

/// Everything a single instruction needs beyond the task it belongs to.
/// Built fresh by the scheduler before every `Task::step` call.
pub struct ExecCtx<'a> {
    pub heap: &'a mut Heap,
    pub program: &'a Program,
    pub builtins: &'a BuiltinRegistry,
    /// Roots contributed by every task other than the one currently
    /// stepping, plus the global environment (the scheduler computes this
    /// once per step rather than handing the interpreter a live callback
    /// into itself — see [`task::StepRoots`]).
    pub other_roots: &'a [Address],
    pub global_env: Address,
}

impl Task {
    /// Executes the instruction at the current pc and reports what
    /// happened. A pc that has run off the end of the program is treated
    /// as an implicit `DONE` — well-formed programs always end in one, but
    /// nothing stops a hand-assembled one from relying on the fallback.
    pub fn step(&mut self, ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
        let Some(instr) = ctx.program.get(self.pc).cloned() else {
            self.done = true;
            return Ok(StepOutcome::Done);
        };

        use opcodes::*;
        match instr {
            Instruction::Ldc(lit) => stack::ldc(self, ctx, &lit),
            Instruction::Unop(op) => stack::unop(self, ctx, op),
            Instruction::Binop(op) => stack::binop(self, ctx, op),
            Instruction::Pop => stack::pop(self, ctx),
            Instruction::Jof(addr) => control_flow::jof(self, ctx, addr),
            Instruction::Goto(addr) => control_flow::goto(self, ctx, addr),
            Instruction::EnterScope(n) => scope::enter_scope(self, ctx, n),
            Instruction::ExitScope => scope::exit_scope(self, ctx),
            Instruction::Ld { name, addr } => scope::ld(self, ctx, &name, addr),
            Instruction::Assign { name, addr } => scope::assign(self, ctx, &name, addr),
            Instruction::Ldf { arity, entry } => calls::ldf(self, ctx, arity, entry),
            Instruction::Call(n) => calls::call(self, ctx, n),
            Instruction::Tcall(n) => calls::tcall(self, ctx, n),
            Instruction::Reset => calls::reset(self, ctx),
            Instruction::LaunchThread(addr) => concurrency::launch_thread(self, ctx, addr),
            Instruction::Send => concurrency::send(self, ctx),
            Instruction::Receive => concurrency::receive(self, ctx),
            Instruction::Sof(addr) => concurrency::sof(self, ctx, addr),
            Instruction::Rof(addr) => concurrency::rof(self, ctx, addr),
            Instruction::Block => concurrency::block(self, ctx),
            Instruction::ClearWait => concurrency::clear_wait(self, ctx),
            Instruction::Done => concurrency::done(self, ctx),
            Instruction::AccessAddress => arrays::access_address(self, ctx),
            Instruction::AssignAddress => arrays::assign_address(self, ctx),
        }
    }
}
