//! Task structure and execution state (spec §4.2 "State per task", §2).
//!
//! Modeled on the teacher's `vm/scheduler/task.rs` (`TaskId`, task-local
//! state, a reason the task can't proceed), adapted from a worker-pool green
//! thread (parked on a `parking_lot::Condvar`, suspended with a
//! `SuspendReason`) down to the single-threaded, explicitly-stepped task
//! this spec calls for: no OS synchronization primitives, just plain fields
//! a single-threaded scheduler reads and writes between instructions.

use crate::heap::{Address, RootSource};

/// Unique identifier for a [`Task`], assigned in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

/// What happened as a result of executing one instruction (spec §4.2's
/// `OpcodeResult`-shaped return, teacher: `OpcodeResult::{Continue,Suspend,Error}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction completed normally; the task may keep running.
    Continue,
    /// The task blocked on a channel operation (spec §4.3 SEND/RECEIVE) or
    /// hit an explicit `BLOCK`; the scheduler should rotate.
    Blocked,
    /// `DONE` executed.
    Done,
    /// `LAUNCH_THREAD` fired: the scheduler should create a new task
    /// starting at `entry` with environment `env` and append it to the ring.
    Spawn { entry: usize, env: Address },
}

/// A lightweight cooperative execution context (spec §2 "Task").
#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub pc: usize,
    pub operand_stack: Vec<Address>,
    /// Addresses of `CALLFRAME`/`BLOCKFRAME` nodes (spec §4.2 scope/call protocol).
    pub runtime_stack: Vec<Address>,
    pub env: Address,
    /// Addresses of `WAIT_SEND`/`WAIT_RECEIVE` tokens this task is blocked on.
    pub waiting_set: Vec<Address>,
    /// Addresses protected mid-instruction, across allocations that might
    /// trigger a GC before the addresses are linked into a permanent root.
    pub working_set: Vec<Address>,
    pub done: bool,
    pub blocked: bool,
}

impl Task {
    pub fn new(id: TaskId, pc: usize, env: Address) -> Self {
        Task {
            id,
            pc,
            operand_stack: Vec::new(),
            runtime_stack: Vec::new(),
            env,
            waiting_set: Vec::new(),
            working_set: Vec::new(),
            done: false,
            blocked: false,
        }
    }

    pub fn is_runnable(&self) -> bool {
        !self.done && !self.blocked
    }

    /// Appends every address this task alone keeps alive to `out`.
    pub fn append_roots(&self, out: &mut Vec<Address>) {
        out.push(self.env);
        out.extend_from_slice(&self.operand_stack);
        out.extend_from_slice(&self.runtime_stack);
        out.extend_from_slice(&self.waiting_set);
        out.extend_from_slice(&self.working_set);
    }
}

/// An owned snapshot of every address live at the start of the instruction
/// currently executing, combined with whatever the scheduler knows about
/// every *other* task and the global environment.
///
/// Capturing the snapshot once at instruction entry (rather than handing
/// the interpreter a live, continuously-updated view into the scheduler)
/// sidesteps a real aliasing problem: advancing a task requires `&mut
/// Task`, while building live roots from the scheduler requires reading
/// every task, including the one being advanced. A start-of-instruction
/// snapshot is always a safe superset of what a GC run partway through the
/// instruction actually needs — values an instruction pops are still
/// logically owned by it until the instruction completes — so the
/// over-approximation costs nothing but a few redundant marks on a rare GC.
pub struct StepRoots {
    addresses: Vec<Address>,
}

impl StepRoots {
    pub fn capture(task: &Task, other_roots: &[Address], global_env: Address) -> Self {
        let mut addresses = Vec::with_capacity(
            task.operand_stack.len()
                + task.runtime_stack.len()
                + task.waiting_set.len()
                + task.working_set.len()
                + other_roots.len()
                + 2,
        );
        addresses.push(global_env);
        task.append_roots(&mut addresses);
        addresses.extend_from_slice(other_roots);
        StepRoots { addresses }
    }
}

impl RootSource for StepRoots {
    fn collect_roots(&self, out: &mut Vec<Address>) {
        out.extend_from_slice(&self.addresses);
    }
}
