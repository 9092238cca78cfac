//! `golite-vm`: the managed heap, bytecode interpreter, and cooperative
//! scheduler that execute a compiled golite program.
//!
//! Modeled on the teacher's top-level `vm` crate, which wires its own
//! `Heap`, `Interpreter`, and `Scheduler` together behind one `Vm` facade;
//! this crate keeps that shape while dropping everything downstream of
//! "run this bytecode" — no compiler, no REPL, no network surface.

pub mod builtins;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod scheduler;

pub use builtins::BuiltinRegistry;
pub use bytecode::{Instruction, Program};
pub use config::VmConfig;
pub use error::{VmError, VmResult};
pub use heap::{Address, Heap};
pub use scheduler::Scheduler;

use heap::NoRoots;

/// The top-level facade: a heap, a builtin table, a global environment
/// built from both, and a scheduler that runs a [`Program`] against them
/// (spec §1 "Overview").
#[derive(Debug)]
pub struct Vm {
    heap: Heap,
    builtins: BuiltinRegistry,
    scheduler: Scheduler,
    program: Program,
    global_env: Address,
}

impl Vm {
    /// Builds a fresh machine ready to run `program` from instruction 0.
    ///
    /// The global environment's single frame binds every builtin (in the
    /// registry's declared order) followed by every math constant (spec §6),
    /// so compiled code addresses them by a `LexAddr` whose slot is
    /// `builtin_slot`/`math_constant_slot` below and whose frame is however
    /// many scopes deeper the reference sits.
    pub fn new(program: Program, config: VmConfig) -> VmResult<Self> {
        let mut heap = Heap::new(config.initial_heap_words, config.debug);
        let builtins = BuiltinRegistry::new();

        let builtin_names: Vec<&'static str> = builtins.names().collect();
        let constants = &*builtins::MATH_CONSTANTS;
        let global_len = (builtin_names.len() + constants.len()) as u32;

        let frame = heap.allocate_frame(global_len, &NoRoots)?;
        for (slot, name) in builtin_names.iter().enumerate() {
            let id = builtins.id_of(name).expect("name came from the registry itself");
            let addr = heap.allocate_builtin(id, &NoRoots)?;
            heap.frame_set(frame, slot as u32, addr)?;
        }
        let base_slot = builtin_names.len();
        for (i, (_name, value)) in constants.iter().enumerate() {
            let addr = heap.allocate_number(*value, &NoRoots)?;
            heap.frame_set(frame, (base_slot + i) as u32, addr)?;
        }

        let base_env = heap.allocate_environment(0, &NoRoots)?;
        let global_env = heap.extend_environment(base_env, frame, &NoRoots)?;

        let scheduler = Scheduler::new(0, global_env, config.quantum);

        Ok(Vm {
            heap,
            builtins,
            scheduler,
            program,
            global_env,
        })
    }

    /// The slot within the global frame bound to builtin `name`.
    pub fn builtin_slot(&self, name: &str) -> Option<u32> {
        self.builtins
            .names()
            .position(|n| n == name)
            .map(|i| i as u32)
    }

    /// The slot within the global frame bound to math constant `name`
    /// (e.g. `"MATH_PI"`).
    pub fn math_constant_slot(&self, name: &str) -> Option<u32> {
        let base = self.builtins.names().count();
        builtins::MATH_CONSTANTS
            .iter()
            .position(|(n, _)| *n == name)
            .map(|i| (base + i) as u32)
    }

    pub fn global_env(&self) -> Address {
        self.global_env
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runs the program to completion (spec §5 "Program termination").
    pub fn run(&mut self) -> VmResult<()> {
        self.scheduler
            .run(&mut self.heap, &self.program, &self.builtins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::Instruction;

    #[test]
    fn empty_program_with_wired_globals_runs_to_completion() {
        let program = Program::new(vec![Instruction::Done]);
        let mut vm = Vm::new(program, VmConfig::default()).unwrap();
        assert!(vm.builtin_slot("display").is_some());
        assert!(vm.math_constant_slot("MATH_PI").is_some());
        vm.run().unwrap();
    }
}
