//! End-to-end scenarios against hand-assembled instruction streams — there
//! is no compiler in scope, so every program here is built directly out of
//! `Instruction` values, the way the teacher's own `tests/` integration
//! suite builds fixtures straight from the crate's own data types rather
//! than through an external toolchain.

use golite_vm::bytecode::{BinOp, Instruction, LexAddr, Literal, Program};
use golite_vm::error::VmError;
use golite_vm::{Vm, VmConfig};

fn run(instructions: Vec<Instruction>) -> Result<Vm, (Vm, VmError)> {
    let mut vm = Vm::new(Program::new(instructions), VmConfig::default()).unwrap();
    match vm.run() {
        Ok(()) => Ok(vm),
        Err(e) => Err((vm, e)),
    }
}

fn root_top(vm: &Vm) -> golite_vm::Address {
    *vm.scheduler().tasks()[0].operand_stack.last().unwrap()
}

#[test]
fn arithmetic_expression_leaves_its_value_on_the_stack() {
    // (3 + 4) * 2 == 14
    let vm = run(vec![
        Instruction::Ldc(Literal::Number(3.0)),
        Instruction::Ldc(Literal::Number(4.0)),
        Instruction::Binop(BinOp::Add),
        Instruction::Ldc(Literal::Number(2.0)),
        Instruction::Binop(BinOp::Mul),
        Instruction::Done,
    ])
    .unwrap();
    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Number(14.0));
}

#[test]
fn calling_a_two_argument_closure_returns_their_sum() {
    // fn add(a, b) { return a + b } ; add(3, 4)
    let vm = run(vec![
        /*0*/ Instruction::Ldf { arity: 2, entry: 5 },
        /*1*/ Instruction::Ldc(Literal::Number(3.0)),
        /*2*/ Instruction::Ldc(Literal::Number(4.0)),
        /*3*/ Instruction::Call(2),
        /*4*/ Instruction::Done,
        /*5*/ Instruction::Ld { name: "a".into(), addr: LexAddr { frame: 0, slot: 0 } },
        /*6*/ Instruction::Ld { name: "b".into(), addr: LexAddr { frame: 0, slot: 1 } },
        /*7*/ Instruction::Binop(BinOp::Add),
        /*8*/ Instruction::Reset,
    ])
    .unwrap();
    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Number(7.0));
}

#[test]
fn use_before_assign_is_fatal() {
    // ENTER_SCOPE declares one slot, then LD reads it without ever ASSIGNing.
    let (_, err) = run(vec![
        Instruction::EnterScope(1),
        Instruction::Ld { name: "x".into(), addr: LexAddr { frame: 0, slot: 0 } },
        Instruction::Done,
    ])
    .unwrap_err();
    assert!(matches!(err, VmError::UseBeforeAssign { .. }));
}

#[test]
fn assign_leaves_the_value_on_the_stack_for_statement_compilers_to_pop() {
    let vm = run(vec![
        Instruction::EnterScope(1),
        Instruction::Ldc(Literal::Number(5.0)),
        Instruction::Assign { name: "x".into(), addr: LexAddr { frame: 0, slot: 0 } },
        Instruction::Done,
    ])
    .unwrap();
    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Number(5.0));
}

#[test]
fn array_index_out_of_range_is_fatal() {
    let probe = Vm::new(Program::new(vec![Instruction::Done]), VmConfig::default()).unwrap();
    let make_array_slot = probe.builtin_slot("make_array").unwrap();

    // var arr = make_array(3); arr[5]
    let (_, err) = run(vec![
        /*0*/ Instruction::EnterScope(1),
        /*1*/ Instruction::Ld { name: "make_array".into(), addr: LexAddr { frame: 1, slot: make_array_slot } },
        /*2*/ Instruction::Ldc(Literal::Number(3.0)),
        /*3*/ Instruction::Call(1),
        /*4*/ Instruction::Assign { name: "arr".into(), addr: LexAddr { frame: 0, slot: 0 } },
        /*5*/ Instruction::Pop,
        /*6*/ Instruction::Ld { name: "arr".into(), addr: LexAddr { frame: 0, slot: 0 } },
        /*7*/ Instruction::Ldc(Literal::Number(5.0)),
        /*8*/ Instruction::AccessAddress,
        /*9*/ Instruction::Done,
    ])
    .unwrap_err();
    assert!(matches!(err, VmError::IndexOutOfRange { index: 5, length: 3 }));
}

#[test]
fn launch_thread_child_sends_root_receives() {
    // ENTER_SCOPE(1)                 ; slot 0 = the channel
    // LD make_channel ; CALL 0 ; ASSIGN chan ; POP
    // LAUNCH_THREAD <after>          ; child runs LD chan; LD 99; SEND; CLEAR_WAIT; DONE
    // LD chan ; RECEIVE ; CLEAR_WAIT ; DONE
    let program_with_slots = |make_channel_slot: u32| {
        vec![
            /*0*/ Instruction::EnterScope(1),
            /*1*/ Instruction::Ld { name: "make_channel".into(), addr: LexAddr { frame: 1, slot: make_channel_slot } },
            /*2*/ Instruction::Call(0),
            /*3*/ Instruction::Assign { name: "chan".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*4*/ Instruction::Pop,
            /*5*/ Instruction::LaunchThread(11),
            // child body: runs at pc 6, the instruction right after LAUNCH_THREAD.
            // SEND expects the channel on top of the value (spec §4.3): value
            // pushed first, channel pushed last.
            /*6*/ Instruction::Ldc(Literal::Number(99.0)),
            /*7*/ Instruction::Ld { name: "chan".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*8*/ Instruction::Send,
            /*9*/ Instruction::ClearWait,
            /*10*/ Instruction::Done,
            // parent body: LAUNCH_THREAD redirects the parent straight here.
            /*11*/ Instruction::Ld { name: "chan".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*12*/ Instruction::Receive,
            /*13*/ Instruction::ClearWait,
            /*14*/ Instruction::Done,
        ]
    };

    let mut vm = Vm::new(Program::new(vec![Instruction::Done]), VmConfig::default()).unwrap();
    let make_channel_slot = vm.builtin_slot("make_channel").unwrap();
    vm = Vm::new(Program::new(program_with_slots(make_channel_slot)), VmConfig::default()).unwrap();
    vm.run().unwrap();

    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Number(99.0));
}

#[test]
fn select_with_default_falls_through_when_nothing_is_ready() {
    // var chan = make_channel(); select { case <-chan: ... default: display("none") }
    // Nobody ever sends on `chan`, so ROF fails on its very first attempt
    // and falls straight into the default case without blocking.
    let program_with_slots = |make_channel_slot: u32, display_slot: u32| {
        vec![
            /*0*/ Instruction::EnterScope(1),
            /*1*/ Instruction::Ld { name: "make_channel".into(), addr: LexAddr { frame: 1, slot: make_channel_slot } },
            /*2*/ Instruction::Call(0),
            /*3*/ Instruction::Assign { name: "chan".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*4*/ Instruction::Pop,
            /*5*/ Instruction::Ld { name: "chan".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*6*/ Instruction::Rof(7), // channel is always empty, so this always jumps to 7
            /*7*/ Instruction::ClearWait,
            /*8*/ Instruction::Ld { name: "display".into(), addr: LexAddr { frame: 1, slot: display_slot } },
            /*9*/ Instruction::Ldc(Literal::Str("none".into())),
            /*10*/ Instruction::Call(1),
            /*11*/ Instruction::Done,
        ]
    };

    let probe = Vm::new(Program::new(vec![Instruction::Done]), VmConfig::default()).unwrap();
    let make_channel_slot = probe.builtin_slot("make_channel").unwrap();
    let display_slot = probe.builtin_slot("display").unwrap();

    let vm = run(program_with_slots(make_channel_slot, display_slot)).unwrap();
    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Str("none".to_string()));
}

#[test]
fn gc_under_pressure_survives_a_tight_allocation_loop_on_a_tiny_heap() {
    // while (i < ITERATIONS) { 42; i = i + 1 } against a heap barely bigger
    // than the singletons, forcing a collect() on nearly every iteration
    // since the discarded Number from the previous pass is already garbage.
    const ITERATIONS: f64 = 3000.0;
    let addr = LexAddr { frame: 0, slot: 0 };
    let program = Program::new(vec![
        /*0*/ Instruction::EnterScope(1),
        /*1*/ Instruction::Ldc(Literal::Number(0.0)),
        /*2*/ Instruction::Assign { name: "i".into(), addr },
        /*3*/ Instruction::Pop,
        /*4*/ Instruction::Ld { name: "i".into(), addr },
        /*5*/ Instruction::Ldc(Literal::Number(ITERATIONS)),
        /*6*/ Instruction::Binop(BinOp::Lt),
        /*7*/ Instruction::Jof(16),
        /*8*/ Instruction::Ldc(Literal::Number(42.0)),
        /*9*/ Instruction::Pop,
        /*10*/ Instruction::Ld { name: "i".into(), addr },
        /*11*/ Instruction::Ldc(Literal::Number(1.0)),
        /*12*/ Instruction::Binop(BinOp::Add),
        /*13*/ Instruction::Assign { name: "i".into(), addr },
        /*14*/ Instruction::Pop,
        /*15*/ Instruction::Goto(4),
        /*16*/ Instruction::Ld { name: "i".into(), addr },
        /*17*/ Instruction::Done,
    ]);
    let mut vm = Vm::new(
        program,
        VmConfig {
            quantum: 16,
            initial_heap_words: 60, // 5 singleton nodes + 1 free node: maximal pressure
            debug: false,
        },
    )
    .unwrap();
    vm.run().unwrap();
    let value = vm.heap().address_to_value(root_top(&vm)).unwrap();
    assert_eq!(value, golite_vm::heap::Value::Number(ITERATIONS));
}

#[test]
fn fibonacci_producer_and_consumer_rendezvous_over_a_select() {
    // Root spawns a producer (the new task) and continues on as the
    // consumer. The producer iterates fib via (a, b) = (b, a + b), trying
    // to SEND the current `a` on `c` inside a select alongside `quit`;
    // the consumer RECEIVEs ten values into an array, then sends on
    // `quit`, which the producer's next select attempt picks up.
    let program_with_slots = |make_channel_slot: u32, make_array_slot: u32| {
        vec![
            /*0*/ Instruction::EnterScope(2), // slot0 = c, slot1 = quit
            /*1*/ Instruction::Ld { name: "make_channel".into(), addr: LexAddr { frame: 1, slot: make_channel_slot } },
            /*2*/ Instruction::Call(0),
            /*3*/ Instruction::Assign { name: "c".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*4*/ Instruction::Pop,
            /*5*/ Instruction::Ld { name: "make_channel".into(), addr: LexAddr { frame: 1, slot: make_channel_slot } },
            /*6*/ Instruction::Call(0),
            /*7*/ Instruction::Assign { name: "quit".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*8*/ Instruction::Pop,
            /*9*/ Instruction::LaunchThread(38), // root continues as the consumer at 38; producer starts at 10

            // --- producer (the spawned task), starting at pc 10 ---
            /*10*/ Instruction::EnterScope(2), // slot0 = a, slot1 = b
            /*11*/ Instruction::Ldc(Literal::Number(0.0)),
            /*12*/ Instruction::Assign { name: "a".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*13*/ Instruction::Pop,
            /*14*/ Instruction::Ldc(Literal::Number(1.0)),
            /*15*/ Instruction::Assign { name: "b".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*16*/ Instruction::Pop,
            // select loop: 17
            /*17*/ Instruction::Ld { name: "a".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*18*/ Instruction::Ld { name: "c".into(), addr: LexAddr { frame: 1, slot: 0 } },
            /*19*/ Instruction::Sof(30), // case `c <- a`; on failure, try quit at 30
            /*20*/ Instruction::ClearWait,
            /*21*/ Instruction::Ld { name: "b".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*22*/ Instruction::Ld { name: "a".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*23*/ Instruction::Ld { name: "b".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*24*/ Instruction::Binop(BinOp::Add),
            /*25*/ Instruction::Assign { name: "b".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*26*/ Instruction::Pop,
            /*27*/ Instruction::Assign { name: "a".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*28*/ Instruction::Pop,
            /*29*/ Instruction::Goto(17),
            // case `<-quit`: 30
            /*30*/ Instruction::Ld { name: "quit".into(), addr: LexAddr { frame: 1, slot: 1 } },
            /*31*/ Instruction::Rof(35), // quit not ready yet; fall through to block-and-retry
            /*32*/ Instruction::ClearWait,
            /*33*/ Instruction::Pop,
            /*34*/ Instruction::Done,
            // neither case is ready this round: block, clear stale tokens, retry the select
            /*35*/ Instruction::Block,
            /*36*/ Instruction::ClearWait,
            /*37*/ Instruction::Goto(17),

            // --- consumer (root continues here after LAUNCH_THREAD) ---
            /*38*/ Instruction::EnterScope(2), // slot0 = count, slot1 = results
            /*39*/ Instruction::Ld { name: "make_array".into(), addr: LexAddr { frame: 2, slot: make_array_slot } },
            /*40*/ Instruction::Ldc(Literal::Number(10.0)),
            /*41*/ Instruction::Call(1),
            /*42*/ Instruction::Assign { name: "results".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*43*/ Instruction::Pop,
            /*44*/ Instruction::Ldc(Literal::Number(0.0)),
            /*45*/ Instruction::Assign { name: "count".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*46*/ Instruction::Pop,
            // loop: 47
            /*47*/ Instruction::Ld { name: "count".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*48*/ Instruction::Ldc(Literal::Number(10.0)),
            /*49*/ Instruction::Binop(BinOp::Lt),
            /*50*/ Instruction::Jof(64),
            /*51*/ Instruction::Ld { name: "results".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*52*/ Instruction::Ld { name: "count".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*53*/ Instruction::Ld { name: "c".into(), addr: LexAddr { frame: 1, slot: 0 } },
            /*54*/ Instruction::Receive,
            /*55*/ Instruction::ClearWait,
            /*56*/ Instruction::AssignAddress,
            /*57*/ Instruction::Pop,
            /*58*/ Instruction::Ld { name: "count".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*59*/ Instruction::Ldc(Literal::Number(1.0)),
            /*60*/ Instruction::Binop(BinOp::Add),
            /*61*/ Instruction::Assign { name: "count".into(), addr: LexAddr { frame: 0, slot: 0 } },
            /*62*/ Instruction::Pop,
            /*63*/ Instruction::Goto(47),
            // after loop: 64 — signal the producer to stop and report
            /*64*/ Instruction::Ldc(Literal::Bool(true)),
            /*65*/ Instruction::Ld { name: "quit".into(), addr: LexAddr { frame: 1, slot: 1 } },
            /*66*/ Instruction::Send,
            /*67*/ Instruction::ClearWait,
            /*68*/ Instruction::Ld { name: "results".into(), addr: LexAddr { frame: 0, slot: 1 } },
            /*69*/ Instruction::Done,
        ]
    };

    let probe = Vm::new(Program::new(vec![Instruction::Done]), VmConfig::default()).unwrap();
    let make_channel_slot = probe.builtin_slot("make_channel").unwrap();
    let make_array_slot = probe.builtin_slot("make_array").unwrap();

    let vm = run(program_with_slots(make_channel_slot, make_array_slot)).unwrap();
    let results = root_top(&vm);
    let expected = [0.0, 1.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0];
    for (i, want) in expected.iter().enumerate() {
        let item = vm.heap().array_get(results, i as i64).unwrap();
        let value = vm.heap().address_to_value(item).unwrap();
        assert_eq!(value, golite_vm::heap::Value::Number(*want));
    }
}
