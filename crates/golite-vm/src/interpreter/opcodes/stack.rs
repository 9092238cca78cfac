//! `LDC`, `UNOP`, `BINOP`, `POP` (spec §4.2 "Expression opcodes").

use crate::bytecode::{BinOp, Literal, UnOp};
use crate::error::{VmError, VmResult};
use crate::heap::Value;
use crate::interpreter::task::{StepOutcome, StepRoots, Task};
use crate::interpreter::ExecCtx;

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Null => Value::Null,
        Literal::Undefined => Value::Undefined,
    }
}

pub fn ldc(task: &mut Task, ctx: &mut ExecCtx, lit: &Literal) -> VmResult<StepOutcome> {
    let value = literal_to_value(lit);
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let addr = ctx.heap.value_to_address(&value, &roots)?;
    task.operand_stack.push(addr);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn pop(task: &mut Task, _ctx: &mut ExecCtx) -> VmResult<StepOutcome> {
    task.operand_stack.pop();
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

pub fn unop(task: &mut Task, ctx: &mut ExecCtx, op: UnOp) -> VmResult<StepOutcome> {
    let addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("UNOP on an empty operand stack".into()))?;
    let value = ctx.heap.address_to_value(addr)?;
    let result = match (op, &value) {
        (UnOp::Neg, Value::Number(n)) => Value::Number(-n),
        (UnOp::Not, Value::Bool(b)) => Value::Bool(!b),
        _ => {
            return Err(VmError::OperandTypeError(format!(
                "{op:?} is not defined for a {}",
                value.type_name()
            )))
        }
    };
    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let result_addr = ctx.heap.value_to_address(&result, &roots)?;
    task.operand_stack.push(result_addr);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Undefined, Value::Undefined) => true,
        _ => false,
    }
}

pub fn binop(task: &mut Task, ctx: &mut ExecCtx, op: BinOp) -> VmResult<StepOutcome> {
    let rhs_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("BINOP on an empty operand stack".into()))?;
    let lhs_addr = task
        .operand_stack
        .pop()
        .ok_or_else(|| VmError::OperandTypeError("BINOP on an empty operand stack".into()))?;
    let lhs = ctx.heap.address_to_value(lhs_addr)?;
    let rhs = ctx.heap.address_to_value(rhs_addr)?;

    let result = match op {
        BinOp::Eq => Value::Bool(values_equal(&lhs, &rhs)),
        BinOp::Ne => Value::Bool(!values_equal(&lhs, &rhs)),
        BinOp::And => match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a && *b),
            _ => return Err(type_error(op, &lhs, &rhs)),
        },
        BinOp::Or => match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(*a || *b),
            _ => return Err(type_error(op, &lhs, &rhs)),
        },
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}")),
            _ => return Err(type_error(op, &lhs, &rhs)),
        },
        arith => {
            let (Value::Number(a), Value::Number(b)) = (&lhs, &rhs) else {
                return Err(type_error(op, &lhs, &rhs));
            };
            match arith {
                BinOp::Sub => Value::Number(a - b),
                BinOp::Mul => Value::Number(a * b),
                BinOp::Div => Value::Number(a / b),
                BinOp::Mod => Value::Number(a % b),
                BinOp::Lt => Value::Bool(a < b),
                BinOp::Le => Value::Bool(a <= b),
                BinOp::Gt => Value::Bool(a > b),
                BinOp::Ge => Value::Bool(a >= b),
                _ => unreachable!("handled above"),
            }
        }
    };

    let roots = StepRoots::capture(task, ctx.other_roots, ctx.global_env);
    let result_addr = ctx.heap.value_to_address(&result, &roots)?;
    task.operand_stack.push(result_addr);
    task.pc += 1;
    Ok(StepOutcome::Continue)
}

fn type_error(op: BinOp, lhs: &Value, rhs: &Value) -> VmError {
    VmError::OperandTypeError(format!(
        "{op:?} is not defined between a {} and a {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}
