//! Instruction records (spec §4.2).

use serde::{Deserialize, Serialize};

/// A compile-time-resolved lexical address: `f` frames back from the
/// current environment, `s` the slot within that frame (spec §4.2
/// "Operand encoding").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexAddr {
    pub frame: u32,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    Bool(bool),
    Str(String),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Ldc(Literal),
    Unop(UnOp),
    Binop(BinOp),
    Pop,
    Jof(usize),
    Goto(usize),
    EnterScope(u32),
    ExitScope,
    Ld { name: String, addr: LexAddr },
    Assign { name: String, addr: LexAddr },
    Ldf { arity: u16, entry: usize },
    Call(u16),
    Tcall(u16),
    Reset,
    LaunchThread(usize),
    Send,
    Receive,
    Sof(usize),
    Rof(usize),
    Block,
    ClearWait,
    Done,
    AccessAddress,
    AssignAddress,
}
