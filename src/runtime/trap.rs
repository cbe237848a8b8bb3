use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the two stacks an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stack {
    Main,
    Aux,
}

impl std::fmt::Display for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stack::Main => write!(f, "main"),
            Stack::Aux => write!(f, "aux"),
        }
    }
}

/// Why a run stopped with status `Trapped`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrapReason {
    #[error("stack underflow on {0} stack")]
    StackUnderflow(Stack),

    #[error("stack overflow on {stack} stack (limit {limit})")]
    StackOverflow { stack: Stack, limit: usize },

    #[error("end of input: read after the end-of-input sentinel was delivered")]
    EndOfInput,

    #[error("type error: {op} expected {expected}, got {got}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("division by zero in {op}")]
    DivisionByZero { op: &'static str },

    #[error("arithmetic overflow in {op}")]
    ArithmeticOverflow { op: &'static str },
}

/// A trap reason paired with the pc of the offending instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} (at pc {pc})")]
pub struct Trap {
    pub reason: TrapReason,
    pub pc: usize,
}

pub fn stack_underflow(stack: Stack) -> TrapReason {
    TrapReason::StackUnderflow(stack)
}

pub fn type_mismatch(op: &'static str, expected: &'static str, got: &'static str) -> TrapReason {
    TrapReason::TypeMismatch { op, expected, got }
}
