use crate::lang::value::Value;
use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Decoded instructions
// =============================================================================

/// A decoded instruction. Control-flow variants carry the absolute index of
/// their matching block boundary, resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // stack transfer
    /// `a`: main top moves to the auxiliary stack.
    ToAux,
    /// `m`: auxiliary top moves back to the main stack.
    ToMain,

    // input
    /// `,`: next tape symbol onto the main stack.
    Read,

    // literals
    Push(Value),

    // tests & stack shuffling
    Eq,
    Not,
    IsEmpty,
    Dup,
    Drop,
    Swap,

    // ==========================================================================
    // Control flow
    // ==========================================================================
    /// Pop bool, if false continue after the `EndIf` at `end`.
    If { end: usize },
    EndIf,

    /// Pop bool, if false continue after the `EndLoop` at `end`.
    Loop { end: usize },
    /// Jump back to the `Loop` at `start`, which tests again.
    EndLoop { start: usize },

    /// Pop bool, if true skip the following op.
    SkipIf,

    // output & halting
    Output,
    Halt,
    Dump,

    // ==========================================================================
    // Extended arithmetic / logic
    // ==========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    And,
    Or,
    Xor,
}

impl Op {
    /// True for the optional arithmetic/logic subset.
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Rem
                | Op::Lt
                | Op::Gt
                | Op::And
                | Op::Or
                | Op::Xor
        )
    }

    /// Matching block boundary for block ops. `SkipIf` has none; it always
    /// lands two ops ahead.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::If { end } | Op::Loop { end } => Some(*end),
            Op::EndLoop { start } => Some(*start),
            _ => None,
        }
    }

    pub fn is_block_delimiter(&self) -> bool {
        matches!(
            self,
            Op::If { .. } | Op::EndIf | Op::Loop { .. } | Op::EndLoop { .. }
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::ToAux => "TO_AUX",
            Op::ToMain => "TO_MAIN",
            Op::Read => "READ",
            Op::Push(_) => "PUSH",
            Op::Eq => "EQ",
            Op::Not => "NOT",
            Op::IsEmpty => "IS_EMPTY",
            Op::Dup => "DUP",
            Op::Drop => "DROP",
            Op::Swap => "SWAP",
            Op::If { .. } => "IF",
            Op::EndIf => "END_IF",
            Op::Loop { .. } => "LOOP",
            Op::EndLoop { .. } => "END_LOOP",
            Op::SkipIf => "SKIP_IF",
            Op::Output => "OUTPUT",
            Op::Halt => "HALT",
            Op::Dump => "DUMP",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Rem => "REM",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Xor => "XOR",
        }
    }
}
