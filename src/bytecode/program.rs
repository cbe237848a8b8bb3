use crate::bytecode::instruction_set::{InstructionSet, Lookup, Opcode};
use crate::bytecode::load_error::{DecodeError, LoadError};
use crate::bytecode::op::Op;
use crate::lang::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A loaded program: a flat op sequence with every block boundary resolved.
///
/// Immutable once built; one `Program` can be run against any number of
/// tapes, concurrently if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    ops: Vec<Op>,

    /// Character offset in the program text of each op, for diagnostics.
    positions: Vec<usize>,
}

/// An opener waiting for its closer during block resolution.
struct OpenBlock {
    ch: char,
    kind: Opcode,
    pos: usize,
    pc: usize,
}

impl Program {
    /// Decode stripped program text and resolve its blocks.
    pub fn load(text: &str, set: &InstructionSet) -> Result<Program, LoadError> {
        let chars: Vec<char> = text.chars().collect();
        let mut ops: Vec<Op> = Vec::with_capacity(chars.len());
        let mut positions: Vec<usize> = Vec::with_capacity(chars.len());
        let mut open: Vec<OpenBlock> = Vec::new();
        let mut last_was_int = false;
        let mut pos = 0;

        while pos < chars.len() {
            let ch = chars[pos];
            let start = pos;

            // A lone space may only separate two integer literals.
            if ch == ' '
                && last_was_int
                && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit())
            {
                last_was_int = false;
                pos += 1;
                continue;
            }

            let opcode = match set.lookup(ch) {
                Lookup::Found(opcode) => opcode,
                Lookup::Disabled(_) => {
                    return Err(LoadError::ExtendedInstructionDisabled { ch, pos });
                }
                Lookup::Unknown => return Err(LoadError::UnknownInstruction { ch, pos }),
            };
            last_was_int = false;
            pos += 1;

            let op = match opcode {
                Opcode::ToAux => Op::ToAux,
                Opcode::ToMain => Op::ToMain,
                Opcode::Read => Op::Read,
                Opcode::True => Op::Push(Value::Bool(true)),
                Opcode::False => Op::Push(Value::Bool(false)),
                Opcode::Eof => Op::Push(Value::Eof),
                Opcode::Eq => Op::Eq,
                Opcode::Not => Op::Not,
                Opcode::IsEmpty => Op::IsEmpty,
                Opcode::Dup => Op::Dup,
                Opcode::Drop => Op::Drop,
                Opcode::Swap => Op::Swap,
                Opcode::Output => Op::Output,
                Opcode::Halt => Op::Halt,
                Opcode::Dump => Op::Dump,
                Opcode::SkipIf => Op::SkipIf,
                Opcode::Add => Op::Add,
                Opcode::Sub => Op::Sub,
                Opcode::Mul => Op::Mul,
                Opcode::Div => Op::Div,
                Opcode::Rem => Op::Rem,
                Opcode::Lt => Op::Lt,
                Opcode::Gt => Op::Gt,
                Opcode::And => Op::And,
                Opcode::Or => Op::Or,
                Opcode::Xor => Op::Xor,

                Opcode::CharLiteral => {
                    let (c, next) = decode_char_literal(&chars, start, pos)?;
                    pos = next;
                    Op::Push(Value::Char(c))
                }
                Opcode::Digit => {
                    let mut n = ch.to_digit(10).map(i64::from).ok_or_else(|| {
                        LoadError::malformed(start, format!("{:?} is not a digit", ch))
                    })?;
                    while let Some(d) = chars.get(pos).and_then(|c| c.to_digit(10)) {
                        n = n
                            .checked_mul(10)
                            .and_then(|n| n.checked_add(d as i64))
                            .ok_or_else(|| {
                                LoadError::malformed(start, "integer literal overflows i64")
                            })?;
                        pos += 1;
                    }
                    last_was_int = true;
                    Op::Push(Value::Int(n))
                }

                Opcode::IfOpen | Opcode::LoopOpen => {
                    open.push(OpenBlock {
                        ch,
                        kind: opcode,
                        pos: start,
                        pc: ops.len(),
                    });
                    // Target is patched when the closer is seen.
                    if opcode == Opcode::IfOpen {
                        Op::If { end: 0 }
                    } else {
                        Op::Loop { end: 0 }
                    }
                }
                Opcode::IfClose | Opcode::LoopClose => {
                    let block = open
                        .pop()
                        .ok_or_else(|| LoadError::unmatched_close(ch, start))?;
                    let here = ops.len();

                    match (block.kind, opcode) {
                        (Opcode::IfOpen, Opcode::IfClose) => {
                            ops[block.pc] = Op::If { end: here };
                            Op::EndIf
                        }
                        (Opcode::LoopOpen, Opcode::LoopClose) => {
                            ops[block.pc] = Op::Loop { end: here };
                            Op::EndLoop { start: block.pc }
                        }
                        _ => {
                            return Err(LoadError::mismatched_close(
                                block.ch, block.pos, ch, start,
                            ));
                        }
                    }
                }
            };

            // A skip lands two ops ahead, so it must not hop over a block edge.
            if op.is_block_delimiter() && ops.last() == Some(&Op::SkipIf) {
                return Err(LoadError::malformed(
                    start,
                    format!("skip cannot jump over '{}'", ch),
                ));
            }

            ops.push(op);
            positions.push(start);
        }

        if let Some(block) = open.pop() {
            return Err(LoadError::unclosed(block.ch, block.pos));
        }

        let program = Program { ops, positions };
        debug!(
            ops = program.len(),
            blocks = program
                .ops
                .iter()
                .filter(|op| matches!(op, Op::If { .. } | Op::Loop { .. }))
                .count(),
            extended = set.extended_enabled(),
            "program loaded"
        );
        Ok(program)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn get(&self, pc: usize) -> Option<&Op> {
        self.ops.get(pc)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Character offset in the program text of the op at `pc`.
    pub fn source_pos(&self, pc: usize) -> Option<usize> {
        self.positions.get(pc).copied()
    }

    /// Matching block boundary of the control-flow op at `pc`.
    pub fn jump_target(&self, pc: usize) -> Option<usize> {
        self.ops.get(pc).and_then(Op::jump_target)
    }

    /// `(pc, target)` for every op that jumps, in program order.
    pub fn jump_table(&self) -> Vec<(usize, usize)> {
        self.ops
            .iter()
            .enumerate()
            .filter_map(|(pc, op)| op.jump_target().map(|t| (pc, t)))
            .collect()
    }

    pub fn uses_extended(&self) -> bool {
        self.ops.iter().any(Op::is_extended)
    }

    // Compiled form

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decode a compiled program, re-checking every block pairing.
    pub fn from_bytes(bytes: &[u8], set: &InstructionSet) -> Result<Program, DecodeError> {
        let program: Program = postcard::from_bytes(bytes)?;
        program.validate(set)?;
        debug!(ops = program.len(), "compiled program decoded");
        Ok(program)
    }

    fn validate(&self, set: &InstructionSet) -> Result<(), DecodeError> {
        if self.positions.len() != self.ops.len() {
            return Err(DecodeError::PositionsMismatch {
                ops: self.ops.len(),
                positions: self.positions.len(),
            });
        }

        let mut open: Vec<usize> = Vec::new();
        for (pc, op) in self.ops.iter().enumerate() {
            let bad = || DecodeError::BadJumpTarget {
                op: op.mnemonic(),
                pc,
            };

            if op.is_extended() && !set.extended_enabled() {
                return Err(DecodeError::ExtendedInstructionDisabled {
                    op: op.mnemonic(),
                    pc,
                });
            }

            if op.is_block_delimiter() && pc > 0 && self.ops[pc - 1] == Op::SkipIf {
                return Err(DecodeError::BadJumpTarget {
                    op: Op::SkipIf.mnemonic(),
                    pc: pc - 1,
                });
            }

            match *op {
                Op::If { .. } | Op::Loop { .. } => open.push(pc),
                Op::EndIf => {
                    let start = open.pop().ok_or_else(bad)?;
                    if self.ops[start] != (Op::If { end: pc }) {
                        return Err(bad());
                    }
                }
                Op::EndLoop { start } => {
                    let opener = open.pop().ok_or_else(bad)?;
                    if opener != start || self.ops[start] != (Op::Loop { end: pc }) {
                        return Err(bad());
                    }
                }
                _ => {}
            }
        }

        if let Some(pc) = open.pop() {
            return Err(DecodeError::BadJumpTarget {
                op: self.ops[pc].mnemonic(),
                pc,
            });
        }

        Ok(())
    }
}

/// Decode the character after a `'` prefix at `start`. Returns the char and
/// the position after it.
fn decode_char_literal(
    chars: &[char],
    start: usize,
    pos: usize,
) -> Result<(char, usize), LoadError> {
    match chars.get(pos) {
        None => Err(LoadError::malformed(start, "character literal at end of program")),
        Some('\\') => {
            let c = match chars.get(pos + 1) {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('\\') => '\\',
                Some(other) => {
                    return Err(LoadError::malformed(
                        pos,
                        format!("invalid escape sequence \\{}", other),
                    ));
                }
                None => {
                    return Err(LoadError::malformed(
                        pos,
                        "escape sequence at end of program",
                    ));
                }
            };
            Ok((c, pos + 2))
        }
        Some(c) => Ok((*c, pos + 1)),
    }
}
