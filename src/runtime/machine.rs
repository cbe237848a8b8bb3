use crate::lang::value::Value;
use crate::runtime::trap::{Stack, TrapReason, stack_underflow};

// =============================================================================
// Input tape
// =============================================================================

/// Immutable input with a read cursor that only moves forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    symbols: Vec<Value>,
    cursor: usize,
    /// Set once the end-of-input sentinel has been handed out.
    eof_delivered: bool,
}

impl Tape {
    pub fn new(symbols: Vec<Value>) -> Self {
        Tape {
            symbols,
            cursor: 0,
            eof_delivered: false,
        }
    }

    /// Next symbol, then `Eof` exactly once, then `EndOfInput`.
    pub fn read(&mut self) -> Result<Value, TrapReason> {
        if let Some(value) = self.symbols.get(self.cursor) {
            self.cursor += 1;
            Ok(*value)
        } else if !self.eof_delivered {
            self.eof_delivered = true;
            Ok(Value::Eof)
        } else {
            Err(TrapReason::EndOfInput)
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.cursor >= self.symbols.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn remaining(&self) -> &[Value] {
        &self.symbols[self.cursor.min(self.symbols.len())..]
    }
}

impl From<&str> for Tape {
    fn from(input: &str) -> Self {
        Tape::new(input.chars().map(Value::Char).collect())
    }
}

impl From<Vec<Value>> for Tape {
    fn from(symbols: Vec<Value>) -> Self {
        Tape::new(symbols)
    }
}

impl From<&[Value]> for Tape {
    fn from(symbols: &[Value]) -> Self {
        Tape::new(symbols.to_vec())
    }
}

// =============================================================================
// Halt status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Accept,
    Reject,
    Trapped,
    StepLimitExceeded,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Running)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Running => "running",
            Status::Accept => "accept",
            Status::Reject => "reject",
            Status::Trapped => "trapped",
            Status::StepLimitExceeded => "step limit exceeded",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Machine state
// =============================================================================

/// Everything a single run mutates. Owned by exactly one `Vm`.
///
/// Mutating helpers check their preconditions before touching anything, so
/// a failed operation leaves the machine exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    main: Vec<Value>,
    aux: Vec<Value>,
    tape: Tape,
    output: Vec<Value>,
    pub(super) pc: usize,
    pub(super) status: Status,
}

impl Machine {
    pub fn new(tape: Tape) -> Self {
        Machine {
            main: Vec::new(),
            aux: Vec::new(),
            tape,
            output: Vec::new(),
            pc: 0,
            status: Status::Running,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn output(&self) -> &[Value] {
        &self.output
    }

    pub fn main_depth(&self) -> usize {
        self.main.len()
    }

    pub fn aux_depth(&self) -> usize {
        self.aux.len()
    }

    /// Main stack, bottom first.
    pub fn main_stack(&self) -> &[Value] {
        &self.main
    }

    /// Auxiliary stack, bottom first.
    pub fn aux_stack(&self) -> &[Value] {
        &self.aux
    }

    /// Main stack, top first.
    pub fn main_iter(&self) -> impl Iterator<Item = &Value> {
        self.main.iter().rev()
    }

    /// Auxiliary stack, top first.
    pub fn aux_iter(&self) -> impl Iterator<Item = &Value> {
        self.aux.iter().rev()
    }

    pub fn top(&self) -> Option<&Value> {
        self.main.last()
    }

    /// The `n`-th value from the top of the main stack (0 = top).
    pub(super) fn peek(&self, n: usize) -> Result<&Value, TrapReason> {
        self.main
            .len()
            .checked_sub(n + 1)
            .map(|i| &self.main[i])
            .ok_or_else(|| stack_underflow(Stack::Main))
    }

    pub(super) fn require(&self, n: usize) -> Result<(), TrapReason> {
        if self.main.len() < n {
            return Err(stack_underflow(Stack::Main));
        }
        Ok(())
    }

    pub(super) fn check_room(&self, stack: Stack, limit: Option<usize>) -> Result<(), TrapReason> {
        let depth = match stack {
            Stack::Main => self.main.len(),
            Stack::Aux => self.aux.len(),
        };
        match limit {
            Some(limit) if depth >= limit => Err(TrapReason::StackOverflow { stack, limit }),
            _ => Ok(()),
        }
    }

    pub(super) fn push(&mut self, value: Value, limit: Option<usize>) -> Result<(), TrapReason> {
        self.check_room(Stack::Main, limit)?;
        self.main.push(value);
        Ok(())
    }

    pub(super) fn pop(&mut self) -> Result<Value, TrapReason> {
        self.main.pop().ok_or_else(|| stack_underflow(Stack::Main))
    }

    /// Replace the top of the main stack. Caller has checked it exists.
    pub(super) fn replace_top(&mut self, value: Value) -> Result<(), TrapReason> {
        let top = self
            .main
            .last_mut()
            .ok_or_else(|| stack_underflow(Stack::Main))?;
        *top = value;
        Ok(())
    }

    pub(super) fn swap_top(&mut self) -> Result<(), TrapReason> {
        self.require(2)?;
        let n = self.main.len();
        self.main.swap(n - 1, n - 2);
        Ok(())
    }

    /// Pop main, push aux.
    pub(super) fn to_aux(&mut self, limit: Option<usize>) -> Result<(), TrapReason> {
        self.require(1)?;
        self.check_room(Stack::Aux, limit)?;
        let value = self.pop()?;
        self.aux.push(value);
        Ok(())
    }

    /// Pop aux, push main.
    pub(super) fn to_main(&mut self, limit: Option<usize>) -> Result<(), TrapReason> {
        let value = *self.aux.last().ok_or_else(|| stack_underflow(Stack::Aux))?;
        self.check_room(Stack::Main, limit)?;
        self.aux.pop();
        self.main.push(value);
        Ok(())
    }

    /// Read the tape onto the main stack.
    pub(super) fn read(&mut self, limit: Option<usize>) -> Result<(), TrapReason> {
        self.check_room(Stack::Main, limit)?;
        let value = self.tape.read()?;
        self.main.push(value);
        Ok(())
    }

    pub(super) fn emit(&mut self) -> Result<(), TrapReason> {
        let value = self.pop()?;
        self.output.push(value);
        Ok(())
    }
}
