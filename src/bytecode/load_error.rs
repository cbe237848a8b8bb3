use thiserror::Error;

/// Errors reported while turning program text into a [`Program`].
///
/// Every variant carries `pos`, the character offset in the stripped
/// program text. All of them are fatal and reported before execution.
///
/// [`Program`]: crate::bytecode::Program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("malformed program at {pos}: {reason}")]
    MalformedProgram { pos: usize, reason: String },

    #[error("unknown instruction {ch:?} at {pos}")]
    UnknownInstruction { ch: char, pos: usize },

    #[error("extended instruction {ch:?} at {pos} is disabled")]
    ExtendedInstructionDisabled { ch: char, pos: usize },

    #[error("unbalanced control flow at {pos}: {reason}")]
    UnbalancedControlFlow { pos: usize, reason: String },
}

impl LoadError {
    pub fn malformed(pos: usize, reason: impl Into<String>) -> Self {
        LoadError::MalformedProgram {
            pos,
            reason: reason.into(),
        }
    }

    /// A closer with nothing open.
    pub fn unmatched_close(ch: char, pos: usize) -> Self {
        LoadError::UnbalancedControlFlow {
            pos,
            reason: format!("'{}' has no matching opener", ch),
        }
    }

    /// A closer of the wrong kind for the innermost open block.
    pub fn mismatched_close(open: char, open_pos: usize, close: char, pos: usize) -> Self {
        LoadError::UnbalancedControlFlow {
            pos,
            reason: format!("'{}' closes '{}' opened at {}", close, open, open_pos),
        }
    }

    /// An opener still open at end of program.
    pub fn unclosed(open: char, pos: usize) -> Self {
        LoadError::UnbalancedControlFlow {
            pos,
            reason: format!("'{}' is never closed", open),
        }
    }

    pub fn pos(&self) -> usize {
        match self {
            LoadError::MalformedProgram { pos, .. }
            | LoadError::UnknownInstruction { pos, .. }
            | LoadError::ExtendedInstructionDisabled { pos, .. }
            | LoadError::UnbalancedControlFlow { pos, .. } => *pos,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LoadError::ExtendedInstructionDisabled { .. } => {
                Some("arithmetic and logic instructions need the extended instruction set")
            }
            LoadError::UnknownInstruction { .. } => {
                Some("whitespace and '#' comments must be stripped before loading")
            }
            _ => None,
        }
    }
}

/// Errors from decoding a compiled program.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid program encoding: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("corrupt program: {op} at {pc} has an invalid jump target")]
    BadJumpTarget { op: &'static str, pc: usize },

    #[error("corrupt program: {ops} ops but {positions} source positions")]
    PositionsMismatch { ops: usize, positions: usize },

    #[error("extended instruction {op} at {pc} is disabled")]
    ExtendedInstructionDisabled { op: &'static str, pc: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_display() {
        let err = LoadError::UnknownInstruction { ch: 'q', pos: 3 };
        let msg = err.to_string();
        assert!(msg.contains("unknown instruction"));
        assert!(msg.contains("'q'"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_unbalanced_display() {
        let err = LoadError::mismatched_close('[', 0, ')', 4);
        let msg = err.to_string();
        assert!(msg.contains("unbalanced"));
        assert!(msg.contains("')' closes '['"));
        assert_eq!(err.pos(), 4);
    }

    #[test]
    fn test_unclosed_display() {
        let err = LoadError::unclosed('(', 2);
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_hints() {
        assert!(
            LoadError::ExtendedInstructionDisabled { ch: '+', pos: 0 }
                .hint()
                .is_some()
        );
        assert!(LoadError::malformed(0, "x").hint().is_none());
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = LoadError::malformed(1, "dangling literal");
        let _: &dyn std::error::Error = &err;
    }
}
