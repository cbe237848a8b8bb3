use serde::{Deserialize, Serialize};

/// A symbol that can live on either stack, on the input tape, or in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// A single character, the usual tape symbol.
    Char(char),

    /// 64-bit signed integer.
    Int(i64),

    /// Boolean produced by tests and consumed by `(` and `[`.
    Bool(bool),

    /// End-of-input sentinel, pushed by the first read past the end of the tape.
    Eof,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Eof => "eof",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Char(c) => write!(f, "{}", c),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Eof => write!(f, "$"),
        }
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Render a sequence of values the way `p` output is shown on a terminal.
pub fn render(values: &[Value]) -> String {
    values.iter().map(|v| v.to_string()).collect()
}
