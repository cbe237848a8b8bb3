//! Source loading: turns a program file into the stripped instruction text
//! that [`Program::load`](crate::bytecode::Program::load) accepts.
//!
//! - spaces, tabs and newlines are dropped
//! - `#` starts a comment that runs to the next `#` or end of line
//! - the character after `'` is kept verbatim, so `' ` and `'#` are literals
//! - whitespace or a comment between two integer literals becomes one space,
//!   the only place the decoder accepts a space

use crate::bytecode::LoadError;

/// 1-based source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Stripped program text plus where each kept character came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub code: String,
    spans: Vec<Span>,
}

impl Stripped {
    /// Source location of the `pos`-th character of `code`.
    pub fn span_of(&self, pos: usize) -> Option<Span> {
        self.spans.get(pos).copied()
    }

    /// Formats a load error as `line:col: message` for CLI diagnostics.
    pub fn locate(&self, err: &LoadError) -> String {
        // Errors at end of text point just past the last kept character.
        let span = self.span_of(err.pos()).or_else(|| {
            self.spans.last().map(|s| Span {
                line: s.line,
                col: s.col + 1,
            })
        });

        let mut msg = match span {
            Some(span) => format!("{}: {}", span, err),
            None => err.to_string(),
        };
        if let Some(hint) = err.hint() {
            msg.push_str("\n  hint: ");
            msg.push_str(hint);
        }
        msg
    }
}

struct Stripper {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    out: String,
    spans: Vec<Span>,
    /// Last kept character was a digit of an integer literal.
    after_int: bool,
    /// Whitespace or a comment was skipped since the last kept character.
    gap: bool,
}

impl Stripper {
    fn new(source: &str) -> Self {
        Stripper {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            out: String::new(),
            spans: Vec::new(),
            after_int: false,
            gap: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    /// Copy the current character to the output.
    fn keep(&mut self) {
        let span = self.span();
        if let Some(ch) = self.advance() {
            self.out.push(ch);
            self.spans.push(span);
        }
    }

    fn skip_comment(&mut self) {
        self.advance();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
            if ch == '#' {
                break;
            }
        }
    }

    fn run(mut self) -> Stripped {
        while let Some(ch) = self.current() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                    self.gap = true;
                }
                '#' => {
                    self.skip_comment();
                    self.gap = true;
                }
                '\'' => {
                    self.keep();
                    if self.current() == Some('\\') {
                        self.keep();
                    }
                    self.keep();
                    self.after_int = false;
                    self.gap = false;
                }
                c if c.is_ascii_digit() => {
                    if self.after_int && self.gap {
                        let span = self.span();
                        self.out.push(' ');
                        self.spans.push(span);
                    }
                    self.keep();
                    self.after_int = true;
                    self.gap = false;
                }
                _ => {
                    self.keep();
                    self.after_int = false;
                    self.gap = false;
                }
            }
        }

        Stripped {
            code: self.out,
            spans: self.spans,
        }
    }
}

/// Strip whitespace and comments from program source.
pub fn strip(source: &str) -> Stripped {
    Stripper::new(source).run()
}
