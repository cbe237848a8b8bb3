use std::collections::HashMap;

/// What a source character decodes to, before block targets are known.
///
/// `CharLiteral` and `Digit` are prefixes: the decoder consumes the
/// following character / digit run itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    ToAux,
    ToMain,
    Read,
    CharLiteral,
    Digit,
    True,
    False,
    Eof,
    Eq,
    Not,
    IsEmpty,
    Dup,
    Drop,
    Swap,
    IfOpen,
    IfClose,
    LoopOpen,
    LoopClose,
    SkipIf,
    Output,
    Halt,
    Dump,

    // extended
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

impl Opcode {
    pub fn is_extended(&self) -> bool {
        use Opcode::*;
        matches!(self, Add | Sub | Mul | Div | Rem | Lt | Gt | And | Or | Xor)
    }
}

const BASE: &[(char, Opcode)] = &[
    ('a', Opcode::ToAux),
    ('m', Opcode::ToMain),
    (',', Opcode::Read),
    ('\'', Opcode::CharLiteral),
    ('t', Opcode::True),
    ('f', Opcode::False),
    ('$', Opcode::Eof),
    ('=', Opcode::Eq),
    ('!', Opcode::Not),
    ('e', Opcode::IsEmpty),
    ('d', Opcode::Dup),
    ('o', Opcode::Drop),
    ('w', Opcode::Swap),
    ('(', Opcode::IfOpen),
    (')', Opcode::IfClose),
    ('[', Opcode::LoopOpen),
    (']', Opcode::LoopClose),
    ('s', Opcode::SkipIf),
    ('p', Opcode::Output),
    ('x', Opcode::Halt),
    ('h', Opcode::Dump),
];

const EXTENDED: &[(char, Opcode)] = &[
    ('+', Opcode::Add),
    ('-', Opcode::Sub),
    ('*', Opcode::Mul),
    ('/', Opcode::Div),
    ('%', Opcode::Rem),
    ('<', Opcode::Lt),
    ('>', Opcode::Gt),
    ('&', Opcode::And),
    ('|', Opcode::Or),
    ('^', Opcode::Xor),
];

/// Character-to-opcode table used by the decoder.
///
/// Extended bindings are always present in the table so that a program using
/// them in pure mode is reported as `ExtendedInstructionDisabled` rather than
/// as an unknown character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSet {
    table: HashMap<char, Opcode>,
    extended: bool,
}

/// Result of looking a character up in an [`InstructionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Opcode),
    Disabled(Opcode),
    Unknown,
}

impl InstructionSet {
    pub fn new(extended: bool) -> Self {
        let mut table: HashMap<char, Opcode> = BASE.iter().copied().collect();
        table.extend(EXTENDED.iter().copied());
        for c in '0'..='9' {
            table.insert(c, Opcode::Digit);
        }

        Self { table, extended }
    }

    /// The pure two-stack automaton: no arithmetic/logic subset.
    pub fn base() -> Self {
        Self::new(false)
    }

    pub fn extended() -> Self {
        Self::new(true)
    }

    pub fn new_with<F: FnOnce(&mut Self)>(extended: bool, configure: F) -> Self {
        let mut me = Self::new(extended);
        configure(&mut me);
        me
    }

    pub fn extended_enabled(&self) -> bool {
        self.extended
    }

    /// Rebind `ch` to `opcode`, replacing any previous binding.
    pub fn bind(&mut self, ch: char, opcode: Opcode) -> &mut Self {
        self.table.insert(ch, opcode);
        self
    }

    pub fn unbind(&mut self, ch: char) -> &mut Self {
        self.table.remove(&ch);
        self
    }

    pub fn lookup(&self, ch: char) -> Lookup {
        match self.table.get(&ch) {
            Some(op) if op.is_extended() && !self.extended => Lookup::Disabled(*op),
            Some(op) => Lookup::Found(*op),
            None => Lookup::Unknown,
        }
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::base()
    }
}
