//! # chasement
//!
//! Interpreter for a single-character stack language whose machine is a
//! pushdown automaton with a second, indirectly reachable stack.
//!
//! Only two instructions touch the auxiliary stack: `a` moves the main top
//! onto it and `m` moves its top back. Think of the main stack as the tape
//! left of the head and the auxiliary stack as the tape right of it; that
//! makes the machine strong enough for languages like `a^n b^n c^n`.
//!
//! ```
//! use chasement::bytecode::{InstructionSet, Program};
//! use chasement::frontend::source::strip;
//! use chasement::runtime::{Status, run};
//!
//! // accept a*: read while 'a', then require end of input
//! let text = strip(",d'a=[o,d'a=]  d$=!(x)o");
//! let program = Program::load(&text.code, &InstructionSet::base()).unwrap();
//! assert_eq!(run(&program, "aaa", None).status, Status::Accept);
//! assert_eq!(run(&program, "aab", None).status, Status::Reject);
//! ```

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod runtime;
