pub mod disasm;
pub mod instruction_set;
pub mod load_error;
pub mod op;
pub mod program;

pub use instruction_set::{InstructionSet, Opcode};
pub use load_error::{DecodeError, LoadError};
pub use op::Op;
pub use program::Program;
