pub mod config;
pub mod machine;
pub mod trap;
pub mod vm;

pub use config::{Acceptance, VmConfig};
pub use machine::{Machine, Status, Tape};
pub use trap::{Stack, Trap, TrapReason};
pub use vm::{RunReport, Vm, run};
