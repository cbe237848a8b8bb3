use crate::lang::value::Value;
use crate::runtime::machine::Machine;
use serde::{Deserialize, Serialize};

/// Predicate evaluated when a run halts normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acceptance {
    /// Main stack empty and the whole tape read.
    #[default]
    EmptyStackAndInput,
    /// Main stack empty, regardless of unread input.
    EmptyStack,
    /// Whole tape read, regardless of the stacks.
    InputConsumed,
    /// Top of the main stack is `true`.
    TopIsTrue,
}

impl Acceptance {
    pub fn accepts(&self, machine: &Machine) -> bool {
        match self {
            Acceptance::EmptyStackAndInput => {
                machine.main_depth() == 0 && machine.tape().is_consumed()
            }
            Acceptance::EmptyStack => machine.main_depth() == 0,
            Acceptance::InputConsumed => machine.tape().is_consumed(),
            Acceptance::TopIsTrue => machine.top() == Some(&Value::Bool(true)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Maximum number of instructions a run may execute.
    pub step_limit: Option<u64>,
    /// Maximum depth of either stack.
    pub max_stack_size: Option<usize>,
    pub acceptance: Acceptance,
}

impl VmConfig {
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn with_max_stack_size(mut self, limit: usize) -> Self {
        self.max_stack_size = Some(limit);
        self
    }

    pub fn with_acceptance(mut self, acceptance: Acceptance) -> Self {
        self.acceptance = acceptance;
        self
    }
}
