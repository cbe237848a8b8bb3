use crate::bytecode::{Op, Program};
use crate::lang::value::Value;
use crate::runtime::config::VmConfig;
use crate::runtime::machine::{Machine, Status, Tape};
use crate::runtime::trap::{Trap, TrapReason, type_mismatch};
use tracing::{debug, trace, warn};

/// What the engine does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: Status,
    pub output: Vec<Value>,
    pub trap: Option<Trap>,
    pub steps: u64,
    /// Pc the run stopped at. After a step-limit stop this is the op that
    /// would have run next.
    pub pc: usize,
}

impl RunReport {
    pub fn trap_reason(&self) -> Option<String> {
        self.trap.as_ref().map(|t| t.reason.to_string())
    }

    pub fn is_accepted(&self) -> bool {
        self.status == Status::Accept
    }
}

/// Run `program` once against `input`.
pub fn run(program: &Program, input: impl Into<Tape>, step_limit: Option<u64>) -> RunReport {
    let config = VmConfig {
        step_limit,
        ..VmConfig::default()
    };
    Vm::with_config(program, input.into(), config).run()
}

/// Execution engine for one run of a program.
pub struct Vm<'p> {
    program: &'p Program,
    machine: Machine,
    config: VmConfig,
    steps: u64,
    trap: Option<Trap>,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, tape: Tape) -> Self {
        Self::with_config(program, tape, VmConfig::default())
    }

    pub fn with_config(program: &'p Program, tape: Tape, config: VmConfig) -> Self {
        Self {
            program,
            machine: Machine::new(tape),
            config,
            steps: 0,
            trap: None,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn status(&self) -> Status {
        self.machine.status
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn trap(&self) -> Option<&Trap> {
        self.trap.as_ref()
    }

    /// Step until a terminal status.
    pub fn run(&mut self) -> RunReport {
        while !self.step().is_terminal() {}
        self.report()
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            status: self.machine.status,
            output: self.machine.output().to_vec(),
            trap: self.trap.clone(),
            steps: self.steps,
            pc: self.machine.pc,
        }
    }

    /// Execute the instruction at the pc, or halt if the program is exhausted.
    /// Does nothing once the status is terminal.
    pub fn step(&mut self) -> Status {
        if self.machine.status.is_terminal() {
            return self.machine.status;
        }

        let pc = self.machine.pc;
        let Some(op) = self.program.get(pc).copied() else {
            self.halt();
            return self.machine.status;
        };

        if let Some(limit) = self.config.step_limit {
            if self.steps >= limit {
                self.machine.status = Status::StepLimitExceeded;
                warn!(pc, limit, "step limit exceeded");
                return self.machine.status;
            }
        }
        self.steps += 1;

        trace!(
            pc,
            op = op.mnemonic(),
            main = self.machine.main_depth(),
            aux = self.machine.aux_depth(),
            "exec"
        );

        match self.exec(op) {
            Ok(Flow::Next) => self.machine.pc = pc + 1,
            Ok(Flow::Jump(target)) => self.machine.pc = target,
            Ok(Flow::Halt) => self.halt(),
            Err(reason) => {
                warn!(pc, op = op.mnemonic(), %reason, "run trapped");
                self.trap = Some(Trap { reason, pc });
                self.machine.status = Status::Trapped;
            }
        }

        self.machine.status
    }

    fn halt(&mut self) {
        self.machine.status = if self.config.acceptance.accepts(&self.machine) {
            Status::Accept
        } else {
            Status::Reject
        };
        debug!(
            status = %self.machine.status,
            steps = self.steps,
            pc = self.machine.pc,
            "halted"
        );
    }

    // Execution

    fn exec(&mut self, op: Op) -> Result<Flow, TrapReason> {
        let limit = self.config.max_stack_size;
        let m = &mut self.machine;

        match op {
            // Stack transfer
            Op::ToAux => m.to_aux(limit)?,
            Op::ToMain => m.to_main(limit)?,

            Op::Read => m.read(limit)?,
            Op::Push(value) => m.push(value, limit)?,

            // Tests
            Op::Eq => {
                m.require(2)?;
                let b = m.pop()?;
                let a = m.pop()?;
                m.push(Value::Bool(a == b), None)?;
            }
            Op::Not => {
                let result = match *m.peek(0)? {
                    Value::Bool(b) => Value::Bool(!b),
                    Value::Int(n) => Value::Int(!n),
                    other => return Err(type_mismatch("NOT", "bool or int", other.type_name())),
                };
                m.replace_top(result)?;
            }
            Op::IsEmpty => {
                let empty = m.main_depth() == 0;
                m.push(Value::Bool(empty), limit)?;
            }

            // Stack shuffling
            Op::Dup => {
                let top = *m.peek(0)?;
                m.push(top, limit)?;
            }
            Op::Drop => {
                m.pop()?;
            }
            Op::Swap => m.swap_top()?,

            // Control flow
            Op::If { end } | Op::Loop { end } => {
                if !self.pop_condition(op)? {
                    return Ok(Flow::Jump(end + 1));
                }
            }
            Op::SkipIf => {
                let past_next = m.pc() + 2;
                if self.pop_condition(op)? {
                    return Ok(Flow::Jump(past_next));
                }
            }
            Op::EndIf => {}
            Op::EndLoop { start } => return Ok(Flow::Jump(start)),

            Op::Output => m.emit()?,
            Op::Halt => return Ok(Flow::Halt),
            Op::Dump => {
                debug!(
                    pc = m.pc(),
                    main = ?m.main_iter().collect::<Vec<_>>(),
                    aux = ?m.aux_iter().collect::<Vec<_>>(),
                    unread = m.tape().remaining().len(),
                    "stack dump"
                );
            }

            // Extended
            Op::Add => self.int_binary(op, |a, b| checked(op, a.checked_add(b)))?,
            Op::Sub => self.int_binary(op, |a, b| checked(op, a.checked_sub(b)))?,
            Op::Mul => self.int_binary(op, |a, b| checked(op, a.checked_mul(b)))?,
            Op::Div => self.int_binary(op, |a, b| {
                if b == 0 {
                    return Err(TrapReason::DivisionByZero { op: "DIV" });
                }
                checked(op, a.checked_div(b))
            })?,
            Op::Rem => self.int_binary(op, |a, b| {
                if b == 0 {
                    return Err(TrapReason::DivisionByZero { op: "REM" });
                }
                checked(op, a.checked_rem(b))
            })?,
            Op::Lt => self.int_binary(op, |a, b| Ok(Value::Bool(a < b)))?,
            Op::Gt => self.int_binary(op, |a, b| Ok(Value::Bool(a > b)))?,
            Op::And | Op::Or | Op::Xor => self.logic_binary(op)?,
        }

        Ok(Flow::Next)
    }

    /// Pop the bool a control-flow op branches on.
    fn pop_condition(&mut self, op: Op) -> Result<bool, TrapReason> {
        match *self.machine.peek(0)? {
            Value::Bool(b) => {
                self.machine.pop()?;
                Ok(b)
            }
            other => Err(type_mismatch(op.mnemonic(), "bool", other.type_name())),
        }
    }

    /// `( a b -- f(a, b) )` on integers. Nothing is popped if `f` fails.
    fn int_binary(
        &mut self,
        op: Op,
        f: impl Fn(i64, i64) -> Result<Value, TrapReason>,
    ) -> Result<(), TrapReason> {
        let (a, b) = match (*self.machine.peek(1)?, *self.machine.peek(0)?) {
            (Value::Int(a), Value::Int(b)) => (a, b),
            (Value::Int(_), other) | (other, _) => {
                return Err(type_mismatch(op.mnemonic(), "int", other.type_name()));
            }
        };
        let result = f(a, b)?;
        self.machine.pop()?;
        self.machine.replace_top(result)
    }

    /// `( a b -- a op b )` on two bools or two ints.
    fn logic_binary(&mut self, op: Op) -> Result<(), TrapReason> {
        let name = op.mnemonic();
        let result = match (*self.machine.peek(1)?, *self.machine.peek(0)?) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(match op {
                Op::And => a && b,
                Op::Or => a || b,
                _ => a ^ b,
            }),
            (Value::Int(a), Value::Int(b)) => Value::Int(match op {
                Op::And => a & b,
                Op::Or => a | b,
                _ => a ^ b,
            }),
            (Value::Bool(_), other) | (Value::Int(_), other) | (other, _) => {
                return Err(type_mismatch(name, "two bools or two ints", other.type_name()));
            }
        };
        self.machine.pop()?;
        self.machine.replace_top(result)
    }
}

fn checked(op: Op, result: Option<i64>) -> Result<Value, TrapReason> {
    result
        .map(Value::Int)
        .ok_or(TrapReason::ArithmeticOverflow { op: op.mnemonic() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::InstructionSet;
    use crate::runtime::config::Acceptance;
    use crate::runtime::trap::Stack;

    // ============================================================
    // Test Helpers
    // ============================================================

    fn load(text: &str) -> Program {
        Program::load(text, &InstructionSet::extended()).expect("program should load")
    }

    /// Run `text` on `input` and return the finished vm's report and machine
    fn run_text(text: &str, input: &str) -> (RunReport, Machine) {
        let program = load(text);
        let mut vm = Vm::new(&program, Tape::from(input));
        let report = vm.run();
        (report, vm.machine().clone())
    }

    /// Assert the main stack (bottom first) after a run that did not trap
    fn assert_stack(text: &str, expected: Vec<Value>) {
        let (report, machine) = run_text(text, "");
        assert!(
            report.trap.is_none(),
            "unexpected trap: {:?}",
            report.trap
        );
        assert_eq!(machine.main_stack(), expected.as_slice(), "stack mismatch");
    }

    /// Assert the run traps with `reason` at `pc`
    fn assert_trap(text: &str, input: &str, reason: TrapReason, pc: usize) {
        let (report, _) = run_text(text, input);
        assert_eq!(report.status, Status::Trapped);
        assert_eq!(report.trap, Some(Trap { reason, pc }));
    }

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn ch(c: char) -> Value {
        Value::Char(c)
    }

    fn boolean(b: bool) -> Value {
        Value::Bool(b)
    }

    // ============================================================
    // Transfers
    // ============================================================

    #[test]
    fn test_to_aux_and_back() {
        let (report, machine) = run_text("'x'ya", "");
        assert_eq!(report.status, Status::Reject);
        assert_eq!(machine.main_stack(), &[ch('x')]);
        assert_eq!(machine.aux_stack(), &[ch('y')]);

        assert_stack("'x'yaam", vec![ch('x')]);
        assert_stack("'x'yaamm", vec![ch('x'), ch('y')]);
    }

    #[test]
    fn test_to_aux_empty_main_traps() {
        assert_trap("a", "", TrapReason::StackUnderflow(Stack::Main), 0);
    }

    #[test]
    fn test_to_main_empty_aux_traps() {
        assert_trap("1m", "", TrapReason::StackUnderflow(Stack::Aux), 1);
    }

    #[test]
    fn test_trap_leaves_state_untouched() {
        let (_, machine) = run_text("'p'qa'rmm", "");
        // 'p' 'q' a -> main [p], aux [q]; 'r' -> main [p r]; m -> [p r q]; m traps
        assert_eq!(machine.main_stack(), &[ch('p'), ch('r'), ch('q')]);
        assert_eq!(machine.aux_depth(), 0);
        assert_eq!(machine.pc(), 5);
    }

    // ============================================================
    // Input
    // ============================================================

    #[test]
    fn test_read() {
        let (report, machine) = run_text(",,", "ab");
        assert_eq!(report.status, Status::Reject);
        assert_eq!(machine.main_stack(), &[ch('a'), ch('b')]);
        assert!(machine.tape().is_consumed());
    }

    #[test]
    fn test_read_past_end_pushes_eof_once() {
        let (_, machine) = run_text(",,", "a");
        assert_eq!(machine.main_stack(), &[ch('a'), Value::Eof]);
        assert_trap(",,,", "a", TrapReason::EndOfInput, 2);
    }

    #[test]
    fn test_eof_test() {
        assert_stack(",$=", vec![boolean(true)]);
    }

    // ============================================================
    // Literals, tests and shuffling
    // ============================================================

    #[test]
    fn test_literals() {
        assert_stack(
            "'a42tf$",
            vec![ch('a'), int(42), boolean(true), boolean(false), Value::Eof],
        );
    }

    #[test]
    fn test_eq() {
        assert_stack("'a'a=", vec![boolean(true)]);
        assert_stack("'a'b=", vec![boolean(false)]);
        assert_stack("1'1=", vec![boolean(false)]);
    }

    #[test]
    fn test_eq_underflow_keeps_operand() {
        let (report, machine) = run_text("'a=", "");
        assert_eq!(
            report.trap_reason().as_deref(),
            Some("stack underflow on main stack")
        );
        assert_eq!(machine.main_stack(), &[ch('a')]);
    }

    #[test]
    fn test_not() {
        assert_stack("t!", vec![boolean(false)]);
        assert_stack("0!", vec![int(-1)]);
        assert_trap(
            "'c!",
            "",
            TrapReason::TypeMismatch {
                op: "NOT",
                expected: "bool or int",
                got: "char",
            },
            1,
        );
    }

    #[test]
    fn test_is_empty() {
        assert_stack("e", vec![boolean(true)]);
        assert_stack("1e", vec![int(1), boolean(false)]);
    }

    #[test]
    fn test_dup_drop_swap() {
        assert_stack("1d", vec![int(1), int(1)]);
        assert_stack("1 2o", vec![int(1)]);
        assert_stack("1 2w", vec![int(2), int(1)]);
        assert_trap("d", "", TrapReason::StackUnderflow(Stack::Main), 0);
        assert_trap("o", "", TrapReason::StackUnderflow(Stack::Main), 0);
        assert_trap("1w", "", TrapReason::StackUnderflow(Stack::Main), 1);
    }

    // ============================================================
    // Control flow
    // ============================================================

    #[test]
    fn test_if_taken() {
        assert_stack("t(1)2", vec![int(1), int(2)]);
    }

    #[test]
    fn test_if_not_taken() {
        assert_stack("f(1)2", vec![int(2)]);
    }

    #[test]
    fn test_if_requires_bool() {
        assert_trap(
            "1(2)",
            "",
            TrapReason::TypeMismatch {
                op: "IF",
                expected: "bool",
                got: "int",
            },
            1,
        );
    }

    #[test]
    fn test_loop_skipped() {
        assert_stack("f[1]2", vec![int(2)]);
    }

    #[test]
    fn test_loop_counts_down() {
        // 3 [ dup 0 > ] while: push 3, loop decrementing to 0
        assert_stack("3d0>[1-d0>]", vec![int(0)]);
    }

    #[test]
    fn test_loop_consumes_input() {
        // read while the symbol is 'a'
        let (_, machine) = run_text(",d'a=[o,d'a=]", "aaab");
        assert_eq!(machine.main_stack(), &[ch('b')]);
        assert_eq!(machine.tape().cursor(), 4);
    }

    #[test]
    fn test_nested_blocks() {
        assert_stack("t(t(1)f(2)3)4", vec![int(1), int(3), int(4)]);
    }

    #[test]
    fn test_skip_if_true_skips_next_op() {
        assert_stack("ts1 2", vec![int(2)]);
        // a multi-character literal is one op
        assert_stack("ts'a'b", vec![ch('b')]);
    }

    #[test]
    fn test_skip_if_false_runs_next_op() {
        assert_stack("fs1 2", vec![int(1), int(2)]);
    }

    #[test]
    fn test_skip_if_past_end_halts() {
        let program = load("1ts");
        let report = run(&program, "", None);
        assert_eq!(report.status, Status::Reject);
        assert_eq!(report.pc, 4);
    }

    #[test]
    fn test_skip_if_requires_bool() {
        assert_trap(
            "'cs1",
            "",
            TrapReason::TypeMismatch {
                op: "SKIP_IF",
                expected: "bool",
                got: "char",
            },
            1,
        );
        assert_trap("s", "", TrapReason::StackUnderflow(Stack::Main), 0);
    }

    #[test]
    fn test_halt_stops_execution() {
        let (report, machine) = run_text("x1", "");
        assert_eq!(report.status, Status::Accept);
        assert_eq!(machine.main_depth(), 0);
        assert_eq!(machine.pc(), 0);
    }

    #[test]
    fn test_step_limit() {
        let program = load("t[t]");
        let report = run(&program, "", Some(100));
        assert_eq!(report.status, Status::StepLimitExceeded);
        assert_eq!(report.steps, 100);
        assert!(report.trap.is_none());
    }

    #[test]
    fn test_step_limit_reports_position() {
        // t, then [ t ] cycles through pcs 1, 2, 3
        let program = load("t[t]");
        let report = run(&program, "", Some(7));
        assert_eq!(report.status, Status::StepLimitExceeded);
        assert_eq!(report.steps, 7);
        assert_eq!(report.pc, 1);

        let report = run(&program, "", Some(5));
        assert_eq!(report.pc, 2);
    }

    #[test]
    fn test_report_pc_on_trap_and_halt() {
        let program = load("1oo");
        assert_eq!(run(&program, "", None).pc, 2);

        let program = load("x1");
        assert_eq!(run(&program, "", None).pc, 0);

        let program = load("1o");
        assert_eq!(run(&program, "", None).pc, 2);
    }

    #[test]
    fn test_step_limit_not_hit() {
        let program = load("1o");
        let report = run(&program, "", Some(2));
        assert_eq!(report.status, Status::Accept);
        assert_eq!(report.steps, 2);
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let program = load("o");
        let mut vm = Vm::new(&program, Tape::default());
        assert_eq!(vm.step(), Status::Trapped);
        assert_eq!(vm.step(), Status::Trapped);
        assert_eq!(vm.steps(), 1);
    }

    // ============================================================
    // Output & acceptance
    // ============================================================

    #[test]
    fn test_output() {
        let program = load("'h'iwpp");
        let report = run(&program, "", None);
        assert_eq!(report.output, vec![ch('h'), ch('i')]);
        assert_eq!(report.status, Status::Accept);
    }

    #[test]
    fn test_output_kept_on_trap() {
        let program = load("'kpp");
        let report = run(&program, "", None);
        assert_eq!(report.status, Status::Trapped);
        assert_eq!(report.output, vec![ch('k')]);
        assert_eq!(report.trap.map(|t| t.pc), Some(2));
    }

    #[test]
    fn test_default_acceptance_requires_consumed_input() {
        let program = load("");
        assert_eq!(run(&program, "", None).status, Status::Accept);
        assert_eq!(run(&program, "a", None).status, Status::Reject);
    }

    #[test]
    fn test_acceptance_modes() {
        let program = load("t");
        let report = |acceptance| {
            let config = VmConfig::default().with_acceptance(acceptance);
            Vm::with_config(&program, Tape::from("z"), config).run().status
        };
        assert_eq!(report(Acceptance::TopIsTrue), Status::Accept);
        assert_eq!(report(Acceptance::EmptyStack), Status::Reject);
        assert_eq!(report(Acceptance::InputConsumed), Status::Reject);
        assert_eq!(report(Acceptance::EmptyStackAndInput), Status::Reject);
    }

    #[test]
    fn test_max_stack_size() {
        let program = load("t[1t]");
        let config = VmConfig::default().with_max_stack_size(8);
        let mut vm = Vm::with_config(&program, Tape::default(), config);
        let report = vm.run();
        assert_eq!(report.status, Status::Trapped);
        assert!(matches!(
            report.trap.map(|t| t.reason),
            Some(TrapReason::StackOverflow {
                stack: Stack::Main,
                limit: 8
            })
        ));
        assert_eq!(vm.machine().main_depth(), 8);
    }

    // ============================================================
    // Extended instructions
    // ============================================================

    #[test]
    fn test_arithmetic() {
        assert_stack("2 3+", vec![int(5)]);
        assert_stack("2 3-", vec![int(-1)]);
        assert_stack("6 7*", vec![int(42)]);
        assert_stack("7 2/", vec![int(3)]);
        assert_stack("7 2%", vec![int(1)]);
    }

    #[test]
    fn test_comparison() {
        assert_stack("1 2<", vec![boolean(true)]);
        assert_stack("1 2>", vec![boolean(false)]);
    }

    #[test]
    fn test_logic() {
        assert_stack("tf&", vec![boolean(false)]);
        assert_stack("tf|", vec![boolean(true)]);
        assert_stack("tt^", vec![boolean(false)]);
        assert_stack("6 3&", vec![int(2)]);
        assert_stack("6 3|", vec![int(7)]);
        assert_stack("6 3^", vec![int(5)]);
    }

    #[test]
    fn test_logic_mixed_types_trap() {
        let (report, machine) = run_text("t1&", "");
        assert_eq!(report.status, Status::Trapped);
        assert_eq!(machine.main_stack(), &[boolean(true), int(1)]);
    }

    #[test]
    fn test_division_by_zero_keeps_operands() {
        let (report, machine) = run_text("7 0/", "");
        assert_eq!(
            report.trap.map(|t| t.reason),
            Some(TrapReason::DivisionByZero { op: "DIV" })
        );
        assert_eq!(machine.main_stack(), &[int(7), int(0)]);
    }

    #[test]
    fn test_add_type_error() {
        assert_trap(
            "'a1+",
            "",
            TrapReason::TypeMismatch {
                op: "ADD",
                expected: "int",
                got: "char",
            },
            2,
        );
    }

    #[test]
    fn test_add_underflow() {
        assert_trap("1+", "", TrapReason::StackUnderflow(Stack::Main), 1);
    }

    #[test]
    fn test_overflow_traps() {
        assert_trap(
            "9223372036854775807 1+",
            "",
            TrapReason::ArithmeticOverflow { op: "ADD" },
            2,
        );
    }
}
