use crate::bytecode::{Op, Program};
use crate::lang::value::Value;
use std::fmt::Write;

/// Disassembly of a whole program as a listing.
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(out, " {} instructions", program.len());
    let _ = writeln!(out, "════════════════════════════════════════");
    out.push_str(&disassemble_ops(program.ops()));
    out
}

/// Disassemble a slice of ops, marking every jump landing site.
pub fn disassemble_ops(ops: &[Op]) -> String {
    let jump_targets = collect_jump_targets(ops);
    let mut out = String::new();

    for (ip, op) in ops.iter().enumerate() {
        if jump_targets.contains(&ip) {
            let _ = writeln!(out, "      ┌──────────────────────────────────");
        }

        let marker = if jump_targets.contains(&ip) { "► " } else { "  " };
        let _ = writeln!(out, "{:04} {}{}", ip, marker, format_op(op, ip));
    }

    out
}

/// Where control actually lands for each jumping op.
fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();

    for (ip, op) in ops.iter().enumerate() {
        let target = match op {
            // a failed test resumes after the closer
            Op::If { end } | Op::Loop { end } => Some(end + 1),
            Op::EndLoop { start } => Some(*start),
            Op::SkipIf => Some(ip + 2),
            _ => None,
        };

        if let Some(target) = target {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn format_op(op: &Op, ip: usize) -> String {
    match op {
        Op::Push(v) => format!("PUSH        {}", format_value(v)),

        Op::ToAux => "TO_AUX      ; ( a -- ) A:( -- a )".to_string(),
        Op::ToMain => "TO_MAIN     ; ( -- a ) A:( a -- )".to_string(),
        Op::Read => "READ        ; ( -- sym )".to_string(),

        Op::If { end } => format!("IF          ↓ (→ {:04}) ; ( bool -- )", end + 1),
        Op::Loop { end } => format!("LOOP        ↓ (→ {:04}) ; ( bool -- )", end + 1),
        Op::EndLoop { start } => {
            let direction = if *start < ip { "↑" } else { "↓" };
            format!("END_LOOP    {} (→ {:04})", direction, start)
        }

        Op::SkipIf => format!("SKIP_IF     ↓ (→ {:04}) ; ( bool -- )", ip + 2),

        Op::Eq => "EQ          ; ( a b -- bool )".to_string(),
        Op::Output => "OUTPUT      ; ( a -- )".to_string(),

        other => other.mnemonic().to_string(),
    }
}

/// Format a literal in program syntax.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Char('\n') => "'\\n'".to_string(),
        Value::Char('\t') => "'\\t'".to_string(),
        Value::Char(c) => format!("'{}'", c),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Eof => "$".to_string(),
    }
}
