use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::{fs, process};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chasement::bytecode::disasm::disassemble;
use chasement::bytecode::{InstructionSet, Program};
use chasement::frontend::source::strip;
use chasement::lang::value::render;
use chasement::runtime::{Acceptance, Status, Tape, Vm, VmConfig};

/// Extension of compiled programs written by `compile`.
const COMPILED_EXT: &str = "chc";

const EXIT_ACCEPT: i32 = 0;
const EXIT_REJECT: i32 = 1;
const EXIT_TRAPPED: i32 = 2;
const EXIT_LOAD: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "chasement")]
#[command(about = "Two-stack pushdown automaton interpreter")]
struct Cli {
    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Reject arithmetic/logic instructions (pure two-stack automaton)
    #[arg(long, global = true)]
    pure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program against an input tape
    Run {
        /// Program source, or a compiled .chc file
        program: PathBuf,

        /// Input symbols, one per character
        #[arg(short, long, conflicts_with = "stdin")]
        input: Option<String>,

        /// Read the input tape from stdin (trailing newline dropped)
        #[arg(long)]
        stdin: bool,

        /// Stop after this many instructions
        #[arg(long)]
        step_limit: Option<u64>,

        /// Maximum depth of either stack
        #[arg(long)]
        max_stack: Option<usize>,

        /// Acceptance predicate evaluated on halt
        #[arg(long, value_enum, default_value_t = AcceptArg::EmptyStackAndInput)]
        accept: AcceptArg,
    },

    /// Load a program and report load errors only
    Check { program: PathBuf },

    /// Print the decoded program
    Disasm { program: PathBuf },

    /// Write the decoded program in compiled form
    Compile {
        program: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AcceptArg {
    EmptyStackAndInput,
    EmptyStack,
    InputConsumed,
    TopIsTrue,
}

impl From<AcceptArg> for Acceptance {
    fn from(arg: AcceptArg) -> Self {
        match arg {
            AcceptArg::EmptyStackAndInput => Acceptance::EmptyStackAndInput,
            AcceptArg::EmptyStack => Acceptance::EmptyStack,
            AcceptArg::InputConsumed => Acceptance::InputConsumed,
            AcceptArg::TopIsTrue => Acceptance::TopIsTrue,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(EXIT_LOAD);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "chasement=warn",
        1 => "chasement=debug",
        _ => "chasement=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<i32> {
    let set = InstructionSet::new(!cli.pure);

    match cli.command {
        Command::Run {
            program,
            input,
            stdin,
            step_limit,
            max_stack,
            accept,
        } => {
            let Some(loaded) = load_program(&program, &set)? else {
                return Ok(EXIT_LOAD);
            };

            let input = match (input, stdin) {
                (Some(input), _) => input,
                (None, true) => read_stdin()?,
                (None, false) => String::new(),
            };

            let config = VmConfig {
                step_limit,
                max_stack_size: max_stack,
                acceptance: accept.into(),
            };
            run_program(&loaded, &input, config)
        }

        Command::Check { program } => Ok(match load_program(&program, &set)? {
            Some(loaded) => {
                println!("ok: {} instructions", loaded.program.len());
                EXIT_ACCEPT
            }
            None => EXIT_LOAD,
        }),

        Command::Disasm { program } => Ok(match load_program(&program, &set)? {
            Some(loaded) => {
                print!("{}", disassemble(&loaded.program));
                EXIT_ACCEPT
            }
            None => EXIT_LOAD,
        }),

        Command::Compile { program, output } => {
            let Some(loaded) = load_program(&program, &set)? else {
                return Ok(EXIT_LOAD);
            };
            let output = output.unwrap_or_else(|| program.with_extension(COMPILED_EXT));
            let bytes = loaded
                .program
                .to_bytes()
                .context("failed to encode program")?;
            fs::write(&output, &bytes)
                .with_context(|| format!("failed to write '{}'", output.display()))?;
            info!(path = %output.display(), bytes = bytes.len(), "compiled program written");
            Ok(EXIT_ACCEPT)
        }
    }
}

/// A program plus what is needed to point diagnostics back at its source.
struct Loaded {
    program: Program,
    /// Maps an op's text offset to `line:col`; absent for compiled input.
    locate: Option<Box<dyn Fn(usize) -> Option<String>>>,
}

impl Loaded {
    fn location(&self, pc: usize) -> Option<String> {
        let pos = self.program.source_pos(pc)?;
        self.locate.as_ref().and_then(|f| f(pos))
    }
}

/// Load source or compiled form. Load errors are reported here and yield `None`.
fn load_program(path: &Path, set: &InstructionSet) -> Result<Option<Loaded>> {
    if path.extension().and_then(|e| e.to_str()) == Some(COMPILED_EXT) {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        return match Program::from_bytes(&bytes, set) {
            Ok(program) => Ok(Some(Loaded {
                program,
                locate: None,
            })),
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                Ok(None)
            }
        };
    }

    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let stripped = strip(&source);
    debug!(chars = stripped.code.len(), "source stripped");

    let result = Program::load(&stripped.code, set);
    match result {
        Ok(program) => Ok(Some(Loaded {
            program,
            locate: Some(Box::new(move |pos| {
                stripped.span_of(pos).map(|s| s.to_string())
            })),
        })),
        Err(e) => {
            eprintln!("{}:{}", path.display(), stripped.locate(&e));
            Ok(None)
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read input from stdin")?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(input)
}

fn run_program(loaded: &Loaded, input: &str, config: VmConfig) -> Result<i32> {
    let mut vm = Vm::with_config(&loaded.program, Tape::from(input), config);
    let report = vm.run();

    print!("{}", render(&report.output));

    let code = match report.status {
        Status::Accept => {
            eprintln!("accept");
            EXIT_ACCEPT
        }
        Status::Reject => {
            eprintln!("reject");
            EXIT_REJECT
        }
        Status::Trapped => {
            match &report.trap {
                Some(trap) => match loaded.location(trap.pc) {
                    Some(at) => eprintln!("trapped: {} ({})", trap, at),
                    None => eprintln!("trapped: {}", trap),
                },
                None => eprintln!("trapped"),
            }
            EXIT_TRAPPED
        }
        Status::StepLimitExceeded => {
            let at = loaded
                .location(report.pc)
                .map(|at| format!(", {}", at))
                .unwrap_or_default();
            eprintln!(
                "step limit exceeded after {} steps (next pc {}{})",
                report.steps, report.pc, at
            );
            EXIT_TRAPPED
        }
        Status::Running => unreachable!("run() returns only on a terminal status"),
    };

    Ok(code)
}
