use std::path::PathBuf;
use std::{fs, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use emulator::config::{Config, DEFAULT_SP, DEFAULT_STACK_LIMIT};
use emulator::listing;
use emulator::vm::{Halt, Vm};

#[derive(Parser, Debug)]
#[command(name = "main", version, about = "Run an AArch64-style assembly listing")]
struct Cli {
  /// Assembly listing to execute.
  listing: PathBuf,

  /// Initial stack pointer.
  #[arg(long, default_value_t = DEFAULT_SP, value_parser = parse_address)]
  sp: u64,

  /// Initial program counter; defaults to the start of the code.
  #[arg(long, value_parser = parse_address)]
  pc: Option<u64>,

  /// Address of the first instruction.
  #[arg(long, default_value_t = 0, value_parser = parse_address)]
  code_top: u64,

  /// Largest stack size in bytes.
  #[arg(long, default_value_t = DEFAULT_STACK_LIMIT)]
  stack_limit: u64,

  /// Stop after this many instructions.
  #[arg(long)]
  max_steps: Option<u64>,

  /// Print the machine state after every instruction.
  #[arg(long)]
  trace: bool,
}

fn parse_address(text: &str) -> Result<u64, String> {
  let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16),
    None => text.parse(),
  };
  parsed.map_err(|err| format!("`{}` is not an address: {}", text, err))
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  if let Err(message) = run(&cli) {
    eprintln!("error: {}", message);
    process::exit(1);
  }
}

fn run(cli: &Cli) -> Result<(), String> {
  let source = fs::read_to_string(&cli.listing)
    .map_err(|err| format!("cannot read {}: {}", cli.listing.display(), err))?;
  let chunk = listing::parse(&source, cli.code_top).map_err(|err| err.to_string())?;

  let config = Config {
    sp: cli.sp,
    pc: cli.pc.unwrap_or(cli.code_top),
    stack_limit: cli.stack_limit,
    max_steps: cli.max_steps,
  };
  let mut vm = Vm::with_config(&config);

  let halt = vm
    .run_with(&chunk, |vm| {
      if cli.trace {
        println!("{}", vm.dump());
      }
    })
    .map_err(|err| format!("at pc {:#x}: {}", vm.pc(), err));
  let halt = halt?;

  match halt {
    Halt::LeftCode { pc } => println!("Left the code at pc = {:#x}", pc),
    Halt::Unsupported { opcode, pc } => println!("Stopped at `{}` (pc = {:#x})", opcode, pc),
    Halt::StepLimit { steps } => println!("Stopped after {} steps", steps),
  }
  vm.cover_sp().map_err(|err| err.to_string())?;
  print!("{}", vm.dump());
  Ok(())
}
