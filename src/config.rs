/// Default initial stack pointer.
pub const DEFAULT_SP: u64 = 0x1000;

/// Default upper bound on the stack buffer, in bytes.
pub const DEFAULT_STACK_LIMIT: u64 = 16 * 1024 * 1024;

/// Settings for a single simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Config {
  /// Initial stack pointer, also where the first stack word is anchored.
  pub sp: u64,
  /// Initial program counter.
  pub pc: u64,
  /// Largest size the stack buffer may grow to.
  pub stack_limit: u64,
  /// Maximum number of instructions [`Vm::run`](crate::vm::Vm::run) executes.
  pub max_steps: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      sp: DEFAULT_SP,
      pc: 0,
      stack_limit: DEFAULT_STACK_LIMIT,
      max_steps: None,
    }
  }
}
