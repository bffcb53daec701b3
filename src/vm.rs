use std::cmp::Ordering;
use std::collections::TryReserveError;

use tracing::trace;

use crate::config::Config;
use crate::execute;
use crate::opcode::Opcode;
use crate::operand::{
  Instruction, Operand, Register, RegisterKind, Width, GENERAL_REGISTERS, LINK_REGISTER,
};
use crate::region::{Region, INSTRUCTION_BYTES};
use crate::stack::Stack;

const LOW_HALF: u64 = 0xFFFF_FFFF;

/// The single flag left behind by the most recent `cmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Condition {
  #[default]
  None,
  Zero,
  Negative,
  Positive,
}

impl From<Ordering> for Condition {
  fn from(ordering: Ordering) -> Self {
    match ordering {
      Ordering::Less => Self::Negative,
      Ordering::Equal => Self::Zero,
      Ordering::Greater => Self::Positive,
    }
  }
}

/// What a single executed instruction did to control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  /// Fall through; the caller advances `pc`.
  Continue,
  /// `pc` was assigned by the instruction.
  Branched,
  /// Nothing was executed.
  Unsupported(Opcode),
}

/// Why [`Vm::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Halt {
  /// `pc` no longer addresses an instruction of the region.
  LeftCode { pc: u64 },
  /// The instruction at `pc` cannot be executed.
  Unsupported { opcode: Opcode, pc: u64 },
  /// The configured step budget ran out.
  StepLimit { steps: u64 },
}

/// An error that occurred during execution of instructions
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("`{opcode}` is missing operand {index}")]
  MissingOperand { opcode: Opcode, index: usize },

  #[error("cannot write to `{0}`, only registers are writable")]
  NotWritable(Operand),

  #[error("`{0}` cannot be read as a value")]
  NotReadable(Operand),

  #[error("`{0}` is not a memory operand")]
  NotMemory(Operand),

  #[error("`{opcode}` transfers through a register, got `{operand}`")]
  NotRegister { opcode: Opcode, operand: Operand },

  #[error("there is no general register {0}")]
  BadRegister(u8),

  #[error("pc {pc:#x} is outside the loaded code")]
  FetchOutOfRange { pc: u64 },

  #[error("pc {pc:#x} is not on an instruction boundary")]
  MisalignedPc { pc: u64 },

  #[error("stack cannot grow to cover {address:#x} within {limit} bytes")]
  StackLimit { address: u64, limit: u64 },

  #[error("address {address:#x} lies outside the stack [{top:#x}, {bot:#x}]")]
  StackOutOfBounds { address: u64, top: u64, bot: u64 },

  #[error("out of memory while growing the stack")]
  OutOfMemory(#[from] TryReserveError),
}

/// The machine state of one simulation run.
///
/// General registers start out as zero but are remembered as unused until
/// something writes them, so diagnostics only show what the program touched.
#[derive(Debug, Clone)]
pub struct Vm {
  pub(crate) registers: [Option<u64>; GENERAL_REGISTERS],
  pub(crate) sp: u64,
  pub(crate) pc: u64,
  pub(crate) condition: Condition,
  pub(crate) stack: Stack,
  max_steps: Option<u64>,
}

impl Vm {
  /// Create a machine with the given stack pointer and program counter and
  /// default settings otherwise
  pub fn new(sp: u64, pc: u64) -> Self {
    Self::with_config(&Config {
      sp,
      pc,
      ..Config::default()
    })
  }

  pub fn with_config(config: &Config) -> Self {
    Self {
      registers: [None; GENERAL_REGISTERS],
      sp: config.sp,
      pc: config.pc,
      condition: Condition::None,
      stack: Stack::new(config.sp, config.stack_limit),
      max_steps: config.max_steps,
    }
  }

  pub fn sp(&self) -> u64 {
    self.sp
  }

  pub fn pc(&self) -> u64 {
    self.pc
  }

  pub fn condition(&self) -> Condition {
    self.condition
  }

  pub fn stack(&self) -> &Stack {
    &self.stack
  }

  /// Value of general register `index`, zero if it was never written.
  pub fn register(&self, index: u8) -> Result<u64, Error> {
    self
      .registers
      .get(usize::from(index))
      .map(|slot| slot.unwrap_or(0))
      .ok_or(Error::BadRegister(index))
  }

  /// Registers that hold a value, in index order.
  pub fn live_registers(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
    self
      .registers
      .iter()
      .enumerate()
      .filter_map(|(i, slot)| slot.map(|value| (i as u8, value)))
  }

  fn slot_mut(&mut self, index: u8) -> Result<&mut Option<u64>, Error> {
    self
      .registers
      .get_mut(usize::from(index))
      .ok_or(Error::BadRegister(index))
  }

  fn read_register(&self, reg: Register) -> Result<u64, Error> {
    let value = match reg.kind {
      RegisterKind::W => self.register(reg.index)? & LOW_HALF,
      RegisterKind::X => self.register(reg.index)?,
      RegisterKind::Sp => self.sp,
      RegisterKind::Pc => self.pc,
    };
    Ok(value)
  }

  /// Value of a constant, address or register operand.
  pub fn read(&self, operand: &Operand) -> Result<u64, Error> {
    match *operand {
      Operand::Constant(value) | Operand::Address(value) => Ok(value),
      Operand::Register(reg) => self.read_register(reg),
      Operand::Memory { .. } => Err(Error::NotReadable(*operand)),
    }
  }

  /// Stores `value` through a register operand. A `w` view clears the upper
  /// half of the register.
  pub fn write(&mut self, operand: &Operand, value: u64) -> Result<(), Error> {
    let Operand::Register(reg) = *operand else {
      return Err(Error::NotWritable(*operand));
    };
    match reg.kind {
      RegisterKind::W => *self.slot_mut(reg.index)? = Some(value & LOW_HALF),
      RegisterKind::X => *self.slot_mut(reg.index)? = Some(value),
      RegisterKind::Sp => self.sp = value,
      RegisterKind::Pc => self.pc = value,
    }
    Ok(())
  }

  /// `base + offset` of a memory operand.
  pub fn effective_address(&self, operand: &Operand) -> Result<u64, Error> {
    match *operand {
      Operand::Memory { base, offset } => Ok(self.read_register(base)?.wrapping_add(offset)),
      _ => Err(Error::NotMemory(*operand)),
    }
  }

  /// Grows the stack so that the current `sp` is backed.
  pub fn cover_sp(&mut self) -> Result<(), Error> {
    self.stack.ensure_covers(self.sp)
  }

  fn cover(&mut self, address: u64, width: Width) -> Result<(), Error> {
    self.stack.ensure_covers(address)?;
    self
      .stack
      .ensure_covers(address.wrapping_add(width.bytes() - 1))
  }

  pub(crate) fn load(&mut self, address: u64, width: Width) -> Result<u64, Error> {
    self.cover(address, width)?;
    match width {
      Width::Half => self.stack.read_u32(address).map(u64::from),
      Width::Word => self.stack.read_u64(address),
    }
  }

  pub(crate) fn store(&mut self, address: u64, width: Width, value: u64) -> Result<(), Error> {
    self.cover(address, width)?;
    match width {
      Width::Half => self.stack.write_u32(address, value as u32),
      Width::Word => self.stack.write_u64(address, value),
    }
  }

  pub(crate) fn link_target(&self) -> Result<u64, Error> {
    self.register(LINK_REGISTER)
  }

  /// Execute one instruction against the machine. `pc` is only touched by
  /// instructions that assign it.
  pub fn execute(&mut self, instruction: &Instruction) -> Result<Status, Error> {
    trace!(pc = self.pc, %instruction, "execute");
    execute::dispatch(self, instruction)
  }

  /// Fetch the instruction at `pc`, execute it, and move on to the next one
  /// unless it branched
  pub fn step<R>(&mut self, region: &R) -> Result<Status, Error>
  where
    R: Region,
  {
    let instruction = region.fetch(self.pc)?;
    let status = self.execute(instruction)?;
    if status == Status::Continue {
      self.pc = self.pc.wrapping_add(INSTRUCTION_BYTES);
    }
    Ok(status)
  }

  /// Step until `pc` leaves the region, an unsupported instruction is hit or
  /// the step budget is spent.
  pub fn run<R>(&mut self, region: &R) -> Result<Halt, Error>
  where
    R: Region,
  {
    self.run_with(region, |_| {})
  }

  /// Like [`Vm::run`], calling `observe` after every executed instruction.
  pub fn run_with<R, F>(&mut self, region: &R, mut observe: F) -> Result<Halt, Error>
  where
    R: Region,
    F: FnMut(&Self),
  {
    let mut steps = 0;
    loop {
      if !region.contains(self.pc) {
        return Ok(Halt::LeftCode { pc: self.pc });
      }
      if self.max_steps.is_some_and(|max| steps >= max) {
        return Ok(Halt::StepLimit { steps });
      }
      if let Status::Unsupported(opcode) = self.step(region)? {
        return Ok(Halt::Unsupported {
          opcode,
          pc: self.pc,
        });
      }
      steps += 1;
      observe(self);
    }
  }
}
