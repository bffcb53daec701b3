use std::fmt;

use crate::opcode::Opcode;

/// Number of general purpose registers, `x0` through `x30`.
pub const GENERAL_REGISTERS: usize = 31;

/// The link register, written by `bl` and read by `ret`.
pub const LINK_REGISTER: u8 = 30;

/// Which slot a register operand names, and through which view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterKind {
  /// Low 32 bits of a general register (`w0`..`w30`).
  W,
  /// All 64 bits of a general register (`x0`..`x30`).
  X,
  Sp,
  Pc,
}

/// Access width of a register view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
  Half,
  Word,
}

impl Width {
  pub const fn bits(self) -> u32 {
    match self {
      Self::Half => 32,
      Self::Word => 64,
    }
  }

  pub const fn bytes(self) -> u64 {
    self.bits() as u64 / 8
  }
}

/// A register reference. `index` is only meaningful for `W` and `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register {
  pub kind: RegisterKind,
  pub index: u8,
}

impl Register {
  pub const fn w(index: u8) -> Self {
    Self { kind: RegisterKind::W, index }
  }

  pub const fn x(index: u8) -> Self {
    Self { kind: RegisterKind::X, index }
  }

  pub const fn sp() -> Self {
    Self { kind: RegisterKind::Sp, index: 0 }
  }

  pub const fn pc() -> Self {
    Self { kind: RegisterKind::Pc, index: 0 }
  }

  pub const fn width(self) -> Width {
    match self.kind {
      RegisterKind::W => Width::Half,
      RegisterKind::X | RegisterKind::Sp | RegisterKind::Pc => Width::Word,
    }
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      RegisterKind::W => write!(f, "w{}", self.index),
      RegisterKind::X => write!(f, "x{}", self.index),
      RegisterKind::Sp => f.write_str("sp"),
      RegisterKind::Pc => f.write_str("pc"),
    }
  }
}

/// A single instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
  Constant(u64),
  /// An absolute address; reads exactly like a constant.
  Address(u64),
  Register(Register),
  /// `[base, #offset]`, resolving to `base + offset`.
  Memory { base: Register, offset: u64 },
}

impl Operand {
  /// Width of the register view this operand reads through, if it is one.
  pub fn width(&self) -> Option<Width> {
    match self {
      Self::Register(reg) => Some(reg.width()),
      _ => None,
    }
  }
}

impl From<Register> for Operand {
  fn from(reg: Register) -> Self {
    Self::Register(reg)
  }
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Constant(value) => write!(f, "#{:#x}", value),
      Self::Address(address) => write!(f, "{:#x}", address),
      Self::Register(reg) => fmt::Display::fmt(reg, f),
      Self::Memory { base, offset: 0 } => write!(f, "[{}]", base),
      Self::Memory { base, offset } => write!(f, "[{}, #{}]", base, *offset as i64),
    }
  }
}

/// An opcode plus up to three operands, destination first.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
  pub opcode: Opcode,
  pub operands: Vec<Operand>,
}

impl Instruction {
  pub fn new(opcode: Opcode, operands: impl IntoIterator<Item = Operand>) -> Self {
    Self {
      opcode,
      operands: operands.into_iter().collect(),
    }
  }

  pub fn operand(&self, index: usize) -> Option<&Operand> {
    self.operands.get(index)
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.opcode.mnemonic())?;
    for (i, operand) in self.operands.iter().enumerate() {
      let sep = if i == 0 { " " } else { ", " };
      write!(f, "{}{}", sep, operand)?;
    }
    Ok(())
  }
}
