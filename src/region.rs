use crate::operand::Instruction;
use crate::vm::Error;

/// Size in bytes of one instruction slot.
pub const INSTRUCTION_BYTES: u64 = 4;

/// A region of decoded instructions laid out contiguously from `code_top`
pub trait Region {
  fn instructions(&self) -> &[Instruction];

  /// Address of the first instruction.
  fn code_top(&self) -> u64;

  /// Inclusive address of the last byte occupied by the region.
  fn code_bot(&self) -> u64 {
    let len = self.instructions().len() as u64;
    self
      .code_top()
      .wrapping_add(len * INSTRUCTION_BYTES)
      .wrapping_sub(1)
  }

  fn contains(&self, pc: u64) -> bool {
    let len = self.instructions().len() as u64;
    pc >= self.code_top() && pc - self.code_top() < len * INSTRUCTION_BYTES
  }

  /// Maps `pc` onto the instruction it addresses, `(pc - code_top) / 4`.
  fn fetch(&self, pc: u64) -> Result<&Instruction, Error> {
    if !self.contains(pc) {
      return Err(Error::FetchOutOfRange { pc });
    }
    let delta = pc - self.code_top();
    if delta % INSTRUCTION_BYTES != 0 {
      return Err(Error::MisalignedPc { pc });
    }
    self
      .instructions()
      .get((delta / INSTRUCTION_BYTES) as usize)
      .ok_or(Error::FetchOutOfRange { pc })
  }
}

/// A `Chunk` is a single owned region of instructions that our virtual
/// machine may execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
  top: u64,
  instructions: Vec<Instruction>,
}

impl Chunk {
  pub fn new(top: u64, instructions: Vec<Instruction>) -> Self {
    Self { top, instructions }
  }
}

impl From<Vec<Instruction>> for Chunk {
  fn from(instructions: Vec<Instruction>) -> Self {
    Self::new(0, instructions)
  }
}

impl Region for Chunk {
  fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  fn code_top(&self) -> u64 {
    self.top
  }
}
