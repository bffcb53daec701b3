//! Human readable rendering of the machine state.
//!
//! Rendering never mutates the machine. Call [`Vm::cover_sp`] first if the
//! stack should be extended to show where `sp` points.

use std::fmt;

use crate::stack::WORD_BYTES;
use crate::vm::{Condition, Vm};

const RULE: &str = "+-------------------------+";

/// Displays flags, live registers, `sp`, `pc` and every stack word.
#[derive(Debug, Clone, Copy)]
pub struct Dump<'vm>(pub &'vm Vm);

impl Vm {
  pub fn dump(&self) -> Dump<'_> {
    Dump(self)
  }
}

impl fmt::Display for Dump<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let vm = self.0;

    f.write_str("Condition codes:")?;
    match vm.condition() {
      Condition::None => {}
      Condition::Zero => f.write_str(" Z")?,
      Condition::Negative => f.write_str(" N")?,
      Condition::Positive => f.write_str(" P")?,
    }
    writeln!(f)?;

    writeln!(f, "Registers:")?;
    for (index, value) in vm.live_registers() {
      writeln!(f, "\tw/x{} = {:#x}", index, value)?;
    }
    writeln!(f, "\tsp = {:#X}", vm.sp())?;
    writeln!(f, "\tpc = {:#X}", vm.pc())?;

    writeln!(f, "Stack:")?;
    for (address, row) in vm.stack().rows() {
      let here = (address..address + WORD_BYTES).contains(&vm.sp());
      let marker = if here { "sp->" } else { "" };
      writeln!(f, "\t{:>10} {}", marker, RULE)?;
      write!(f, "\t{:#010X} |", address)?;
      for byte in row {
        write!(f, " {:02X}", byte)?;
      }
      writeln!(f, " |")?;
    }
    writeln!(f, "\t{:>10} {}", "", RULE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::operand::{Operand, Register};

  #[test]
  fn fresh_machine() {
    let vm = Vm::new(0x1000, 0);
    let expected = "Condition codes:\n\
                    Registers:\n\
                    \tsp = 0x1000\n\
                    \tpc = 0x0\n\
                    Stack:\n\
                    \t      sp-> +-------------------------+\n\
                    \t0x00001000 | 00 00 00 00 00 00 00 00 |\n\
                    \t           +-------------------------+\n";
    assert_eq!(vm.dump().to_string(), expected);
  }

  #[test]
  fn shows_live_registers_and_flag() {
    let mut vm = Vm::new(0x1000, 0);
    vm.write(&Register::x(0).into(), 8).unwrap();
    vm.write(&Register::w(30).into(), 0xAB).unwrap();
    vm.condition = Condition::Negative;
    let text = vm.dump().to_string();
    assert!(text.starts_with("Condition codes: N\n"));
    assert!(text.contains("\tw/x0 = 0x8\n"));
    assert!(text.contains("\tw/x30 = 0xab\n"));
    assert!(!text.contains("w/x1 "));
  }

  #[test]
  fn marks_row_holding_sp() {
    let mut vm = Vm::new(0x1000, 0);
    vm.write(&Register::sp().into(), 0xFF4).unwrap();
    let before = vm.dump().to_string();
    assert!(!before.contains("sp->"));
    assert_eq!(vm.stack().top(), 0x1000);

    vm.cover_sp().unwrap();
    let text = vm.dump().to_string();
    let lines: Vec<_> = text.lines().collect();
    let marked = lines.iter().position(|l| l.contains("sp->")).unwrap();
    assert_eq!(lines[marked + 1], "\t0x00000FF0 | 00 00 00 00 00 00 00 00 |");
    assert!(text.contains("\t0x00001000 |"));
  }

  #[test]
  fn renders_stored_bytes() {
    let mut vm = Vm::new(0x1000, 0);
    vm.write(&Register::x(1).into(), 0xDEADBEEF).unwrap();
    let address = vm
      .effective_address(&Operand::Memory {
        base: Register::sp(),
        offset: 0,
      })
      .unwrap();
    vm.store(address, crate::operand::Width::Word, 0xDEADBEEF)
      .unwrap();
    assert!(vm
      .dump()
      .to_string()
      .contains("\t0x00001000 | EF BE AD DE 00 00 00 00 |"));
  }
}
