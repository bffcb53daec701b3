//! Assembly listing loader.
//!
//! One instruction per line, placed 4 bytes apart starting at `code_top`:
//!
//! ```text
//! // comments start with `//` or `;`
//!         mov  x0, #5
//! loop:   sub  x0, x0, #1
//!         str  w0, [sp, #-4]
//!         cmp  x0, #0
//!         bne  loop
//! ```
//!
//! `#imm` is a constant, a bare number or a label is an absolute address,
//! `[reg]` and `[reg, #imm]` are memory operands.

use std::collections::HashMap;

use crate::opcode::{Family, Opcode, UnknownMnemonic};
use crate::operand::{Instruction, Operand, Register, GENERAL_REGISTERS, LINK_REGISTER};
use crate::region::{Chunk, INSTRUCTION_BYTES};

/// A problem with a listing, reported against its 1-based line number
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
  #[error("line {line}: {source}")]
  Mnemonic { line: usize, source: UnknownMnemonic },

  #[error("line {line}: malformed operand `{text}`")]
  Operand { line: usize, text: String },

  #[error("line {line}: `{opcode}` takes {expected} operands, found {found}")]
  Arity {
    line: usize,
    opcode: Opcode,
    expected: usize,
    found: usize,
  },

  #[error("line {line}: label `{name}` is already defined")]
  DuplicateLabel { line: usize, name: String },

  #[error("line {line}: undefined label `{name}`")]
  UndefinedLabel { line: usize, name: String },

  #[error("line {line}: address does not fit in 64 bits")]
  AddressOverflow { line: usize },
}

struct Line<'src> {
  number: usize,
  mnemonic: &'src str,
  operands: Vec<&'src str>,
}

/// Parses `source` into a chunk whose first instruction lives at `code_top`.
pub fn parse(source: &str, code_top: u64) -> Result<Chunk, ListingError> {
  let mut labels = HashMap::new();
  let mut lines = Vec::new();

  for (i, raw) in source.lines().enumerate() {
    let number = i + 1;
    let address = || {
      u64::try_from(lines.len())
        .ok()
        .and_then(|index| index.checked_mul(INSTRUCTION_BYTES))
        .and_then(|offset| code_top.checked_add(offset))
        .ok_or(ListingError::AddressOverflow { line: number })
    };
    let mut text = strip_comment(raw).trim();
    if let Some((head, rest)) = text.split_once(':') {
      let name = head.trim();
      if is_identifier(name) {
        if labels.insert(name, address()?).is_some() {
          return Err(ListingError::DuplicateLabel {
            line: number,
            name: name.to_owned(),
          });
        }
        text = rest.trim();
      }
    }
    if text.is_empty() {
      continue;
    }
    address()?;
    let (mnemonic, rest) = text
      .split_once(char::is_whitespace)
      .unwrap_or((text, ""));
    lines.push(Line {
      number,
      mnemonic,
      operands: split_operands(rest),
    });
  }

  let instructions = lines
    .iter()
    .map(|line| assemble(line, &labels))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Chunk::new(code_top, instructions))
}

fn assemble(line: &Line<'_>, labels: &HashMap<&str, u64>) -> Result<Instruction, ListingError> {
  let opcode: Opcode = line
    .mnemonic
    .parse()
    .map_err(|source| ListingError::Mnemonic {
      line: line.number,
      source,
    })?;

  // never executed, so their operands are not worth understanding
  if opcode.family() == Family::Unsupported {
    return Ok(Instruction::new(opcode, []));
  }

  if line.operands.len() != opcode.arity() {
    return Err(ListingError::Arity {
      line: line.number,
      opcode,
      expected: opcode.arity(),
      found: line.operands.len(),
    });
  }
  let operands = line
    .operands
    .iter()
    .map(|text| parse_operand(text, line.number, labels))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Instruction::new(opcode, operands))
}

fn strip_comment(line: &str) -> &str {
  let end = [line.find("//"), line.find(';')]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(line.len());
  &line[..end]
}

fn is_identifier(text: &str) -> bool {
  let mut chars = text.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

// split on commas that are not inside `[...]`
fn split_operands(text: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (i, c) in text.char_indices() {
    match c {
      '[' => depth += 1,
      ']' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        out.push(text[start..i].trim());
        start = i + 1;
      }
      _ => {}
    }
  }
  let last = text[start..].trim();
  if !last.is_empty() || !out.is_empty() {
    out.push(last);
  }
  out
}

fn parse_number(text: &str) -> Option<u64> {
  let (negative, digits) = match text.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, text),
  };
  let magnitude = match digits
    .strip_prefix("0x")
    .or_else(|| digits.strip_prefix("0X"))
  {
    Some(hex) => u64::from_str_radix(hex, 16).ok()?,
    None => digits.parse::<u64>().ok()?,
  };
  Some(if negative {
    magnitude.wrapping_neg()
  } else {
    magnitude
  })
}

fn parse_register(text: &str) -> Option<Register> {
  let lower = text.to_ascii_lowercase();
  match lower.as_str() {
    "sp" => return Some(Register::sp()),
    "pc" => return Some(Register::pc()),
    "lr" => return Some(Register::x(LINK_REGISTER)),
    _ => {}
  }
  if !register_shaped(&lower) {
    return None;
  }
  let index: u8 = lower[1..].parse().ok()?;
  if usize::from(index) >= GENERAL_REGISTERS {
    return None;
  }
  match lower.as_bytes()[0] {
    b'x' => Some(Register::x(index)),
    b'w' => Some(Register::w(index)),
    _ => None,
  }
}

// `x<digits>` or `w<digits>`, whether or not the index exists
fn register_shaped(text: &str) -> bool {
  let mut chars = text.chars();
  matches!(chars.next(), Some('x' | 'w' | 'X' | 'W'))
    && !chars.as_str().is_empty()
    && chars.as_str().bytes().all(|b| b.is_ascii_digit())
}

fn parse_operand(
  text: &str,
  line: usize,
  labels: &HashMap<&str, u64>,
) -> Result<Operand, ListingError> {
  let malformed = || ListingError::Operand {
    line,
    text: text.to_owned(),
  };

  if let Some(inner) = text.strip_prefix('[') {
    let inner = inner.strip_suffix(']').ok_or_else(malformed)?;
    let (base, offset) = match inner.split_once(',') {
      Some((base, offset)) => {
        let offset = offset.trim();
        let offset = offset.strip_prefix('#').unwrap_or(offset);
        (base.trim(), parse_number(offset).ok_or_else(malformed)?)
      }
      None => (inner.trim(), 0),
    };
    let base = parse_register(base).ok_or_else(malformed)?;
    return Ok(Operand::Memory { base, offset });
  }

  if let Some(imm) = text.strip_prefix('#') {
    return parse_number(imm.trim())
      .map(Operand::Constant)
      .ok_or_else(malformed);
  }

  if let Some(reg) = parse_register(text) {
    return Ok(Operand::Register(reg));
  }

  if let Some(address) = parse_number(text) {
    return Ok(Operand::Address(address));
  }

  if is_identifier(text) && !register_shaped(text) {
    return labels
      .get(text)
      .copied()
      .map(Operand::Address)
      .ok_or_else(|| ListingError::UndefinedLabel {
        line,
        name: text.to_owned(),
      });
  }

  Err(malformed())
}

#[cfg(test)]
mod tests {
  use super::*;

  use rstest::rstest;

  use crate::region::Region;
  use crate::vm::{Halt, Vm};

  #[test]
  fn two_instruction_program() {
    let chunk = parse("mov x0, #5\nadd x0, x0, #3\n", 0).unwrap();
    assert_eq!(chunk.instructions().len(), 2);
    assert_eq!(chunk.code_bot(), 7);

    let mut vm = Vm::new(0x1000, 0);
    vm.step(&chunk).unwrap();
    vm.step(&chunk).unwrap();
    assert_eq!(vm.register(0).unwrap(), 8);
    assert_eq!(vm.pc(), 8);
  }

  #[test]
  fn labels_comments_and_blank_lines() {
    let source = "
      // sum 1..=4 into x1
      start:  mov x0, #4        ; counter
      loop:
              add x1, x1, x0
              sub x0, x0, #1
              cmp x0, #0
              bgt loop
      done:   hlt
    ";
    let chunk = parse(source, 0x400).unwrap();
    assert_eq!(chunk.instructions().len(), 6);
    assert_eq!(
      chunk.instructions()[4],
      Instruction::new(Opcode::Bgt, [Operand::Address(0x404)])
    );

    let mut vm = Vm::new(0x1000, 0x400);
    let halt = vm.run(&chunk).unwrap();
    assert_eq!(
      halt,
      Halt::Unsupported {
        opcode: Opcode::Hlt,
        pc: 0x414
      }
    );
    assert_eq!(vm.register(1).unwrap(), 10);
  }

  #[test]
  fn call_and_return() {
    let source = "
              mov x0, #6
              bl  double
              b   0x14
      double: add x0, x0, x0
              ret
    ";
    let chunk = parse(source, 0).unwrap();
    let mut vm = Vm::new(0x1000, 0);
    assert_eq!(vm.run(&chunk).unwrap(), Halt::LeftCode { pc: 0x14 });
    assert_eq!(vm.register(0).unwrap(), 12);
    assert_eq!(vm.register(30).unwrap(), 8);
  }

  #[test]
  fn stack_frame() {
    let source = "
      sub sp, sp, #16
      mov x1, #0xDEADBEEF
      str x1, [sp, #8]
      str w1, [sp]
      ldr x2, [sp, #8]
      ldr w3, [sp]
      add sp, sp, #16
    ";
    let chunk = parse(source, 0).unwrap();
    let mut vm = Vm::new(0x1000, 0);
    vm.run(&chunk).unwrap();
    assert_eq!(vm.register(2).unwrap(), 0xDEADBEEF);
    assert_eq!(vm.register(3).unwrap(), 0xDEADBEEF);
    assert_eq!(vm.sp(), 0x1000);
    assert_eq!(vm.stack().top(), 0xFF0);
  }

  #[rstest]
  #[case("#42", Operand::Constant(42))]
  #[case("#-1", Operand::Constant(u64::MAX))]
  #[case("#0x1F", Operand::Constant(0x1F))]
  #[case("0x40", Operand::Address(0x40))]
  #[case("x30", Operand::Register(Register::x(30)))]
  #[case("W7", Operand::Register(Register::w(7)))]
  #[case("lr", Operand::Register(Register::x(30)))]
  #[case("sp", Operand::Register(Register::sp()))]
  #[case("[sp]", Operand::Memory { base: Register::sp(), offset: 0 })]
  #[case("[x29, #-16]", Operand::Memory { base: Register::x(29), offset: (-16i64) as u64 })]
  fn operands(#[case] text: &str, #[case] expected: Operand) {
    assert_eq!(parse_operand(text, 1, &HashMap::new()), Ok(expected));
  }

  #[rstest]
  #[case("x31")]
  #[case("#abc")]
  #[case("[sp, #8")]
  #[case("[#8]")]
  #[case("%x0")]
  fn malformed_operands(#[case] text: &str) {
    assert!(matches!(
      parse_operand(text, 3, &HashMap::new()),
      Err(ListingError::Operand { line: 3, .. })
    ));
  }

  #[test]
  fn errors_carry_line_numbers() {
    assert!(matches!(
      parse("nop\nfmadd x0, x1, x2", 0),
      Err(ListingError::Mnemonic { line: 2, .. })
    ));
    assert_eq!(
      parse("\n\nadd x0, x1", 0),
      Err(ListingError::Arity {
        line: 3,
        opcode: Opcode::Add,
        expected: 3,
        found: 2
      })
    );
    assert_eq!(
      parse("a: nop\na: nop", 0),
      Err(ListingError::DuplicateLabel {
        line: 2,
        name: "a".to_owned()
      })
    );
    assert_eq!(
      parse("b nowhere", 0),
      Err(ListingError::UndefinedLabel {
        line: 1,
        name: "nowhere".to_owned()
      })
    );
  }

  #[test]
  fn code_must_fit_below_the_top_of_memory() {
    let chunk = parse("nop", u64::MAX - 3).unwrap();
    assert_eq!(chunk.code_top(), u64::MAX - 3);
    assert_eq!(
      parse("nop\nnop", u64::MAX - 3),
      Err(ListingError::AddressOverflow { line: 2 })
    );
    assert_eq!(
      parse("nop\nend:", u64::MAX - 3),
      Err(ListingError::AddressOverflow { line: 2 })
    );
  }

  #[test]
  fn unsupported_operands_are_dropped() {
    let chunk = parse("stp x29, x30, [sp, #-16]!", 0).unwrap();
    assert_eq!(chunk.instructions()[0], Instruction::new(Opcode::Stp, []));
  }

  #[test]
  fn error_message() {
    let err = parse("mov x0, ?", 0).unwrap_err();
    assert_eq!(err.to_string(), "line 1: malformed operand `?`");
  }
}
