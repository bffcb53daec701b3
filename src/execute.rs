//! Semantic handlers, grouped by the kind of operation.
//!
//! Values are two's complement and wrap on overflow. Nothing here touches
//! the condition flag except `cmp`.

use tracing::warn;

use crate::opcode::Opcode;
use crate::operand::{Instruction, Operand, Register, RegisterKind, Width, LINK_REGISTER};
use crate::vm::{Condition, Error, Status, Vm};

pub(crate) fn dispatch(vm: &mut Vm, ins: &Instruction) -> Result<Status, Error> {
  match ins.opcode {
    Opcode::Add => binary_op(vm, ins, |a, b, _| a.wrapping_add(b))?,
    // subs leaves the flags alone
    Opcode::Sub | Opcode::Subs => binary_op(vm, ins, |a, b, _| a.wrapping_sub(b))?,
    Opcode::Mul => binary_op(vm, ins, |a, b, _| a.wrapping_mul(b))?,
    Opcode::Sdiv => binary_op(vm, ins, signed_divide)?,
    Opcode::Udiv => binary_op(vm, ins, |a, b, _| a.checked_div(b).unwrap_or(0))?,
    Opcode::Neg => unary_op(vm, ins, u64::wrapping_neg)?,
    Opcode::Lsl => binary_op(vm, ins, |a, b, _| a.wrapping_shl(b as u32))?,
    Opcode::Lsr => binary_op(vm, ins, |a, b, _| a.wrapping_shr(b as u32))?,
    Opcode::And => binary_op(vm, ins, |a, b, _| a & b)?,
    Opcode::Orr => binary_op(vm, ins, |a, b, _| a | b)?,
    Opcode::Eor => binary_op(vm, ins, |a, b, _| a ^ b)?,
    Opcode::Mvn => unary_op(vm, ins, |a| !a)?,
    Opcode::Mov => {
      let value = vm.read(operand(ins, 1)?)?;
      vm.write(operand(ins, 0)?, value)?;
    }
    Opcode::Ldr => load(vm, ins)?,
    Opcode::Clz => count_leading(vm, ins, count_leading_zeros)?,
    Opcode::Cls => count_leading(vm, ins, count_leading_signs)?,
    Opcode::Str => {
      store(vm, ins)?;
      return Ok(Status::Continue);
    }
    Opcode::Cmp => {
      compare(vm, ins)?;
      return Ok(Status::Continue);
    }
    Opcode::Nop => return Ok(Status::Continue),
    Opcode::B | Opcode::Bl => return branch(vm, ins),
    Opcode::Bne | Opcode::Beq | Opcode::Blt | Opcode::Bgt | Opcode::Ble | Opcode::Bge => {
      return conditional_branch(vm, ins)
    }
    Opcode::Ret => {
      vm.pc = vm.link_target()?;
      return Ok(Status::Branched);
    }
    Opcode::Ldp | Opcode::Stp | Opcode::Adrp | Opcode::Hlt => {
      warn!(pc = vm.pc, opcode = %ins.opcode, "instruction not implemented");
      return Ok(Status::Unsupported(ins.opcode));
    }
  }
  // the remaining opcodes write operand 0, which may be pc
  if targets_pc(ins) {
    return Ok(Status::Branched);
  }
  Ok(Status::Continue)
}

fn targets_pc(ins: &Instruction) -> bool {
  matches!(
    ins.operand(0),
    Some(Operand::Register(Register {
      kind: RegisterKind::Pc,
      ..
    }))
  )
}

fn operand(ins: &Instruction, index: usize) -> Result<&Operand, Error> {
  ins.operand(index).ok_or(Error::MissingOperand {
    opcode: ins.opcode,
    index,
  })
}

fn width_of(operand: &Operand) -> Width {
  operand.width().unwrap_or(Width::Word)
}

// reinterpret a value read through a view of `width` as signed
fn signed(value: u64, width: Width) -> i64 {
  match width {
    Width::Half => i64::from(value as u32 as i32),
    Width::Word => value as i64,
  }
}

fn signed_divide(a: u64, b: u64, width: Width) -> u64 {
  match width {
    Width::Half => match b as u32 as i32 {
      0 => 0,
      b => (a as u32 as i32).wrapping_div(b) as u32 as u64,
    },
    Width::Word => match b as i64 {
      0 => 0,
      b => (a as i64).wrapping_div(b) as u64,
    },
  }
}

// op0 ← op1 ∘ op2
fn binary_op(
  vm: &mut Vm,
  ins: &Instruction,
  op: impl Fn(u64, u64, Width) -> u64,
) -> Result<(), Error> {
  let dst = operand(ins, 0)?;
  let a = vm.read(operand(ins, 1)?)?;
  let b = vm.read(operand(ins, 2)?)?;
  vm.write(dst, op(a, b, width_of(dst)))
}

// op0 ← op(op1), for neg and mvn
fn unary_op(vm: &mut Vm, ins: &Instruction, op: impl Fn(u64) -> u64) -> Result<(), Error> {
  let dst = operand(ins, 0)?;
  let a = vm.read(operand(ins, 1)?)?;
  vm.write(dst, op(a))
}

// ldr and str move as many bytes as the register view holds
fn register_width(ins: &Instruction) -> Result<(&Operand, Width), Error> {
  let reg = operand(ins, 0)?;
  match reg.width() {
    Some(width) => Ok((reg, width)),
    None => Err(Error::NotRegister {
      opcode: ins.opcode,
      operand: *reg,
    }),
  }
}

fn load(vm: &mut Vm, ins: &Instruction) -> Result<(), Error> {
  let (reg, width) = register_width(ins)?;
  let address = vm.effective_address(operand(ins, 1)?)?;
  let value = vm.load(address, width)?;
  vm.write(reg, value)
}

fn store(vm: &mut Vm, ins: &Instruction) -> Result<(), Error> {
  let (reg, width) = register_width(ins)?;
  let address = vm.effective_address(operand(ins, 1)?)?;
  let value = vm.read(reg)?;
  vm.store(address, width, value)
}

// flags ← sign(op0 − op1), signed in the width of op0
fn compare(vm: &mut Vm, ins: &Instruction) -> Result<(), Error> {
  let lhs = operand(ins, 0)?;
  let width = width_of(lhs);
  let a = signed(vm.read(lhs)?, width);
  let b = signed(vm.read(operand(ins, 1)?)?, width);
  vm.condition = a.cmp(&b).into();
  Ok(())
}

fn branch(vm: &mut Vm, ins: &Instruction) -> Result<Status, Error> {
  let target = vm.read(operand(ins, 0)?)?;
  if ins.opcode == Opcode::Bl {
    vm.registers[usize::from(LINK_REGISTER)] = Some(vm.pc.wrapping_add(4));
  }
  vm.pc = target;
  Ok(Status::Branched)
}

/// Whether `opcode`'s predicate holds for the current flag.
pub fn taken(opcode: Opcode, condition: Condition) -> bool {
  use Condition::{Negative, Positive, Zero};
  match opcode {
    Opcode::Bne => matches!(condition, Negative | Positive),
    Opcode::Beq => condition == Zero,
    Opcode::Blt => condition == Negative,
    Opcode::Bgt => condition == Positive,
    Opcode::Ble => matches!(condition, Negative | Zero),
    Opcode::Bge => matches!(condition, Positive | Zero),
    _ => false,
  }
}

fn conditional_branch(vm: &mut Vm, ins: &Instruction) -> Result<Status, Error> {
  let target = vm.read(operand(ins, 0)?)?;
  if !taken(ins.opcode, vm.condition) {
    return Ok(Status::Continue);
  }
  vm.pc = target;
  Ok(Status::Branched)
}

/// Leading zero bits of `value` in `width`.
pub fn count_leading_zeros(value: u64, width: Width) -> u32 {
  match width {
    Width::Half => (value as u32).leading_zeros(),
    Width::Word => value.leading_zeros(),
  }
}

/// Bits following the sign bit of `value` in `width` that equal it.
pub fn count_leading_signs(value: u64, width: Width) -> u32 {
  let sign = (value >> (width.bits() - 1)) & 1;
  let value = if sign == 1 { !value } else { value };
  count_leading_zeros(value, width) - 1
}

fn count_leading(
  vm: &mut Vm,
  ins: &Instruction,
  count: fn(u64, Width) -> u32,
) -> Result<(), Error> {
  let src = operand(ins, 1)?;
  let value = vm.read(src)?;
  vm.write(operand(ins, 0)?, u64::from(count(value, width_of(src))))
}
