use std::fmt;
use std::str::FromStr;

/// Every operation the loader understands.
///
/// Operands are written destination first, as in the listing syntax. `op0`,
/// `op1` and `op2` refer to the operand positions of an
/// [`Instruction`](crate::operand::Instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Opcode {
  /// | Operation | Semantics/RTL         | Assembly         |
  /// |-----------|-----------------------|------------------|
  /// | Add       | `op0 ← op1 + op2`     | `add x0, x1, x2` |
  Add,

  /// | Operation | Semantics/RTL         | Assembly         |
  /// |-----------|-----------------------|------------------|
  /// | Subtract  | `op0 ← op1 − op2`     | `sub x0, x1, #4` |
  Sub,

  /// Same as [`Opcode::Sub`]; the flags are left alone.
  ///
  /// | Operation    | Semantics/RTL     | Assembly          |
  /// |--------------|-------------------|-------------------|
  /// | Subtract (S) | `op0 ← op1 − op2` | `subs x0, x1, x2` |
  Subs,

  /// | Operation | Semantics/RTL     | Assembly         |
  /// |-----------|-------------------|------------------|
  /// | Multiply  | `op0 ← op1 × op2` | `mul x0, x1, x2` |
  Mul,

  /// Signed division in the width of `op0`. Division by zero gives zero.
  ///
  /// | Operation     | Semantics/RTL     | Assembly          |
  /// |---------------|-------------------|-------------------|
  /// | Signed Divide | `op0 ← op1 ÷ op2` | `sdiv x0, x1, x2` |
  Sdiv,

  /// Unsigned division. Division by zero gives zero.
  ///
  /// | Operation       | Semantics/RTL     | Assembly          |
  /// |-----------------|-------------------|-------------------|
  /// | Unsigned Divide | `op0 ← op1 ÷ op2` | `udiv x0, x1, x2` |
  Udiv,

  /// | Operation | Semantics/RTL  | Assembly     |
  /// |-----------|----------------|--------------|
  /// | Negate    | `op0 ← −op1`   | `neg x0, x1` |
  Neg,

  /// | Operation           | Semantics/RTL        | Assembly         |
  /// |---------------------|----------------------|------------------|
  /// | Logical Shift Left  | `op0 ← op1 << op2`   | `lsl x0, x1, #2` |
  Lsl,

  /// | Operation           | Semantics/RTL        | Assembly         |
  /// |---------------------|----------------------|------------------|
  /// | Logical Shift Right | `op0 ← op1 >> op2`   | `lsr x0, x1, #2` |
  Lsr,

  /// | Operation   | Semantics/RTL     | Assembly         |
  /// |-------------|-------------------|------------------|
  /// | Bitwise AND | `op0 ← op1 & op2` | `and x0, x1, x2` |
  And,

  /// | Operation  | Semantics/RTL     | Assembly         |
  /// |------------|-------------------|------------------|
  /// | Bitwise OR | `op0 ← op1 | op2` | `orr x0, x1, x2` |
  Orr,

  /// | Operation   | Semantics/RTL     | Assembly         |
  /// |-------------|-------------------|------------------|
  /// | Bitwise XOR | `op0 ← op1 ^ op2` | `eor x0, x1, x2` |
  Eor,

  /// | Operation   | Semantics/RTL | Assembly     |
  /// |-------------|---------------|--------------|
  /// | Bitwise NOT | `op0 ← ~op1`  | `mvn x0, x1` |
  Mvn,

  /// | Operation | Semantics/RTL | Assembly     |
  /// |-----------|---------------|--------------|
  /// | Move      | `op0 ← op1`   | `mov x0, #5` |
  Mov,

  /// Loads 4 bytes for a `w` destination, 8 bytes otherwise.
  ///
  /// | Operation | Semantics/RTL          | Assembly             |
  /// |-----------|------------------------|----------------------|
  /// | Load      | `op0 ← m[base + off]`  | `ldr x0, [sp, #8]`   |
  Ldr,

  /// Stores 4 bytes for a `w` source, 8 bytes otherwise.
  ///
  /// | Operation | Semantics/RTL          | Assembly             |
  /// |-----------|------------------------|----------------------|
  /// | Store     | `m[base + off] ← op0`  | `str x0, [sp, #8]`   |
  Str,

  /// Sets exactly one of the zero, negative or positive flags from the
  /// signed difference `op0 − op1`.
  ///
  /// | Operation | Semantics/RTL             | Assembly     |
  /// |-----------|---------------------------|--------------|
  /// | Compare   | `flags ← sign(op0 − op1)` | `cmp x0, #3` |
  Cmp,

  /// | Operation | Semantics/RTL | Assembly   |
  /// |-----------|---------------|------------|
  /// | Branch    | `pc ← op0`    | `b 0x40`   |
  B,

  /// | Operation       | Semantics/RTL                | Assembly   |
  /// |-----------------|------------------------------|------------|
  /// | Branch and Link | `x30 ← pc + 4` ; `pc ← op0`  | `bl 0x40`  |
  Bl,

  /// | Operation        | Semantics/RTL             | Assembly    |
  /// |------------------|---------------------------|-------------|
  /// | Branch Not Equal | `if ¬Z : pc ← op0`        | `bne 0x40`  |
  Bne,

  /// | Operation    | Semantics/RTL        | Assembly    |
  /// |--------------|----------------------|-------------|
  /// | Branch Equal | `if Z : pc ← op0`    | `beq 0x40`  |
  Beq,

  /// | Operation        | Semantics/RTL      | Assembly    |
  /// |------------------|--------------------|-------------|
  /// | Branch Less Than | `if N : pc ← op0`  | `blt 0x40`  |
  Blt,

  /// | Operation           | Semantics/RTL      | Assembly    |
  /// |---------------------|--------------------|-------------|
  /// | Branch Greater Than | `if P : pc ← op0`  | `bgt 0x40`  |
  Bgt,

  /// | Operation            | Semantics/RTL          | Assembly    |
  /// |----------------------|------------------------|-------------|
  /// | Branch Less or Equal | `if N ∨ Z : pc ← op0`  | `ble 0x40`  |
  Ble,

  /// | Operation               | Semantics/RTL          | Assembly    |
  /// |-------------------------|------------------------|-------------|
  /// | Branch Greater or Equal | `if P ∨ Z : pc ← op0`  | `bge 0x40`  |
  Bge,

  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | Return    | `pc ← x30`    | `ret`    |
  Ret,

  /// | Operation | Semantics/RTL  | Assembly |
  /// |-----------|----------------|----------|
  /// | nop       | `(do nothing)` | `nop`    |
  Nop,

  /// Zero bits above the most significant set bit of `op1`, counted in the
  /// width of `op1`.
  ///
  /// | Operation            | Semantics/RTL   | Assembly     |
  /// |----------------------|-----------------|--------------|
  /// | Count Leading Zeros  | `op0 ← clz(op1)`| `clz x0, x1` |
  Clz,

  /// Bits below the sign bit of `op1` that are equal to it.
  ///
  /// | Operation            | Semantics/RTL   | Assembly     |
  /// |----------------------|-----------------|--------------|
  /// | Count Leading Signs  | `op0 ← cls(op1)`| `cls x0, x1` |
  Cls,

  /// Decoded but never executed.
  Ldp,
  /// Decoded but never executed.
  Stp,
  /// Decoded but never executed.
  Adrp,
  /// Decoded but never executed; the driver stops on it.
  Hlt,
}

/// The semantic group an [`Opcode`] is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
  Arithmetic,
  Bitwise,
  MoveLoadStore,
  Compare,
  Branch,
  ConditionalBranch,
  Return,
  Nop,
  CountLeading,
  Unsupported,
}

impl Opcode {
  pub const fn family(self) -> Family {
    match self {
      Self::Add | Self::Sub | Self::Subs | Self::Mul | Self::Sdiv | Self::Udiv | Self::Neg => {
        Family::Arithmetic
      }
      Self::Lsl | Self::Lsr | Self::And | Self::Orr | Self::Eor | Self::Mvn => Family::Bitwise,
      Self::Mov | Self::Ldr | Self::Str => Family::MoveLoadStore,
      Self::Cmp => Family::Compare,
      Self::B | Self::Bl => Family::Branch,
      Self::Bne | Self::Beq | Self::Blt | Self::Bgt | Self::Ble | Self::Bge => {
        Family::ConditionalBranch
      }
      Self::Ret => Family::Return,
      Self::Nop => Family::Nop,
      Self::Clz | Self::Cls => Family::CountLeading,
      Self::Ldp | Self::Stp | Self::Adrp | Self::Hlt => Family::Unsupported,
    }
  }

  /// Number of operands the listing must supply.
  pub const fn arity(self) -> usize {
    match self {
      Self::Ret | Self::Nop | Self::Hlt => 0,
      Self::B
      | Self::Bl
      | Self::Bne
      | Self::Beq
      | Self::Blt
      | Self::Bgt
      | Self::Ble
      | Self::Bge => 1,
      Self::Neg
      | Self::Mvn
      | Self::Mov
      | Self::Ldr
      | Self::Str
      | Self::Cmp
      | Self::Clz
      | Self::Cls
      | Self::Adrp => 2,
      Self::Add
      | Self::Sub
      | Self::Subs
      | Self::Mul
      | Self::Sdiv
      | Self::Udiv
      | Self::Lsl
      | Self::Lsr
      | Self::And
      | Self::Orr
      | Self::Eor
      | Self::Ldp
      | Self::Stp => 3,
    }
  }

  pub const fn mnemonic(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Sub => "sub",
      Self::Subs => "subs",
      Self::Mul => "mul",
      Self::Sdiv => "sdiv",
      Self::Udiv => "udiv",
      Self::Neg => "neg",
      Self::Lsl => "lsl",
      Self::Lsr => "lsr",
      Self::And => "and",
      Self::Orr => "orr",
      Self::Eor => "eor",
      Self::Mvn => "mvn",
      Self::Mov => "mov",
      Self::Ldr => "ldr",
      Self::Str => "str",
      Self::Cmp => "cmp",
      Self::B => "b",
      Self::Bl => "bl",
      Self::Bne => "bne",
      Self::Beq => "beq",
      Self::Blt => "blt",
      Self::Bgt => "bgt",
      Self::Ble => "ble",
      Self::Bge => "bge",
      Self::Ret => "ret",
      Self::Nop => "nop",
      Self::Clz => "clz",
      Self::Cls => "cls",
      Self::Ldp => "ldp",
      Self::Stp => "stp",
      Self::Adrp => "adrp",
      Self::Hlt => "hlt",
    }
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

/// Returned when a mnemonic names no known opcode.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mnemonic `{0}`")]
pub struct UnknownMnemonic(pub String);

impl FromStr for Opcode {
  type Err = UnknownMnemonic;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let op = match s.to_ascii_lowercase().as_str() {
      "add" => Self::Add,
      "sub" => Self::Sub,
      "subs" => Self::Subs,
      "mul" => Self::Mul,
      "sdiv" => Self::Sdiv,
      "udiv" => Self::Udiv,
      "neg" => Self::Neg,
      "lsl" => Self::Lsl,
      "lsr" => Self::Lsr,
      "and" => Self::And,
      "orr" => Self::Orr,
      "eor" => Self::Eor,
      "mvn" => Self::Mvn,
      "mov" => Self::Mov,
      "ldr" => Self::Ldr,
      "str" => Self::Str,
      "cmp" => Self::Cmp,
      "b" => Self::B,
      "bl" => Self::Bl,
      "bne" | "b.ne" => Self::Bne,
      "beq" | "b.eq" => Self::Beq,
      "blt" | "b.lt" => Self::Blt,
      "bgt" | "b.gt" => Self::Bgt,
      "ble" | "b.le" => Self::Ble,
      "bge" | "b.ge" => Self::Bge,
      "ret" => Self::Ret,
      "nop" => Self::Nop,
      "clz" => Self::Clz,
      "cls" => Self::Cls,
      "ldp" => Self::Ldp,
      "stp" => Self::Stp,
      "adrp" => Self::Adrp,
      "hlt" => Self::Hlt,
      _ => return Err(UnknownMnemonic(s.to_owned())),
    };
    Ok(op)
  }
}
