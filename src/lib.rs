//! Instruction-level simulator for a reduced AArch64-like register machine.
//!
//! The machine has 31 general purpose registers (with 32 and 64 bit views),
//! a stack pointer, a program counter, a single mutually exclusive condition
//! flag and a stack region that grows on demand in either direction.
//!
//! Programs are handed over as a [`region::Region`] of decoded
//! [`operand::Instruction`]s, usually produced by [`listing::parse`].

pub mod config;
pub mod dump;
pub mod execute;
pub mod listing;
pub mod opcode;
pub mod operand;
pub mod region;
pub mod stack;
pub mod vm;
