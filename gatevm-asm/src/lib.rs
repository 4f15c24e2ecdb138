//! Instruction set, word encoding, and register-count analysis for `gatevm`.
//!
//! This crate has no notion of a running program: it only knows how to turn
//! opcodes and operands into 32-bit words and back, and how to size a
//! register file from a code stream. The interpreter lives in the `gatevm`
//! crate.

pub mod instruction;
pub mod opcode;
pub mod signature;

pub use instruction::{
    instr, instr_imm, instr_imm_r, instr_r, instr_rr, instr_rrr, register_count_for, Instruction,
};
pub use opcode::{Opcode, UnknownOpcode};
pub use signature::{OperandShape, Operands};
