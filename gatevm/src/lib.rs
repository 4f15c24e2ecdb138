//! An embeddable interpreter for sandboxed "flow handler" bytecode programs.
//!
//! A [`program::Program`] holds a linked unit of constant pools and named
//! [`handler::Handler`]s; a host implements [`runtime::Runtime`] to supply
//! native callbacks, links the program against it once, and then spawns a
//! [`runner::Runner`] per invocation. See `gatevm_asm` for the instruction
//! set this crate executes.

pub mod error;
pub mod handler;
pub mod pool;
pub mod program;
pub mod runner;
pub mod runtime;
pub mod signature;

pub use error::{ExecutionError, LinkError, ProgramError};
pub use handler::Handler;
pub use pool::{IntegerPool, ModuleImport, ModulePool, RegexPool, StringPool};
pub use program::{modules_from_pairs, LinkReport, Program};
pub use runner::{InterruptHandle, Runner};
pub use runtime::{Callback, CallbackKind, CallbackRegistry, Runtime, SimpleRuntime};
pub use signature::{Signature, SignatureError, Type};

pub use gatevm_asm::{
    instr, instr_imm, instr_imm_r, instr_r, instr_rr, instr_rrr, register_count_for, Instruction,
    Opcode,
};
