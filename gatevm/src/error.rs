//! The error taxonomy: construction/link errors surface to the caller
//! immediately, execution errors terminate a [`crate::runner::Runner`] and
//! are reported through the diagnostic channel.

use crate::signature::SignatureError;
use thiserror::Error;

/// Raised while building a [`crate::program::Program`] or its handlers.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("malformed native signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("negative or out-of-range constant pool index: {pool} pool has {len} entries, got {index}")]
    PoolIndexOutOfRange { pool: &'static str, len: usize, index: usize },
    #[error("a handler named {0:?} already exists")]
    DuplicateHandler(String),
}

/// Raised by [`crate::program::Program::link`]'s detailed report.
/// `link` itself returns a `bool`; this is the per-failure detail behind it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("unresolved native symbol: {0}")]
    UnresolvedNativeSymbol(String),
    #[error("failed to import module {0:?}")]
    ImportFailed(String),
    #[error("regex pool entry {index} failed to compile: {pattern:?}: {reason}")]
    RegexCompilationError { index: usize, pattern: String, reason: String },
}

/// Fatal to a single [`crate::runner::Runner`] run; `run()` returns `false`
/// and the Runner is thereafter dead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("unknown opcode byte 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("jump to instruction index {0} is out of bounds (code length {1})")]
    JumpOutOfBounds(usize, usize),
    #[error("{pool} constant pool index {index} is out of bounds ({len} entries)")]
    ConstantIndexOutOfBounds { pool: &'static str, index: usize, len: usize },
    #[error("register index {0} is out of bounds (register file has {1} cells)")]
    RegisterOutOfBounds(usize, usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invoked native symbol at index {0} was never linked")]
    UnlinkedCallbackInvoked(usize),
    #[error("regex pool entry {0} was not compiled (link failed or was skipped)")]
    RegexNotCompiled(usize),
    #[error("run was interrupted by the host")]
    Interrupted,
    #[error("instruction limit of {0} exceeded")]
    InstructionLimitExceeded(u64),
}
