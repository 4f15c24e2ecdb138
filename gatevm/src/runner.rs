//! The execution engine: one [`Runner`] per run, owning a register file,
//! a transient string arena, and driving the threaded-dispatch interpreter
//! loop over a [`crate::handler::Handler`]'s code.

use crate::error::ExecutionError;
use crate::handler::Handler;
use crate::program::Program;
use gatevm_asm::{Opcode, Operands};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::any::Any;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// High bit of a register cell tags a string address as arena-local rather
/// than Program-pool; see the module doc for why this is still "untyped"
/// from the bytecode's point of view (it's an opaque handle, the cell
/// carries no further type information and a `MOV` never inspects it).
const ARENA_TAG: u64 = 1 << 63;

fn pool_address(index: usize) -> u64 {
    index as u64
}

fn arena_address(index: usize) -> u64 {
    ARENA_TAG | index as u64
}

fn split_address(addr: u64) -> (bool, usize) {
    (addr & ARENA_TAG != 0, (addr & !ARENA_TAG) as usize)
}

/// A cooperative cancellation flag a host may share with a running
/// [`Runner`] and flip from another thread; checked once per dispatch step.
/// Not part of `spec.md`'s core contract — `spec.md` §5 explicitly invites
/// this as the mechanism for implementing timeouts, since the core has no
/// other cancellation primitive.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum Flow {
    Continue,
    Jump(usize),
    Return(bool),
}

/// The single-shot execution context for one run of one [`Handler`].
///
/// `Ready → Running → Terminated{Accepted|Declined|Error}`: a `Runner` is
/// constructed `Ready`, `run()` drives it through `Running` to
/// `Terminated`, and re-running a terminated `Runner` is a programmer
/// error — `run()` returns an error immediately instead of silently
/// re-executing.
pub struct Runner<'p, 'rt> {
    handler: &'p Handler,
    program: &'p Program<'rt>,
    registers: Vec<u64>,
    arena: Vec<String>,
    instruction_counter: u64,
    last_match: Option<Vec<Option<String>>>,
    userdata: Option<Box<dyn Any>>,
    interrupt: InterruptHandle,
    instruction_limit: Option<u64>,
    sink: Box<dyn Write>,
    terminated: bool,
}

impl<'p, 'rt> Runner<'p, 'rt> {
    pub(crate) fn new(handler: &'p Handler, program: &'p Program<'rt>) -> Self {
        Runner {
            handler,
            program,
            registers: vec![0u64; handler.register_count()],
            arena: Vec::new(),
            instruction_counter: 0,
            last_match: None,
            userdata: None,
            interrupt: InterruptHandle::default(),
            instruction_limit: None,
            sink: Box::new(io::stdout()),
            terminated: false,
        }
    }

    /// Attach opaque host context, retrievable with [`Runner::userdata`].
    pub fn set_userdata(&mut self, value: impl Any) {
        self.userdata = Some(Box::new(value));
    }

    pub fn userdata(&self) -> Option<&dyn Any> {
        self.userdata.as_deref()
    }

    pub fn userdata_mut(&mut self) -> Option<&mut (dyn Any)> {
        self.userdata.as_deref_mut()
    }

    /// Redirect `SPRINT`/`NDUMPN` output; defaults to stdout.
    pub fn set_diagnostic_sink(&mut self, sink: Box<dyn Write>) {
        self.sink = sink;
    }

    /// A cooperative cancellation flag the host can trigger from another
    /// thread between instructions. See [`InterruptHandle`].
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Bound the number of instructions this run may execute; exceeding it
    /// is fatal (`ExecutionError::InstructionLimitExceeded`).
    pub fn set_instruction_limit(&mut self, limit: Option<u64>) {
        self.instruction_limit = limit;
    }

    pub fn registers(&self) -> &[u64] {
        &self.registers
    }

    /// Arena-allocate a new string and return its address, stable for the
    /// Runner's remaining lifetime. Native callbacks use this to produce
    /// string results (e.g. writing the address into `argv[0]`).
    pub fn create_string(&mut self, value: String) -> u64 {
        self.arena.push(value);
        arena_address(self.arena.len() - 1)
    }

    /// Resolve a register cell as a string, whether it addresses the
    /// Program's string pool or this Runner's arena.
    pub fn resolve_str(&self, addr: u64) -> Result<&str, ExecutionError> {
        let (is_arena, index) = split_address(addr);
        if is_arena {
            self.arena
                .get(index)
                .map(String::as_str)
                .ok_or(ExecutionError::ConstantIndexOutOfBounds { pool: "arena", index, len: self.arena.len() })
        } else {
            self.program
                .strings()
                .get(index)
                .ok_or(ExecutionError::ConstantIndexOutOfBounds { pool: "string", index, len: self.program.strings().len() })
        }
    }

    fn reg(&self, index: u8) -> Result<u64, ExecutionError> {
        self.registers
            .get(index as usize)
            .copied()
            .ok_or(ExecutionError::RegisterOutOfBounds(index as usize, self.registers.len()))
    }

    fn reg_i64(&self, index: u8) -> Result<i64, ExecutionError> {
        self.reg(index).map(|cell| cell as i64)
    }

    fn reg_str(&self, index: u8) -> Result<&str, ExecutionError> {
        self.resolve_str(self.reg(index)?)
    }

    fn set_reg(&mut self, index: u8, value: u64) -> Result<(), ExecutionError> {
        let len = self.registers.len();
        let cell = self
            .registers
            .get_mut(index as usize)
            .ok_or(ExecutionError::RegisterOutOfBounds(index as usize, len))?;
        *cell = value;
        Ok(())
    }

    fn set_reg_i64(&mut self, index: u8, value: i64) -> Result<(), ExecutionError> {
        self.set_reg(index, value as u64)
    }

    fn set_reg_bool(&mut self, index: u8, value: bool) -> Result<(), ExecutionError> {
        self.set_reg(index, value as u64)
    }

    fn set_reg_str(&mut self, index: u8, value: String) -> Result<(), ExecutionError> {
        let addr = self.create_string(value);
        self.set_reg(index, addr)
    }

    /// Run the handler to completion. Terminates on `EXIT` or on a
    /// `HANDLER` invocation whose post-call `argv[0]` is non-zero.
    pub fn run(&mut self) -> Result<bool, ExecutionError> {
        if self.terminated {
            return Err(ExecutionError::Interrupted);
        }

        let mut ip: usize = 0;
        loop {
            if let Some(limit) = self.instruction_limit {
                if self.instruction_counter >= limit {
                    self.terminated = true;
                    return Err(ExecutionError::InstructionLimitExceeded(limit));
                }
            }
            if self.interrupt.is_triggered() {
                self.terminated = true;
                return Err(ExecutionError::Interrupted);
            }

            match self.step(&mut ip) {
                Ok(Flow::Continue) | Ok(Flow::Jump(_)) => {}
                Ok(Flow::Return(accepted)) => {
                    self.terminated = true;
                    return Ok(accepted);
                }
                Err(e) => {
                    self.terminated = true;
                    tracing::error!(error = %e, ip, "run faulted");
                    return Err(e);
                }
            }
        }
    }

    /// Decode and execute one instruction, advancing `ip` in place for
    /// `Flow::Continue`/`Flow::Jump`. Split out of `run()` so every error
    /// exit, not just a successful `EXIT`/`HANDLER`-accept, funnels through
    /// one place that marks the Runner terminated.
    fn step(&mut self, ip: &mut usize) -> Result<Flow, ExecutionError> {
        let code = self.handler.code();
        let word = *code.get(*ip).ok_or(ExecutionError::JumpOutOfBounds(*ip, code.len()))?;
        let op = word.opcode().map_err(|e| ExecutionError::UnknownOpcode(e.0))?;
        self.instruction_counter += 1;
        tracing::trace!(ip = *ip, instruction = %word.disassemble(), "dispatch");

        let operands = word.operands(op);
        let flow = self.execute(op, operands)?;
        match flow {
            Flow::Continue => *ip += 1,
            Flow::Jump(target) => *ip = target,
            Flow::Return(_) => {}
        }
        Ok(flow)
    }

    fn execute(&mut self, op: Opcode, operands: Operands) -> Result<Flow, ExecutionError> {
        use Opcode::*;
        match (op, operands) {
            (Exit, Operands::I(d)) => Ok(Flow::Return(d != 0)),
            (Jmp, Operands::I(d)) => Ok(Flow::Jump(d as usize)),
            (Condbr, Operands::RI(a, d)) => {
                if self.reg(a)? != 0 {
                    Ok(Flow::Jump(d as usize))
                } else {
                    Ok(Flow::Continue)
                }
            }

            (Ndumpn, Operands::RI(a, d)) => {
                let mut parts = Vec::with_capacity(d as usize);
                for offset in 0..d as usize {
                    let index = a as usize + offset;
                    let value = self
                        .registers
                        .get(index)
                        .copied()
                        .ok_or(ExecutionError::RegisterOutOfBounds(index, self.registers.len()))?;
                    parts.push((value as i64).to_string());
                }
                let _ = writeln!(self.sink, "regdump: {}", parts.join(", "));
                Ok(Flow::Continue)
            }
            (Nticks, Operands::R(a)) => {
                self.set_reg(a, self.instruction_counter)?;
                Ok(Flow::Continue)
            }

            (Mov, Operands::RR(a, b)) => {
                let value = self.reg(b)?;
                self.set_reg(a, value)?;
                Ok(Flow::Continue)
            }
            (Imov, Operands::RI(a, d)) => {
                self.set_reg(a, d as u64)?;
                Ok(Flow::Continue)
            }
            (Nconst, Operands::RI(a, d)) => {
                let index = d as usize;
                let value = self.program.integers().get(index).ok_or(ExecutionError::ConstantIndexOutOfBounds {
                    pool: "integer",
                    index,
                    len: self.program.integers().len(),
                })?;
                self.set_reg_i64(a, value)?;
                Ok(Flow::Continue)
            }
            (Sconst, Operands::RI(a, d)) => {
                let index = d as usize;
                if self.program.strings().get(index).is_none() {
                    return Err(ExecutionError::ConstantIndexOutOfBounds {
                        pool: "string",
                        index,
                        len: self.program.strings().len(),
                    });
                }
                self.set_reg(a, pool_address(index))?;
                Ok(Flow::Continue)
            }

            (Nneg, Operands::RR(a, b)) => {
                let value = self.reg_i64(b)?;
                self.set_reg_i64(a, value.wrapping_neg())?;
                Ok(Flow::Continue)
            }

            (Nadd, Operands::RRR(a, b, c)) => self.alu(a, b, c, i64::wrapping_add),
            (Nsub, Operands::RRR(a, b, c)) => self.alu(a, b, c, i64::wrapping_sub),
            (Nmul, Operands::RRR(a, b, c)) => self.alu(a, b, c, i64::wrapping_mul),
            (Ndiv, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg_i64(b)?, self.reg_i64(c)?);
                if rhs == 0 {
                    return Err(ExecutionError::DivisionByZero);
                }
                if lhs == i64::MIN && rhs == -1 {
                    return Err(ExecutionError::IntegerOverflow);
                }
                self.set_reg_i64(a, lhs / rhs)?;
                Ok(Flow::Continue)
            }
            (Nrem, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg_i64(b)?, self.reg_i64(c)?);
                if rhs == 0 {
                    return Err(ExecutionError::DivisionByZero);
                }
                if lhs == i64::MIN && rhs == -1 {
                    return Err(ExecutionError::IntegerOverflow);
                }
                self.set_reg_i64(a, lhs % rhs)?;
                Ok(Flow::Continue)
            }
            (Nshl, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg_i64(b)?, self.reg_i64(c)?);
                self.set_reg_i64(a, lhs.wrapping_shl(rhs as u32 % 64))?;
                Ok(Flow::Continue)
            }
            (Nshr, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg(b)?, self.reg_i64(c)?);
                // Logical shift: no sign extension, operate on the raw u64.
                self.set_reg(a, lhs.wrapping_shr(rhs as u32 % 64))?;
                Ok(Flow::Continue)
            }
            (Npow, Operands::RRR(a, b, c)) => {
                // Mirrors the reference implementation's `powl` + truncate:
                // floating-point exponentiation sidesteps an unbounded loop
                // for large exponents, at the cost of precision past 2^53.
                let (base, exp) = (self.reg_i64(b)?, self.reg_i64(c)?);
                let result = (base as f64).powf(exp as f64);
                self.set_reg_i64(a, result as i64)?;
                Ok(Flow::Continue)
            }
            (Nand, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg(b)?, self.reg(c)?);
                self.set_reg(a, lhs & rhs)?;
                Ok(Flow::Continue)
            }
            (Nor, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg(b)?, self.reg(c)?);
                self.set_reg(a, lhs | rhs)?;
                Ok(Flow::Continue)
            }
            (Nxor, Operands::RRR(a, b, c)) => {
                let (lhs, rhs) = (self.reg(b)?, self.reg(c)?);
                self.set_reg(a, lhs ^ rhs)?;
                Ok(Flow::Continue)
            }

            (Ncmpeq, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x == y),
            (Ncmpne, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x != y),
            (Ncmple, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x <= y),
            (Ncmpge, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x >= y),
            (Ncmplt, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x < y),
            (Ncmpgt, Operands::RRR(a, b, c)) => self.cmp(a, b, c, |x, y| x > y),

            (Sadd, Operands::RRR(a, b, c)) => {
                let joined = format!("{}{}", self.reg_str(b)?, self.reg_str(c)?);
                self.set_reg_str(a, joined)?;
                Ok(Flow::Continue)
            }
            (Ssubstr, Operands::RRR(a, b, c)) => {
                let source = self.reg_str(b)?.to_string();
                let offset = self.reg_i64(c)?.max(0) as usize;
                let length = self.reg_i64(c + 1)?.max(0) as usize;
                let bytes = source.as_bytes();
                let start = offset.min(bytes.len());
                let end = start.saturating_add(length).min(bytes.len());
                // Byte-based, like the reference `std::string::substr`: a
                // clamped window may land mid-codepoint, so rebuild lossily
                // rather than panic on a non-boundary slice.
                let slice = String::from_utf8_lossy(&bytes[start..end]).into_owned();
                self.set_reg_str(a, slice)?;
                Ok(Flow::Continue)
            }
            (Scmpeq, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x == y),
            (Scmpne, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x != y),
            (Scmple, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x <= y),
            (Scmpge, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x >= y),
            (Scmplt, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x < y),
            (Scmpgt, Operands::RRR(a, b, c)) => self.scmp(a, b, c, |x, y| x > y),
            (Scmpbeg, Operands::RRR(a, b, c)) => {
                let (haystack, needle) = (self.reg_str(b)?.to_string(), self.reg_str(c)?.to_string());
                self.set_reg_bool(a, haystack.as_bytes().starts_with(needle.as_bytes()))?;
                Ok(Flow::Continue)
            }
            (Scmpend, Operands::RRR(a, b, c)) => {
                // Open Question (b): the reference implementation compares
                // `b[b.len-c.len .. b.len-c.len]` (always empty) instead of
                // the intended suffix window. This compares
                // `b[b.len-c.len..]` against `c`, as the spec requires.
                let (haystack, needle) = (self.reg_str(b)?.to_string(), self.reg_str(c)?.to_string());
                self.set_reg_bool(a, haystack.as_bytes().ends_with(needle.as_bytes()))?;
                Ok(Flow::Continue)
            }
            (Scontains, Operands::RRR(a, b, c)) => {
                let (haystack, needle) = (self.reg_str(b)?.to_string(), self.reg_str(c)?.to_string());
                self.set_reg_bool(a, haystack.contains(&needle))?;
                Ok(Flow::Continue)
            }
            (Slen, Operands::RR(a, b)) => {
                let len = self.reg_str(b)?.len() as i64;
                self.set_reg_i64(a, len)?;
                Ok(Flow::Continue)
            }
            (Sprint, Operands::R(a)) => {
                let text = self.reg_str(a)?.to_string();
                let _ = writeln!(self.sink, "{}", text);
                Ok(Flow::Continue)
            }

            (Sregmatch, Operands::RRR(a, b, c)) => {
                let haystack = self.reg_str(b)?.to_string();
                let index = c as usize;
                let regex = self
                    .program
                    .regexes()
                    .compiled(index)
                    .ok_or(ExecutionError::RegexNotCompiled(index))?;
                match regex.captures(&haystack) {
                    Some(caps) => {
                        let groups = (0..caps.len()).map(|i| caps.get(i).map(|m| m.as_str().to_string())).collect();
                        self.last_match = Some(groups);
                        self.set_reg_bool(a, true)?;
                    }
                    None => {
                        self.last_match = None;
                        self.set_reg_bool(a, false)?;
                    }
                }
                Ok(Flow::Continue)
            }
            (Sreggroup, Operands::RR(a, b)) => {
                let group = self.reg_i64(b)?;
                let value = if group < 0 {
                    String::new()
                } else {
                    self.last_match
                        .as_ref()
                        .and_then(|groups| groups.get(group as usize))
                        .cloned()
                        .flatten()
                        .unwrap_or_default()
                };
                self.set_reg_str(a, value)?;
                Ok(Flow::Continue)
            }

            (I2s, Operands::RR(a, b)) => {
                let value = self.reg_i64(b)?;
                self.set_reg_str(a, value.to_string())?;
                Ok(Flow::Continue)
            }
            (S2i, Operands::RR(a, b)) => {
                let text = self.reg_str(b)?.to_string();
                let value = text.trim().parse::<i64>().unwrap_or(0);
                self.set_reg_i64(a, value)?;
                Ok(Flow::Continue)
            }
            (Surlenc, Operands::RR(a, b)) => {
                let text = self.reg_str(b)?.to_string();
                let encoded = utf8_percent_encode(&text, NON_ALPHANUMERIC).to_string();
                self.set_reg_str(a, encoded)?;
                Ok(Flow::Continue)
            }
            (Surldec, Operands::RR(a, b)) => {
                let text = self.reg_str(b)?.to_string();
                let decoded = percent_decode_str(&text).decode_utf8_lossy().into_owned();
                self.set_reg_str(a, decoded)?;
                Ok(Flow::Continue)
            }

            (Call, Operands::RRR(a, b, c)) => self.invoke(a, b, c, false),
            (Handler, Operands::RRR(a, b, c)) => self.invoke(a, b, c, true),

            _ => unreachable!("opcode shape mismatch: {:?} with {:?}", op, operands),
        }
    }

    fn alu(&mut self, a: u8, b: u8, c: u8, f: impl Fn(i64, i64) -> i64) -> Result<Flow, ExecutionError> {
        let (lhs, rhs) = (self.reg_i64(b)?, self.reg_i64(c)?);
        self.set_reg_i64(a, f(lhs, rhs))?;
        Ok(Flow::Continue)
    }

    fn cmp(&mut self, a: u8, b: u8, c: u8, f: impl Fn(i64, i64) -> bool) -> Result<Flow, ExecutionError> {
        let (lhs, rhs) = (self.reg_i64(b)?, self.reg_i64(c)?);
        self.set_reg_bool(a, f(lhs, rhs))?;
        Ok(Flow::Continue)
    }

    fn scmp(&mut self, a: u8, b: u8, c: u8, f: impl Fn(&str, &str) -> bool) -> Result<Flow, ExecutionError> {
        let lhs = self.reg_str(b)?.to_string();
        let rhs = self.reg_str(c)?.to_string();
        self.set_reg_bool(a, f(&lhs, &rhs))?;
        Ok(Flow::Continue)
    }

    /// `A` and `B` are register-indirect — `reg[A]` is the native-symbol
    /// index, `reg[B]` is argc — while `C` is the literal base-register
    /// number of the argv window. (Confirmed against the worked `getcwd`/
    /// `print`/`assert` examples: the caller loads the index and argc into
    /// registers with `IMOV` before `CALL`/`HANDLER`, but the base register
    /// number is the bare operand.)
    fn invoke(&mut self, a: u8, b: u8, c: u8, is_handler: bool) -> Result<Flow, ExecutionError> {
        let index = self.reg(a)? as usize;
        let argc = self.reg_i64(b)? as i32;
        let len = argc.max(0) as usize;
        let base = c as usize;
        let reg_len = self.registers.len();
        if base.checked_add(len).map_or(true, |end| end > reg_len) {
            return Err(ExecutionError::RegisterOutOfBounds(base + len, reg_len));
        }

        let program = self.program;
        let callback = if is_handler { program.native_handler(index) } else { program.native_function(index) }
            .ok_or(ExecutionError::UnlinkedCallbackInvoked(index))?;

        let mut argv: Vec<u64> = self.registers[base..base + len].to_vec();
        callback.invoke(argc, &mut argv, self);
        let accepted = is_handler && argv.first().copied().unwrap_or(0) != 0;
        self.registers[base..base + len].copy_from_slice(&argv);

        if accepted {
            Ok(Flow::Return(true))
        } else {
            Ok(Flow::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{IntegerPool, ModulePool, RegexPool, StringPool};
    use crate::program::Program;
    use crate::runtime::CallbackRegistry;
    use gatevm_asm::{instr_imm, instr_imm_r, instr_r, instr_rr, instr_rrr, Opcode};

    fn program_with<'rt>(
        integers: Vec<i64>,
        strings: Vec<&str>,
        handler_sigs: Vec<&str>,
        function_sigs: Vec<&str>,
    ) -> Program<'rt> {
        Program::new(
            IntegerPool::new(integers),
            StringPool::new(strings.into_iter().map(String::from).collect()),
            RegexPool::new(vec![]),
            ModulePool::new(vec![]),
            handler_sigs.into_iter().map(String::from).collect(),
            function_sigs.into_iter().map(String::from).collect(),
        )
        .unwrap()
    }

    #[test]
    fn minimal_accept() {
        let mut program = program_with(vec![], vec![], vec![], vec![]);
        program.create_handler("h", vec![instr_imm(Opcode::Exit, 1)]).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
    }

    #[test]
    fn minimal_decline() {
        let mut program = program_with(vec![], vec![], vec![], vec![]);
        program.create_handler("h", vec![instr_imm(Opcode::Exit, 0)]).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(!runner.run().unwrap());
    }

    #[test]
    fn loop_sum_to_ten() {
        // r1 = 0; r2 = 0; r3 = 1; r4 = 4
        // loop: r1 += r3; r2 += r1; cond = r1 != r4; condbr cond -> loop
        // exit 1
        use Opcode::*;
        let code = vec![
            instr_imm_r(Imov, 1, 0), // r1 = 0
            instr_imm_r(Imov, 2, 0), // r2 = 0
            instr_imm_r(Imov, 3, 1), // r3 = 1 (step)
            instr_imm_r(Imov, 4, 4), // r4 = 4 (bound)
            // loop body starts at index 4
            instr_rrr(Nadd, 1, 1, 3), // r1 += 1
            instr_rrr(Nadd, 2, 2, 1), // r2 += r1
            instr_rrr(Ncmpne, 5, 1, 4), // r5 = r1 != r4
            instr_imm_r(Condbr, 5, 4), // if r5 jump to 4
            instr_imm(Exit, 1),
        ];
        let mut program = program_with(vec![], vec![], vec![], vec![]);
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
        assert_eq!(runner.registers()[2] as i64, 10);
    }

    #[test]
    fn string_concat_and_substring() {
        use Opcode::*;
        // pool: [0]=" " [1]="Hello" [2]="World"
        let mut program = program_with(vec![], vec![" ", "Hello", "World"], vec![], vec![]);
        let code = vec![
            instr_imm_r(Sconst, 0, 1), // r0 = "Hello"
            instr_imm_r(Sconst, 1, 0), // r1 = " "
            instr_imm_r(Sconst, 2, 2), // r2 = "World"
            instr_rrr(Sadd, 3, 0, 1),  // r3 = "Hello" + " "
            instr_rrr(Sadd, 3, 3, 2),  // r3 = r3 + "World" = "Hello World"
            instr_imm_r(Imov, 5, 1),   // r5 = offset 1
            instr_imm_r(Imov, 6, 9),   // r6 = length 9
            instr_rrr(Ssubstr, 4, 3, 5), // r4 = substr(r3, r5, r6)
            instr_imm(Exit, 1),
        ];
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
        assert_eq!(runner.resolve_str(runner.registers()[3]).unwrap(), "Hello World");
        assert_eq!(runner.resolve_str(runner.registers()[4]).unwrap(), "ello Worl");
    }

    #[test]
    fn prefix_suffix_and_contains() {
        use Opcode::*;
        let mut program = program_with(vec![], vec!["Hello World", "Hello", "World", "rl"], vec![], vec![]);
        let code = vec![
            instr_imm_r(Sconst, 0, 0),
            instr_imm_r(Sconst, 1, 1),
            instr_imm_r(Sconst, 2, 2),
            instr_imm_r(Sconst, 3, 3),
            instr_rrr(Scmpbeg, 4, 0, 1),
            instr_rrr(Scmpend, 5, 0, 2),
            instr_rrr(Scontains, 6, 0, 3),
            instr_imm(Exit, 1),
        ];
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
        assert_eq!(runner.registers()[4], 1);
        assert_eq!(runner.registers()[5], 1);
        assert_eq!(runner.registers()[6], 1);
    }

    #[test]
    fn division_by_zero_is_fatal() {
        use Opcode::*;
        let code = vec![
            instr_imm_r(Imov, 1, 5),
            instr_imm_r(Imov, 2, 0),
            instr_rrr(Ndiv, 3, 1, 2),
            instr_imm(Exit, 1),
        ];
        let mut program = program_with(vec![], vec![], vec![], vec![]);
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert_eq!(runner.run().unwrap_err(), ExecutionError::DivisionByZero);
    }

    #[test]
    fn min_int_div_by_neg_one_overflows() {
        use Opcode::*;
        let mut program = program_with(vec![i64::MIN, -1], vec![], vec![], vec![]);
        let code = vec![
            instr_imm_r(Nconst, 1, 0),
            instr_imm_r(Nconst, 2, 1),
            instr_rrr(Ndiv, 3, 1, 2),
            instr_imm(Exit, 1),
        ];
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert_eq!(runner.run().unwrap_err(), ExecutionError::IntegerOverflow);
    }

    #[test]
    fn unlinked_call_is_fatal() {
        use Opcode::*;
        let code = vec![instr_rrr(Call, 0, 1, 2), instr_imm(Exit, 1)];
        let mut program = program_with(vec![], vec![], vec![], vec!["print(S)I".into()]);
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert_eq!(runner.run().unwrap_err(), ExecutionError::UnlinkedCallbackInvoked(0));
    }

    #[test]
    fn handler_accept_via_native_short_circuits() {
        use crate::signature::Type;
        use Opcode::*;
        let mut registry = CallbackRegistry::new();
        registry.register_handler("assert", vec![Type::Boolean, Type::String], |_, argv, _| {
            argv[0] = 1;
        });

        let mut program = program_with(vec![], vec![" ", "Hello"], vec!["assert(BS)B"], vec![]);
        let code = vec![
            instr_imm_r(Imov, 0, 0),     // r0 = native symbol index 0
            instr_imm_r(Imov, 1, 3),     // r1 = argc 3
            instr_imm_r(Imov, 3, 1),     // argv[1] (r3) = true
            instr_imm_r(Sconst, 4, 1),   // argv[2] (r4) = "Hello"
            instr_rrr(Handler, 0, 1, 2), // reg-indirect symbol/argc, literal base r2
            instr_imm(Exit, 0),
        ];
        program.create_handler("h", code).unwrap();
        assert!(program.link(&mut registry));
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
    }

    #[test]
    fn url_encode_decode_round_trip() {
        use Opcode::*;
        let mut program = program_with(vec![], vec!["a b/c"], vec![], vec![]);
        let code = vec![
            instr_imm_r(Sconst, 0, 0),
            instr_rr(Surlenc, 1, 0),
            instr_rr(Surldec, 2, 1),
            instr_imm(Exit, 1),
        ];
        program.create_handler("h", code).unwrap();
        let mut runner = program.create_runner("h").unwrap();
        assert!(runner.run().unwrap());
        assert_eq!(runner.resolve_str(runner.registers()[1]).unwrap(), "a%20b%2Fc");
        assert_eq!(runner.resolve_str(runner.registers()[2]).unwrap(), "a b/c");
        let _ = instr_r(Opcode::Sprint, 0);
    }
}
