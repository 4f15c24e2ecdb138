//! A named bytecode subroutine owned by a [`crate::program::Program`].

use crate::program::Program;
use crate::runner::Runner;
use gatevm_asm::{register_count_for, Instruction};

/// An immutable code vector plus the register-file size it requires.
///
/// `spec.md` describes a Handler as also carrying "a back-pointer to the
/// owning Program". Since a Program owns its Handlers in a `Vec<Handler>`,
/// storing that back-pointer as a field would make Handler self-referential
/// into its own container — not expressible in safe Rust without an arena
/// index or `Rc`/`Weak`. This crate instead threads the owning `&Program`
/// through [`Handler::create_runner`] (and `Program::create_runner`, which
/// looks the handler up by name first), the same shape `fuel-vm`'s
/// `Interpreter<S>` uses for its storage parameter rather than storing a
/// cyclic reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    name: String,
    code: Vec<Instruction>,
    register_count: usize,
}

impl Handler {
    pub(crate) fn new(name: String, code: Vec<Instruction>) -> Self {
        let register_count = register_count_for(&code);
        Handler { name, code, register_count }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// `1 + max(operand used by any instruction, 0 if no code touches a
    /// register)`; see `gatevm_asm::register_count_for`.
    pub fn register_count(&self) -> usize {
        self.register_count
    }

    /// Pretty-print every instruction, one per line, as
    /// `<index>: <mnemonic r.., #d>`.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instr) in self.code.iter().enumerate() {
            out.push_str(&format!("{:>4}: {}\n", index, instr.disassemble()));
        }
        out
    }

    /// Create a fresh, single-shot [`Runner`] for this handler against its
    /// owning program.
    pub fn create_runner<'p, 'rt>(&'p self, program: &'p Program<'rt>) -> Runner<'p, 'rt> {
        Runner::new(self, program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatevm_asm::{instr_imm, Opcode};

    #[test]
    fn register_count_is_computed_at_construction() {
        let handler = Handler::new("accept".into(), vec![instr_imm(Opcode::Exit, 1)]);
        assert_eq!(handler.register_count(), 1);
    }

    #[test]
    fn disassemble_includes_every_instruction() {
        let handler = Handler::new(
            "h".into(),
            vec![instr_imm(Opcode::Jmp, 1), instr_imm(Opcode::Exit, 0)],
        );
        let text = handler.disassemble();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("jmp"));
        assert!(text.contains("exit"));
    }
}
