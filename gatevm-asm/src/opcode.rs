//! Opcode enumeration and static per-opcode metadata.

use crate::signature::OperandShape;
use consts::*;
use core::convert::TryFrom;
use core::fmt;

pub mod consts {
    //! Raw byte values backing [`super::Opcode`] variants.

    // control
    pub const OP_EXIT: u8 = 0x00;
    pub const OP_JMP: u8 = 0x01;
    pub const OP_CONDBR: u8 = 0x02;

    // diagnostics
    pub const OP_NDUMPN: u8 = 0x03;
    pub const OP_NTICKS: u8 = 0x04;

    // copy
    pub const OP_MOV: u8 = 0x05;
    pub const OP_IMOV: u8 = 0x06;
    pub const OP_NCONST: u8 = 0x07;
    pub const OP_SCONST: u8 = 0x08;

    // integer arithmetic
    pub const OP_NNEG: u8 = 0x09;
    pub const OP_NADD: u8 = 0x0a;
    pub const OP_NSUB: u8 = 0x0b;
    pub const OP_NMUL: u8 = 0x0c;
    pub const OP_NDIV: u8 = 0x0d;
    pub const OP_NREM: u8 = 0x0e;
    pub const OP_NSHL: u8 = 0x0f;
    pub const OP_NSHR: u8 = 0x10;
    pub const OP_NPOW: u8 = 0x11;
    pub const OP_NAND: u8 = 0x12;
    pub const OP_NOR: u8 = 0x13;
    pub const OP_NXOR: u8 = 0x14;

    // integer comparison
    pub const OP_NCMPEQ: u8 = 0x15;
    pub const OP_NCMPNE: u8 = 0x16;
    pub const OP_NCMPLE: u8 = 0x17;
    pub const OP_NCMPGE: u8 = 0x18;
    pub const OP_NCMPLT: u8 = 0x19;
    pub const OP_NCMPGT: u8 = 0x1a;

    // string
    pub const OP_SADD: u8 = 0x1b;
    pub const OP_SSUBSTR: u8 = 0x1c;
    pub const OP_SCMPEQ: u8 = 0x1d;
    pub const OP_SCMPNE: u8 = 0x1e;
    pub const OP_SCMPLE: u8 = 0x1f;
    pub const OP_SCMPGE: u8 = 0x20;
    pub const OP_SCMPLT: u8 = 0x21;
    pub const OP_SCMPGT: u8 = 0x22;
    pub const OP_SCMPBEG: u8 = 0x23;
    pub const OP_SCMPEND: u8 = 0x24;
    pub const OP_SCONTAINS: u8 = 0x25;
    pub const OP_SLEN: u8 = 0x26;
    pub const OP_SPRINT: u8 = 0x27;

    // regex
    pub const OP_SREGMATCH: u8 = 0x28;
    pub const OP_SREGGROUP: u8 = 0x29;

    // conversion
    pub const OP_I2S: u8 = 0x2a;
    pub const OP_S2I: u8 = 0x2b;
    pub const OP_SURLENC: u8 = 0x2c;
    pub const OP_SURLDEC: u8 = 0x2d;

    // invocation
    pub const OP_CALL: u8 = 0x2e;
    pub const OP_HANDLER: u8 = 0x2f;
}

/// The closed instruction set executed by a [`crate::Instruction`] stream.
///
/// Opcodes are grouped by family and prefixed accordingly: `N*` operates on
/// registers interpreted as signed 64-bit integers, `S*` on registers
/// interpreted as string-arena addresses, `I*` converts between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[repr(u8)]
pub enum Opcode {
    /// Terminate the run.
    ///
    /// | Operation | `return D != 0` |
    /// | Encoding  | `I(D)`          |
    Exit = OP_EXIT,

    /// Unconditional jump to instruction index `D`.
    Jmp = OP_JMP,

    /// Jump to `D` if register `A` is non-zero, else fall through.
    Condbr = OP_CONDBR,

    /// Print registers `A..A+D-1` as signed integers to the diagnostic sink.
    Ndumpn = OP_NDUMPN,

    /// `R[A] <- instruction counter so far`. Advisory only.
    Nticks = OP_NTICKS,

    /// `R[A] <- R[B]`, copying the raw 64-bit cell regardless of how it is
    /// currently interpreted.
    Mov = OP_MOV,

    /// `R[A] <- zero_extend(D)`.
    Imov = OP_IMOV,

    /// `R[A] <- integer_pool[D]`.
    Nconst = OP_NCONST,

    /// `R[A] <- address_of(string_pool[D])`.
    Sconst = OP_SCONST,

    /// `R[A] <- -as_i64(R[B])` (two's-complement wrapping negation).
    Nneg = OP_NNEG,

    /// Integer addition.
    ///
    /// | Operation | ```$rA = $rB + $rC;``` |
    /// | Encoding  | `RRR(A, B, C)`         |
    ///
    /// Result is stored as the raw bit pattern of a wrapping `i64` add.
    Nadd = OP_NADD,
    /// Integer subtraction. See [`Opcode::Nadd`] for encoding/wrap behavior.
    Nsub = OP_NSUB,
    /// Integer multiplication. See [`Opcode::Nadd`].
    Nmul = OP_NMUL,
    /// Integer division. Fails the run with a division-by-zero or overflow
    /// error for `R[C] == 0` or `i64::MIN / -1`.
    Ndiv = OP_NDIV,
    /// Integer remainder. Same fault conditions as [`Opcode::Ndiv`].
    Nrem = OP_NREM,
    /// Logical left shift; shift count taken modulo 64.
    Nshl = OP_NSHL,
    /// Logical right shift (no sign extension); shift count taken modulo 64.
    Nshr = OP_NSHR,
    /// Integer exponentiation. A negative exponent yields `0`.
    Npow = OP_NPOW,
    /// Bitwise AND.
    Nand = OP_NAND,
    /// Bitwise OR.
    Nor = OP_NOR,
    /// Bitwise XOR.
    Nxor = OP_NXOR,

    /// `R[A] <- as_i64(R[B]) == as_i64(R[C])`.
    Ncmpeq = OP_NCMPEQ,
    /// `R[A] <- as_i64(R[B]) != as_i64(R[C])`.
    Ncmpne = OP_NCMPNE,
    /// `R[A] <- as_i64(R[B]) <= as_i64(R[C])`.
    Ncmple = OP_NCMPLE,
    /// `R[A] <- as_i64(R[B]) >= as_i64(R[C])`.
    Ncmpge = OP_NCMPGE,
    /// `R[A] <- as_i64(R[B]) < as_i64(R[C])`.
    Ncmplt = OP_NCMPLT,
    /// `R[A] <- as_i64(R[B]) > as_i64(R[C])`.
    Ncmpgt = OP_NCMPGT,

    /// String concatenation.
    ///
    /// | Operation | ```$rA = str($rB) ++ str($rC);``` |
    /// | Encoding  | `RRR(A, B, C)`                     |
    ///
    /// Allocates the result in the Runner's string arena.
    Sadd = OP_SADD,

    /// Substring using registers `C` (offset) and `C+1` (length), clamped to
    /// the source string's bounds. Allocates in the arena.
    Ssubstr = OP_SSUBSTR,

    /// Byte-wise string equality.
    Scmpeq = OP_SCMPEQ,
    /// Byte-wise string inequality.
    Scmpne = OP_SCMPNE,
    /// Byte-wise string `<=`.
    Scmple = OP_SCMPLE,
    /// Byte-wise string `>=`.
    Scmpge = OP_SCMPGE,
    /// Byte-wise string `<`.
    Scmplt = OP_SCMPLT,
    /// Byte-wise string `>`.
    Scmpgt = OP_SCMPGT,
    /// Prefix test: does `str(B)` start with `str(C)`.
    Scmpbeg = OP_SCMPBEG,
    /// Suffix test: does `str(B)` end with `str(C)`.
    Scmpend = OP_SCMPEND,
    /// Substring-contains test.
    Scontains = OP_SCONTAINS,
    /// `R[A] <- byte_len(str(B))`.
    Slen = OP_SLEN,
    /// Write `str(A)` followed by a newline to the diagnostic sink.
    Sprint = OP_SPRINT,

    /// Match `str(B)` against regex-pool entry `C`; sets `R[A]` to `0`/`1`
    /// and stores captures for a following [`Opcode::Sreggroup`].
    Sregmatch = OP_SREGMATCH,
    /// Fetch capture group `R[B]` of the last match into the arena;
    /// out-of-range groups yield an empty string.
    Sreggroup = OP_SREGGROUP,

    /// Base-10 integer to string.
    I2s = OP_I2S,
    /// Base-10 string to integer; `0` on parse failure.
    S2i = OP_S2I,
    /// RFC 3986 percent-encode.
    Surlenc = OP_SURLENC,
    /// RFC 3986 percent-decode; malformed escapes pass through unchanged.
    Surldec = OP_SURLDEC,

    /// Invoke native function `nativeFunctions[A]` with an argc/argv window
    /// of length `B` based at register `C`. `argv[0]` is the return slot.
    Call = OP_CALL,
    /// Invoke native handler `nativeHandlers[A]`, same argc/argv convention
    /// as [`Opcode::Call`]. If `argv[0] != 0` after the call the Runner
    /// returns `true` immediately.
    Handler = OP_HANDLER,
}

impl Opcode {
    /// The static operand shape used by the disassembler and by
    /// `compute_register_count`.
    pub const fn shape(self) -> OperandShape {
        use Opcode::*;
        match self {
            Exit | Jmp => OperandShape::I,
            Condbr | Ndumpn | Imov | Nconst | Sconst => OperandShape::RI,
            Nticks | Sprint => OperandShape::R,
            Mov | Nneg | Slen | I2s | S2i | Surlenc | Surldec | Sreggroup => OperandShape::RR,
            Nadd | Nsub | Nmul | Ndiv | Nrem | Nshl | Nshr | Npow | Nand | Nor | Nxor | Ncmpeq
            | Ncmpne | Ncmple | Ncmpge | Ncmplt | Ncmpgt | Sadd | Ssubstr | Scmpeq | Scmpne
            | Scmple | Scmpge | Scmplt | Scmpgt | Scmpbeg | Scmpend | Scontains | Sregmatch
            | Call | Handler => OperandShape::RRR,
        }
    }

    /// Mnemonic used by the disassembler, lower-case, matching the spec's
    /// opcode names.
    pub const fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Exit => "exit",
            Jmp => "jmp",
            Condbr => "condbr",
            Ndumpn => "ndumpn",
            Nticks => "nticks",
            Mov => "mov",
            Imov => "imov",
            Nconst => "nconst",
            Sconst => "sconst",
            Nneg => "nneg",
            Nadd => "nadd",
            Nsub => "nsub",
            Nmul => "nmul",
            Ndiv => "ndiv",
            Nrem => "nrem",
            Nshl => "nshl",
            Nshr => "nshr",
            Npow => "npow",
            Nand => "nand",
            Nor => "nor",
            Nxor => "nxor",
            Ncmpeq => "ncmpeq",
            Ncmpne => "ncmpne",
            Ncmple => "ncmple",
            Ncmpge => "ncmpge",
            Ncmplt => "ncmplt",
            Ncmpgt => "ncmpgt",
            Sadd => "sadd",
            Ssubstr => "ssubstr",
            Scmpeq => "scmpeq",
            Scmpne => "scmpne",
            Scmple => "scmple",
            Scmpge => "scmpge",
            Scmplt => "scmplt",
            Scmpgt => "scmpgt",
            Scmpbeg => "scmpbeg",
            Scmpend => "scmpend",
            Scontains => "scontains",
            Slen => "slen",
            Sprint => "sprint",
            Sregmatch => "sregmatch",
            Sreggroup => "sreggroup",
            I2s => "i2s",
            S2i => "s2i",
            Surlenc => "surlenc",
            Surldec => "surldec",
            Call => "call",
            Handler => "handler",
        }
    }
}

/// A raw byte did not correspond to any known [`Opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownOpcode(pub u8);

impl fmt::Display for UnknownOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown opcode byte 0x{:02x}", self.0)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match byte {
            OP_EXIT => Exit,
            OP_JMP => Jmp,
            OP_CONDBR => Condbr,
            OP_NDUMPN => Ndumpn,
            OP_NTICKS => Nticks,
            OP_MOV => Mov,
            OP_IMOV => Imov,
            OP_NCONST => Nconst,
            OP_SCONST => Sconst,
            OP_NNEG => Nneg,
            OP_NADD => Nadd,
            OP_NSUB => Nsub,
            OP_NMUL => Nmul,
            OP_NDIV => Ndiv,
            OP_NREM => Nrem,
            OP_NSHL => Nshl,
            OP_NSHR => Nshr,
            OP_NPOW => Npow,
            OP_NAND => Nand,
            OP_NOR => Nor,
            OP_NXOR => Nxor,
            OP_NCMPEQ => Ncmpeq,
            OP_NCMPNE => Ncmpne,
            OP_NCMPLE => Ncmple,
            OP_NCMPGE => Ncmpge,
            OP_NCMPLT => Ncmplt,
            OP_NCMPGT => Ncmpgt,
            OP_SADD => Sadd,
            OP_SSUBSTR => Ssubstr,
            OP_SCMPEQ => Scmpeq,
            OP_SCMPNE => Scmpne,
            OP_SCMPLE => Scmple,
            OP_SCMPGE => Scmpge,
            OP_SCMPLT => Scmplt,
            OP_SCMPGT => Scmpgt,
            OP_SCMPBEG => Scmpbeg,
            OP_SCMPEND => Scmpend,
            OP_SCONTAINS => Scontains,
            OP_SLEN => Slen,
            OP_SPRINT => Sprint,
            OP_SREGMATCH => Sregmatch,
            OP_SREGGROUP => Sreggroup,
            OP_I2S => I2s,
            OP_S2I => S2i,
            OP_SURLENC => Surlenc,
            OP_SURLDEC => Surldec,
            OP_CALL => Call,
            OP_HANDLER => Handler,
            other => return Err(UnknownOpcode(other)),
        })
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_opcode_round_trips_through_its_byte() {
        for op in Opcode::iter() {
            let byte: u8 = op.into();
            assert_eq!(Opcode::try_from(byte).unwrap(), op);
        }
    }

    #[test]
    fn unknown_byte_past_last_opcode_is_rejected() {
        assert_eq!(Opcode::try_from(0xff), Err(UnknownOpcode(0xff)));
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for op in Opcode::iter() {
            assert!(seen.insert(op.mnemonic()), "duplicate mnemonic {}", op.mnemonic());
        }
    }
}
