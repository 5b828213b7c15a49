//! The intermediate representation that sits between the peephole compiler
//! and every downstream consumer (the interpreter and the emitters).
//!
//! `Ir` is a closed set of tagged variants rather than a generic
//! `(op, a, b)` triple: the triple in the specification describes the
//! information content of an instruction, not a mandated layout, and a
//! Rust enum lets `match` arms in the interpreter and the emitter framework
//! be exhaustive and checked at compile time.

use std::fmt;

/// One resolved IR instruction.
///
/// Loop and guard operands (`LoopStart`/`LoopEnd`, `If`/`EndIf`) are IR
/// indices into the vector that contains this instruction, already resolved
/// by the compiler: executing or lowering the IR never needs to re-discover
/// a bracket partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ir {
    /// `hp <- hp + n`, `n != 0`.
    MovePointer(i32),
    /// `tape[hp] <- (tape[hp] + n) mod 256`, `n != 0`, `-255..=255`.
    Add(i32),
    /// Emit `tape[hp]` as a byte.
    Putchar,
    /// Flush output, then read one byte into `tape[hp]`.
    Getchar,
    /// If `tape[hp] == 0`, jump to the matching `LoopEnd` at this index.
    LoopStart(usize),
    /// If `tape[hp] != 0`, jump to the matching `LoopStart` at this index.
    LoopEnd(usize),
    /// If `tape[hp] == 0`, jump to the matching `EndIf` at this index.
    If(usize),
    /// No-op at runtime; marks where a copy/multiply guard ends.
    EndIf(usize),
    /// `tape[hp] <- n`, `0..=255`.
    Assign(u8),
    /// While `tape[hp] != 0`: `hp <- hp + stride`. `stride != 0`.
    SearchZero(i32),
    /// `tape[hp+off] <- (tape[hp+off] + tape[hp]) mod 256`, `off != 0`.
    AddVar(i32),
    /// `tape[hp+off] <- (tape[hp+off] - tape[hp]) mod 256`, `off != 0`.
    SubVar(i32),
    /// `tape[hp+off] <- (tape[hp+off] + tape[hp] * k) mod 256`, `off != 0`.
    AddCMulVar(i32, i32),
    /// If `tape[hp] != 0`, diverge. Must never fall through when taken.
    InfLoop,
    /// Optional debugger trap. A backend that does not support it ignores it.
    BreakPoint,
}

impl Ir {
    /// The opcode name as it appears in the IR text dump and in trace logs.
    pub fn name(&self) -> &'static str {
        match self {
            Ir::MovePointer(_) => "MovePointer",
            Ir::Add(_) => "Add",
            Ir::Putchar => "Putchar",
            Ir::Getchar => "Getchar",
            Ir::LoopStart(_) => "LoopStart",
            Ir::LoopEnd(_) => "LoopEnd",
            Ir::If(_) => "If",
            Ir::EndIf(_) => "EndIf",
            Ir::Assign(_) => "Assign",
            Ir::SearchZero(_) => "SearchZero",
            Ir::AddVar(_) => "AddVar",
            Ir::SubVar(_) => "SubVar",
            Ir::AddCMulVar(_, _) => "AddCMulVar",
            Ir::InfLoop => "InfLoop",
            Ir::BreakPoint => "BreakPoint",
        }
    }
}

impl fmt::Display for Ir {
    /// One line, opcode name followed by operands separated by `, `.
    /// This is a debugging surface; punctuation is not load-bearing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ir::MovePointer(n) => write!(f, "MovePointer, {n}"),
            Ir::Add(n) => write!(f, "Add, {n}"),
            Ir::Putchar => write!(f, "Putchar"),
            Ir::Getchar => write!(f, "Getchar"),
            Ir::LoopStart(t) => write!(f, "LoopStart, {t}"),
            Ir::LoopEnd(t) => write!(f, "LoopEnd, {t}"),
            Ir::If(t) => write!(f, "If, {t}"),
            Ir::EndIf(t) => write!(f, "EndIf, {t}"),
            Ir::Assign(n) => write!(f, "Assign, {n}"),
            Ir::SearchZero(s) => write!(f, "SearchZero, {s}"),
            Ir::AddVar(o) => write!(f, "AddVar, {o}"),
            Ir::SubVar(o) => write!(f, "SubVar, {o}"),
            Ir::AddCMulVar(o, k) => write!(f, "AddCMulVar, {o}, {k}"),
            Ir::InfLoop => write!(f, "InfLoop"),
            Ir::BreakPoint => write!(f, "BreakPoint"),
        }
    }
}

/// Prints one IR instruction per line, in the `--dump-ir` format.
pub fn dump(ir: &[Ir]) -> String {
    let mut out = String::new();
    for inst in ir {
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}

/// Checks the resolved-IR balance invariant (spec §8.1): every `LoopStart`/
/// `If` operand points at a matching `LoopEnd`/`EndIf` that points back, and
/// `i < j`. Used by the interpreter builder as a cheap sanity check on
/// hand-built or fuzzed IR, not by the compiler (whose own bookkeeping makes
/// this true by construction).
pub fn is_balanced(ir: &[Ir]) -> bool {
    for (i, inst) in ir.iter().enumerate() {
        match *inst {
            Ir::LoopStart(j) => {
                if j <= i || !matches!(ir.get(j), Some(Ir::LoopEnd(back)) if *back == i) {
                    return false;
                }
            }
            Ir::If(j) => {
                if j <= i || !matches!(ir.get(j), Some(Ir::EndIf(back)) if *back == i) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}
