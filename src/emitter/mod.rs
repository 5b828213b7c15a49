//! The lowering framework: one pass over IR, dispatching each opcode to a
//! [`Backend`]. A backend implements only the hooks its target can't
//! synthesize from cheaper primitives; everything else falls back to the
//! default derivations in §4.3 of the design (e.g. `assign` as a clear loop
//! followed by a literal add).

pub mod c;
pub mod codebuf;
pub mod jit;
pub mod xbyakc;

use std::io;

use thiserror::Error;

use crate::error::ReportableError;
use crate::ir::Ir;

pub mod binary {
    pub mod elf;
    pub mod pe;
}

/// A lowering target for IR. Every method has a default derived in terms of
/// the others; a backend overrides exactly the ones its target can express
/// more directly (e.g. a real `[`/`]` pair instead of the generic loop
/// skeleton `assign` would otherwise build from).
pub trait Backend {
    /// Emitted once, before the first instruction.
    fn header(&mut self) -> Result<(), EmitError>;
    /// Emitted once, after the last instruction.
    fn footer(&mut self) -> Result<(), EmitError>;

    fn move_by(&mut self, n: i32) -> Result<(), EmitError>;
    fn add_by(&mut self, n: i32) -> Result<(), EmitError>;
    fn putchar(&mut self) -> Result<(), EmitError>;
    fn getchar(&mut self) -> Result<(), EmitError>;
    fn loop_start(&mut self) -> Result<(), EmitError>;
    fn loop_end(&mut self) -> Result<(), EmitError>;
    fn break_point(&mut self) -> Result<(), EmitError> {
        Ok(())
    }

    fn if_open(&mut self) -> Result<(), EmitError> {
        self.loop_start()
    }
    fn if_close(&mut self) -> Result<(), EmitError> {
        self.loop_end()
    }

    fn assign(&mut self, n: u8) -> Result<(), EmitError> {
        self.loop_start()?;
        self.add_by(-1)?;
        self.loop_end()?;
        self.add_by(n as i32)
    }

    fn search_zero(&mut self, stride: i32) -> Result<(), EmitError> {
        self.loop_start()?;
        self.move_by(stride)?;
        self.loop_end()
    }

    fn add_var(&mut self, off: i32) -> Result<(), EmitError> {
        self.move_by(off)?;
        self.add_by(1)?;
        self.move_by(-off)
    }

    fn sub_var(&mut self, off: i32) -> Result<(), EmitError> {
        self.move_by(off)?;
        self.add_by(-1)?;
        self.move_by(-off)
    }

    fn add_c_mul_var(&mut self, off: i32, k: i32) -> Result<(), EmitError> {
        self.move_by(off)?;
        self.add_by(k)?;
        self.move_by(-off)
    }

    fn inf_loop(&mut self) -> Result<(), EmitError> {
        self.loop_start()?;
        self.loop_end()
    }
}

/// Walks `ir` once, dispatching each instruction to `backend`, bracketed by
/// `header()`/`footer()`.
pub fn emit(ir: &[Ir], backend: &mut dyn Backend) -> Result<(), EmitError> {
    backend.header()?;

    for inst in ir {
        match *inst {
            Ir::MovePointer(n) => backend.move_by(n)?,
            Ir::Add(n) => backend.add_by(n)?,
            Ir::Putchar => backend.putchar()?,
            Ir::Getchar => backend.getchar()?,
            Ir::LoopStart(_) => backend.loop_start()?,
            Ir::LoopEnd(_) => backend.loop_end()?,
            Ir::If(_) => backend.if_open()?,
            Ir::EndIf(_) => backend.if_close()?,
            Ir::Assign(n) => backend.assign(n)?,
            Ir::SearchZero(stride) => backend.search_zero(stride)?,
            Ir::AddVar(off) => backend.add_var(off)?,
            Ir::SubVar(off) => backend.sub_var(off)?,
            Ir::AddCMulVar(off, k) => backend.add_c_mul_var(off, k)?,
            Ir::InfLoop => backend.inf_loop()?,
            Ir::BreakPoint => backend.break_point()?,
        }
    }

    backend.footer()
}

/// Failure while lowering IR to a target.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The output sink failed.
    #[error("failed to write emitted output: {0}")]
    Io(#[source] io::Error),
    /// An offset computed during jump patching doesn't fit the target's
    /// branch encoding (e.g. ARM's 24-bit word-granular `B`/`BNE` field,
    /// good for roughly +-32 MiB of body either direction).
    #[error("jump offset {offset} does not fit the target's branch encoding")]
    OffsetOutOfRange {
        /// The byte distance that overflowed the encoding.
        offset: i64,
    },
}

impl From<io::Error> for EmitError {
    fn from(error: io::Error) -> EmitError {
        EmitError::Io(error)
    }
}

impl ReportableError for EmitError {}
