//! Executes resolved IR directly: a tape, a program counter, a head
//! pointer, and a dispatch loop over [`Ir`]. No bracket matching happens
//! here; the compiler already resolved every jump target.

use std::fmt::Debug;
use std::io::{self, Read, Write};

use thiserror::Error;

use crate::error::ReportableError;
use crate::ir::{self, Ir};

/// Default tape size (spec §3.3): 64 KiB.
pub const DEFAULT_HEAP_SIZE: usize = 65_536;

/// Executes an IR program against injected I/O sinks.
pub struct Interpreter<'io> {
    ir: Vec<Ir>,
    tape: Vec<u8>,
    hp: usize,
    pc: usize,
    input: Box<dyn Read + 'io>,
    output: Box<dyn Write + 'io>,
}

impl<'io> Interpreter<'io> {
    /// Starts building an [`Interpreter`] for `ir`.
    pub fn builder(ir: Vec<Ir>) -> InterpreterBuilder<'io> {
        InterpreterBuilder::new(ir)
    }

    fn new(
        ir: Vec<Ir>,
        config: InterpreterConfig,
        input: Box<dyn Read + 'io>,
        output: Box<dyn Write + 'io>,
    ) -> Result<Interpreter<'io>, InterpreterError> {
        if !ir::is_balanced(&ir) {
            return Err(InterpreterError::Unbalanced);
        }

        Ok(Interpreter {
            ir,
            tape: vec![0u8; config.heap_size],
            hp: 0,
            pc: 0,
            input,
            output,
        })
    }

    /// Runs the program to completion.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.pc < self.ir.len() {
            self.step()?;
        }
        self.output.write_all(b"\n").map_err(RuntimeError::Io)?;
        self.output.flush().map_err(RuntimeError::Io)?;
        Ok(())
    }

    /// The final tape contents, for tests and `--dump-ir`-adjacent tooling.
    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    fn cell(&mut self, at: usize) -> Result<&mut u8, RuntimeError> {
        self.tape
            .get_mut(at)
            .ok_or(RuntimeError::PointerOutOfBounds { at })
    }

    fn move_hp(&mut self, by: i32) -> Result<(), RuntimeError> {
        let moved = self.hp as i64 + by as i64;
        if moved < 0 || moved as usize >= self.tape.len() {
            return Err(RuntimeError::PointerOutOfBounds {
                at: moved.max(0) as usize,
            });
        }
        self.hp = moved as usize;
        Ok(())
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        log::trace!("pc={} hp={} ir={}", self.pc, self.hp, self.ir[self.pc]);

        match self.ir[self.pc] {
            Ir::MovePointer(n) => {
                self.move_hp(n)?;
                self.pc += 1;
            }
            Ir::Add(n) => {
                let hp = self.hp;
                let cell = self.cell(hp)?;
                *cell = (*cell as i32 + n).rem_euclid(256) as u8;
                self.pc += 1;
            }
            Ir::Putchar => {
                let byte = *self.cell(self.hp)?;
                self.output
                    .write_all(&[byte])
                    .map_err(RuntimeError::Io)?;
                self.pc += 1;
            }
            Ir::Getchar => {
                self.output.flush().map_err(RuntimeError::Io)?;
                let mut buf = [0u8; 1];
                let byte = match self.input.read(&mut buf).map_err(RuntimeError::Io)? {
                    0 => 0,
                    _ => buf[0],
                };
                let hp = self.hp;
                *self.cell(hp)? = byte;
                self.pc += 1;
            }
            Ir::LoopStart(target) => {
                self.pc = if *self.cell(self.hp)? == 0 {
                    target
                } else {
                    self.pc + 1
                };
            }
            Ir::LoopEnd(target) => {
                self.pc = if *self.cell(self.hp)? != 0 {
                    target
                } else {
                    self.pc + 1
                };
            }
            Ir::If(target) => {
                self.pc = if *self.cell(self.hp)? == 0 {
                    target
                } else {
                    self.pc + 1
                };
            }
            Ir::EndIf(_) => {
                self.pc += 1;
            }
            Ir::Assign(n) => {
                let hp = self.hp;
                *self.cell(hp)? = n;
                self.pc += 1;
            }
            Ir::SearchZero(stride) => {
                while *self.cell(self.hp)? != 0 {
                    self.move_hp(stride)?;
                }
                self.pc += 1;
            }
            Ir::AddVar(off) => {
                let src = *self.cell(self.hp)?;
                let target = (self.hp as i64 + off as i64) as usize;
                let cell = self.cell(target)?;
                *cell = cell.wrapping_add(src);
                self.pc += 1;
            }
            Ir::SubVar(off) => {
                let src = *self.cell(self.hp)?;
                let target = (self.hp as i64 + off as i64) as usize;
                let cell = self.cell(target)?;
                *cell = cell.wrapping_sub(src);
                self.pc += 1;
            }
            Ir::AddCMulVar(off, k) => {
                let src = *self.cell(self.hp)?;
                let target = (self.hp as i64 + off as i64) as usize;
                let cell = self.cell(target)?;
                *cell = (*cell as i32 + src as i32 * k).rem_euclid(256) as u8;
                self.pc += 1;
            }
            Ir::InfLoop => {
                if *self.cell(self.hp)? != 0 {
                    return Err(RuntimeError::Diverged);
                }
                self.pc += 1;
            }
            Ir::BreakPoint => {
                self.pc += 1;
            }
        }

        Ok(())
    }
}

/// Builder for [`Interpreter`] (mirrors the teacher's `Interpreter::builder`
/// pattern), defaulting to the configured heap size and real stdio sinks.
pub struct InterpreterBuilder<'io> {
    ir: Vec<Ir>,
    config: InterpreterConfig,
    input: Box<dyn Read + 'io>,
    output: Box<dyn Write + 'io>,
}

impl<'io> InterpreterBuilder<'io> {
    pub fn new(ir: Vec<Ir>) -> InterpreterBuilder<'io> {
        InterpreterBuilder {
            ir,
            config: InterpreterConfig::default(),
            input: Box::new(io::stdin()),
            output: Box::new(io::stdout()),
        }
    }

    /// Sets the tape size in bytes.
    #[must_use]
    pub fn with_heap_size(mut self, heap_size: usize) -> Self {
        self.config.heap_size = heap_size;
        self
    }

    /// Replaces the input sink (default: stdin).
    #[must_use]
    pub fn with_input(mut self, input: impl Read + 'io) -> Self {
        self.input = Box::new(input);
        self
    }

    /// Replaces the output sink (default: stdout).
    #[must_use]
    pub fn with_output(mut self, output: impl Write + 'io) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn build(self) -> Result<Interpreter<'io>, InterpreterError> {
        Interpreter::new(self.ir, self.config, self.input, self.output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InterpreterConfig {
    heap_size: usize,
}

impl Default for InterpreterConfig {
    fn default() -> InterpreterConfig {
        InterpreterConfig {
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

/// Failure to construct an [`Interpreter`].
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The IR's loop/guard targets don't satisfy the resolved-IR invariant
    /// (spec §8.1). Only reachable for hand-built or fuzzed IR; IR produced
    /// by the compiler is balanced by construction.
    #[error("IR is not balanced: every LoopStart/If must target a matching LoopEnd/EndIf")]
    Unbalanced,
}

/// Failure while running an [`Interpreter`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The head pointer moved outside the configured tape.
    #[error("tape pointer went out of bounds at cell {at}")]
    PointerOutOfBounds {
        /// The offending (possibly negative, clamped to 0) cell index.
        at: usize,
    },
    /// An `InfLoop` guard's cell was non-zero: the program diverges here by
    /// definition, so execution stops rather than spinning forever.
    #[error("program diverges (InfLoop guard cell was non-zero)")]
    Diverged,
    /// The I/O sink failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl ReportableError for InterpreterError {}
impl ReportableError for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::source::SourceFile;
    use std::path::PathBuf;

    fn run(src: &str, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), src.into());
        let ir = compile(&sf).unwrap();
        let mut output = Vec::new();
        {
            let mut interp = Interpreter::builder(ir)
                .with_input(input)
                .with_output(&mut output)
                .build()
                .unwrap();
            interp.run().unwrap();
        }
        (output, Vec::new())
    }

    #[test]
    fn hello_world() {
        let src = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.\
<-.<.+++.------.--------.>>+.>++.";
        let (out, _) = run(src, &[]);
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), "Hello World!");
    }

    #[test]
    fn echoes_input_until_eof_then_zero() {
        let (out, _) = run(",.,.,.", b"AB");
        assert_eq!(out, b"AB\0\n");
    }

    #[test]
    fn clear_then_assign() {
        let ir = compile(&SourceFile::from_raw_parts(
            PathBuf::from("<test>"),
            "+++++[-]".into(),
        ))
        .unwrap();
        let mut interp = Interpreter::builder(ir).build().unwrap();
        interp.run().unwrap();
        assert_eq!(interp.tape()[0], 0);
    }

    #[test]
    fn copy_loop_distributes_value() {
        let ir = compile(&SourceFile::from_raw_parts(
            PathBuf::from("<test>"),
            "+++++[->++<]".into(),
        ))
        .unwrap();
        let mut interp = Interpreter::builder(ir).build().unwrap();
        interp.run().unwrap();
        assert_eq!(interp.tape()[0], 0);
        assert_eq!(interp.tape()[1], 10);
    }

    #[test]
    fn pointer_out_of_bounds_is_reported() {
        let ir = compile(&SourceFile::from_raw_parts(
            PathBuf::from("<test>"),
            "<".into(),
        ))
        .unwrap();
        let mut interp = Interpreter::builder(ir).build().unwrap();
        assert!(matches!(
            interp.run(),
            Err(RuntimeError::PointerOutOfBounds { at: 0 })
        ));
    }

    #[test]
    fn unbalanced_hand_built_ir_is_rejected() {
        let err = Interpreter::builder(vec![Ir::LoopStart(5)]).build();
        assert!(matches!(err, Err(InterpreterError::Unbalanced)));
    }

    #[test]
    fn infinite_loop_opcode_diverges_when_cell_nonzero() {
        let ir = vec![Ir::Add(1), Ir::InfLoop];
        let mut interp = Interpreter::builder(ir).build().unwrap();
        assert!(matches!(interp.run(), Err(RuntimeError::Diverged)));
    }

    #[test]
    fn infinite_loop_opcode_is_skipped_when_cell_zero() {
        let ir = vec![Ir::InfLoop];
        let mut interp = Interpreter::builder(ir).build().unwrap();
        interp.run().unwrap();
    }
}
