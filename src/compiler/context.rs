//! The mutable state threaded through a single compilation: the IR being
//! built and the stack of open `[` positions.

use crate::ir::Ir;

use super::rules::{self, Closed};

/// Accumulates IR for one source file. Construction order matches the
/// source, so `stack` always holds a strictly increasing run of indices of
/// still-open `LoopStart`s.
#[derive(Debug, Default)]
pub struct Compiler {
    ir: Vec<Ir>,
    stack: Vec<usize>,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler::default()
    }

    /// R1: pushes `Add(k)`, folding into a trailing `Assign` when possible.
    pub fn push_add(&mut self, k: i32) {
        if !rules::fuse_assign_add(&mut self.ir, k) {
            self.push(Ir::Add(k));
        }
    }

    pub fn push_move(&mut self, n: i32) {
        self.push(Ir::MovePointer(n));
    }

    pub fn push_putchar(&mut self) {
        self.push(Ir::Putchar);
    }

    pub fn push_getchar(&mut self) {
        self.push(Ir::Getchar);
    }

    /// `[`: pushes a placeholder `LoopStart` and records its position.
    pub fn open_loop(&mut self) {
        self.stack.push(self.ir.len());
        self.push(Ir::LoopStart(0));
    }

    fn push(&mut self, inst: Ir) {
        log::trace!("ir[{}] = {inst}", self.ir.len());
        self.ir.push(inst);
    }

    /// `]`: pops the matching `[`, if any, and runs R2-R6 against the body.
    /// Returns `false` if the brackets don't balance (caller reports it).
    pub fn close_loop(&mut self) -> bool {
        let Some(base) = self.stack.pop() else {
            return false;
        };

        if let Closed::Unchanged = rules::try_close_loop(&mut self.ir, base) {
            let end_idx = self.ir.len();
            self.ir[base] = Ir::LoopStart(end_idx);
            log::trace!("ir[{base}] = {} (patched)", self.ir[base]);
            self.push(Ir::LoopEnd(base));
        }

        true
    }

    /// True once every `[` has a matching `]`.
    pub fn is_closed(&self) -> bool {
        self.stack.is_empty()
    }

    /// Byte-ish marker used for diagnostics: the index of the still-open `[`
    /// nearest the end of input, if any remain at EOF.
    pub fn dangling_loop_start(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    pub fn finish(self) -> Vec<Ir> {
        self.ir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_nested_loops() {
        let mut c = Compiler::new();
        c.open_loop();
        c.push_add(1);
        c.open_loop();
        c.push_move(1);
        assert!(c.close_loop());
        assert!(c.close_loop());
        assert!(c.is_closed());
    }

    #[test]
    fn close_without_open_fails() {
        let mut c = Compiler::new();
        assert!(!c.close_loop());
    }

    #[test]
    fn unclosed_open_is_detected() {
        let mut c = Compiler::new();
        c.open_loop();
        assert!(!c.is_closed());
        assert_eq!(c.dangling_loop_start(), Some(0));
    }
}
