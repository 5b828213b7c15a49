//! A peephole-optimizing Brainfuck compiler: source trimming, a resolved
//! intermediate representation, a tree-walking interpreter, and a shared
//! lowering framework driving a C source backend, a JIT, and a handful of
//! binary-file backends (ELF and PE, several architectures each).

pub mod clap_cli;
pub mod compiler;
pub mod direct;
pub mod emitter;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod source;
pub mod utils;
