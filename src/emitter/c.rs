//! Lowers IR to freestanding, ISO C source (spec §4.3.1).
//!
//! No pointer-bounds checking is emitted here, even though the Rust
//! interpreter itself bound-checks (§3.3): the emitted C is a separate
//! artifact, and an out-of-bounds tape pointer there is the C compiler's
//! and the OS's problem, exactly as in the reference this idiom is drawn
//! from.

use std::io::Write;

use super::{Backend, EmitError};

/// Writes a C translation unit defining `main` to `out`.
pub struct CBackend<'w> {
    out: &'w mut dyn Write,
    heap_size: usize,
    indent: usize,
}

impl<'w> CBackend<'w> {
    pub fn new(out: &'w mut dyn Write, heap_size: usize) -> CBackend<'w> {
        CBackend {
            out,
            heap_size,
            indent: 1,
        }
    }

    fn line(&mut self, text: &str) -> Result<(), EmitError> {
        writeln!(self.out, "{}{}", "    ".repeat(self.indent), text)?;
        Ok(())
    }
}

impl Backend for CBackend<'_> {
    fn header(&mut self) -> Result<(), EmitError> {
        writeln!(self.out, "#include <stdio.h>")?;
        writeln!(self.out, "#include <string.h>")?;
        writeln!(self.out)?;
        writeln!(self.out, "int main(void) {{")?;
        self.line(&format!("static unsigned char tape[{}];", self.heap_size))?;
        self.line("unsigned char *p = tape;")
    }

    fn footer(&mut self) -> Result<(), EmitError> {
        self.line("putchar('\\n');")?;
        self.line("return 0;")?;
        writeln!(self.out, "}}")?;
        Ok(())
    }

    fn move_by(&mut self, n: i32) -> Result<(), EmitError> {
        if n >= 0 {
            self.line(&format!("p += {n};"))
        } else {
            self.line(&format!("p -= {};", -n))
        }
    }

    fn add_by(&mut self, n: i32) -> Result<(), EmitError> {
        if n >= 0 {
            self.line(&format!("*p += {n};"))
        } else {
            self.line(&format!("*p -= {};", -n))
        }
    }

    fn putchar(&mut self) -> Result<(), EmitError> {
        self.line("putchar(*p);")
    }

    fn getchar(&mut self) -> Result<(), EmitError> {
        self.line("{ int c = getchar(); *p = (c == EOF) ? 0 : (unsigned char)c; }")
    }

    fn loop_start(&mut self) -> Result<(), EmitError> {
        self.line("while (*p) {")?;
        self.indent += 1;
        Ok(())
    }

    fn loop_end(&mut self) -> Result<(), EmitError> {
        self.indent -= 1;
        self.line("}")
    }

    fn assign(&mut self, n: u8) -> Result<(), EmitError> {
        self.line(&format!("*p = {n};"))
    }

    fn search_zero(&mut self, stride: i32) -> Result<(), EmitError> {
        self.loop_start()?;
        self.move_by(stride)?;
        self.loop_end()
    }

    fn add_var(&mut self, off: i32) -> Result<(), EmitError> {
        self.line(&format!("p[{off}] += *p;"))
    }

    fn sub_var(&mut self, off: i32) -> Result<(), EmitError> {
        self.line(&format!("p[{off}] -= *p;"))
    }

    fn add_c_mul_var(&mut self, off: i32, k: i32) -> Result<(), EmitError> {
        self.line(&format!("p[{off}] += *p * {k};"))
    }

    fn inf_loop(&mut self) -> Result<(), EmitError> {
        self.line("if (*p) { while (1) {} }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::source::SourceFile;
    use std::path::PathBuf;

    fn lower(src: &str) -> String {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), src.into());
        let ir = compile(&sf).unwrap();
        let mut buf = Vec::new();
        {
            let mut backend = CBackend::new(&mut buf, 65_536);
            super::super::emit(&ir, &mut backend).unwrap();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn emits_valid_looking_skeleton() {
        let c = lower("+.");
        assert!(c.contains("int main(void) {"));
        assert!(c.contains("*p += 1;"));
        assert!(c.contains("putchar(*p);"));
        assert!(c.trim_end().ends_with('}'));
    }

    #[test]
    fn clear_cell_lowers_to_direct_assignment() {
        let c = lower("[-]");
        assert!(c.contains("*p = 0;"));
        assert!(!c.contains("while"));
    }

    #[test]
    fn copy_loop_lowers_to_a_direct_add_and_clear() {
        // The If/EndIf guard still lowers through the default while-skeleton
        // (sound here because the body always zeroes the guard cell), but
        // the body itself is a direct add, not a derived move/add/move.
        let c = lower("[->+<]");
        assert!(c.contains("p[1] += *p;"));
        assert!(c.contains("*p = 0;"));
    }

    #[test]
    fn plain_loop_uses_while() {
        let c = lower("[>+.<-]");
        assert!(c.contains("while (*p) {"));
    }
}
