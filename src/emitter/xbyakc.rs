//! The `xbyakc` target (spec §4.3.3): writes the JIT backend's assembled
//! machine code as a byte array embedded in a C program, which `mprotect`s
//! the array executable and invokes it through the same three-argument
//! calling convention the JIT's own [`super::jit::JitProgram::run`] uses.

use std::io::{self, Write};

/// Writes a freestanding C translation unit embedding `code` to `out`.
pub fn write(out: &mut dyn Write, code: &[u8], heap_size: usize) -> io::Result<()> {
    writeln!(out, "#include <stdio.h>")?;
    writeln!(out, "#include <string.h>")?;
    writeln!(out, "#include <sys/mman.h>")?;
    writeln!(out)?;
    writeln!(out, "static unsigned char tape[{heap_size}];")?;
    writeln!(out)?;
    writeln!(out, "static void io_putchar(unsigned char c) {{ putchar(c); }}")?;
    writeln!(out, "static int io_getchar(void) {{ return getchar(); }}")?;
    writeln!(out)?;
    write!(out, "static const unsigned char code[] = {{")?;
    for (i, byte) in code.iter().enumerate() {
        if i % 16 == 0 {
            writeln!(out)?;
            write!(out, "    ")?;
        }
        write!(out, "0x{byte:02x}, ")?;
    }
    writeln!(out, "\n}};")?;
    writeln!(out)?;
    writeln!(
        out,
        "typedef void (*entry_fn)(void (*)(unsigned char), int (*)(void), unsigned char *);"
    )?;
    writeln!(out)?;
    writeln!(out, "int main(void) {{")?;
    writeln!(out, "    size_t len = sizeof(code);")?;
    writeln!(
        out,
        "    void *mem = mmap(NULL, len, PROT_READ | PROT_WRITE, MAP_PRIVATE | MAP_ANONYMOUS, -1, 0);"
    )?;
    writeln!(out, "    memcpy(mem, code, len);")?;
    writeln!(out, "    mprotect(mem, len, PROT_READ | PROT_EXEC);")?;
    writeln!(out, "    entry_fn entry = (entry_fn)mem;")?;
    writeln!(out, "    entry(io_putchar, io_getchar, tape);")?;
    writeln!(out, "    munmap(mem, len);")?;
    writeln!(out, "    return 0;")?;
    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::emitter::emit;
    use crate::emitter::jit::JitBackend;
    use crate::source::SourceFile;
    use std::path::PathBuf;

    #[test]
    fn emits_an_mprotect_trampoline_around_the_code_bytes() {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), "+.".into());
        let ir = compile(&sf).unwrap();
        let mut backend = JitBackend::new();
        emit(&ir, &mut backend).unwrap();
        let code = backend.assembled_bytes();

        let mut buf = Vec::new();
        write(&mut buf, &code, 65_536).unwrap();
        let c = String::from_utf8(buf).unwrap();

        assert!(c.contains("mprotect(mem, len, PROT_READ | PROT_EXEC)"));
        assert!(c.contains("0x55")); // push rbp, the JIT prologue's first byte
        assert!(c.contains("entry(io_putchar, io_getchar, tape);"));
    }
}
