//! Assembles IR directly into x86-64 System V machine code and runs it from
//! an executable memory-mapped buffer (spec §4.3.3), using the same
//! `Backend` visitor and jump-patching discipline as the binary file
//! backends.
//!
//! The pointer/cell primitives (`inc r12`, `dec BYTE PTR [r12]`, the
//! `cmp BYTE PTR [r12],0x0` / `je`/`jne` guard pair) are adapted from the
//! hand-encoded sequences in n9v9/brainfuck's JIT. I/O is routed through
//! two injected callback functions rather than raw syscalls, so the JIT
//! shares the same `Read`/`Write` sink contract as the interpreter instead
//! of writing straight to file descriptor 1.

use std::cell::Cell;
use std::io::{self, Read, Write};

use memmap2::MmapMut;

use super::codebuf::CodeBuffer;
use super::{Backend, EmitError};

/// A `putchar`-like callback: writes one byte to whatever sink the caller
/// of [`JitProgram::run`] installed.
pub type PutcharFn = extern "sysv64" fn(u8);
/// A `getchar`-like callback: returns the next input byte, or `-1` at EOF.
pub type GetcharFn = extern "sysv64" fn() -> i32;
type EntryFn = extern "sysv64" fn(PutcharFn, GetcharFn, *mut u8);

thread_local! {
    static OUTPUT: Cell<*mut dyn Write> = Cell::new(std::ptr::null_mut::<io::Sink>() as *mut dyn Write);
    static INPUT: Cell<*mut dyn Read> = Cell::new(std::ptr::null_mut::<io::Empty>() as *mut dyn Read);
}

extern "sysv64" fn putchar_trampoline(byte: u8) {
    OUTPUT.with(|cell| {
        let sink = cell.get();
        if !sink.is_null() {
            // SAFETY: only non-null for the duration of `JitProgram::run`,
            // which owns an exclusive borrow of the sink for that long.
            let _ = unsafe { (*sink).write_all(&[byte]) };
        }
    });
}

extern "sysv64" fn getchar_trampoline() -> i32 {
    INPUT.with(|cell| {
        let source = cell.get();
        if source.is_null() {
            return -1;
        }
        let mut buf = [0u8; 1];
        // SAFETY: see putchar_trampoline.
        match unsafe { (*source).read(&mut buf) } {
            Ok(1) => buf[0] as i32,
            _ => -1,
        }
    })
}

/// Builds x86-64 machine code for a Brainfuck program, one IR instruction
/// at a time.
#[derive(Default)]
pub struct JitBackend {
    code: CodeBuffer,
    loop_stack: Vec<(usize, usize)>,
}

impl JitBackend {
    pub fn new() -> JitBackend {
        JitBackend::default()
    }

    /// Maps the assembled code executable and returns a program ready to
    /// run against a fresh tape of `heap_size` bytes.
    pub fn finish(self, heap_size: usize) -> io::Result<JitProgram> {
        let bytes = self.code.into_bytes();
        let mut mmap = MmapMut::map_anon(bytes.len().max(1))?;
        mmap[..bytes.len()].copy_from_slice(&bytes);
        let map = mmap.make_exec()?;
        Ok(JitProgram {
            map,
            tape: vec![0u8; heap_size],
        })
    }

    /// The raw assembled machine code, for `xbyakc`'s "dump as C" mode
    /// ([`super::xbyakc`]) instead of mapping it executable here.
    pub fn assembled_bytes(self) -> Vec<u8> {
        self.code.into_bytes()
    }
}

impl Backend for JitBackend {
    fn header(&mut self) -> Result<(), EmitError> {
        self.code.push(&[0x55]); // push rbp
        self.code.push(&[0x48, 0x89, 0xe5]); // mov rbp, rsp
        self.code.push(&[0x41, 0x54]); // push r12
        self.code.push(&[0x41, 0x55]); // push r13
        self.code.push(&[0x41, 0x56]); // push r14
        self.code.push(&[0x49, 0x89, 0xd4]); // mov r12, rdx  (tape base)
        self.code.push(&[0x49, 0x89, 0xfd]); // mov r13, rdi  (putchar fn)
        self.code.push(&[0x49, 0x89, 0xf6]); // mov r14, rsi  (getchar fn)
        Ok(())
    }

    fn footer(&mut self) -> Result<(), EmitError> {
        self.code.push(&[0x41, 0x5e]); // pop r14
        self.code.push(&[0x41, 0x5d]); // pop r13
        self.code.push(&[0x41, 0x5c]); // pop r12
        self.code.push(&[0x48, 0x89, 0xec]); // mov rsp, rbp
        self.code.push(&[0x5d]); // pop rbp
        self.code.push(&[0xc3]); // ret
        Ok(())
    }

    fn move_by(&mut self, n: i32) -> Result<(), EmitError> {
        let op: &[u8] = if n >= 0 {
            &[0x49, 0xff, 0xc4] // inc r12
        } else {
            &[0x49, 0xff, 0xcc] // dec r12
        };
        for _ in 0..n.unsigned_abs() {
            self.code.push(op);
        }
        Ok(())
    }

    fn add_by(&mut self, n: i32) -> Result<(), EmitError> {
        let op: &[u8] = if n >= 0 {
            &[0x41, 0xfe, 0x04, 0x24] // inc BYTE PTR [r12]
        } else {
            &[0x41, 0xfe, 0x0c, 0x24] // dec BYTE PTR [r12]
        };
        for _ in 0..n.unsigned_abs() {
            self.code.push(op);
        }
        Ok(())
    }

    fn putchar(&mut self) -> Result<(), EmitError> {
        self.code.push(&[0x41, 0x8a, 0x04, 0x24]); // mov al, [r12]
        self.code.push(&[0x40, 0x88, 0xc7]); // mov dil, al
        self.code.push(&[0x41, 0xff, 0xd5]); // call r13
        Ok(())
    }

    fn getchar(&mut self) -> Result<(), EmitError> {
        self.code.push(&[0x41, 0xff, 0xd6]); // call r14
        self.code.push(&[0x3d, 0xff, 0xff, 0xff, 0xff]); // cmp eax, -1
        self.code.push(&[0x75, 0x07]); // jne +7 (over the "store 0" path)
        self.code.push(&[0x41, 0xc6, 0x04, 0x24, 0x00]); // mov BYTE PTR [r12], 0
        self.code.push(&[0xeb, 0x04]); // jmp +4 (past the normal store)
        self.code.push(&[0x41, 0x88, 0x04, 0x24]); // mov BYTE PTR [r12], al
        Ok(())
    }

    fn loop_start(&mut self) -> Result<(), EmitError> {
        let start_pos = self.code.len();
        self.code.push(&[0x41, 0x80, 0x3c, 0x24, 0x00]); // cmp BYTE PTR [r12], 0
        self.code.push(&[0x0f, 0x84]); // je rel32
        let placeholder = self.code.len();
        self.code.push(&[0, 0, 0, 0]);
        self.loop_stack.push((start_pos, placeholder));
        Ok(())
    }

    fn loop_end(&mut self) -> Result<(), EmitError> {
        let (start_pos, placeholder) = self
            .loop_stack
            .pop()
            .expect("emit() only calls loop_end after a matching loop_start");

        self.code.push(&[0x41, 0x80, 0x3c, 0x24, 0x00]); // cmp BYTE PTR [r12], 0

        // backward jump to start_pos
        let short_from = self.code.len() + 2; // length of the short encoding
        let short_dist = start_pos as i64 - short_from as i64;
        if (-128..=127).contains(&short_dist) {
            self.code.push(&[0x75, short_dist as i8 as u8]); // jne rel8
        } else {
            let near_from = self.code.len() + 6;
            let near_dist = (start_pos as i64 - near_from as i64) as i32;
            self.code.push(&[0x0f, 0x85]); // jne rel32
            self.code.push(&near_dist.to_le_bytes());
        }

        let end = self.code.len();
        let dist = (end as i64 - (placeholder as i64 + 4)) as i32;
        self.code.patch_i32(placeholder, dist);
        Ok(())
    }
}

/// Assembled, executable code plus the tape it runs against.
pub struct JitProgram {
    map: memmap2::Mmap,
    tape: Vec<u8>,
}

impl JitProgram {
    /// Runs the program once, reading from `input` and writing to `output`.
    pub fn run(&mut self, input: &mut dyn Read, output: &mut dyn Write) {
        // SAFETY: erasing the borrow's lifetime to 'static here is sound
        // because the raw pointers are cleared (set back to null) before
        // this call returns, so they never outlive `input`/`output`.
        let input: *mut dyn Read =
            unsafe { std::mem::transmute::<&mut dyn Read, &'static mut dyn Read>(input) };
        let output: *mut dyn Write =
            unsafe { std::mem::transmute::<&mut dyn Write, &'static mut dyn Write>(output) };
        INPUT.with(|cell| cell.set(input));
        OUTPUT.with(|cell| cell.set(output));

        // SAFETY: `map` holds freshly-assembled, well-formed code built by
        // `JitBackend` from a closed IR enum via the same visitor used by
        // every other backend; the tape buffer outlives the call.
        let entry: EntryFn = unsafe { std::mem::transmute(self.map.as_ptr()) };
        entry(putchar_trampoline, getchar_trampoline, self.tape.as_mut_ptr());

        INPUT.with(|cell| cell.set(std::ptr::null_mut::<io::Empty>() as *mut dyn Read));
        OUTPUT.with(|cell| cell.set(std::ptr::null_mut::<io::Sink>() as *mut dyn Write));
    }

    /// The tape after the most recent [`run`](Self::run).
    pub fn tape(&self) -> &[u8] {
        &self.tape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::emitter::emit;
    use crate::source::SourceFile;
    use std::path::PathBuf;

    fn assemble(src: &str) -> JitProgram {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), src.into());
        let ir = compile(&sf).unwrap();
        let mut backend = JitBackend::new();
        emit(&ir, &mut backend).unwrap();
        backend.finish(4096).unwrap()
    }

    #[test]
    fn adds_and_reports_via_tape() {
        let mut program = assemble("+++");
        let mut input = io::empty();
        let mut output = Vec::new();
        program.run(&mut input, &mut output);
        assert_eq!(program.tape()[0], 3);
    }

    #[test]
    fn putchar_reaches_the_injected_sink() {
        let mut program = assemble("+++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++.");
        let mut input = io::empty();
        let mut output = Vec::new();
        program.run(&mut input, &mut output);
        assert_eq!(output, vec![b'A']);
    }

    #[test]
    fn getchar_reads_from_the_injected_source() {
        let mut program = assemble(",.");
        let mut input: &[u8] = b"Z";
        let mut output = Vec::new();
        program.run(&mut input, &mut output);
        assert_eq!(output, vec![b'Z']);
    }

    #[test]
    fn getchar_at_eof_stores_zero() {
        let mut program = assemble(",.");
        let mut input = io::empty();
        let mut output = Vec::new();
        program.run(&mut input, &mut output);
        assert_eq!(output, vec![0]);
        assert_eq!(program.tape()[0], 0);
    }

    #[test]
    fn backward_jump_over_a_large_body_uses_the_near_encoding() {
        // A body long enough that the jne back to loop_start can't fit a
        // signed 8-bit displacement forces the near (0x0f 0x85) encoding.
        let body: String = std::iter::repeat("+>").take(40).collect();
        let src = format!("+[{body}<{}]", "<".repeat(0));
        let mut program = assemble(&src);
        let mut input = io::empty();
        let mut output = Vec::new();
        program.run(&mut input, &mut output);
    }
}
