//! The naive bracket-matching interpreter backing `-O 0`. It walks the
//! trimmed source directly, rediscovering each `[`/`]` partner by scanning
//! rather than consulting a resolved IR, and is kept only because the CLI's
//! optimization-level knob names it as a mode; its own structure is an
//! external collaborator, not part of the core lowering pipeline.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Default tape size, matching [`crate::interpreter::DEFAULT_HEAP_SIZE`].
pub const DEFAULT_HEAP_SIZE: usize = crate::interpreter::DEFAULT_HEAP_SIZE;

/// Runs `src` (already trimmed to the eight Brainfuck characters) against
/// `input`/`output`, re-scanning for each bracket's partner on every jump.
pub fn run(
    src: &[u8],
    heap_size: usize,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<(), DirectError> {
    let mut tape = vec![0u8; heap_size];
    let mut hp: usize = 0;
    let mut pc: usize = 0;

    while pc < src.len() {
        match src[pc] {
            b'+' => {
                let cell = cell(&mut tape, hp)?;
                *cell = cell.wrapping_add(1);
            }
            b'-' => {
                let cell = cell(&mut tape, hp)?;
                *cell = cell.wrapping_sub(1);
            }
            b'>' => hp = move_hp(hp, 1, tape.len())?,
            b'<' => hp = move_hp(hp, -1, tape.len())?,
            b'.' => {
                let byte = *cell(&mut tape, hp)?;
                output.write_all(&[byte]).map_err(DirectError::Io)?;
            }
            b',' => {
                output.flush().map_err(DirectError::Io)?;
                let mut buf = [0u8; 1];
                let byte = match input.read(&mut buf).map_err(DirectError::Io)? {
                    0 => 0,
                    _ => buf[0],
                };
                *cell(&mut tape, hp)? = byte;
            }
            b'[' => {
                if *cell(&mut tape, hp)? == 0 {
                    pc = matching_close(src, pc)?;
                }
            }
            b']' => {
                if *cell(&mut tape, hp)? != 0 {
                    pc = matching_open(src, pc)?;
                }
            }
            _ => unreachable!("caller trims to the eight significant characters"),
        }
        pc += 1;
    }

    output.write_all(b"\n").map_err(DirectError::Io)?;
    output.flush().map_err(DirectError::Io)
}

fn cell(tape: &mut [u8], at: usize) -> Result<&mut u8, DirectError> {
    tape.get_mut(at).ok_or(DirectError::PointerOutOfBounds { at })
}

fn move_hp(hp: usize, by: i32, len: usize) -> Result<usize, DirectError> {
    let moved = hp as i64 + by as i64;
    if moved < 0 || moved as usize >= len {
        return Err(DirectError::PointerOutOfBounds {
            at: moved.max(0) as usize,
        });
    }
    Ok(moved as usize)
}

/// Scans forward from `open` (a `[`) for its matching `]`, tracking nesting.
fn matching_close(src: &[u8], open: usize) -> Result<usize, DirectError> {
    let mut depth = 0usize;
    for (i, &b) in src.iter().enumerate().skip(open) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(DirectError::UnmatchedBracket { at: open })
}

/// Scans backward from `close` (a `]`) for its matching `[`, tracking nesting.
fn matching_open(src: &[u8], close: usize) -> Result<usize, DirectError> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match src[i] {
            b']' => depth += 1,
            b'[' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(DirectError::UnmatchedBracket { at: close })
}

/// Failure while running the direct interpreter.
#[derive(Debug, Error)]
pub enum DirectError {
    #[error("tape pointer went out of bounds at cell {at}")]
    PointerOutOfBounds { at: usize },
    #[error("unmatched bracket at source byte {at}")]
    UnmatchedBracket { at: usize },
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_str(src: &str, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        run(src.as_bytes(), 1024, &mut &input[..], &mut output).unwrap();
        output
    }

    #[test]
    fn hello_world_matches_the_ir_interpreter() {
        let src = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.\
<-.<.+++.------.--------.>>+.>++.";
        let out = run_str(src, &[]);
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), "Hello World!");
    }

    #[test]
    fn echoes_input_until_eof_then_zero() {
        let out = run_str(",.,.,.", b"AB");
        assert_eq!(out, b"AB\0\n");
    }

    #[test]
    fn nested_loops_resolve_their_own_brackets() {
        let out = run_str("++[>++[>+<-]<-]>>.", &[]);
        assert_eq!(out, vec![4, b'\n']);
    }

    #[test]
    fn pointer_out_of_bounds_is_reported() {
        let mut output = Vec::new();
        let err = run(b"<", 1024, &mut io::empty(), &mut output).unwrap_err();
        assert!(matches!(err, DirectError::PointerOutOfBounds { at: 0 }));
    }
}
