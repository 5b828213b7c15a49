//! Compiles a trimmed Brainfuck program straight to resolved IR, applying
//! the peephole catalogue (`rules`) as each loop closes rather than as a
//! separate optimization pass over a literal translation.

mod context;
pub mod error;
mod rules;

use crate::error::Lint;
use crate::ir::Ir;
use crate::source::SourceFile;

pub use error::CompileError;

/// Compiles `source`'s program into IR.
///
/// Runs of `+`/`-` and of `<`/`>` are folded to a single signed `Add`/
/// `MovePointer` as they're read (a net-zero run vanishes entirely), `+`/`-`
/// also fold into a preceding `Assign` (R1), and every `]` triggers R2-R6
/// against the loop body that just closed.
pub fn compile(source: &SourceFile) -> Result<Vec<Ir>, CompileError> {
    let mut compiler = context::Compiler::new();
    let mut open_offsets: Vec<usize> = Vec::new();

    let mut chars = source
        .contents()
        .char_indices()
        .filter(|(_, c)| matches!(c, '+' | '-' | '<' | '>' | '.' | ',' | '[' | ']'))
        .peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '+' | '-' => {
                let mut run = if c == '+' { 1 } else { -1 };
                while let Some(&(_, next)) = chars.peek() {
                    match next {
                        '+' => run += 1,
                        '-' => run -= 1,
                        _ => break,
                    }
                    chars.next();
                }
                let run = wrap_add(run);
                if run != 0 {
                    compiler.push_add(run);
                }
            }
            '<' | '>' => {
                let mut run = if c == '>' { 1 } else { -1 };
                while let Some(&(_, next)) = chars.peek() {
                    match next {
                        '>' => run += 1,
                        '<' => run -= 1,
                        _ => break,
                    }
                    chars.next();
                }
                if run != 0 {
                    compiler.push_move(run);
                }
            }
            '.' => compiler.push_putchar(),
            ',' => compiler.push_getchar(),
            '[' => {
                open_offsets.push(offset);
                compiler.open_loop();
            }
            ']' => match open_offsets.pop() {
                Some(_) => {
                    let closed = compiler.close_loop();
                    debug_assert!(closed, "bracket stacks fell out of sync");
                }
                None => {
                    return Err(CompileError::UnmatchedBracket {
                        lint: Some(Lint::error_at(source, offset)),
                    });
                }
            },
            _ => unreachable!("filtered to the eight significant characters"),
        }
    }

    if let Some(&offset) = open_offsets.last() {
        return Err(CompileError::UnmatchedBracket {
            lint: Some(Lint::error_at(source, offset)),
        });
    }

    Ok(compiler.finish())
}

/// Clamps a run-compressed `+`/`-` count to `Add`'s documented `-255..=255`
/// range; a longer literal run still nets out to a value in that range once
/// taken mod 256, so this just picks the representative closer to zero.
fn wrap_add(run: i32) -> i32 {
    let m = run.rem_euclid(256);
    if m > 128 {
        m - 256
    } else {
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn compile_str(src: &str) -> Vec<Ir> {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), src.into());
        compile(&sf).expect("should compile")
    }

    #[test]
    fn run_compression() {
        let ir = compile_str("+++--");
        assert_eq!(ir, vec![Ir::Add(1)]);

        let ir = compile_str(">>><");
        assert_eq!(ir, vec![Ir::MovePointer(2)]);
    }

    #[test]
    fn net_zero_run_vanishes() {
        let ir = compile_str("++--");
        assert!(ir.is_empty());

        let ir = compile_str("><");
        assert!(ir.is_empty());
    }

    #[test]
    fn clear_cell_loop() {
        let ir = compile_str("[-]");
        assert_eq!(ir, vec![Ir::Assign(0)]);
    }

    #[test]
    fn copy_loop_end_to_end() {
        let ir = compile_str("[->+<]");
        assert_eq!(
            ir,
            vec![Ir::If(3), Ir::AddVar(1), Ir::Assign(0), Ir::EndIf(0)]
        );
    }

    #[test]
    fn nested_nonreducible_loop_resolves_targets() {
        // A Putchar inside the body rules out R5, so this stays a plain
        // loop: Add(1), LoopStart(7), MovePointer(1), Add(1), Putchar,
        // MovePointer(-1), Add(-1), LoopEnd(1).
        let ir = compile_str("+[>+.<-]");
        assert_eq!(ir[0], Ir::Add(1));
        assert_eq!(ir[1], Ir::LoopStart(7));
        assert_eq!(ir[6], Ir::Add(-1));
        assert_eq!(ir[7], Ir::LoopEnd(1));
        assert!(crate::ir::is_balanced(&ir));
    }

    #[test]
    fn unmatched_close_bracket_is_an_error() {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), "+]".into());
        let err = compile(&sf).unwrap_err();
        assert!(matches!(err, CompileError::UnmatchedBracket { lint: Some(_) }));
    }

    #[test]
    fn unclosed_open_bracket_is_an_error() {
        let sf = SourceFile::from_raw_parts(PathBuf::from("<test>"), "[+".into());
        let err = compile(&sf).unwrap_err();
        assert!(matches!(err, CompileError::UnmatchedBracket { lint: Some(_) }));
    }

    #[test]
    fn ignores_non_brainfuck_bytes() {
        let ir = compile_str("hi [-]. bye");
        assert_eq!(ir, vec![Ir::Assign(0), Ir::Putchar]);
    }

    #[test]
    fn assign_add_fusion_across_a_clear_then_literal() {
        // [-] clears to Assign(0); the following +++ should fold into it.
        let ir = compile_str("[-]+++");
        assert_eq!(ir, vec![Ir::Assign(3)]);
    }
}
