//! The peephole catalogue (spec §4.1, rules R1-R6), applied as the compiler
//! closes a loop or is about to push a run-compressed `Add`.
//!
//! Each rule is a small, independently testable function over the IR buffer
//! being built, mirroring how the teacher's optimiser splits its rewrites
//! into one function per idiom rather than one large `match`.

use crate::ir::Ir;

/// R1, assign-then-add fusion. Called instead of unconditionally pushing
/// `Add(k)`: if the tail is `Assign(v)`, folds `k` into it and reports that
/// nothing further needs pushing.
pub fn fuse_assign_add(ir: &mut [Ir], k: i32) -> bool {
    match ir.last() {
        Some(&Ir::Assign(v)) => {
            let folded = (v as i32 + k).rem_euclid(256) as u8;
            let last = ir.len() - 1;
            ir[last] = Ir::Assign(folded);
            true
        }
        _ => false,
    }
}

/// Outcome of closing a `[ ... ]` span: either the loop collapsed into a
/// derived opcode (and the IR buffer has already been rewritten in place),
/// or none of R2-R5 applied and the caller must fall back to R6 (emit a
/// plain `LoopEnd`).
pub enum Closed {
    Reduced,
    Unchanged,
}

/// Tries R2 (empty loop), R3 (clear cell), R4 (scan to zero) and R5
/// (copy/multiply loop) in that order, against the loop body
/// `ir[base + 1..]` where `ir[base]` is the `LoopStart` being closed.
pub fn try_close_loop(ir: &mut Vec<Ir>, base: usize) -> Closed {
    let body_len = ir.len() - (base + 1);

    // R2: empty body.
    if body_len == 0 {
        ir.truncate(base);
        ir.push(Ir::InfLoop);
        log::debug!("R2 fired at ir[{base}]: empty loop -> InfLoop");
        return Closed::Reduced;
    }

    // R3 / R4: single-instruction body.
    if body_len == 1 {
        match ir[base + 1] {
            Ir::Add(k) if k.abs() == 1 => {
                ir.truncate(base);
                ir.push(Ir::Assign(0));
                log::debug!("R3 fired at ir[{base}]: clear cell -> Assign(0)");
                return Closed::Reduced;
            }
            Ir::MovePointer(n) => {
                ir.truncate(base);
                ir.push(Ir::SearchZero(n));
                log::debug!("R4 fired at ir[{base}]: scan to zero, stride {n}");
                return Closed::Reduced;
            }
            _ => return Closed::Unchanged,
        }
    }

    // R5: copy/multiply loop.
    if try_copy_multiply(ir, base) {
        log::debug!("R5 fired at ir[{base}]: copy/multiply loop");
        return Closed::Reduced;
    }

    Closed::Unchanged
}

/// R5. Recognizes a decrement-and-distribute body: a single `Add(-1)` at
/// one edge of the body, a single bare `MovePointer` (the "rollback") at
/// the other edge, and zero or more `(MovePointer, Add)` pairs in between
/// whose offsets (relative to the home cell) never return to zero before
/// the end, and whose total displacement plus the rollback sums to zero.
///
/// Ported from the reference's `]`-handling in its compiler pass (see
/// `original_source/Brainfuck.hpp`), which places the decrementer at
/// either the start (`[->+<]`) or the end (`[>+<-]`) of the body rather
/// than requiring every element to literally be a `(MovePointer, Add)`
/// pair, as an overly literal reading of the idiom catalogue might suggest.
fn try_copy_multiply(ir: &mut Vec<Ir>, base: usize) -> bool {
    let size = ir.len();
    let decrement_at_end = matches!(ir[size - 1], Ir::Add(-1));
    let decrement_at_start = !decrement_at_end && matches!(ir[base + 1], Ir::Add(-1));

    let (pairs_start, pairs_end, rollback) = if decrement_at_end {
        let rollback = match ir[size - 2] {
            Ir::MovePointer(m) => m,
            _ => return false,
        };
        (base + 1, size - 2, rollback)
    } else if decrement_at_start {
        let rollback = match ir[size - 1] {
            Ir::MovePointer(m) => m,
            _ => return false,
        };
        (base + 2, size - 1, rollback)
    } else {
        return false;
    };

    if pairs_end < pairs_start || (pairs_end - pairs_start) % 2 != 0 {
        return false;
    }

    let mut offset = 0i32;
    let mut derived = Vec::with_capacity((pairs_end - pairs_start) / 2 + 1);
    let mut i = pairs_start;
    while i < pairs_end {
        let (mv, add) = (ir[i], ir[i + 1]);
        let (m, k) = match (mv, add) {
            (Ir::MovePointer(m), Ir::Add(k)) => (m, k),
            _ => return false,
        };
        offset += m;
        if offset == 0 {
            // Would target the home cell itself; AddVar/SubVar/AddCMulVar
            // require a non-zero offset. Decline rather than emit an
            // instruction that violates that invariant.
            return false;
        }
        derived.push(match k {
            1 => Ir::AddVar(offset),
            -1 => Ir::SubVar(offset),
            k => Ir::AddCMulVar(offset, k),
        });
        i += 2;
    }

    if offset + rollback != 0 {
        return false;
    }

    ir.truncate(base);
    let if_idx = ir.len();
    ir.push(Ir::If(0)); // patched below, once EndIf's index is known
    ir.extend(derived);
    ir.push(Ir::Assign(0));
    let end_if_idx = ir.len();
    ir.push(Ir::EndIf(if_idx));
    ir[if_idx] = Ir::If(end_if_idx);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_body(open_and_body: &[Ir]) -> Vec<Ir> {
        let mut ir = open_and_body.to_vec();
        let base = 0;
        match try_close_loop(&mut ir, base) {
            Closed::Reduced => ir,
            Closed::Unchanged => {
                let end_idx = ir.len();
                ir[base] = Ir::LoopStart(end_idx);
                ir.push(Ir::LoopEnd(base));
                ir
            }
        }
    }

    #[test]
    fn fuse_assign_add_folds_into_tail() {
        let mut ir = vec![Ir::Assign(8)];
        assert!(fuse_assign_add(&mut ir, 3));
        assert_eq!(ir, vec![Ir::Assign(11)]);

        let mut ir = vec![Ir::Assign(250)];
        assert!(fuse_assign_add(&mut ir, 10));
        assert_eq!(ir, vec![Ir::Assign(4)]);
    }

    #[test]
    fn fuse_assign_add_declines_without_assign_tail() {
        let mut ir = vec![Ir::Putchar];
        assert!(!fuse_assign_add(&mut ir, 3));
    }

    #[test]
    fn r2_empty_loop_becomes_infloop() {
        let ir = compile_body(&[Ir::LoopStart(0)]);
        assert_eq!(ir, vec![Ir::InfLoop]);
    }

    #[test]
    fn r3_clear_cell() {
        let ir = compile_body(&[Ir::LoopStart(0), Ir::Add(-1)]);
        assert_eq!(ir, vec![Ir::Assign(0)]);

        let ir = compile_body(&[Ir::LoopStart(0), Ir::Add(1)]);
        assert_eq!(ir, vec![Ir::Assign(0)]);
    }

    #[test]
    fn r4_scan_zero() {
        let ir = compile_body(&[Ir::LoopStart(0), Ir::MovePointer(1)]);
        assert_eq!(ir, vec![Ir::SearchZero(1)]);

        let ir = compile_body(&[Ir::LoopStart(0), Ir::MovePointer(-3)]);
        assert_eq!(ir, vec![Ir::SearchZero(-3)]);
    }

    #[test]
    fn r5_copy_loop_decrement_first() {
        // [->+<]
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::Add(-1),
            Ir::MovePointer(1),
            Ir::Add(1),
            Ir::MovePointer(-1),
        ]);
        assert_eq!(
            ir,
            vec![Ir::If(3), Ir::AddVar(1), Ir::Assign(0), Ir::EndIf(0)]
        );
    }

    #[test]
    fn r5_copy_loop_decrement_last() {
        // [>+<-]
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::MovePointer(1),
            Ir::Add(1),
            Ir::MovePointer(-1),
            Ir::Add(-1),
        ]);
        assert_eq!(
            ir,
            vec![Ir::If(3), Ir::AddVar(1), Ir::Assign(0), Ir::EndIf(0)]
        );
    }

    #[test]
    fn r5_multi_target_copy_loop() {
        // [->+>+<<]  (distribute to two cells with constant 1 each)
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::Add(-1),
            Ir::MovePointer(1),
            Ir::Add(1),
            Ir::MovePointer(1),
            Ir::Add(1),
            Ir::MovePointer(-2),
        ]);
        assert_eq!(
            ir,
            vec![
                Ir::If(4),
                Ir::AddVar(1),
                Ir::AddVar(2),
                Ir::Assign(0),
                Ir::EndIf(0)
            ]
        );
    }

    #[test]
    fn r5_constant_multiply() {
        // [->+++<]  multiply by 3 into the next cell
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::Add(-1),
            Ir::MovePointer(1),
            Ir::Add(3),
            Ir::MovePointer(-1),
        ]);
        assert_eq!(
            ir,
            vec![Ir::If(3), Ir::AddCMulVar(1, 3), Ir::Assign(0), Ir::EndIf(0)]
        );
    }

    #[test]
    fn r5_declines_on_nonzero_net_movement() {
        // [->>+<]  pointer does not return home
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::Add(-1),
            Ir::MovePointer(2),
            Ir::Add(1),
            Ir::MovePointer(-1),
        ]);
        assert_eq!(ir[0], Ir::LoopStart(5));
        assert!(matches!(ir.last(), Some(Ir::LoopEnd(0))));
    }

    #[test]
    fn r5_declines_when_body_contains_io() {
        // [-.+<] : contains a Putchar, cannot be a pure copy loop.
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::Add(-1),
            Ir::Putchar,
            Ir::Add(1),
            Ir::MovePointer(-1),
        ]);
        assert!(matches!(ir.last(), Some(Ir::LoopEnd(0))));
    }

    #[test]
    fn r5_declines_without_decrementer() {
        let ir = compile_body(&[
            Ir::LoopStart(0),
            Ir::MovePointer(1),
            Ir::Add(1),
            Ir::MovePointer(-1),
        ]);
        assert!(matches!(ir.last(), Some(Ir::LoopEnd(0))));
    }
}
