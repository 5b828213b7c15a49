//! ARM EABI (32-bit, little-endian) code generation for `elfarmeabi`. The
//! tape pointer lives in `r4`, cell values are staged through `r3`, and I/O
//! goes through the same EABI syscall numbers as `elfx86`'s `int 0x80`
//! (`write`=4, `read`=3, `exit`=1), issued via `svc 0`.
//!
//! Every instruction here is built from the generic data-processing/branch/
//! load-store field layouts rather than copied as opaque byte literals, so
//! the encodings stay checkable against the ARM instruction formats instead
//! of being magic numbers.

use crate::emitter::codebuf::CodeBuffer;
use crate::emitter::EmitError;

const COND_AL: u32 = 0xE;
const COND_EQ: u32 = 0x0;
const COND_NE: u32 = 0x1;

const OP_SUB: u32 = 0x2;
const OP_ADD: u32 = 0x4;
const OP_CMP: u32 = 0xA;
const OP_MOV: u32 = 0xD;

fn data_imm(cond: u32, opcode: u32, s: bool, rn: u32, rd: u32, imm8: u32) -> [u8; 4] {
    let word = (cond << 28) | (0b001 << 25) | (opcode << 21) | ((s as u32) << 20)
        | (rn << 16) | (rd << 12) | imm8;
    word.to_le_bytes()
}

fn mov_reg(cond: u32, rd: u32, rm: u32) -> [u8; 4] {
    let word = (cond << 28) | (0b00011010 << 20) | (rd << 12) | rm;
    word.to_le_bytes()
}

fn ldrstrb(cond: u32, load: bool, rn: u32, rt: u32) -> [u8; 4] {
    let l = if load { 1 } else { 0 };
    // bits27-24 = 0101 (I=0 immediate offset, P=1 offset addressing);
    // bits23-20 = U=1,B=1,W=0,L.
    let word = (cond << 28) | (0b0101 << 24) | ((0b1100 | l) << 20) | (rn << 16) | (rt << 12);
    word.to_le_bytes()
}

fn branch(cond: u32, imm24: i32) -> [u8; 4] {
    let word = (cond << 28) | (0xA << 24) | (imm24 as u32 & 0x00ff_ffff);
    word.to_le_bytes()
}

/// ARM's `B`/`BNE` carry a 24-bit signed word-granular offset: +-2^23 words,
/// i.e. roughly +-32 MiB of byte distance from the instruction after the
/// branch. A loop body large enough to exceed that silently wrapped to the
/// wrong target before this check existed; now it's a hard error instead.
fn branch_offset(dist: i64) -> Result<i32, EmitError> {
    debug_assert_eq!(dist % 4, 0, "branch targets are always word-aligned");
    let words = dist / 4;
    if !(-(1i64 << 23)..(1i64 << 23)).contains(&words) {
        return Err(EmitError::OffsetOutOfRange { offset: dist });
    }
    Ok(words as i32)
}

fn svc0() -> [u8; 4] {
    ((0xFu32) << 28 | 0xF << 24).to_le_bytes()
}

/// `mov rd, #imm` for a value that may not fit a rotated 8-bit immediate:
/// `movw`/`movt` (ARMv6T2+), which this target assumes.
fn load_imm32(buf: &mut CodeBuffer, rd: u32, imm32: u32) {
    let lo = imm32 & 0xffff;
    let hi = (imm32 >> 16) & 0xffff;
    let movw = (COND_AL << 28) | (0x30 << 20) | (((lo >> 12) & 0xf) << 16) | (rd << 12) | (lo & 0xfff);
    let movt = (COND_AL << 28) | (0x34 << 20) | (((hi >> 12) & 0xf) << 16) | (rd << 12) | (hi & 0xfff);
    buf.push(&movw.to_le_bytes());
    buf.push(&movt.to_le_bytes());
}

const R0: u32 = 0;
const R1: u32 = 1;
const R2: u32 = 2;
const R3: u32 = 3;
const R4: u32 = 4;
const R7: u32 = 7;

pub fn prologue(buf: &mut CodeBuffer) {
    load_imm32(buf, R4, super::BSS_VADDR as u32);
}

fn syscall(buf: &mut CodeBuffer, number: u32, a0: u32, a1: Option<u32>, a2: Option<u32>) {
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R0, a0));
    if let Some(r1) = a1 {
        buf.push(&mov_reg(COND_AL, R1, r1));
    }
    if let Some(count) = a2 {
        buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R2, count));
    }
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R7, number));
    buf.push(&svc0());
}

pub fn exit_sequence(buf: &mut CodeBuffer) {
    syscall(buf, 1, 0, None, None);
}

pub fn move_by(buf: &mut CodeBuffer, n: i32) {
    let op = if n >= 0 { OP_ADD } else { OP_SUB };
    for _ in 0..n.unsigned_abs() {
        buf.push(&data_imm(COND_AL, op, false, R4, R4, 1));
    }
}

pub fn add_by(buf: &mut CodeBuffer, n: i32) {
    buf.push(&ldrstrb(COND_AL, true, R4, R3));
    let op = if n >= 0 { OP_ADD } else { OP_SUB };
    for _ in 0..n.unsigned_abs() {
        buf.push(&data_imm(COND_AL, op, false, R3, R3, 1));
    }
    buf.push(&ldrstrb(COND_AL, false, R4, R3));
}

pub fn write_one_byte(buf: &mut CodeBuffer) {
    // write(1, r4, 1)
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R0, 1));
    buf.push(&mov_reg(COND_AL, R1, R4));
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R2, 1));
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R7, 4));
    buf.push(&svc0());
}

pub fn read_one_byte(buf: &mut CodeBuffer) {
    // read(0, r4, 1); if eax == 0 (EOF), store 0 at [r4]
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R0, 0));
    buf.push(&mov_reg(COND_AL, R1, R4));
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R2, 1));
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R7, 3));
    buf.push(&svc0());
    buf.push(&data_imm(COND_AL, OP_CMP, true, R0, 0, 0)); // cmp r0, #0
    buf.push(&branch(COND_NE, 1)); // bne +1 instruction
    buf.push(&data_imm(COND_AL, OP_MOV, false, 0, R3, 0)); // mov r3, #0
    buf.push(&ldrstrb(COND_AL, false, R4, R3)); // strb r3, [r4]
}

/// Emits `ldrb r3,[r4]; cmp r3,#0; beq <placeholder>` and returns where the
/// instruction (whose low 24 bits carry the branch offset) starts.
pub fn branch_if_zero_placeholder(buf: &mut CodeBuffer) -> (super::OperandWidth, usize) {
    buf.push(&ldrstrb(COND_AL, true, R4, R3));
    buf.push(&data_imm(COND_AL, OP_CMP, true, R3, 0, 0));
    let at = buf.len();
    buf.push(&branch(COND_EQ, 0));
    (super::OperandWidth::ArmRel24, at)
}

pub fn branch_if_nonzero(buf: &mut CodeBuffer, start: usize) -> Result<(), EmitError> {
    buf.push(&ldrstrb(COND_AL, true, R4, R3));
    buf.push(&data_imm(COND_AL, OP_CMP, true, R3, 0, 0));
    let at = buf.len();
    let dist = start as i64 - (at as i64 + 8);
    let imm24 = branch_offset(dist)?;
    buf.push(&branch(COND_NE, imm24));
    Ok(())
}

/// Patches a branch instruction's low 24 bits once its target offset (in
/// bytes, from the start of the code buffer) is known.
pub fn patch_branch(buf: &mut CodeBuffer, at: usize, target: usize) -> Result<(), EmitError> {
    let dist = target as i64 - (at as i64 + 8);
    let imm24 = branch_offset(dist)?;
    let cond = (buf.as_slice()[at + 3] >> 4) as u32;
    buf.patch_bytes(at, &branch(cond, imm24));
    Ok(())
}
