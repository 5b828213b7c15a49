//! Assembles the final ELF file: header, program headers, the already
//! machine-code'd body, and a trailing minimal section table. Two PT_LOAD
//! segments are emitted (spec §6): one covering the headers and code
//! (R+X), one describing the zero-filled `.bss` tape (R+W, `filesz` 0).

use super::{ElfArch, BASE_VADDR};

const BSS_VADDR: u64 = super::BSS_VADDR;

enum Word {
    W32,
    W64,
}

fn word(arch: ElfArch) -> Word {
    match arch {
        ElfArch::X86 | ElfArch::ArmEabi => Word::W32,
        ElfArch::X64 => Word::W64,
    }
}

fn e_machine(arch: ElfArch) -> u16 {
    match arch {
        ElfArch::X86 => 3,      // EM_386
        ElfArch::X64 => 62,     // EM_X86_64
        ElfArch::ArmEabi => 40, // EM_ARM
    }
}

pub fn build(arch: ElfArch, code: Vec<u8>, heap_size: usize) -> Vec<u8> {
    match word(arch) {
        Word::W32 => build32(arch, code, heap_size),
        Word::W64 => build64(arch, code, heap_size),
    }
}

const SHSTRTAB: &[u8] = b"\0.shstrtab\0.text\0.bss\0";

fn build32(arch: ElfArch, code: Vec<u8>, heap_size: usize) -> Vec<u8> {
    const EHSIZE: usize = 52;
    const PHENTSIZE: usize = 32;
    const SHENTSIZE: usize = 40;
    let phoff = EHSIZE as u32;
    let text_start = phoff as usize + 2 * PHENTSIZE;
    let entry = BASE_VADDR as u32 + text_start as u32;
    let shoff = (text_start + code.len()) as u32;
    let shstrtab_off = shoff + 4 * SHENTSIZE as u32;

    let mut out = Vec::new();
    push_ident(&mut out, 1); // ELFCLASS32
    push_u16(&mut out, 2); // ET_EXEC
    push_u16(&mut out, e_machine(arch));
    push_u32(&mut out, 1); // e_version
    push_u32(&mut out, entry);
    push_u32(&mut out, phoff);
    push_u32(&mut out, shoff);
    push_u32(&mut out, 0); // e_flags
    push_u16(&mut out, EHSIZE as u16);
    push_u16(&mut out, PHENTSIZE as u16);
    push_u16(&mut out, 2); // e_phnum
    push_u16(&mut out, SHENTSIZE as u16);
    push_u16(&mut out, 4); // e_shnum
    push_u16(&mut out, 1); // e_shstrndx

    // PT_LOAD: text+headers
    push_u32(&mut out, 1); // PT_LOAD
    push_u32(&mut out, 0); // p_offset
    push_u32(&mut out, BASE_VADDR as u32);
    push_u32(&mut out, BASE_VADDR as u32);
    push_u32(&mut out, (text_start + code.len()) as u32);
    push_u32(&mut out, (text_start + code.len()) as u32);
    push_u32(&mut out, 5); // R+X
    push_u32(&mut out, 0x1000);

    // PT_LOAD: bss
    push_u32(&mut out, 1);
    push_u32(&mut out, 0);
    push_u32(&mut out, BSS_VADDR as u32);
    push_u32(&mut out, BSS_VADDR as u32);
    push_u32(&mut out, 0); // filesz
    push_u32(&mut out, heap_size as u32); // memsz
    push_u32(&mut out, 6); // R+W
    push_u32(&mut out, 0x1000);

    debug_assert_eq!(out.len(), text_start);
    out.extend_from_slice(&code);

    push_section_headers_32(&mut out, &code, shstrtab_off);
    out.extend_from_slice(SHSTRTAB);
    out
}

fn build64(arch: ElfArch, code: Vec<u8>, heap_size: usize) -> Vec<u8> {
    const EHSIZE: usize = 64;
    const PHENTSIZE: usize = 56;
    const SHENTSIZE: usize = 64;
    let phoff = EHSIZE as u64;
    let text_start = phoff as usize + 2 * PHENTSIZE;
    let entry = BASE_VADDR + text_start as u64;
    let shoff = (text_start + code.len()) as u64;
    let shstrtab_off = shoff + 4 * SHENTSIZE as u64;

    let mut out = Vec::new();
    push_ident(&mut out, 2); // ELFCLASS64
    push_u16(&mut out, 2); // ET_EXEC
    push_u16(&mut out, e_machine(arch));
    push_u32(&mut out, 1);
    push_u64(&mut out, entry);
    push_u64(&mut out, phoff);
    push_u64(&mut out, shoff);
    push_u32(&mut out, 0);
    push_u16(&mut out, EHSIZE as u16);
    push_u16(&mut out, PHENTSIZE as u16);
    push_u16(&mut out, 2);
    push_u16(&mut out, SHENTSIZE as u16);
    push_u16(&mut out, 4);
    push_u16(&mut out, 1);

    push_u32(&mut out, 1); // PT_LOAD
    push_u32(&mut out, 5); // R+X
    push_u64(&mut out, 0);
    push_u64(&mut out, BASE_VADDR);
    push_u64(&mut out, BASE_VADDR);
    push_u64(&mut out, (text_start + code.len()) as u64);
    push_u64(&mut out, (text_start + code.len()) as u64);
    push_u64(&mut out, 0x1000);

    push_u32(&mut out, 1);
    push_u32(&mut out, 6); // R+W
    push_u64(&mut out, 0);
    push_u64(&mut out, BSS_VADDR);
    push_u64(&mut out, BSS_VADDR);
    push_u64(&mut out, 0);
    push_u64(&mut out, heap_size as u64);
    push_u64(&mut out, 0x1000);

    debug_assert_eq!(out.len(), text_start);
    out.extend_from_slice(&code);

    push_section_headers_64(&mut out, &code, shstrtab_off);
    out.extend_from_slice(SHSTRTAB);
    out
}

fn push_section_headers_32(out: &mut Vec<u8>, code: &[u8], shstrtab_off: u32) {
    // null section
    out.extend_from_slice(&[0u8; 40]);
    // .shstrtab
    push_section32(out, 1, 3, 0, shstrtab_off, SHSTRTAB.len() as u32, 0, 0, 1, 0);
    // .text
    push_section32(out, 11, 1, 6, BASE_VADDR as u32, code.len() as u32, 0, 0, 16, 0);
    // .bss
    push_section32(out, 17, 8, 3, BSS_VADDR as u32, 0, 0, 0, 16, 0);
}

#[allow(clippy::too_many_arguments)]
fn push_section32(
    out: &mut Vec<u8>,
    name: u32,
    ty: u32,
    flags: u32,
    addr: u32,
    size: u32,
    link: u32,
    info: u32,
    align: u32,
    entsize: u32,
) {
    push_u32(out, name);
    push_u32(out, ty);
    push_u32(out, flags);
    push_u32(out, addr);
    push_u32(out, addr); // sh_offset (unused by us; reuse addr as a placeholder)
    push_u32(out, size);
    push_u32(out, link);
    push_u32(out, info);
    push_u32(out, align);
    push_u32(out, entsize);
}

fn push_section_headers_64(out: &mut Vec<u8>, code: &[u8], shstrtab_off: u64) {
    out.extend_from_slice(&[0u8; 64]);
    push_section64(out, 1, 3, 0, shstrtab_off, SHSTRTAB.len() as u64, 0, 0, 1, 0);
    push_section64(out, 11, 1, 6, BASE_VADDR, code.len() as u64, 0, 0, 16, 0);
    push_section64(out, 17, 8, 3, BSS_VADDR, 0, 0, 0, 16, 0);
}

#[allow(clippy::too_many_arguments)]
fn push_section64(
    out: &mut Vec<u8>,
    name: u32,
    ty: u32,
    flags: u64,
    addr: u64,
    size: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
) {
    push_u32(out, name);
    push_u32(out, ty);
    push_u64(out, flags);
    push_u64(out, addr);
    push_u64(out, addr);
    push_u64(out, size);
    push_u32(out, link);
    push_u32(out, info);
    push_u64(out, align);
    push_u64(out, entsize);
}

fn push_ident(out: &mut Vec<u8>, class: u8) {
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    out.push(class);
    out.push(1); // ELFDATA2LSB
    out.push(1); // EV_CURRENT
    out.push(0); // ELFOSABI_SYSV
    out.extend_from_slice(&[0u8; 8]); // padding
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
