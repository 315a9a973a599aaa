//! Shared fixtures: synthetic ELF images around hand-assembled x86-64 code.

use std::io::Write;

use tempfile::NamedTempFile;

pub const TEXT_VADDR: u64 = 0x401000;

fn u16le(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn u32le(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn u64le(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Minimal ELF64 executable: one `.text` section plus `.shstrtab`.
pub fn build_elf(text: &[u8], text_vaddr: u64) -> Vec<u8> {
    let shstrtab = b"\0.text\0.shstrtab\0";
    let text_off = 64u64;
    let shstrtab_off = text_off + text.len() as u64;
    let mut shoff = shstrtab_off + shstrtab.len() as u64;
    shoff += (8 - shoff % 8) % 8;

    let mut buf = Vec::new();
    buf.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    buf.extend_from_slice(&[0; 8]);
    u16le(&mut buf, 2); // ET_EXEC
    u16le(&mut buf, 0x3e); // EM_X86_64
    u32le(&mut buf, 1);
    u64le(&mut buf, text_vaddr); // e_entry
    u64le(&mut buf, 0); // e_phoff
    u64le(&mut buf, shoff);
    u32le(&mut buf, 0); // e_flags
    u16le(&mut buf, 64); // e_ehsize
    u16le(&mut buf, 0x38); // e_phentsize
    u16le(&mut buf, 0); // e_phnum
    u16le(&mut buf, 64); // e_shentsize
    u16le(&mut buf, 3); // e_shnum
    u16le(&mut buf, 2); // e_shstrndx
    assert_eq!(buf.len(), 64);

    buf.extend_from_slice(text);
    buf.extend_from_slice(shstrtab);
    while (buf.len() as u64) < shoff {
        buf.push(0);
    }

    // Null section header.
    buf.extend_from_slice(&[0; 64]);

    // .text
    u32le(&mut buf, 1); // sh_name
    u32le(&mut buf, 1); // SHT_PROGBITS
    u64le(&mut buf, 6); // SHF_ALLOC | SHF_EXECINSTR
    u64le(&mut buf, text_vaddr);
    u64le(&mut buf, text_off);
    u64le(&mut buf, text.len() as u64);
    u32le(&mut buf, 0);
    u32le(&mut buf, 0);
    u64le(&mut buf, 16);
    u64le(&mut buf, 0);

    // .shstrtab
    u32le(&mut buf, 7);
    u32le(&mut buf, 3); // SHT_STRTAB
    u64le(&mut buf, 0);
    u64le(&mut buf, 0);
    u64le(&mut buf, shstrtab_off);
    u64le(&mut buf, shstrtab.len() as u64);
    u32le(&mut buf, 0);
    u32le(&mut buf, 0);
    u64le(&mut buf, 1);
    u64le(&mut buf, 0);

    buf
}

pub fn write_elf(text: &[u8]) -> NamedTempFile {
    write_temp(&build_elf(text, TEXT_VADDR))
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Two functions, both discoverable:
///
/// - `0x401000`: frame-pointer prologue, calls `0x401020`, two blocks;
/// - `0x401020`: `sub rsp` prologue with a conditional diamond, three blocks.
///
/// `mov eax, 0x2a` has its immediate at offset [`PATCH_OFFSET`].
#[rustfmt::skip]
pub fn two_function_text() -> Vec<u8> {
    let mut text = vec![
        // 0x401000
        0x55,                         // push rbp
        0x48, 0x89, 0xe5,             // mov rbp, rsp
        0xe8, 0x17, 0x00, 0x00, 0x00, // call 0x401020
        0x5d,                         // pop rbp
        0xc3,                         // ret
    ];
    text.resize(0x20, 0x90);
    text.extend_from_slice(&[
        // 0x401020
        0x48, 0x83, 0xec, 0x20,       // sub rsp, 0x20
        0x85, 0xff,                   // test edi, edi
        0x75, 0x07,                   // jne 0x40102f
        0x31, 0xc0,                   // xor eax, eax
        0x48, 0x83, 0xc4, 0x20,       // add rsp, 0x20
        0xc3,                         // ret
        // 0x40102f
        0xb8, 0x2a, 0x00, 0x00, 0x00, // mov eax, 0x2a
        0x48, 0x83, 0xc4, 0x20,       // add rsp, 0x20
        0xc3,                         // ret
    ]);
    text.resize(0x50, 0x90);
    text
}

/// Offset of the `0x2a` immediate inside [`two_function_text`].
pub const PATCH_OFFSET: usize = 0x30;

/// A small leaf function that neither strategy finds through calls: a
/// push-run prologue followed by straight-line code.
#[rustfmt::skip]
pub fn leaf_function_code() -> Vec<u8> {
    vec![
        0x53,       // push rbx
        0x41, 0x54, // push r12
        0x31, 0xc0, // xor eax, eax
        0x41, 0x5c, // pop r12
        0x5b,       // pop rbx
        0xc3,       // ret
    ]
}
