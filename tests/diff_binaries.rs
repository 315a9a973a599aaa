//! End-to-end scenarios over synthetic ELF images on disk.

mod common;

use bindelta::differ::diff_binaries;
use common::{
    leaf_function_code, two_function_text, write_elf, write_temp, PATCH_OFFSET, TEXT_VADDR,
};

#[test]
fn identical_binaries_match_completely() {
    let file = write_elf(&two_function_text());

    let result = diff_binaries(file.path(), file.path()).unwrap();

    assert!(result.unmatched_primary.is_empty());
    assert!(result.unmatched_secondary.is_empty());
    assert_eq!(result.matched.len(), 2);
    for m in &result.matched {
        assert_eq!(m.similarity(), 1.0);
        assert_eq!(m.primary.start_address, m.secondary.start_address);
        assert!(m.primary.diff_details.is_empty());
    }
    assert_eq!(result.overall_similarity(), 1.0);
}

#[test]
fn single_byte_patch_shows_one_modified_function() {
    let primary = write_elf(&two_function_text());

    let mut patched = two_function_text();
    assert_eq!(patched[PATCH_OFFSET], 0x2a);
    patched[PATCH_OFFSET] = 0x2b; // mov eax, 0x2a -> mov eax, 0x2b
    let secondary = write_elf(&patched);

    let result = diff_binaries(primary.path(), secondary.path()).unwrap();

    assert!(result.unmatched_primary.is_empty());
    assert!(result.unmatched_secondary.is_empty());
    assert_eq!(result.matched.len(), 2);

    let unchanged: Vec<_> = result.matched.iter().filter(|m| m.is_unchanged()).collect();
    let modified: Vec<_> = result.matched.iter().filter(|m| !m.is_unchanged()).collect();
    assert_eq!(unchanged.len(), 1);
    assert_eq!(modified.len(), 1);

    let m = modified[0];
    assert!(m.similarity() > 0.5 && m.similarity() < 1.0);
    assert_eq!(m.primary.start_address, TEXT_VADDR + 0x20);
    assert_eq!(m.primary.diff_details.len(), 1);

    let detail = &m.primary.diff_details[0];
    assert!(detail.starts_with("Block at 0x40102f -> 0x40102f"), "got: {detail}");
    assert!(detail.contains("- mov eax, 0x2a"));
    assert!(detail.contains("+ mov eax, 0x2b"));
}

#[test]
fn added_function_lands_in_unmatched_secondary() {
    let mut with_extra = two_function_text();
    with_extra.extend_from_slice(&leaf_function_code());
    with_extra.resize(0x70, 0x90);
    let secondary = write_elf(&with_extra);

    // Keep the primary the same length so only the new code differs.
    let mut padded_primary = two_function_text();
    padded_primary.resize(0x70, 0x90);
    let primary = write_elf(&padded_primary);

    let result = diff_binaries(primary.path(), secondary.path()).unwrap();

    assert!(result.unmatched_primary.is_empty());
    assert_eq!(result.unmatched_secondary.len(), 1);
    assert_eq!(result.unmatched_secondary[0].start_address, TEXT_VADDR + 0x50);
    assert_eq!(result.matched.len(), 2);
}

#[test]
fn removed_function_lands_in_unmatched_primary() {
    let mut with_extra = two_function_text();
    with_extra.extend_from_slice(&leaf_function_code());
    with_extra.resize(0x70, 0x90);
    let primary = write_elf(&with_extra);

    let mut base = two_function_text();
    base.resize(0x70, 0x90);
    let secondary = write_elf(&base);

    let result = diff_binaries(primary.path(), secondary.path()).unwrap();

    assert_eq!(result.unmatched_primary.len(), 1);
    assert_eq!(result.unmatched_primary[0].start_address, TEXT_VADDR + 0x50);
    assert!(result.unmatched_secondary.is_empty());
    assert_eq!(result.matched.len(), 2);
}

#[test]
fn moved_function_matches_across_addresses() {
    #[rustfmt::skip]
    let body: &[u8] = &[
        0x55,                         // push rbp
        0x48, 0x89, 0xe5,             // mov rbp, rsp
        0xb8, 0x05, 0x00, 0x00, 0x00, // mov eax, 5
        0x5d,                         // pop rbp
        0xc3,                         // ret
    ];

    let mut primary_text = body.to_vec();
    primary_text.resize(0x30, 0x90);
    let primary = write_elf(&primary_text);

    let mut secondary_text = vec![0x90; 0x10];
    secondary_text.extend_from_slice(body);
    secondary_text.resize(0x30, 0x90);
    let secondary = write_elf(&secondary_text);

    let result = diff_binaries(primary.path(), secondary.path()).unwrap();

    assert_eq!(result.matched.len(), 1);
    let m = &result.matched[0];
    assert_eq!(m.similarity(), 1.0);
    assert_eq!(m.primary.start_address, TEXT_VADDR);
    assert_eq!(m.secondary.start_address, TEXT_VADDR + 0x10);
    assert!(m.primary.diff_details.is_empty());
    assert!(result.unmatched_primary.is_empty());
    assert!(result.unmatched_secondary.is_empty());
}

#[test]
fn unsupported_file_is_reported_with_its_path() {
    let good = write_elf(&two_function_text());
    let bad = write_temp(b"just some text, not an executable\n");

    let err = diff_binaries(good.path(), bad.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unsupported"), "got: {message}");
    assert!(
        message.contains(bad.path().to_str().unwrap()),
        "error should name the offending file: {message}"
    );
}

#[test]
fn missing_text_section_yields_empty_diff() {
    // Rename .text in the section string table so the prefix match fails.
    let mut elf = common::build_elf(&two_function_text(), TEXT_VADDR);
    let pos = elf.windows(7).position(|w| w == b"\0.text\0").unwrap();
    elf[pos + 1] = b'x';
    let no_text = write_temp(&elf);
    let good = write_elf(&two_function_text());

    let result = diff_binaries(no_text.path(), good.path()).unwrap();
    assert_eq!(result.matched.len(), 0);
    assert!(result.unmatched_primary.is_empty());
    assert!(result.unmatched_secondary.is_empty());
}
