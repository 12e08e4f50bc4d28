// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Mach-O object writer built from fixed header/footer templates.
//!
//! The header is a 0x130-byte template: mach_header_64, one LC_SEGMENT_64
//! with a single `__text` section, LC_VERSION_MIN_MACOSX, LC_SYMTAB, and
//! LC_DYSYMTAB. Five 32-bit size fields are patched from the finished
//! program before serialization; everything else is constant. The footer
//! holds the one-entry symbol table (`_main`) and its string pool.

use std::io::{self, Write};

/// Total header template length; also the file offset of the program bytes.
pub const HEADER_LEN: u32 = 0x130;
/// One nlist_64 record.
const NLIST_LEN: u32 = 0x10;

// Patched fields. The segment sizes are 64-bit in the file format; the
// template keeps their high halves zero, so a 32-bit patch of the low half
// is enough.
const SEG_VMSIZE_OFFSET: usize = 0x40;
const SEG_FILESIZE_OFFSET: usize = 0x50;
const SECT_SIZE_OFFSET: usize = 0x90;
const SYMTAB_SYMOFF_OFFSET: usize = 0xd0;
const SYMTAB_STROFF_OFFSET: usize = 0xd8;

#[rustfmt::skip]
const HEADER_TEMPLATE: [u8; HEADER_LEN as usize] = [
    // mach_header_64: magic, cputype x86-64, cpusubtype, MH_OBJECT,
    // ncmds 4, sizeofcmds 0x110, flags, reserved
    0xcf, 0xfa, 0xed, 0xfe, 0x07, 0x00, 0x00, 0x01, // 0x00
    0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // 0x08
    0x04, 0x00, 0x00, 0x00, 0x10, 0x01, 0x00, 0x00, // 0x10
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x18
    // LC_SEGMENT_64, cmdsize 0x98, unnamed segment
    0x19, 0x00, 0x00, 0x00, 0x98, 0x00, 0x00, 0x00, // 0x20
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x28
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x30
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x38 vmaddr
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x40 vmsize (patched)
    0x30, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x48 fileoff
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x50 filesize (patched)
    0x07, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, // 0x58 maxprot/initprot
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x60 nsects/flags
    // section_64 "__text" in "__TEXT"
    0x5f, 0x5f, 0x74, 0x65, 0x78, 0x74, 0x00, 0x00, // 0x68
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x70
    0x5f, 0x5f, 0x54, 0x45, 0x58, 0x54, 0x00, 0x00, // 0x78
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x80
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x88 addr
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x90 size (patched)
    0x30, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x98 offset/align
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0xa0 reloff/nreloc
    0x00, 0x04, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, // 0xa8 flags/reserved1
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0xb0 reserved2/3
    // LC_VERSION_MIN_MACOSX 10.11
    0x24, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, // 0xb8
    0x00, 0x0b, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, // 0xc0
    // LC_SYMTAB: symoff (patched), nsyms 1, stroff (patched), strsize 8
    0x02, 0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, // 0xc8
    0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // 0xd0
    0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, // 0xd8
    // LC_DYSYMTAB: one externally defined symbol, nothing else
    0x0b, 0x00, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00, // 0xe0
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0xe8
    0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // 0xf0
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0xf8
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x100
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x108
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x110
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x118
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x120
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0x128
];

#[rustfmt::skip]
const FOOTER_TEMPLATE: [u8; 0x18] = [
    // nlist_64: n_strx 1, n_type N_SECT|N_EXT, n_sect 1, n_desc 0, n_value 0
    0x01, 0x00, 0x00, 0x00, 0x0f, 0x01, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // string pool: "\0_main\0" padded
    0x00, 0x5f, 0x6d, 0x61, 0x69, 0x6e, 0x00, 0x00,
];

fn patch_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Write the assembled program as a Mach-O object.
///
/// The program bytes are padded to a 4-byte boundary; the symbol table and
/// its string pool (the footer) follow at offsets patched into LC_SYMTAB.
pub fn write_object<W: Write>(mut out: W, program: &[u8]) -> io::Result<()> {
    let size = program.len() as u32;
    let size_aligned = (size + 0x03) & !0x03;

    let mut header = HEADER_TEMPLATE;
    patch_u32(&mut header, SEG_VMSIZE_OFFSET, size);
    patch_u32(&mut header, SEG_FILESIZE_OFFSET, size);
    patch_u32(&mut header, SECT_SIZE_OFFSET, size);
    patch_u32(&mut header, SYMTAB_SYMOFF_OFFSET, size_aligned + HEADER_LEN);
    patch_u32(
        &mut header,
        SYMTAB_STROFF_OFFSET,
        size_aligned + HEADER_LEN + NLIST_LEN,
    );

    out.write_all(&header)?;
    out.write_all(program)?;
    out.write_all(&vec![0u8; (size_aligned - size) as usize])?;
    out.write_all(&FOOTER_TEMPLATE)
}
