// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Program image store with hex output mirror.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::error::{AsmErrorKind, Diagnostic};

/// Append-only program image.
///
/// The current length doubles as the location counter for relative-branch
/// arithmetic. In hex mode every stored byte is mirrored as two uppercase
/// hex digits; an end-of-instruction marker terminates the mirror line.
pub struct ImageStore {
    bytes: Vec<u8>,
    hex: String,
    hex_mode: bool,
    limit: usize,
}

impl ImageStore {
    pub fn new(limit: usize, hex_mode: bool) -> Self {
        Self {
            bytes: Vec::new(),
            hex: String::new(),
            hex_mode,
            limit,
        }
    }

    /// Current image length; also the location counter.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Append a single byte.
    pub fn store(&mut self, byte: u8) -> Result<(), Diagnostic> {
        if self.bytes.len() >= self.limit {
            return Err(Diagnostic::error(
                AsmErrorKind::Limit,
                "Program image limit exceeded",
                None,
            ));
        }
        self.bytes.push(byte);
        if self.hex_mode {
            let _ = write!(self.hex, "{byte:02X} ");
        }
        Ok(())
    }

    /// Append a contiguous run of bytes.
    pub fn store_slice(&mut self, bytes: &[u8]) -> Result<(), Diagnostic> {
        for &byte in bytes {
            self.store(byte)?;
        }
        Ok(())
    }

    /// Mark the end of an instruction or directive. Only the hex mirror
    /// cares: it flushes a line separator.
    pub fn end_of_instr(&mut self) {
        if self.hex_mode {
            self.hex.push('\n');
        }
    }

    /// Zero-fill forward to `offset`. The caller is responsible for
    /// rejecting a backward move.
    pub fn pad_to(&mut self, offset: usize) -> Result<(), Diagnostic> {
        while self.bytes.len() < offset {
            self.store(0x00)?;
        }
        Ok(())
    }

    /// The accumulated hex mirror text. Empty unless hex mode is active.
    pub fn hex_text(&self) -> &str {
        &self.hex
    }

    pub fn write_hex_text<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_all(self.hex.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::ImageStore;
    use crate::error::AsmErrorKind;

    #[test]
    fn stores_bytes_and_tracks_length() {
        let mut image = ImageStore::new(16, false);
        image.store(0x55).unwrap();
        image.store_slice(&[0xc3, 0x90]).unwrap();
        assert_eq!(image.len(), 3);
        assert_eq!(image.bytes(), &[0x55, 0xc3, 0x90]);
        assert!(image.hex_text().is_empty());
    }

    #[test]
    fn hex_mirror_groups_bytes_per_instruction() {
        let mut image = ImageStore::new(16, true);
        image.store(0x0f).unwrap();
        image.store(0x05).unwrap();
        image.end_of_instr();
        image.store(0xc3).unwrap();
        image.end_of_instr();
        assert_eq!(image.hex_text(), "0F 05 \nC3 \n");
    }

    #[test]
    fn pad_to_zero_fills_forward() {
        let mut image = ImageStore::new(16, false);
        image.store(0xaa).unwrap();
        image.pad_to(4).unwrap();
        assert_eq!(image.bytes(), &[0xaa, 0x00, 0x00, 0x00]);
        // Padding to a smaller offset is a no-op.
        image.pad_to(2).unwrap();
        assert_eq!(image.len(), 4);
    }

    #[test]
    fn limit_is_enforced() {
        let mut image = ImageStore::new(2, false);
        image.store_slice(&[1, 2]).unwrap();
        let err = image.store(3).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Limit);
        assert_eq!(image.len(), 2);
    }
}
