// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Label table mapping names to image offsets.

use crate::error::{AsmErrorKind, Diagnostic};
use crate::scanner::Token;

/// A label definition: the defining token and the image offset at the point
/// of definition. Created once, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct LabelDef<'a> {
    pub token: Token<'a>,
    pub offset: usize,
}

/// Append-only label table with byte-exact name lookup.
///
/// Only labels defined earlier in the pass are visible to a lookup, which
/// is what restricts branches to backward references.
pub struct SymbolTable<'a> {
    labels: Vec<LabelDef<'a>>,
    limit: usize,
}

impl<'a> SymbolTable<'a> {
    pub fn new(limit: usize) -> Self {
        Self {
            labels: Vec::new(),
            limit,
        }
    }

    /// Define a label at the given image offset.
    pub fn define(&mut self, token: Token<'a>, offset: usize) -> Result<(), Diagnostic> {
        if self.find(token.text).is_some() {
            return Err(Diagnostic::error_at(
                token.line,
                AsmErrorKind::Label,
                "Label defined twice",
                Some(token.text),
            ));
        }
        if self.labels.len() >= self.limit {
            return Err(Diagnostic::error_at(
                token.line,
                AsmErrorKind::Limit,
                "Label table exceeded",
                None,
            ));
        }
        self.labels.push(LabelDef { token, offset });
        Ok(())
    }

    /// Look up a label by exact name.
    pub fn find(&self, name: &str) -> Option<&LabelDef<'a>> {
        self.labels.iter().find(|label| label.token.text == name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
