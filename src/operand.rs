// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand classification: registers, immediates, memory, label references.

use crate::error::{AsmErrorKind, Diagnostic};
use crate::register::{self, RegisterInfo};
use crate::scanner::{Token, TokenKind};

/// A resolved operand. Every variant keeps its originating token for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Imm { value: i64, token: Token<'a> },
    Reg { info: RegisterInfo, token: Token<'a> },
    Mem { index: Option<RegisterInfo>, token: Token<'a> },
    LabelRef { token: Token<'a> },
}

impl<'a> Operand<'a> {
    pub fn token(&self) -> Token<'a> {
        match self {
            Operand::Imm { token, .. }
            | Operand::Reg { token, .. }
            | Operand::Mem { token, .. }
            | Operand::LabelRef { token } => *token,
        }
    }
}

/// Read one operand at the cursor, advancing it past everything consumed.
pub fn read_operand<'a>(
    tokens: &[Token<'a>],
    cursor: &mut usize,
) -> Result<Operand<'a>, Diagnostic> {
    let Some(&token) = tokens.get(*cursor) else {
        return Err(Diagnostic::error(
            AsmErrorKind::Syntax,
            "Trying to read an operand beyond the end of tokens",
            None,
        ));
    };
    match token.kind {
        TokenKind::Identifier => {
            let Some(info) = register::lookup(token.text) else {
                return Err(Diagnostic::error_at(
                    token.line,
                    AsmErrorKind::Syntax,
                    "Unknown register or identifier",
                    Some(token.text),
                ));
            };
            *cursor += 1;
            Ok(Operand::Reg { info, token })
        }
        TokenKind::Integer => {
            let value = token.integer_value()?;
            *cursor += 1;
            Ok(Operand::Imm { value, token })
        }
        TokenKind::Label => {
            *cursor += 1;
            Ok(Operand::LabelRef { token })
        }
        TokenKind::MemOpen => {
            *cursor += 1;
            let index = match tokens.get(*cursor) {
                Some(t) if t.kind == TokenKind::Identifier => {
                    register::lookup(t.text).inspect(|_| *cursor += 1)
                }
                _ => None,
            };
            match tokens.get(*cursor) {
                Some(t) if t.kind == TokenKind::MemClose => {
                    *cursor += 1;
                    Ok(Operand::Mem { index, token })
                }
                Some(t) => Err(Diagnostic::error_at(
                    t.line,
                    AsmErrorKind::Syntax,
                    "Expected ] but got",
                    Some(t.text),
                )),
                None => Err(Diagnostic::error_at(
                    token.line,
                    AsmErrorKind::Syntax,
                    "Expected ] before end of input",
                    None,
                )),
            }
        }
        TokenKind::Operator if token.is("-") => {
            *cursor += 1;
            match read_operand(tokens, cursor)? {
                Operand::Imm { value, token } => Ok(Operand::Imm {
                    value: value.wrapping_neg(),
                    token,
                }),
                other => Err(Diagnostic::error_at(
                    other.token().line,
                    AsmErrorKind::Syntax,
                    "Unary minus is only supported for immediate operands",
                    Some(other.token().text),
                )),
            }
        }
        _ => Err(Diagnostic::error_at(
            token.line,
            AsmErrorKind::Syntax,
            "Expected operand, got",
            Some(token.text),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{read_operand, Operand};
    use crate::error::AsmErrorKind;
    use crate::register::RegisterClass;
    use crate::scanner::Scanner;

    fn read_one(src: &'static str) -> Result<(Operand<'static>, usize), crate::error::Diagnostic> {
        let tokens = Scanner::new(src).tokenize().unwrap();
        // Leak for 'static in tests only; keeps the helper signature simple.
        let tokens = Box::leak(tokens.into_boxed_slice());
        let mut cursor = 0;
        read_operand(tokens, &mut cursor).map(|op| (op, cursor))
    }

    #[test]
    fn classifies_register() {
        let (op, cursor) = read_one("rbx").unwrap();
        assert_eq!(cursor, 1);
        match op {
            Operand::Reg { info, .. } => {
                assert_eq!(info.class, RegisterClass::Reg64Legacy);
                assert_eq!(info.number, 3);
            }
            other => panic!("expected register, got {other:?}"),
        }
    }

    #[test]
    fn classifies_immediate_and_negation() {
        let (op, _) = read_one("42").unwrap();
        assert!(matches!(op, Operand::Imm { value: 42, .. }));
        let (op, cursor) = read_one("- 6").unwrap();
        assert_eq!(cursor, 2);
        assert!(matches!(op, Operand::Imm { value: -6, .. }));
    }

    #[test]
    fn unary_minus_rejects_non_immediate() {
        let err = read_one("- rax").unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Syntax);
    }

    #[test]
    fn classifies_label_reference() {
        let (op, _) = read_one(":loop").unwrap();
        match op {
            Operand::LabelRef { token } => assert_eq!(token.text, "loop"),
            other => panic!("expected label reference, got {other:?}"),
        }
    }

    #[test]
    fn memory_operand_with_and_without_index() {
        let (op, cursor) = read_one("[si]").unwrap();
        assert_eq!(cursor, 3);
        match op {
            Operand::Mem { index: Some(info), .. } => assert_eq!(info.number, 6),
            other => panic!("expected indexed memory, got {other:?}"),
        }
        let (op, cursor) = read_one("[]").unwrap();
        assert_eq!(cursor, 2);
        assert!(matches!(op, Operand::Mem { index: None, .. }));
    }

    #[test]
    fn memory_operand_requires_closing_bracket() {
        let err = read_one("[si retq").unwrap_err();
        assert!(err.message().starts_with("Expected ]"));
        let err = read_one("[si").unwrap_err();
        assert!(err.message().starts_with("Expected ]"));
    }

    #[test]
    fn unknown_identifier_is_an_explicit_error() {
        let err = read_one("bogus").unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Syntax);
        assert!(err.message().contains("Unknown register or identifier"));
    }

    #[test]
    fn reading_past_the_end_fails() {
        let err = read_one("").unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Syntax);
    }
}
