// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! x86-64 instruction encoding: mnemonic and operator dispatch.
//!
//! Both dispatch tables are closed enums. A mnemonic handler consumes
//! tokens from the statement cursor and emits bytes; an operator handler
//! consumes an already-resolved `left op right` operand pair.

use crate::assembler::Assembler;
use crate::error::{AsmErrorKind, Diagnostic};
use crate::operand::{read_operand, Operand};
use crate::register::{RegisterClass, REG_NUM_SI};
use crate::scanner::{Token, TokenKind};

const PREFIX_REX: u8 = 0x40;
const PREFIX_REX_W: u8 = 0x08;

const OP_IMM_GRP1_EV_IB: u8 = 0x83;
const OP_MOV_EV_GV: u8 = 0x89;
const OP_MOV_GB_EB: u8 = 0x8a;
const OP_MOV_SREG_EW: u8 = 0x8e;
const OP_MOV_R16_IW: u8 = 0xb8;
const OP_MOV_EV_IZ: u8 = 0xc7;
const OP_XOR_EV_GV: u8 = 0x31;
const OP_INC_DEC_GRP5: u8 = 0xff;
const OP_PUSH_R64: u8 = 0x50;
const OP_POP_R64: u8 = 0x58;
const OP_INT_IB: u8 = 0xcd;
const OP_JMP_SHORT: u8 = 0xeb;
const OP_JCC_BASE: u8 = 0x70;
const COND_NE: u8 = 0x05;

/// Build a ModRM byte from its three fields.
pub fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | (reg << 3) | rm
}

/// Supported mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Nop,
    Retq,
    Hlt,
    Syscall,
    Push,
    Pop,
    Inc,
    Int,
    Jmp,
    Jne,
}

impl Mnemonic {
    /// Look up a statement-leading token as a mnemonic. The increment
    /// mnemonic is spelled `++`.
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "nop" => Self::Nop,
            "retq" => Self::Retq,
            "hlt" => Self::Hlt,
            "syscall" => Self::Syscall,
            "push" => Self::Push,
            "pop" => Self::Pop,
            "++" => Self::Inc,
            "int" => Self::Int,
            "jmp" => Self::Jmp,
            "jne" => Self::Jne,
            _ => return None,
        })
    }

    /// Encode one mnemonic statement. `cursor` points at the mnemonic
    /// token; the cursor past everything consumed is returned.
    pub fn encode<'a>(
        self,
        asm: &mut Assembler<'a>,
        tokens: &[Token<'a>],
        cursor: usize,
    ) -> Result<usize, Diagnostic> {
        let mn_token = tokens[cursor];
        let mut cursor = cursor + 1;
        match self {
            Self::Nop => asm.image.store(0x90)?,
            Self::Retq => asm.image.store(0xc3)?,
            Self::Hlt => asm.image.store(0xf4)?,
            Self::Syscall => asm.image.store_slice(&[0x0f, 0x05])?,
            Self::Push => encode_push_pop(asm, tokens, &mut cursor, mn_token, OP_PUSH_R64)?,
            Self::Pop => encode_push_pop(asm, tokens, &mut cursor, mn_token, OP_POP_R64)?,
            Self::Inc => encode_inc(asm, tokens, &mut cursor, mn_token)?,
            Self::Int => encode_int(asm, tokens, &mut cursor, mn_token)?,
            Self::Jmp => encode_jmp(asm, tokens, &mut cursor)?,
            Self::Jne => encode_jne(asm, tokens, &mut cursor, mn_token)?,
        }
        Ok(cursor)
    }
}

fn encode_push_pop<'a>(
    asm: &mut Assembler<'a>,
    tokens: &[Token<'a>],
    cursor: &mut usize,
    mn_token: Token<'a>,
    base: u8,
) -> Result<(), Diagnostic> {
    let ope = read_operand(tokens, cursor)?;
    let Operand::Reg { info, .. } = ope else {
        return Err(not_implemented(mn_token));
    };
    if !matches!(
        info.class,
        RegisterClass::Reg64Legacy | RegisterClass::Reg64Low
    ) {
        return Err(not_implemented(mn_token));
    }
    if asm.bits != 64 {
        return Err(wrong_bits(mn_token));
    }
    asm.image.store(base | info.number)
}

fn encode_inc<'a>(
    asm: &mut Assembler<'a>,
    tokens: &[Token<'a>],
    cursor: &mut usize,
    mn_token: Token<'a>,
) -> Result<(), Diagnostic> {
    let ope = read_operand(tokens, cursor)?;
    let Operand::Reg { info, .. } = ope else {
        return Err(not_implemented(mn_token));
    };
    if info.class != RegisterClass::Reg32 {
        return Err(not_implemented(mn_token));
    }
    if asm.bits != 64 {
        return Err(wrong_bits(mn_token));
    }
    asm.image.store(OP_INC_DEC_GRP5)?;
    asm.image.store(modrm(3, 0, info.number))
}

fn encode_int<'a>(
    asm: &mut Assembler<'a>,
    tokens: &[Token<'a>],
    cursor: &mut usize,
    mn_token: Token<'a>,
) -> Result<(), Diagnostic> {
    let Some(&token) = tokens.get(*cursor) else {
        return Err(Diagnostic::error_at(
            mn_token.line,
            AsmErrorKind::Syntax,
            "Expected interrupt number after int",
            None,
        ));
    };
    if token.kind != TokenKind::Integer {
        return Err(Diagnostic::error_at(
            token.line,
            AsmErrorKind::Syntax,
            "Unexpected operand",
            Some(token.text),
        ));
    }
    let value = token.integer_value()?;
    *cursor += 1;
    if !(0..=0xff).contains(&value) {
        return Err(Diagnostic::error_at(
            token.line,
            AsmErrorKind::Encoding,
            "Invalid int number",
            Some(token.text),
        ));
    }
    asm.image.store(OP_INT_IB)?;
    asm.image.store(value as u8)
}

fn encode_jmp<'a>(
    asm: &mut Assembler<'a>,
    tokens: &[Token<'a>],
    cursor: &mut usize,
) -> Result<(), Diagnostic> {
    let ope = read_operand(tokens, cursor)?;
    match ope {
        Operand::Imm { value, token } => {
            let Ok(rel) = i8::try_from(value) else {
                return Err(offset_out_of_bounds(token));
            };
            asm.image.store(OP_JMP_SHORT)?;
            asm.image.store(rel as u8)
        }
        Operand::LabelRef { token } => encode_short_branch(asm, OP_JMP_SHORT, token),
        other => Err(Diagnostic::error_at(
            other.token().line,
            AsmErrorKind::Encoding,
            "Unexpected type of operand",
            Some(other.token().text),
        )),
    }
}

fn encode_jne<'a>(
    asm: &mut Assembler<'a>,
    tokens: &[Token<'a>],
    cursor: &mut usize,
    mn_token: Token<'a>,
) -> Result<(), Diagnostic> {
    let ope = read_operand(tokens, cursor)?;
    match ope {
        Operand::LabelRef { token } => encode_short_branch(asm, OP_JCC_BASE | COND_NE, token),
        _ => Err(Diagnostic::error_at(
            mn_token.line,
            AsmErrorKind::Encoding,
            "Not implemented jump target",
            None,
        )),
    }
}

/// Emit a two-byte short branch to a previously defined label.
///
/// The displacement is relative to the byte immediately after the encoded
/// instruction, so the current image length plus two.
fn encode_short_branch(
    asm: &mut Assembler<'_>,
    opcode: u8,
    target: Token<'_>,
) -> Result<(), Diagnostic> {
    let Some(label) = asm.symbols.find(target.text) else {
        return Err(Diagnostic::error_at(
            target.line,
            AsmErrorKind::Label,
            "Label not found",
            Some(target.text),
        ));
    };
    let rel = label.offset as i64 - (asm.image.len() as i64 + 2);
    let Ok(rel) = i8::try_from(rel) else {
        return Err(offset_out_of_bounds(target));
    };
    asm.image.store(opcode)?;
    asm.image.store(rel as u8)
}

/// Supported assignment-style binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `=` move
    Assign,
    /// `^=` exclusive or
    XorAssign,
    /// `?` compare
    Cmp,
}

impl BinOp {
    pub fn from_token(token: &Token<'_>) -> Option<Self> {
        if token.kind != TokenKind::Operator {
            return None;
        }
        Some(match token.text {
            "=" => Self::Assign,
            "^=" => Self::XorAssign,
            "?" => Self::Cmp,
            _ => return None,
        })
    }

    pub fn encode<'a>(
        self,
        asm: &mut Assembler<'a>,
        left: &Operand<'a>,
        right: &Operand<'a>,
        op_token: Token<'a>,
    ) -> Result<(), Diagnostic> {
        match self {
            Self::Assign => encode_assign(asm, left, right, op_token),
            Self::XorAssign => encode_xor_assign(asm, left, right, op_token),
            Self::Cmp => encode_cmp(asm, left, right, op_token),
        }
    }
}

fn encode_assign<'a>(
    asm: &mut Assembler<'a>,
    left: &Operand<'a>,
    right: &Operand<'a>,
    op_token: Token<'a>,
) -> Result<(), Diagnostic> {
    match (left, right) {
        (Operand::Reg { info: l, .. }, Operand::Reg { info: r, .. }) => {
            match (l.class, r.class) {
                (RegisterClass::Reg64Legacy, RegisterClass::Reg64Legacy) => {
                    asm.image.store(PREFIX_REX | PREFIX_REX_W)?;
                    asm.image.store(OP_MOV_EV_GV)?;
                    asm.image.store(modrm(3, r.number, l.number))
                }
                (RegisterClass::Segment, RegisterClass::Reg16) => {
                    asm.image.store(OP_MOV_SREG_EW)?;
                    asm.image.store(modrm(3, l.number, r.number))
                }
                _ => Err(not_implemented(op_token)),
            }
        }
        (Operand::Reg { info: l, .. }, Operand::Imm { value, .. }) => match l.class {
            RegisterClass::Reg64Legacy => {
                asm.image.store(PREFIX_REX | PREFIX_REX_W)?;
                asm.image.store(OP_MOV_EV_IZ)?;
                asm.image.store(modrm(3, 0, l.number))?;
                store_imm_le(asm, *value, 4)
            }
            RegisterClass::Reg32 => {
                asm.image.store(OP_MOV_EV_IZ)?;
                asm.image.store(modrm(3, 0, l.number))?;
                store_imm_le(asm, *value, 4)
            }
            RegisterClass::Reg16 => {
                asm.image.store(OP_MOV_R16_IW | l.number)?;
                store_imm_le(asm, *value, 2)
            }
            _ => Err(not_implemented(op_token)),
        },
        (Operand::Reg { info: l, .. }, Operand::Mem { index, .. }) => {
            // Intel SDM Table 2-1, 16-bit addressing forms: rm=4 is [SI].
            if l.class == RegisterClass::Reg8 && index.map(|r| r.number) == Some(REG_NUM_SI) {
                asm.image.store(OP_MOV_GB_EB)?;
                asm.image.store(modrm(0, l.number, 4))
            } else {
                Err(not_implemented(op_token))
            }
        }
        _ => Err(not_implemented(op_token)),
    }
}

fn encode_xor_assign<'a>(
    asm: &mut Assembler<'a>,
    left: &Operand<'a>,
    right: &Operand<'a>,
    op_token: Token<'a>,
) -> Result<(), Diagnostic> {
    match (left, right) {
        (Operand::Reg { info: l, .. }, Operand::Reg { info: r, .. }) => {
            asm.image.store(OP_XOR_EV_GV)?;
            asm.image.store(modrm(3, r.number & 7, l.number & 7))
        }
        _ => Err(not_implemented(op_token)),
    }
}

fn encode_cmp<'a>(
    asm: &mut Assembler<'a>,
    left: &Operand<'a>,
    right: &Operand<'a>,
    op_token: Token<'a>,
) -> Result<(), Diagnostic> {
    match (left, right) {
        (Operand::Imm { value, token }, Operand::Reg { info: r, .. }) => {
            if r.class != RegisterClass::Reg32 {
                return Err(not_implemented(op_token));
            }
            if value & !0xff != 0 {
                return Err(Diagnostic::error_at(
                    token.line,
                    AsmErrorKind::Encoding,
                    "Immediate larger than 8 bits is not implemented",
                    Some(token.text),
                ));
            }
            asm.image.store(OP_IMM_GRP1_EV_IB)?;
            asm.image.store(modrm(3, 7, r.number))?;
            asm.image.store(*value as u8)
        }
        _ => Err(not_implemented(op_token)),
    }
}

fn store_imm_le(asm: &mut Assembler<'_>, value: i64, width: usize) -> Result<(), Diagnostic> {
    for bi in 0..width {
        asm.image.store((value >> (8 * bi)) as u8)?;
    }
    Ok(())
}

fn not_implemented(token: Token<'_>) -> Diagnostic {
    Diagnostic::error_at(
        token.line,
        AsmErrorKind::Encoding,
        "Not implemented",
        Some(token.text),
    )
}

fn wrong_bits(token: Token<'_>) -> Diagnostic {
    Diagnostic::error_at(
        token.line,
        AsmErrorKind::Encoding,
        "Not implemented in current bits",
        Some(token.text),
    )
}

fn offset_out_of_bounds(token: Token<'_>) -> Diagnostic {
    Diagnostic::error_at(
        token.line,
        AsmErrorKind::Encoding,
        "Offset out of bounds for short jump",
        Some(token.text),
    )
}

#[cfg(test)]
mod tests {
    use super::{modrm, BinOp, Mnemonic};
    use crate::scanner::Scanner;

    #[test]
    fn modrm_packs_fields() {
        assert_eq!(modrm(3, 0, 0), 0xc0);
        assert_eq!(modrm(3, 7, 0), 0xf8);
        assert_eq!(modrm(0, 1, 4), 0x0c);
    }

    #[test]
    fn mnemonic_lookup_covers_the_table() {
        for (name, mne) in [
            ("nop", Mnemonic::Nop),
            ("retq", Mnemonic::Retq),
            ("hlt", Mnemonic::Hlt),
            ("syscall", Mnemonic::Syscall),
            ("push", Mnemonic::Push),
            ("pop", Mnemonic::Pop),
            ("++", Mnemonic::Inc),
            ("int", Mnemonic::Int),
            ("jmp", Mnemonic::Jmp),
            ("jne", Mnemonic::Jne),
        ] {
            assert_eq!(Mnemonic::from_text(name), Some(mne));
        }
        assert_eq!(Mnemonic::from_text("mov"), None);
    }

    #[test]
    fn operator_lookup_requires_operator_tokens() {
        let tokens = Scanner::new("= ^= ? + nop").tokenize().unwrap();
        assert_eq!(BinOp::from_token(&tokens[0]), Some(BinOp::Assign));
        assert_eq!(BinOp::from_token(&tokens[1]), Some(BinOp::XorAssign));
        assert_eq!(BinOp::from_token(&tokens[2]), Some(BinOp::Cmp));
        assert_eq!(BinOp::from_token(&tokens[3]), None);
        // An identifier spelled like an operator name does not match.
        assert_eq!(BinOp::from_token(&tokens[4]), None);
    }
}
