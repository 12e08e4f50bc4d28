// Scanner/tokenizer for assembly source.

use crate::error::{AsmErrorKind, Diagnostic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Str,
    Operator,
    Label,
    MemOpen,
    MemClose,
}

/// A token borrowing its text from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub line: u32,
    pub kind: TokenKind,
}

impl<'a> Token<'a> {
    pub fn is(&self, s: &str) -> bool {
        self.text == s
    }

    /// Parse the token as a signed 64-bit integer.
    ///
    /// Numeric validity is checked here, not in the scanner: the scanner only
    /// delimits spans, and a span that is not entirely a valid decimal,
    /// `0x` hex, or `0b` binary literal is rejected at consumption time.
    pub fn integer_value(&self) -> Result<i64, Diagnostic> {
        self.expect_kind(TokenKind::Integer)?;
        let parsed = if let Some(hex) = self.text.strip_prefix("0x") {
            i64::from_str_radix(hex, 16).ok()
        } else if let Some(bin) = self.text.strip_prefix("0b") {
            i64::from_str_radix(bin, 2).ok()
        } else {
            self.text.parse::<i64>().ok()
        };
        parsed.ok_or_else(|| {
            Diagnostic::error_at(
                self.line,
                AsmErrorKind::Syntax,
                "Not a valid integer",
                Some(self.text),
            )
        })
    }

    pub fn expect_kind(&self, kind: TokenKind) -> Result<(), Diagnostic> {
        if self.kind != kind {
            return Err(Diagnostic::error_at(
                self.line,
                AsmErrorKind::Syntax,
                &format!("Expected {:?} token, got {:?}", kind, self.kind),
                Some(self.text),
            ));
        }
        Ok(())
    }
}

/// Whole-source tokenizer.
///
/// Produces tokens in source order with no lookahead state carried between
/// tokens. Fails on the first lexical error; there is no partial recovery.
pub struct Scanner<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
    line: u32,
    max_tokens: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::with_token_limit(text, usize::MAX)
    }

    pub fn with_token_limit(text: &'a str, max_tokens: usize) -> Self {
        Self {
            text,
            src: text.as_bytes(),
            pos: 0,
            line: 1,
            max_tokens,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, Diagnostic> {
        let mut tokens = Vec::new();
        while self.pos < self.src.len() {
            let c = self.src[self.pos];
            if c <= 0x20 || c == 0x7f || c == 0xff {
                // Skip non-printable
                if c == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            } else if c == b'#' || self.starts_with(b"//") {
                self.skip_line_comment();
            } else if self.starts_with(b"/*") {
                self.skip_block_comment()?;
            } else {
                if tokens.len() >= self.max_tokens {
                    return Err(Diagnostic::error_at(
                        self.line,
                        AsmErrorKind::Limit,
                        "No more space for token",
                        None,
                    ));
                }
                tokens.push(self.next_token()?);
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token<'a>, Diagnostic> {
        let c = self.src[self.pos];
        if is_ident_start(c) {
            let start = self.pos;
            self.skip_ident_chars();
            return Ok(self.token(TokenKind::Identifier, start, self.pos));
        }
        if c == b':' {
            self.pos += 1; // the ':' is not part of the stored text
            let start = self.pos;
            self.skip_ident_chars();
            if self.pos == start {
                return Err(Diagnostic::error_at(
                    self.line,
                    AsmErrorKind::Lexer,
                    "Expected label name after ':'",
                    None,
                ));
            }
            return Ok(self.token(TokenKind::Label, start, self.pos));
        }
        if is_digit(c) {
            return Ok(self.scan_integer());
        }
        if c == b'"' {
            return self.scan_string();
        }
        if c == b'[' {
            let start = self.pos;
            self.pos += 1;
            return Ok(self.token(TokenKind::MemOpen, start, self.pos));
        }
        if c == b']' {
            let start = self.pos;
            self.pos += 1;
            return Ok(self.token(TokenKind::MemClose, start, self.pos));
        }
        if !c.is_ascii() {
            return Err(Diagnostic::error_at(
                self.line,
                AsmErrorKind::Lexer,
                "Illegal character in source",
                None,
            ));
        }
        // Operator: single character, except the two two-character forms.
        let start = self.pos;
        self.pos += 1;
        if self.starts_at(start, b"^=") || self.starts_at(start, b"++") {
            self.pos += 1;
        }
        Ok(self.token(TokenKind::Operator, start, self.pos))
    }

    fn scan_integer(&mut self) -> Token<'a> {
        let start = self.pos;
        if self.starts_with(b"0x") {
            self.pos += 2;
            while self.pos < self.src.len() && is_hex_digit(self.src[self.pos]) {
                self.pos += 1;
            }
        } else if self.starts_with(b"0b") {
            self.pos += 2;
            while self.pos < self.src.len() && is_bin_digit(self.src[self.pos]) {
                self.pos += 1;
            }
        } else {
            while self.pos < self.src.len() && is_digit(self.src[self.pos]) {
                self.pos += 1;
            }
        }
        self.token(TokenKind::Integer, start, self.pos)
    }

    fn scan_string(&mut self) -> Result<Token<'a>, Diagnostic> {
        let line = self.line;
        self.pos += 1; // opening quote
        let start = self.pos;
        // A quote is closing unless the byte immediately before it is a
        // backslash. The stored text keeps escape sequences verbatim.
        while self.pos < self.src.len()
            && !(self.src[self.pos] == b'"' && self.src[self.pos - 1] != b'\\')
        {
            if self.src[self.pos] == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        if self.pos >= self.src.len() {
            return Err(Diagnostic::error_at(
                line,
                AsmErrorKind::Lexer,
                "Unterminated string literal",
                None,
            ));
        }
        let end = self.pos;
        self.pos += 1; // closing quote
        Ok(Token {
            text: &self.text[start..end],
            line,
            kind: TokenKind::Str,
        })
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), Diagnostic> {
        let mut depth = 0usize;
        while self.pos < self.src.len() {
            if self.starts_with(b"/*") {
                self.pos += 2;
                depth += 1;
            } else if self.starts_with(b"*/") {
                self.pos += 2;
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                if self.src[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }
        }
        Err(Diagnostic::error_at(
            self.line,
            AsmErrorKind::Lexer,
            "Block comment marker is not balanced",
            None,
        ))
    }

    fn skip_ident_chars(&mut self) {
        while self.pos < self.src.len() && is_ident_char(self.src[self.pos]) {
            self.pos += 1;
        }
    }

    fn token(&self, kind: TokenKind, start: usize, end: usize) -> Token<'a> {
        Token {
            text: &self.text[start..end],
            line: self.line,
            kind,
        }
    }

    fn starts_with(&self, s: &[u8]) -> bool {
        self.starts_at(self.pos, s)
    }

    fn starts_at(&self, pos: usize, s: &[u8]) -> bool {
        self.src[pos..].starts_with(s)
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || is_digit(c)
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn is_bin_digit(c: u8) -> bool {
    c == b'0' || c == b'1'
}

#[cfg(test)]
mod tests {
    use super::{Scanner, TokenKind};
    use crate::error::AsmErrorKind;

    fn tokens(src: &str) -> Vec<(TokenKind, String)> {
        Scanner::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn mnemonic_statement_tokens() {
        let toks = tokens("push rbp");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Identifier, "push".to_string()),
                (TokenKind::Identifier, "rbp".to_string()),
            ]
        );
    }

    #[test]
    fn label_token_strips_colon() {
        let toks = tokens(":loop");
        assert_eq!(toks, vec![(TokenKind::Label, "loop".to_string())]);
    }

    #[test]
    fn label_without_name_is_rejected() {
        let err = Scanner::new(": foo").tokenize().unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Lexer);
    }

    #[test]
    fn two_char_operators_are_single_tokens() {
        let toks = tokens("rax ^= rax\n++ eax");
        assert_eq!(toks[1], (TokenKind::Operator, "^=".to_string()));
        assert_eq!(toks[3], (TokenKind::Operator, "++".to_string()));
    }

    #[test]
    fn memory_brackets_are_distinct_kinds() {
        let toks = tokens("[si]");
        assert_eq!(toks[0].0, TokenKind::MemOpen);
        assert_eq!(toks[1], (TokenKind::Identifier, "si".to_string()));
        assert_eq!(toks[2].0, TokenKind::MemClose);
    }

    #[test]
    fn line_numbers_track_newlines() {
        let toks = Scanner::new("nop\n\nretq").tokenize().unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 3);
    }

    #[test]
    fn line_and_hash_comments_are_skipped() {
        let toks = tokens("nop # trailing\n// whole line\nretq");
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].1, "retq");
    }

    #[test]
    fn nested_block_comment_lexes_to_nothing() {
        assert!(tokens("/* a /* b */ c */").is_empty());
    }

    #[test]
    fn unbalanced_block_comment_is_rejected() {
        let err = Scanner::new("/* a /* b */").tokenize().unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Lexer);
    }

    #[test]
    fn integer_spans_and_values() {
        let toks = Scanner::new("42 0x1f 0b101").tokenize().unwrap();
        assert_eq!(toks[0].integer_value().unwrap(), 42);
        assert_eq!(toks[1].integer_value().unwrap(), 0x1f);
        assert_eq!(toks[2].integer_value().unwrap(), 5);
    }

    #[test]
    fn malformed_integer_fails_at_consumption() {
        // The scanner delimits "0x" as an integer span; the value parse
        // rejects it.
        let toks = Scanner::new("0x").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Integer);
        assert!(toks[0].integer_value().is_err());
    }

    #[test]
    fn string_keeps_escaped_quote_verbatim() {
        let toks = Scanner::new("\"a\\\"b\"").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].text, "a\\\"b");
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = Scanner::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Lexer);
    }

    #[test]
    fn non_ascii_source_is_rejected() {
        let err = Scanner::new("nop é").tokenize().unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Lexer);
    }

    #[test]
    fn token_limit_is_enforced() {
        let err = Scanner::with_token_limit("nop nop nop", 2)
            .tokenize()
            .unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Limit);
    }
}
