// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types and diagnostics for the assembler.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Cli,
    Directive,
    Encoding,
    Io,
    Label,
    Lexer,
    Limit,
    Syntax,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with source-line context.
///
/// The assembler is fail-fast: the first diagnostic produced aborts the run,
/// so a diagnostic doubles as the error type threaded through every
/// `Result` in the pipeline.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: Option<u32>,
    code: String,
    severity: Severity,
    error: AsmError,
}

impl Diagnostic {
    pub fn new(severity: Severity, error: AsmError) -> Self {
        Self {
            line: None,
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
        }
    }

    /// Lineless error diagnostic.
    pub fn error(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self::new(Severity::Error, AsmError::new(kind, msg, param))
    }

    /// Error diagnostic tagged with the originating source line.
    pub fn error_at(line: u32, kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self::error(kind, msg, param).with_line(line)
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        match self.line {
            Some(line) => format!("line {}: {} [{}] - {}", line, sev, self.code, self.message()),
            None => format!("{} [{}] - {}", sev, self.code, self.message()),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::error::Error for Diagnostic {}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Cli => "asm101",
        AsmErrorKind::Lexer => "asm102",
        AsmErrorKind::Syntax => "asm201",
        AsmErrorKind::Directive => "asm202",
        AsmErrorKind::Label => "asm301",
        AsmErrorKind::Encoding => "asm402",
        AsmErrorKind::Io => "asm501",
        AsmErrorKind::Limit => "asm502",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}
