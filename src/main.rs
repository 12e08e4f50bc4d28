// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asmx64.

use std::process::ExitCode;

use clap::Parser;
use serde_json::json;

use asmx64::assembler::{run_with_cli, Cli, DiagFormat};
use asmx64::error::{Diagnostic, Severity};

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn format_diagnostic_line(diag: &Diagnostic, format: DiagFormat) -> String {
    match format {
        DiagFormat::Text => diag.format(),
        DiagFormat::Json => json!({
            "code": diag.code(),
            "severity": severity_to_str(diag.severity()),
            "message": diag.message(),
            "line": diag.line(),
        })
        .to_string(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let diag_format = cli.diag_format;
    match run_with_cli(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(diag) => {
            eprintln!("{}", format_diagnostic_line(&diag, diag_format));
            ExitCode::FAILURE
        }
    }
}
