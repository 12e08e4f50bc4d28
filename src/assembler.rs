// Assembler core pipeline: token stream to program image and output files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};

use crate::encoder::{BinOp, Mnemonic};
use crate::error::{AsmErrorKind, Diagnostic};
use crate::imagestore::ImageStore;
use crate::object;
use crate::operand::read_operand;
use crate::scanner::{Scanner, Token, TokenKind};
use crate::symbol_table::SymbolTable;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "x86-64 assembler producing relocatable objects.

The destination is required: use -o/--outfile. By default an ELF64
relocatable object is written; -f/--format macho selects the Mach-O
backend instead. With -x/--hex the object backends are skipped entirely
and the destination receives uppercase hex byte pairs, one line per
instruction.";

/// Safety ceilings for dynamically growing containers.
///
/// These bound pathological inputs; they are not semantic sizes. Every
/// container grows on demand below its ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_source_bytes: usize,
    pub max_tokens: usize,
    pub max_labels: usize,
    pub max_image_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_source_bytes: 1 << 20,
            max_tokens: 1 << 16,
            max_labels: 1 << 12,
            max_image_bytes: 1 << 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectFormat {
    Elf64,
    Macho,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "asmx64",
    version = VERSION,
    about = "x86-64 assembler emitting ELF64 and Mach-O relocatable objects",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Destination path for the object file (or hex text with -x/--hex)."
    )]
    pub outfile: PathBuf,
    #[arg(
        short = 'x',
        long = "hex",
        action = ArgAction::SetTrue,
        long_help = "Write uppercase hex byte pairs, one line per instruction, instead of an object file."
    )]
    pub hex: bool,
    #[arg(
        short = 'f',
        long = "format",
        value_enum,
        default_value_t = ObjectFormat::Elf64,
        long_help = "Object file format. Ignored with -x/--hex."
    )]
    pub format: ObjectFormat,
    #[arg(
        long = "diag-format",
        value_enum,
        default_value_t = DiagFormat::Text,
        long_help = "Diagnostic rendering: human-readable text or one JSON object per line."
    )]
    pub diag_format: DiagFormat,
    #[arg(value_name = "FILE", long_help = "Input assembly source file.")]
    pub infile: PathBuf,
}

/// Assembler session: the addressing-mode flag, label table, and program
/// image for one run. Owned session state replaces the original design's
/// process-global mutable state.
pub struct Assembler<'a> {
    pub(crate) symbols: SymbolTable<'a>,
    pub(crate) image: ImageStore,
    pub(crate) bits: u8,
}

impl<'a> Assembler<'a> {
    pub fn new(hex_mode: bool) -> Self {
        Self::with_limits(Limits::default(), hex_mode)
    }

    pub fn with_limits(limits: Limits, hex_mode: bool) -> Self {
        Self {
            symbols: SymbolTable::new(limits.max_labels),
            image: ImageStore::new(limits.max_image_bytes, hex_mode),
            bits: 64,
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn image(&self) -> &ImageStore {
        &self.image
    }

    pub fn symbols(&self) -> &SymbolTable<'a> {
        &self.symbols
    }

    /// The single parsing pass over the token stream.
    ///
    /// Statement forms, tried in order: label definition, `.` directive,
    /// mnemonic, and finally `operand operator operand`. Labels resolve
    /// backward only; a reference to a label defined later in the stream
    /// fails at the referencing instruction.
    pub fn assemble(&mut self, tokens: &[Token<'a>]) -> Result<(), Diagnostic> {
        let mut cursor = 0;
        while cursor < tokens.len() {
            let token = tokens[cursor];
            if token.kind == TokenKind::Label {
                self.symbols.define(token, self.image.len())?;
                cursor += 1;
            } else if token.kind == TokenKind::Operator && token.is(".") {
                cursor = self.directive(tokens, cursor + 1)?;
                self.image.end_of_instr();
            } else if let Some(mnemonic) = Mnemonic::from_text(token.text) {
                cursor = mnemonic.encode(self, tokens, cursor)?;
                self.image.end_of_instr();
            } else {
                cursor = self.operator_statement(tokens, cursor)?;
                self.image.end_of_instr();
            }
        }
        Ok(())
    }

    /// Handle one directive. `cursor` points at the directive name.
    fn directive(&mut self, tokens: &[Token<'a>], cursor: usize) -> Result<usize, Diagnostic> {
        let Some(&name) = tokens.get(cursor) else {
            return Err(Diagnostic::error(
                AsmErrorKind::Directive,
                "Expected directive name at end of input",
                None,
            ));
        };
        let mut cursor = cursor + 1;
        match name.text {
            "bits" => {
                let arg = self.directive_arg(tokens, cursor, name)?;
                match arg.integer_value()? {
                    64 => self.bits = 64,
                    16 => self.bits = 16,
                    _ => {
                        return Err(Diagnostic::error_at(
                            arg.line,
                            AsmErrorKind::Directive,
                            "Invalid bits for .bits",
                            Some(arg.text),
                        ))
                    }
                }
                cursor += 1;
            }
            "asciinz" => {
                let arg = self.directive_arg(tokens, cursor, name)?;
                arg.expect_kind(TokenKind::Str)?;
                self.image.store_slice(arg.text.as_bytes())?;
                cursor += 1;
            }
            "data32" => cursor = self.data_run(tokens, cursor, 4)?,
            "data16" => cursor = self.data_run(tokens, cursor, 2)?,
            "data8" => cursor = self.data_run(tokens, cursor, 1)?,
            "offset" => {
                let arg = self.directive_arg(tokens, cursor, name)?;
                let ofs = arg.integer_value()?;
                let ofs = usize::try_from(ofs).map_err(|_| {
                    Diagnostic::error_at(
                        arg.line,
                        AsmErrorKind::Directive,
                        "Invalid offset for .offset",
                        Some(arg.text),
                    )
                })?;
                if self.image.len() > ofs {
                    return Err(Diagnostic::error_at(
                        arg.line,
                        AsmErrorKind::Directive,
                        "Current offset is greater than",
                        Some(arg.text),
                    ));
                }
                self.image.pad_to(ofs)?;
                cursor += 1;
            }
            _ => {
                return Err(Diagnostic::error_at(
                    name.line,
                    AsmErrorKind::Directive,
                    "No directive named",
                    Some(name.text),
                ))
            }
        }
        Ok(cursor)
    }

    fn directive_arg(
        &self,
        tokens: &[Token<'a>],
        cursor: usize,
        name: Token<'a>,
    ) -> Result<Token<'a>, Diagnostic> {
        tokens.get(cursor).copied().ok_or_else(|| {
            Diagnostic::error_at(
                name.line,
                AsmErrorKind::Directive,
                "Expected argument for directive",
                Some(name.text),
            )
        })
    }

    /// Emit a run of consecutive integer tokens as little-endian values of
    /// the given byte width. Zero integers is a valid (empty) run.
    fn data_run(
        &mut self,
        tokens: &[Token<'a>],
        mut cursor: usize,
        width: usize,
    ) -> Result<usize, Diagnostic> {
        while let Some(&token) = tokens.get(cursor) {
            if token.kind != TokenKind::Integer {
                break;
            }
            let value = token.integer_value()?;
            for bi in 0..width {
                self.image.store((value >> (8 * bi)) as u8)?;
            }
            cursor += 1;
        }
        Ok(cursor)
    }

    /// Parse and encode an `operand operator operand` statement.
    fn operator_statement(
        &mut self,
        tokens: &[Token<'a>],
        cursor: usize,
    ) -> Result<usize, Diagnostic> {
        let mut cursor = cursor;
        let left = read_operand(tokens, &mut cursor)?;
        let Some(&op_token) = tokens.get(cursor) else {
            return Err(Diagnostic::error_at(
                left.token().line,
                AsmErrorKind::Syntax,
                "Expected operator after operand",
                None,
            ));
        };
        let Some(op) = BinOp::from_token(&op_token) else {
            return Err(Diagnostic::error_at(
                op_token.line,
                AsmErrorKind::Syntax,
                "Expected operator, got",
                Some(op_token.text),
            ));
        };
        cursor += 1;
        let right = read_operand(tokens, &mut cursor)?;
        op.encode(self, &left, &right, op_token)?;
        Ok(cursor)
    }
}

/// Tokenize and assemble a complete source text.
pub fn assemble_source(
    source: &str,
    hex_mode: bool,
    limits: Limits,
) -> Result<Assembler<'_>, Diagnostic> {
    let tokens = Scanner::with_token_limit(source, limits.max_tokens).tokenize()?;
    let mut asm = Assembler::with_limits(limits, hex_mode);
    asm.assemble(&tokens)?;
    Ok(asm)
}

/// Summary of a successful run.
#[derive(Debug)]
pub struct AsmRunReport {
    pub image_len: usize,
    pub label_count: usize,
    pub outfile: PathBuf,
}

pub fn run() -> Result<AsmRunReport, Diagnostic> {
    run_with_cli(Cli::parse())
}

/// Assemble one source file and write the selected output.
///
/// Nothing is written until the whole pipeline has succeeded, so an error
/// can never leave a partial object file behind.
pub fn run_with_cli(cli: Cli) -> Result<AsmRunReport, Diagnostic> {
    let limits = Limits::default();
    let source = fs::read_to_string(&cli.infile).map_err(|err| io_diag(err, &cli.infile))?;
    if source.len() > limits.max_source_bytes {
        return Err(Diagnostic::error(
            AsmErrorKind::Limit,
            "Too large input",
            Some(&cli.infile.display().to_string()),
        ));
    }

    let asm = assemble_source(&source, cli.hex, limits)?;

    let mut out = Vec::new();
    let emit = if cli.hex {
        asm.image().write_hex_text(&mut out)
    } else {
        match cli.format {
            ObjectFormat::Elf64 => object::elf64::write_object(&mut out, asm.image().bytes()),
            ObjectFormat::Macho => object::macho::write_object(&mut out, asm.image().bytes()),
        }
    };
    emit.map_err(|err| io_diag(err, &cli.outfile))?;
    fs::write(&cli.outfile, &out).map_err(|err| io_diag(err, &cli.outfile))?;

    Ok(AsmRunReport {
        image_len: asm.image().len(),
        label_count: asm.symbols().len(),
        outfile: cli.outfile,
    })
}

fn io_diag(err: io::Error, path: &Path) -> Diagnostic {
    Diagnostic::error(
        AsmErrorKind::Io,
        &err.to_string(),
        Some(&path.display().to_string()),
    )
}
