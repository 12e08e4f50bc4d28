use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use asmx64::assembler::{run_with_cli, Cli, DiagFormat, ObjectFormat};
use asmx64::error::AsmErrorKind;

fn unique_temp_dir() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_micros();
    let dir = std::env::temp_dir().join(format!("asmx64-it-{}-{now}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_source(dir: &PathBuf, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write source");
    path
}

fn cli(infile: PathBuf, outfile: PathBuf) -> Cli {
    Cli {
        outfile,
        hex: false,
        format: ObjectFormat::Elf64,
        diag_format: DiagFormat::Text,
        infile,
    }
}

#[test]
fn writes_an_elf64_object() {
    let dir = unique_temp_dir();
    let src = write_source(&dir, "prog.asm", "push rbp\nrax ^= rax\nretq\n");
    let out = dir.join("prog.o");
    let report = run_with_cli(cli(src, out.clone())).expect("assembly");
    assert_eq!(report.image_len, 4);
    assert_eq!(report.outfile, out);

    let bytes = fs::read(&out).expect("object file");
    assert_eq!(&bytes[0..4], &[0x7f, 0x45, 0x4c, 0x46]);
    assert_eq!(&bytes[0x40..0x44], &[0x55, 0x31, 0xc0, 0xc3]);
}

#[test]
fn writes_a_macho_object() {
    let dir = unique_temp_dir();
    let src = write_source(&dir, "prog.asm", "nop\nretq\n");
    let out = dir.join("prog.o");
    let mut cli = cli(src, out.clone());
    cli.format = ObjectFormat::Macho;
    run_with_cli(cli).expect("assembly");

    let bytes = fs::read(&out).expect("object file");
    assert_eq!(&bytes[0..4], &[0xcf, 0xfa, 0xed, 0xfe]);
    // 2 program bytes round up to 4; header and footer sizes are fixed.
    assert_eq!(bytes.len(), 0x130 + 4 + 0x18);
    assert_eq!(&bytes[0x130..0x132], &[0x90, 0xc3]);
}

#[test]
fn hex_mode_writes_text_instead_of_an_object() {
    let dir = unique_temp_dir();
    let src = write_source(&dir, "prog.asm", "nop\nsyscall\n");
    let out = dir.join("prog.hex");
    let mut cli = cli(src, out.clone());
    cli.hex = true;
    run_with_cli(cli).expect("assembly");
    assert_eq!(fs::read_to_string(&out).expect("hex text"), "90 \n0F 05 \n");
}

#[test]
fn failed_runs_write_nothing() {
    let dir = unique_temp_dir();
    let src = write_source(&dir, "bad.asm", "jne :missing\n");
    let out = dir.join("bad.o");
    let err = run_with_cli(cli(src, out.clone())).expect_err("undefined label");
    assert_eq!(err.kind(), AsmErrorKind::Label);
    assert_eq!(err.line(), Some(1));
    assert!(!out.exists(), "no partial output on error");
}

#[test]
fn reports_io_errors_for_missing_input() {
    let dir = unique_temp_dir();
    let err = run_with_cli(cli(dir.join("absent.asm"), dir.join("out.o")))
        .expect_err("missing input");
    assert_eq!(err.kind(), AsmErrorKind::Io);
}

#[test]
fn full_program_with_directives_and_labels() {
    let dir = unique_temp_dir();
    let src = write_source(
        &dir,
        "full.asm",
        "/* exit(0) stub /* nested */ */\n\
         .bits 64\n\
         :start\n\
         rax = 60\n\
         rdi ^= rdi\n\
         syscall\n\
         .asciinz \"ok\"\n\
         .offset 16\n\
         .data8 1 2\n\
         jmp :start\n",
    );
    let out = dir.join("full.o");
    let report = run_with_cli(cli(src, out.clone())).expect("assembly");
    assert_eq!(report.label_count, 1);
    assert_eq!(report.image_len, 20);

    let expected = [
        0x48, 0xc7, 0xc0, 0x3c, 0x00, 0x00, 0x00, // rax = 60
        0x31, 0xff, // rdi ^= rdi
        0x0f, 0x05, // syscall
        0x6f, 0x6b, // "ok"
        0x00, 0x00, 0x00, // pad to offset 16
        0x01, 0x02, // data bytes
        0xeb, 0xec, // jmp back to offset 0: 0 - (18 + 2)
    ];
    let bytes = fs::read(&out).expect("object file");
    assert_eq!(&bytes[0x40..0x40 + expected.len()], &expected);
}
