use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn protex() -> Command {
    Command::new(env!("CARGO_BIN_EXE_protex"))
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const ROUTINE: &str = "!BOP\n! !ROUTINE: tick\n! !DESCRIPTION: Advances the clock.\n!EOP\n";

#[test]
fn shipped_fixtures_pass() {
    let output = protex()
        .arg("test")
        .arg(fixtures_dir())
        .arg("--no-color")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("test result: ok."));
}

#[test]
fn fixture_category_filter() {
    let output = protex()
        .args(["--no-color", "test"])
        .arg(fixtures_dir())
        .args(["--category", "errors"])
        .output()
        .unwrap();
    let err = stderr(&output);
    assert!(output.status.success(), "{}", err);
    assert!(err.contains("errors"));
    assert!(!err.contains("modes"));
}

#[test]
fn renders_file_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("m_clock.f90");
    std::fs::write(&source, ROUTINE).unwrap();
    let target = dir.path().join("doc.tex");

    let output = protex()
        .arg("-o")
        .arg(&target)
        .arg(&source)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).is_empty());

    let tex = std::fs::read_to_string(&target).unwrap();
    assert!(tex.contains("\\documentclass[11pt]{article}"));
    assert!(tex.contains("\\subsubsection{tick (Source File: m\\_clock.f90)}"));
    assert!(tex.contains("Advances the clock."));
    assert!(tex.trim_end().ends_with("\\end{document}"));
}

#[test]
fn reads_standard_input() {
    let mut child = protex()
        .args(["-b", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"!BOP\n! !MODULE: m_clock\n!EOP\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let tex = stdout(&output);
    assert!(tex.contains("Source File: Standard Input"));
    assert!(tex.contains("\\subsection{Fortran90: Module Interface m\\_clock (Source File: m\\_clock)}"));
    assert!(!tex.contains("\\documentclass"));
}

#[test]
fn multiple_files_share_one_document() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.f90");
    let second = dir.path().join("b.f90");
    std::fs::write(&first, "!BOP\n! !ROUTINE: first\n!EOP\n").unwrap();
    std::fs::write(&second, "!BOP\n! !ROUTINE: second\n!EOP\n").unwrap();

    let output = protex().arg(&first).arg(&second).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let tex = stdout(&output);
    assert_eq!(tex.matches("\\begin{document}").count(), 1);
    assert_eq!(tex.matches("\\end{document}").count(), 1);
    assert!(tex.contains("\\subsubsection{first (Source File: a.f90)}"));
    assert!(tex.contains("\\subsubsection{second (Source File: b.f90)}"));
}

#[test]
fn structural_error_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.f90");
    std::fs::write(&source, "!BOP\n! !ROUTINE: r\n!EOC\n").unwrap();
    let target = dir.path().join("doc.tex");

    let output = protex()
        .arg("--no-color")
        .arg("-o")
        .arg(&target)
        .arg(&source)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("`EOC` does not close the open prologue region"));
    assert!(!target.exists());
}

#[test]
fn warnings_do_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("notes.f90");
    std::fs::write(&source, "!BOP\n! !ROUTINE: r\n! !NOTES: later\n!EOP\n").unwrap();

    let output = protex().arg("--no-color").arg(&source).output().unwrap();
    assert!(output.status.success());
    assert!(stderr(&output).contains("unrecognized keyword `!NOTES:`"));

    let output = protex()
        .args(["--no-color", "--keys", "NOTES"])
        .arg(&source)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(!stderr(&output).contains("unrecognized"));
    assert!(stdout(&output).contains("{\\sf NOTES:}"));
}

#[test]
fn bad_configuration_is_rejected() {
    let output = protex().args(["--lang", "cobol", "-"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown language 'cobol'"));

    let output = protex().args(["--keys", "EOP", "-"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("section marker"));
}

#[test]
fn settings_file_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("protex.toml");
    std::fs::write(&settings, "language = \"P\"\nbare = true\nshut_up = true\n").unwrap();
    let source = dir.path().join("main.py");
    std::fs::write(&source, "#BOP\n# !ROUTINE: main\n#EOP\n#BOC\nsecret()\n#EOC\n").unwrap();

    let output = protex()
        .arg("--config")
        .arg(&settings)
        .arg(&source)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let tex = stdout(&output);
    assert!(tex.contains("\\subsubsection{main (Source File: main.py)}"));
    assert!(!tex.contains("\\documentclass"));
    assert!(!tex.contains("secret"));
}

#[test]
fn check_and_list_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("m.f90");
    std::fs::write(&source, format!("{}!BOC\n      x = 1\n!EOC\n", ROUTINE)).unwrap();

    let output = protex().arg("--check").arg(&source).output().unwrap();
    assert!(output.status.success());
    assert!(stderr(&output).contains("ok: m.f90 parsed successfully"));
    assert!(stdout(&output).is_empty());

    let output = protex().arg("--list-blocks").arg(&source).output().unwrap();
    assert!(output.status.success());
    let listing = stdout(&output);
    assert!(listing.contains("prologue ROUTINE tick"), "{}", listing);
    assert!(listing.contains("code (1 lines)"), "{}", listing);
}
