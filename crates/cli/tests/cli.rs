//! End-to-end checks of the `revel` binary
//!
//! Drives the built executable against one-liners and temp-file scripts,
//! asserting stdout, stderr, and exit codes. The REPL itself needs a
//! terminal; its evaluation path is the same `eval_and_print` flow covered
//! here.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn revel() -> Command {
    Command::new(env!("CARGO_BIN_EXE_revel"))
}

fn run_script(source: &str) -> Output {
    let mut script = NamedTempFile::new().expect("temp script");
    script.write_all(source.as_bytes()).expect("script written");
    revel()
        .arg(script.path())
        .output()
        .expect("binary launches")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn eval_flag_prints_the_molded_value() {
    let output = revel()
        .args(["-e", "1 + 2 * 3"])
        .output()
        .expect("binary launches");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "9\n");
}

#[test]
fn eval_flag_is_silent_for_void_results() {
    let output = revel()
        .args(["-e", "if false [1]"])
        .output()
        .expect("binary launches");
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "");
}

#[test]
fn scripts_run_from_a_file() {
    let output = run_script("x: 6\nprint x * 7\n");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "42\n");
}

#[test]
fn script_values_are_not_echoed() {
    // Only PRINT writes to stdout in script mode.
    let output = run_script("1 + 1\n");
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "");
}

#[test]
fn script_failures_report_and_exit_nonzero() {
    let output = run_script("print \"before\"\n1 / 0\nprint \"after\"\n");
    assert!(!output.status.success());
    assert_eq!(stdout_of(&output), "before\n", "evaluation stops at the failure");
    let stderr = stderr_of(&output);
    assert!(
        stderr.contains("zero-divide"),
        "stderr names the error id: {stderr}"
    );
}

#[test]
fn quit_ends_a_script_cleanly() {
    let output = run_script("print \"before\"\nquit\nprint \"after\"\n");
    assert!(output.status.success(), "quit is not an error");
    assert_eq!(stdout_of(&output), "before\n");
    assert_eq!(stderr_of(&output), "", "no spurious halt diagnostics");
}

#[test]
fn quit_return_sets_the_exit_code() {
    let output = run_script("quit/return 3\n");
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stderr_of(&output), "");
}

#[test]
fn quit_works_from_inside_code() {
    // Not the REPL's literal-line shortcut: QUIT invoked as an ordinary
    // native inside a conditional still ends the process.
    let output = run_script("if true [quit/return 5]\nprint \"unreached\"\n");
    assert_eq!(output.status.code(), Some(5));
    assert_eq!(stdout_of(&output), "");
}

#[test]
fn missing_script_fails_with_a_diagnostic() {
    let output = revel()
        .arg("no-such-script.rvl")
        .output()
        .expect("binary launches");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("cannot read"));
}
