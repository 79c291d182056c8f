//! Revel CLI
//!
//! `revel script.rvl` runs a script, `revel -e "expr"` evaluates one
//! expression, and plain `revel` opens the REPL. Every evaluation runs
//! inside the host-boundary trap, so errors print and the session
//! continues; Ctrl-C raises the HALT signal serviced at the next evaluator
//! safe point, while a `quit` anywhere in evaluated code ends the process
//! with its exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use revel_runtime::{Engine, HostOutcome, Signal};

#[derive(Parser)]
#[command(name = "revel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Revel interpreter", long_about = None)]
struct Cli {
    /// Script file to run
    script: Option<PathBuf>,

    /// Evaluate one expression and print its value
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    expression: Option<String>,

    /// Verbose logging (overrides REVEL_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("REVEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut engine = Engine::new();
    install_interrupt_handler(&engine);

    if let Some(expression) = cli.expression {
        return eval_and_print(&mut engine, &expression, true);
    }
    if let Some(script) = cli.script {
        let source = match std::fs::read_to_string(&script) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("revel: cannot read {}: {error}", script.display());
                return ExitCode::FAILURE;
            }
        };
        return eval_and_print(&mut engine, &source, false);
    }
    repl(&mut engine)
}

/// Evaluate source under the top-level trap; optionally print the value.
/// A QUIT in the source becomes the process exit code.
fn eval_and_print(engine: &mut Engine, source: &str, show_value: bool) -> ExitCode {
    match engine.with_unhaltable_trap(|engine| engine.do_text(source)) {
        HostOutcome::Value(value) => {
            if show_value && !value.is_void() {
                let molded = engine.mold_value(&value);
                println!("{molded}");
            }
            ExitCode::SUCCESS
        }
        HostOutcome::Quit(code) => exit_code_from(code),
        HostOutcome::Error(error) => {
            print_error(engine, &error);
            ExitCode::FAILURE
        }
    }
}

fn exit_code_from(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn print_error(engine: &mut Engine, error: &revel_runtime::Cell) {
    let id = engine.error_id(error).unwrap_or("unknown").to_string();
    let message = engine.error_message(error).unwrap_or_default().to_string();
    eprintln!("** {id} error: {message}");
}

fn repl(engine: &mut Engine) -> ExitCode {
    println!("revel {} — q or Ctrl-D to quit", env!("CARGO_PKG_VERSION"));
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("revel: terminal unavailable: {error}");
            return ExitCode::FAILURE;
        }
    };

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "q" {
                    break;
                }
                let _ = editor.add_history_entry(trimmed);
                match engine.with_unhaltable_trap(|engine| engine.do_text(trimmed)) {
                    HostOutcome::Value(value) => {
                        if !value.is_void() {
                            let molded = engine.mold_value(&value);
                            println!("== {molded}");
                        }
                    }
                    HostOutcome::Quit(code) => return exit_code_from(code),
                    HostOutcome::Error(error) => print_error(engine, &error),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C at the prompt just clears the line.
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("revel: readline: {error}");
                return ExitCode::FAILURE;
            }
        }
    }
    debug!("repl session ended");
    ExitCode::SUCCESS
}

/// SIGINT during evaluation raises the HALT signal bit; the evaluator
/// unwinds at its next safe point.
#[cfg(unix)]
fn install_interrupt_handler(engine: &Engine) {
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let signals = engine.signals.clone();
    match Signals::new([SIGINT]) {
        Ok(mut stream) => {
            std::thread::spawn(move || {
                for _ in stream.forever() {
                    signals.raise(Signal::Halt);
                }
            });
        }
        Err(error) => {
            debug!(%error, "interrupt handler unavailable");
        }
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler(_engine: &Engine) {}
