//! Host callback table
//!
//! The core never talks to the OS directly: console output, wall-clock
//! time, and fatal diagnostics all route through a [`Host`] the embedder
//! supplies at engine creation. The CLI installs [`StdioHost`]; tests use
//! [`CaptureHost`] to observe output.

use std::time::{SystemTime, UNIX_EPOCH};

/// Callbacks the core may invoke on its embedder.
pub trait Host {
    /// Write already-formed text to the standard output stream.
    fn write_stdout(&mut self, text: &str);

    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    /// Report an unrecoverable fault (no trap installed). The engine
    /// returns the failure to its caller afterwards; hosts that prefer to
    /// abort may do so here.
    fn panic_report(&mut self, diagnostic: &str);
}

/// Default host: real stdout, real clock, stderr panics.
#[derive(Debug, Default)]
pub struct StdioHost;

impl Host for StdioHost {
    fn write_stdout(&mut self, text: &str) {
        use std::io::Write;
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn panic_report(&mut self, diagnostic: &str) {
        eprintln!("*** revel panic: {diagnostic}");
    }
}

/// Test host that accumulates output.
#[derive(Debug, Default)]
pub struct CaptureHost {
    pub stdout: String,
    pub panics: Vec<String>,
}

impl Host for CaptureHost {
    fn write_stdout(&mut self, text: &str) {
        self.stdout.push_str(text);
    }

    fn now_ms(&self) -> i64 {
        0
    }

    fn panic_report(&mut self, diagnostic: &str) {
        self.panics.push(diagnostic.to_string());
    }
}
