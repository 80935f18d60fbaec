use std::env;
use std::io::{self, IsTerminal};
use std::sync::OnceLock;

fn use_color() -> bool {
    static USE_COLOR: OnceLock<bool> = OnceLock::new();
    *USE_COLOR.get_or_init(|| env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal())
}

fn paint(code: &str, text: &str) -> String {
    if use_color() {
        format!("\u{1b}[{}m{}\u{1b}[0m", code, text)
    } else {
        text.to_string()
    }
}

fn yellow(text: &str) -> String {
    paint("33", text)
}

fn red(text: &str) -> String {
    paint("31", text)
}

fn cyan(text: &str) -> String {
    paint("36", text)
}

pub fn warn(message: &str) {
    let tag = yellow("warn");
    eprintln!("{} {}", tag, message);
}

pub fn error(message: &str) {
    let tag = red("error");
    eprintln!("{} {}", tag, message);
}

pub fn info(message: &str) {
    let tag = cyan("info");
    eprintln!("{} {}", tag, message);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
        }
    }
}

/// Where diagnostics end up. The resolution core never writes to a terminal
/// directly; hosts can swap in their own sink.
pub trait DiagnosticSink {
    fn emit(&self, diagnostic: &Diagnostic);
}

pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Info => info(&diagnostic.message),
            Severity::Warn => warn(&diagnostic.message),
            Severity::Error => error(&diagnostic.message),
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::{Diagnostic, DiagnosticSink};
    use std::sync::{Arc, Mutex};

    /// Captures diagnostics for assertions.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub emitted: Arc<Mutex<Vec<Diagnostic>>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, diagnostic: &Diagnostic) {
            self.emitted.lock().unwrap().push(diagnostic.clone());
        }
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<String> {
            self.emitted
                .lock()
                .unwrap()
                .iter()
                .map(|d| d.message.clone())
                .collect()
        }
    }
}
