use thiserror::Error;

/// Errors raised while assembling or loading a program.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("label {label:?} was referenced but never defined")]
    UnresolvedLabel { label: String },
    #[error("no scope named {path:?}")]
    UnknownScope { path: String },
    #[error("no signal named {path:?}")]
    UnknownSignal { path: String },
}

/// Errors surfaced through the fallible embedder entry points. Opcode
/// handlers never unwind: conditions the data model defines (X results,
/// dropped writes) are not errors, and internal invariant violations
/// (object-stack overflow, inconsistent operands) abort with a pinpoint
/// message instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("handle does not accept values")]
    BadHandle,
}

/// Severity of a user diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// One collected user diagnostic, with the source position last armed by
/// a `file_line` opcode when available.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(file), Some(line)) = (&self.file, self.line) {
            write!(f, "{file}:{line}: ")?;
        }
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        write!(f, "{tag}: {}", self.message)
    }
}

/// Collected diagnostics. The exit status goes nonzero once the error
/// count passes the threshold (default: any error).
#[derive(Debug)]
pub struct Diagnostics {
    pub messages: Vec<Diagnostic>,
    pub error_threshold: usize,
    errors: usize,
    current_file: Option<String>,
    current_line: Option<u32>,
    echo: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            messages: Vec::new(),
            error_threshold: 1,
            errors: 0,
            current_file: None,
            current_line: None,
            echo: false,
        }
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo diagnostics to stderr as they arrive.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Arm the source position for subsequent diagnostics.
    pub fn set_location(&mut self, file: &str, line: u32) {
        self.current_file = Some(file.to_string());
        self.current_line = Some(line);
    }

    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let diag = Diagnostic {
            severity,
            message: message.into(),
            file: self.current_file.clone(),
            line: self.current_line,
        };
        if severity != Severity::Warning {
            self.errors += 1;
        }
        if self.echo {
            eprintln!("{diag}");
        }
        self.messages.push(diag);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, message);
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        self.report(Severity::Fatal, message);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// True when the accumulated errors force a nonzero exit status.
    pub fn over_threshold(&self) -> bool {
        self.errors >= self.error_threshold
    }
}
