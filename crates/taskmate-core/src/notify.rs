use std::fmt;
use std::io::{self, IsTerminal, Write};

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget sink for user-facing outcome messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Prints notifications to stderr, one per line.
#[derive(Debug, Clone)]
pub struct StderrNotifier {
    color: bool,
}

impl StderrNotifier {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stderr().is_terminal(),
        }
    }

    fn format(&self, message: &str, severity: Severity) -> String {
        let code = match severity {
            Severity::Success => "32",
            Severity::Info => "36",
            Severity::Error => "31",
        };
        if self.color {
            format!("\x1b[{code}m[{severity}]\x1b[0m {message}")
        } else {
            format!("[{severity}] {message}")
        }
    }
}

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => error!(message, "notification"),
            _ => info!(message, severity = %severity, "notification"),
        }
        let line = self.format(message, severity);
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::{Severity, StderrNotifier};

    #[test]
    fn plain_format_tags_severity() {
        let notifier = StderrNotifier { color: false };
        assert_eq!(
            notifier.format("Task created successfully!", Severity::Success),
            "[success] Task created successfully!"
        );
        assert_eq!(
            notifier.format("title required", Severity::Error),
            "[error] title required"
        );
    }
}
