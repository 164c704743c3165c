// ABOUTME: Error sink for user-facing diagnostics on stderr
// ABOUTME: Colored when stderr is a terminal, with help text for known failure kinds

use owo_colors::OwoColorize;
use std::io::IsTerminal;

pub struct CliOutput {
    use_color: bool,
}

impl CliOutput {
    /// Color only when stderr is a terminal and nothing asked for plain output
    pub fn new(no_color: bool) -> Self {
        let use_color = !no_color
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stderr().is_terminal();
        Self { use_color }
    }

    pub fn with_color(use_color: bool) -> Self {
        Self { use_color }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.format_error(message));
    }

    pub fn hint(&self, message: &str) {
        eprintln!("{}", self.format_hint(message));
    }

    /// Print an error with its cause chain, plus help text when the root is
    /// an SDK error that has some
    pub fn report(&self, err: &anyhow::Error) {
        self.error(&format!("{:#}", err));

        let help = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<cellpin_sdk::Error>())
            .and_then(cellpin_sdk::Error::help_text);
        if let Some(help) = help {
            self.hint(help);
        }
    }

    fn format_error(&self, message: &str) -> String {
        if self.use_color {
            format!("{} {}", "error:".red().bold(), message)
        } else {
            format!("error: {}", message)
        }
    }

    fn format_hint(&self, message: &str) -> String {
        if self.use_color {
            format!("  {} {}", "help:".cyan(), message)
        } else {
            format!("  help: {}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_formatting() {
        let output = CliOutput::with_color(false);
        assert_eq!(output.format_error("boom"), "error: boom");
        assert_eq!(output.format_hint("try again"), "  help: try again");
    }

    #[test]
    fn test_colored_formatting_keeps_message() {
        let output = CliOutput::with_color(true);
        let line = output.format_error("boom");
        assert!(line.contains("\x1b["));
        assert!(line.ends_with("boom"));
    }

    #[test]
    fn test_no_color_flag_wins() {
        assert!(!CliOutput::new(true).use_color);
    }
}
