//! Human and JSON rendering for command results and errors (§6/§7).

mod json;
mod table;

pub use json::render_error_json;
pub use table::render_change_set;

use apm_config::{ColorMode, LogFormat};
use console::Term;
use owo_colors::OwoColorize;

/// Which framing a command's result should be printed in, resolved once
/// from [`apm_config::ResolvedConfig::log_format`] and the `--format`
/// flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colorized prose, tables, and one-line summaries.
    Human,
    /// A single JSON document per invocation.
    Json,
}

impl From<LogFormat> for OutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Human => Self::Human,
            LogFormat::Json => Self::Json,
        }
    }
}

/// Whether this run should emit ANSI escapes, resolved from
/// [`ColorMode`] and whether stdout is actually a terminal.
#[must_use]
pub fn color_enabled(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => Term::stdout().is_term(),
    }
}

/// Prints a success label, colored green when `color` is enabled.
pub fn print_heading(text: &str, color: bool) {
    if color {
        println!("{}", text.green().bold());
    } else {
        println!("{text}");
    }
}

/// Prints a one-line `name: message` warning.
pub fn print_warning(field: &str, message: &str, color: bool) {
    let line = format!("warning: {field}: {message}");
    if color {
        println!("{}", line.yellow());
    } else {
        println!("{line}");
    }
}
