//! # Output Configuration
//!
//! Controls how the `kr8` CLI decorates its summary lines: emoji markers and
//! ANSI colours, or plain bracketed tags for logs and dumb terminals.
//!
//! Colour is decided once per invocation from `--color=always|never|auto`.
//! In auto mode the usual conventions apply:
//!
//! - `NO_COLOR` set (any value): off
//! - `CLICOLOR=0`: off
//! - `CLICOLOR_FORCE=1`: on, even when stdout is not a TTY
//! - `TERM=dumb`: off
//! - otherwise whatever `console` detects for stdout
//!
//! ```rust,ignore
//! use kr8::output::{emoji, OutputConfig, Status};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} dev", emoji(&config, "✅", "[OK]"));
//! println!("{}", config.paint(Status::Failed, "prod-eu"));
//! ```

use std::env;

use console::Style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

/// Severity of a summary line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Failed,
}

impl OutputConfig {
    /// Resolve the `--color` flag against the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    /// Colour `text` by status; unchanged when colours are off.
    pub fn paint(&self, status: Status, text: &str) -> String {
        if !self.use_color {
            return text.to_string();
        }
        let style = match status {
            Status::Ok => Style::new().green(),
            Status::Warning => Style::new().yellow(),
            Status::Failed => Style::new().red().bold(),
        };
        // Force styling; `console` would otherwise re-check the terminal
        style.force_styling(true).apply_to(text).to_string()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colours are on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}
