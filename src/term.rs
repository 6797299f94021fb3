//! Colored terminal output helpers.
//!
//! Thin wrappers around owo-colors used for host prefixes, banners and
//! operator-facing error/warning/success lines. Colors match the classic
//! "light" ANSI palette so output looks the same in dark and light themes.

use owo_colors::OwoColorize;
use std::io::Write;
use terminal_size::{terminal_size, Width};

pub fn blue(msg: &str) -> String {
    msg.bright_blue().to_string()
}

pub fn red(msg: &str) -> String {
    msg.bright_red().to_string()
}

pub fn green(msg: &str) -> String {
    msg.bright_green().to_string()
}

pub fn yellow(msg: &str) -> String {
    msg.bright_yellow().to_string()
}

pub fn cyan(msg: &str) -> String {
    msg.bright_cyan().to_string()
}

pub fn bold_white(msg: &str) -> String {
    msg.white().bold().to_string()
}

pub fn bold(msg: &str) -> String {
    msg.bold().to_string()
}

/// A horizontal rule of the given width.
pub fn hr(len: usize) -> String {
    "-".repeat(len)
}

/// Current terminal width, with a sane fallback for pipes.
pub fn width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) => w as usize,
        None => 80,
    }
}

pub fn error(msg: &str) {
    print!("{}", red(msg));
    let _ = std::io::stdout().flush();
}

pub fn warn(msg: &str) {
    print!("{}", yellow(msg));
    let _ = std::io::stdout().flush();
}

pub fn success(msg: &str) {
    print!("{}", green(msg));
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hr_width() {
        assert_eq!(hr(5), "-----");
        assert_eq!(hr(0), "");
    }

    #[test]
    fn test_colored_wraps_message() {
        let s = blue("host1");
        assert!(s.contains("host1"));
    }
}
