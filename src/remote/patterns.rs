//! Output-matching contracts for the ssh/scp drivers.
//!
//! Prompt detection is heuristic; the `LC_ALL`/`LANG` pin applied to every
//! child keeps prompt wording stable across locales.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// A password prompt from sudo/su on the remote side.
pub static PASSWD_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Pp]assword").unwrap());

/// Wrong password reported by sudo/su.
pub static WRONG_PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Ss]orry.+try.+again\.?").unwrap());

/// The "Connection to host closed." ssh epilogue (also the multiplexed
/// "Shared connection ..." variant).
pub static CONNECTION_CLOSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([Ss]hared\s+)?[Cc]onnection\s+to\s+.+\s+closed\.?[\n\r]+").unwrap()
});

/// scp's "lost connection" complaint.
pub static LOST_CONNECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Ll]ost\sconnection").unwrap());

/// A chunk consisting only of line breaks: the echo of a just-sent
/// password.
pub static ECHO_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\n\r]+$").unwrap());

/// Terminal noise that is suppressed rather than shown to the operator.
pub fn should_drop_chunk(chunk: &[u8]) -> bool {
    CONNECTION_CLOSED.is_match(chunk) || LOST_CONNECTION.is_match(chunk)
}
