//! Errors produced while parsing host expressions.

use thiserror::Error;

/// Parse failures carry the byte offset of the offending symbol so the
/// REPL can point at it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid symbol '{symbol}', expected -, *, % or a hostname at position {position}")]
    UnexpectedSymbol { symbol: char, position: usize },

    #[error("empty group name at position {position}")]
    EmptyGroupName { position: usize },

    #[error("empty tag at position {position}")]
    EmptyTag { position: usize },

    #[error("error compiling regexp at {position}: {source}")]
    BadRegexp {
        position: usize,
        source: regex::Error,
    },

    #[error("nested patterns are not allowed (at {position})")]
    NestedBraces { position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,
}
