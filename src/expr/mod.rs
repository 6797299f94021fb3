//! Host expression DSL.
//!
//! An expression is a comma-separated list of tokens selecting hosts,
//! groups and work groups from the inventory, with optional datacenter,
//! tag and regexp filters and a leading `-` for exclusion:
//!
//! ```text
//! %backend@dc1#prod,-db03.example.com,*infra/log/,web{1,2}.example.com
//! ```

mod brace;
mod error;
mod parser;

pub use brace::expand_pattern;
pub use error::ParseError;
pub use parser::{parse_expression, Token, TokenKind};
