//! Alias interpolation.
//!
//! An alias body may reference positional arguments as `#1`..`#9` and
//! the whole raw argument line as `#*`. Referencing a missing argument
//! is an error so a broken alias fails loudly instead of running a
//! half-substituted command.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias needs argument #{wanted} but only {given} arguments are given")]
    MissingArgument { wanted: usize, given: usize },
}

/// Substitute `#n` and `#*` references in an alias body.
pub fn interpolate(proxy: &str, args_line: &str, args: &[&str]) -> Result<String, AliasError> {
    let chars: Vec<char> = proxy.chars().collect();
    let mut res = String::with_capacity(proxy.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '#' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if let Some(digit) = next.to_digit(10) {
                let wanted = digit as usize;
                let idx = wanted.wrapping_sub(1);
                if idx >= args.len() {
                    return Err(AliasError::MissingArgument {
                        wanted,
                        given: args.len(),
                    });
                }
                res.push_str(args[idx]);
                i += 2;
                continue;
            }
            if next == '*' {
                res.push_str(args_line);
                i += 2;
                continue;
            }
        }
        res.push(chars[i]);
        i += 1;
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_body_passes_through() {
        assert_eq!(interpolate("local ls", "", &[]).unwrap(), "local ls");
    }

    #[test]
    fn test_positional_substitution() {
        assert_eq!(
            interpolate("p_exec #1 uptime", "%mygroup", &["%mygroup"]).unwrap(),
            "p_exec %mygroup uptime"
        );
        assert_eq!(
            interpolate("exec #2 #1", "a b", &["a", "b"]).unwrap(),
            "exec b a"
        );
    }

    #[test]
    fn test_star_substitutes_raw_args_line() {
        assert_eq!(
            interpolate("exec %all #*", "uptime -p", &["uptime", "-p"]).unwrap(),
            "exec %all uptime -p"
        );
    }

    #[test]
    fn test_missing_argument_is_error() {
        assert_eq!(
            interpolate("exec #2 x", "a", &["a"]),
            Err(AliasError::MissingArgument { wanted: 2, given: 1 })
        );
    }

    #[test]
    fn test_trailing_hash_is_literal() {
        assert_eq!(interpolate("echo #", "", &[]).unwrap(), "echo #");
    }

    #[test]
    fn test_hash_before_letter_is_literal() {
        assert_eq!(interpolate("exec %g#prod ls", "", &[]).unwrap(), "exec %g#prod ls");
    }
}
