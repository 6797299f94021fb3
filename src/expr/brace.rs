//! Brace expansion for host tokens.
//!
//! `web{1,2}.example.com` expands to `web1.example.com, web2.example.com`,
//! preserving alternative order. Multiple groups multiply left to right.
//! Nesting is rejected earlier by the parser; a malformed pattern falls
//! back to the literal string so plain hostnames containing braces still
//! resolve to themselves.

/// Expand a `{a,b,...}` comma pattern into all alternatives.
///
/// Returns the input itself as the only element when the pattern contains
/// no braces or is malformed.
pub fn expand_pattern(pattern: &str) -> Vec<String> {
    match try_expand(pattern) {
        Some(hosts) if !hosts.is_empty() => hosts,
        _ => vec![pattern.to_string()],
    }
}

fn try_expand(pattern: &str) -> Option<Vec<String>> {
    let open = match pattern.find('{') {
        Some(i) => i,
        None => return Some(vec![pattern.to_string()]),
    };
    let close = pattern[open..].find('}').map(|i| open + i)?;

    let head = &pattern[..open];
    let body = &pattern[open + 1..close];
    let tail = &pattern[close + 1..];

    if body.is_empty() {
        return None;
    }

    let rest = try_expand(tail)?;
    let mut result = Vec::with_capacity(body.split(',').count() * rest.len());
    for alt in body.split(',') {
        for suffix in &rest {
            result.push(format!("{head}{alt}{suffix}"));
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_braces_is_identity() {
        assert_eq!(expand_pattern("host1.example.com"), vec!["host1.example.com"]);
    }

    #[test]
    fn test_simple_alternatives_keep_order() {
        assert_eq!(
            expand_pattern("{a,b}.x"),
            vec!["a.x".to_string(), "b.x".to_string()]
        );
    }

    #[test]
    fn test_infix_pattern() {
        assert_eq!(
            expand_pattern("web{1,2}.example.com"),
            vec!["web1.example.com", "web2.example.com"]
        );
    }

    #[test]
    fn test_two_groups_multiply() {
        assert_eq!(
            expand_pattern("{a,b}{1,2}"),
            vec!["a1", "a2", "b1", "b2"]
        );
    }

    #[test]
    fn test_unclosed_brace_falls_back_to_literal() {
        assert_eq!(expand_pattern("host{1"), vec!["host{1"]);
    }

    #[test]
    fn test_empty_alternatives() {
        assert_eq!(expand_pattern("a{}b"), vec!["a{}b"]);
        assert_eq!(expand_pattern("a{,b}c"), vec!["ac", "abc"]);
    }
}
