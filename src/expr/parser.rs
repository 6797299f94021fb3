//! Single-pass state machine turning an expression string into tokens.

use regex::Regex;

use super::error::ParseError;

/// What a token selects from the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenKind {
    #[default]
    Host,
    Group,
    WorkGroup,
    HostRegexp,
}

/// One parsed element of a host expression.
///
/// A `WorkGroup` token with an empty value means "all work groups".
#[derive(Debug, Clone, Default)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub datacenter_filter: Option<String>,
    pub tags_filter: Vec<String>,
    pub regexp_filter: Option<Regex>,
    pub exclude: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Wait,
    ReadHost,
    ReadGroup,
    ReadWorkGroup,
    ReadDatacenter,
    ReadTag,
    ReadHostBracePattern,
    ReadRegexp,
}

fn is_host_symbol(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '{' | '}')
}

/// Parse a host expression into an ordered token sequence.
///
/// Order matters to the resolver: an excluding token removes hosts
/// admitted by the tokens to its left.
pub fn parse_expression(expr: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut ct = Token::default();
    let mut state = State::Wait;
    let mut tag = String::new();
    let mut re = String::new();

    let mut i = 0;
    while i < chars.len() {
        let sym = chars[i];
        let last = i == chars.len() - 1;

        match state {
            State::Wait => {
                if sym == '-' {
                    ct.exclude = true;
                } else if sym == '*' {
                    state = State::ReadWorkGroup;
                    ct.kind = TokenKind::WorkGroup;
                } else if sym == '%' {
                    state = State::ReadGroup;
                    ct.kind = TokenKind::Group;
                } else if sym == '/' || sym == '~' {
                    state = State::ReadRegexp;
                    ct.kind = TokenKind::HostRegexp;
                    re.clear();
                } else if is_host_symbol(sym) {
                    state = if sym == '{' {
                        State::ReadHostBracePattern
                    } else {
                        State::ReadHost
                    };
                    ct.kind = TokenKind::Host;
                    ct.value.push(sym);
                } else {
                    return Err(ParseError::UnexpectedSymbol {
                        symbol: sym,
                        position: i,
                    });
                }
            }

            State::ReadGroup => {
                if sym == '@' {
                    state = State::ReadDatacenter;
                } else if sym == '#' {
                    state = State::ReadTag;
                    tag.clear();
                } else if sym == '/' {
                    state = State::ReadRegexp;
                    re.clear();
                } else if sym == ',' || last {
                    if last && sym != ',' {
                        ct.value.push(sym);
                    }
                    if ct.value.is_empty() {
                        return Err(ParseError::EmptyGroupName { position: i });
                    }
                    tokens.push(std::mem::take(&mut ct));
                    state = State::Wait;
                } else {
                    ct.value.push(sym);
                }
            }

            State::ReadWorkGroup => {
                if sym == '@' {
                    state = State::ReadDatacenter;
                } else if sym == '#' {
                    state = State::ReadTag;
                    tag.clear();
                } else if sym == '/' {
                    state = State::ReadRegexp;
                    re.clear();
                } else if sym == ',' || last {
                    if last && sym != ',' {
                        ct.value.push(sym);
                    }
                    tokens.push(std::mem::take(&mut ct));
                    state = State::Wait;
                } else {
                    ct.value.push(sym);
                }
            }

            State::ReadRegexp => {
                if sym == '\\' && !last && chars[i + 1] == '/' {
                    // screened slash
                    re.push('/');
                    i += 1;
                } else if sym == '/' {
                    let compiled = Regex::new(&re)
                        .map_err(|source| ParseError::BadRegexp { position: i, source })?;
                    ct.regexp_filter = Some(compiled);
                    tokens.push(std::mem::take(&mut ct));
                    state = State::Wait;
                    // a regexp ends with "/EOL" or "/,"; Wait doesn't expect
                    // a comma so it's consumed here
                    if !last && chars[i + 1] == ',' {
                        i += 1;
                    }
                } else {
                    re.push(sym);
                }
            }

            State::ReadHost => {
                if sym == '/' {
                    state = State::ReadRegexp;
                    re.clear();
                } else if sym == '#' && ct.kind == TokenKind::Host {
                    state = State::ReadTag;
                    tag.clear();
                } else {
                    if sym == '{' {
                        state = State::ReadHostBracePattern;
                    }
                    if sym == ',' || last {
                        if last && sym != ',' {
                            ct.value.push(sym);
                        }
                        tokens.push(std::mem::take(&mut ct));
                        state = State::Wait;
                    } else {
                        ct.value.push(sym);
                    }
                }
            }

            State::ReadHostBracePattern => {
                if sym == '{' {
                    return Err(ParseError::NestedBraces { position: i });
                }
                if sym == '}' {
                    state = State::ReadHost;
                }
                ct.value.push(sym);
            }

            State::ReadDatacenter => {
                if sym == ',' || last {
                    if last && sym != ',' {
                        push_filter_char(&mut ct.datacenter_filter, sym);
                    }
                    tokens.push(std::mem::take(&mut ct));
                    state = State::Wait;
                } else if sym == '#' {
                    state = State::ReadTag;
                    tag.clear();
                } else if sym == '/' {
                    state = State::ReadRegexp;
                    re.clear();
                } else {
                    push_filter_char(&mut ct.datacenter_filter, sym);
                }
            }

            State::ReadTag => {
                if sym == ',' || last {
                    if last && sym != ',' {
                        tag.push(sym);
                    }
                    if tag.is_empty() {
                        return Err(ParseError::EmptyTag { position: i });
                    }
                    ct.tags_filter.push(std::mem::take(&mut tag));
                    tokens.push(std::mem::take(&mut ct));
                    state = State::Wait;
                } else if sym == '#' {
                    if tag.is_empty() {
                        return Err(ParseError::EmptyTag { position: i });
                    }
                    ct.tags_filter.push(std::mem::take(&mut tag));
                } else if sym == '@' {
                    if tag.is_empty() {
                        return Err(ParseError::EmptyTag { position: i });
                    }
                    ct.tags_filter.push(std::mem::take(&mut tag));
                    state = State::ReadDatacenter;
                } else if sym == '/' {
                    if tag.is_empty() {
                        return Err(ParseError::EmptyTag { position: i });
                    }
                    ct.tags_filter.push(std::mem::take(&mut tag));
                    state = State::ReadRegexp;
                    re.clear();
                } else {
                    tag.push(sym);
                }
            }
        }

        i += 1;
    }

    if !ct.value.is_empty() || state == State::ReadWorkGroup {
        // a workgroup token may be empty, meaning "all"
        tokens.push(ct);
    } else if state != State::Wait {
        return Err(ParseError::UnexpectedEnd);
    }

    if matches!(
        state,
        State::ReadDatacenter | State::ReadTag | State::ReadHostBracePattern | State::ReadRegexp
    ) {
        return Err(ParseError::UnexpectedEnd);
    }

    Ok(tokens)
}

fn push_filter_char(filter: &mut Option<String>, c: char) {
    filter.get_or_insert_with(String::new).push(c);
}
