//! Tab completion for the REPL.
//!
//! Candidates are computed as suffixes of what the operator already
//! typed, so they are inserted at the cursor. Host expressions complete
//! segment-wise: the text after the last comma decides whether hosts,
//! groups, workgroups or datacenters are offered.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;
use std::sync::{Arc, RwLock};

use crate::inventory::Backend;

/// Help topics offered beyond command names.
pub const HELP_TOPICS: &[&str] = &["expressions", "config", "rcfiles"];

pub struct XcHelper {
    backend: Arc<RwLock<Backend>>,
    commands: Vec<String>,
    /// ANSI-colored prompt rendered in place of the plain one.
    pub colored_prompt: String,
}

impl XcHelper {
    pub fn new(backend: Arc<RwLock<Backend>>, commands: Vec<String>) -> Self {
        Self {
            backend,
            commands,
            colored_prompt: String::new(),
        }
    }

    pub fn add_command(&mut self, name: &str) {
        if !self.commands.iter().any(|c| c == name) {
            self.commands.push(name.to_string());
        }
    }

    pub fn remove_command(&mut self, name: &str) {
        self.commands.retain(|c| c != name);
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    fn complete_line(&self, line: &str) -> Vec<String> {
        let (cmd, args) = match split_first_word(line) {
            Some(split) => split,
            None => return self.complete_command(line),
        };

        match cmd {
            "mode" => static_candidates(&["collapse", "parallel", "serial"], args),
            "debug" | "progressbar" | "prepend_hostnames" => {
                static_candidates(&["off", "on"], args)
            }
            "raise" | "interpreter" => static_candidates(&["none", "su", "sudo"], args),
            "exec" | "c_exec" | "s_exec" | "p_exec" | "ssh" | "hostlist" => {
                self.complete_expr(args)
            }
            "distribute" | "runscript" | "c_runscript" | "p_runscript" | "s_runscript" => {
                match split_first_word(args) {
                    Some((_, file_part)) => complete_files(file_part),
                    None => self.complete_expr(args),
                }
            }
            "cd" | "output" | "local" => complete_files(args),
            "help" => {
                let mut topics: Vec<String> =
                    self.commands.iter().cloned().collect();
                topics.extend(HELP_TOPICS.iter().map(|t| t.to_string()));
                let mut res: Vec<String> = topics
                    .iter()
                    .filter_map(|t| t.strip_prefix(args))
                    .map(String::from)
                    .collect();
                res.sort();
                res
            }
            _ => Vec::new(),
        }
    }

    fn complete_command(&self, line: &str) -> Vec<String> {
        let mut res: Vec<String> = self
            .commands
            .iter()
            .filter_map(|c| c.strip_prefix(line))
            .map(|suffix| format!("{suffix} "))
            .collect();
        res.sort();
        res
    }

    /// Complete the trailing segment of a host expression.
    fn complete_expr(&self, line: &str) -> Vec<String> {
        // a shell command has started, nothing to offer
        if split_first_word(line).is_some() {
            return Vec::new();
        }

        // only the segment after the last comma matters
        if let Some(idx) = line.rfind(',') {
            return self.complete_expr(&line[idx + 1..]);
        }

        // exclusion marker is transparent for completion
        if let Some(rest) = line.strip_prefix('-') {
            return self.complete_expr(rest);
        }

        let backend = match self.backend.read() {
            Ok(backend) => backend,
            Err(_) => return Vec::new(),
        };

        if line.starts_with('%') {
            if let Some(idx) = line.find('@') {
                return backend.complete_datacenter(&line[idx + 1..]);
            }
            return backend.complete_group(line);
        }
        if line.starts_with('*') {
            if let Some(idx) = line.find('@') {
                return backend.complete_datacenter(&line[idx + 1..]);
            }
            return backend.complete_workgroup(line);
        }
        backend.complete_host(line)
    }
}

fn split_first_word(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(char::is_whitespace)?;
    let rest = line[idx..].trim_start();
    Some((&line[..idx], rest))
}

fn static_candidates(variants: &[&str], prefix: &str) -> Vec<String> {
    let mut res: Vec<String> = variants
        .iter()
        .filter_map(|v| v.strip_prefix(prefix))
        .map(String::from)
        .collect();
    res.sort();
    res
}

/// Filesystem completion; directories get a trailing slash.
fn complete_files(prefix: &str) -> Vec<String> {
    let pattern = format!("{prefix}*");
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut res = Vec::new();
    for path in paths.flatten() {
        let mut name = path.to_string_lossy().into_owned();
        if path.is_dir() {
            name.push('/');
        }
        if let Some(suffix) = name.strip_prefix(prefix) {
            res.push(suffix.to_string());
        }
    }
    res.sort();
    res
}

impl Completer for XcHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = self
            .complete_line(&line[..pos])
            .into_iter()
            .map(|suffix| Pair {
                display: suffix.clone(),
                replacement: suffix,
            })
            .collect();
        Ok((pos, candidates))
    }
}

impl Hinter for XcHelper {
    type Hint = String;
}

impl Highlighter for XcHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default && !self.colored_prompt.is_empty() {
            Cow::Owned(self.colored_prompt.clone())
        } else {
            Cow::Borrowed(prompt)
        }
    }
}

impl Validator for XcHelper {}

impl Helper for XcHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::local::{LocalFile, LocalFormat};

    fn helper() -> XcHelper {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.ini");
        std::fs::write(&path, "[web]\nweb1.example.com\nweb2.example.com\n").unwrap();
        let mut local = LocalFile::new(LocalFormat::Ini, path);
        local.load().unwrap();
        let backend = Arc::new(RwLock::new(Backend::LocalFile(local)));
        XcHelper::new(
            backend,
            vec!["exec".to_string(), "exit".to_string(), "hostlist".to_string()],
        )
    }

    #[test]
    fn test_command_completion_offers_suffixes() {
        let h = helper();
        let res = h.complete_line("ex");
        assert_eq!(res, vec!["ec ".to_string(), "it ".to_string()]);
    }

    #[test]
    fn test_expr_host_completion() {
        let h = helper();
        let res = h.complete_line("exec web1");
        assert_eq!(res, vec![".example.com".to_string()]);
    }

    #[test]
    fn test_expr_group_completion() {
        let h = helper();
        let res = h.complete_line("exec %w");
        assert_eq!(res, vec!["eb".to_string()]);
    }

    #[test]
    fn test_expr_completion_after_comma_and_dash() {
        let h = helper();
        assert_eq!(h.complete_line("exec %web,-web2"), vec![".example.com"]);
    }

    #[test]
    fn test_no_completion_once_command_starts() {
        let h = helper();
        assert!(h.complete_line("exec %web uptime").is_empty());
    }

    #[test]
    fn test_static_completion() {
        let h = helper();
        assert_eq!(h.complete_line("raise su"), vec!["", "do"]);
        assert_eq!(h.complete_line("debug o"), vec!["ff", "n"]);
    }
}
