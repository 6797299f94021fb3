//! The interactive command loop and all operator commands.
//!
//! The REPL is synchronous (rustyline owns the terminal); anything that
//! talks to the network or the pool is driven through the embedded tokio
//! runtime with `block_on`.

pub mod alias;
pub mod completer;
pub mod help;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config as ReadlineConfig, Editor};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;
use tokio::signal::unix::{signal, SignalKind};

use crate::config::{XcConfig, MAX_SSH_THREADS};
use crate::executer::Executer;
use crate::inventory::Backend;
use crate::remote::{shared_settings, RaisePassword, RaiseType, SharedSettings, SshSettings};
use crate::term;

use completer::XcHelper;

/// Every built-in command, kept sorted for the help overview.
pub const BUILTIN_COMMANDS: &[&str] = &[
    "alias",
    "c_exec",
    "c_runscript",
    "cd",
    "collapse",
    "connect_timeout",
    "debug",
    "delay",
    "distribute",
    "exec",
    "exit",
    "help",
    "hostlist",
    "interpreter",
    "local",
    "mode",
    "output",
    "p_exec",
    "p_runscript",
    "parallel",
    "passwd",
    "prepend_hostnames",
    "progressbar",
    "raise",
    "reload",
    "runscript",
    "s_exec",
    "s_runscript",
    "serial",
    "ssh",
    "threads",
    "user",
];

const MAX_ALIAS_RECURSION: usize = 10;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecMode {
    Serial,
    Parallel,
    Collapse,
}

impl ExecMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "serial" => Some(ExecMode::Serial),
            "parallel" => Some(ExecMode::Parallel),
            "collapse" => Some(ExecMode::Collapse),
            _ => None,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ExecMode::Serial => "Serial",
            ExecMode::Parallel => "Parallel",
            ExecMode::Collapse => "Collapse",
        }
    }
}

/// Split off the first whitespace-delimited word.
fn ws_split(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

pub struct Cli {
    rt: Runtime,
    editor: Editor<XcHelper, DefaultHistory>,
    backend: Arc<RwLock<Backend>>,
    executer: Executer,
    settings: SharedSettings,

    mode: ExecMode,
    user: String,
    raise: RaiseType,
    raise_passwd: Option<RaisePassword>,
    connect_timeout: u64,
    delay: u64,
    debug: bool,
    progress_bar: bool,
    prepend_hostnames: bool,
    ssh_threads: usize,
    remote_tmpdir: String,
    exit_confirm: bool,
    exec_confirm: bool,
    interpreter: String,
    sudo_interpreter: String,
    su_interpreter: String,

    aliases: HashMap<String, String>,
    alias_recursion: usize,
    output_file_name: String,
    history_file: PathBuf,
    stopped: bool,
}

impl Cli {
    pub fn new(cfg: XcConfig, backend: Backend, rt: Runtime) -> Result<Self> {
        let settings = shared_settings(SshSettings::default());
        {
            let mut s = settings.write().unwrap();
            s.set_connect_timeout(cfg.ssh_connect_timeout);
            s.set_interpreter(RaiseType::None, &cfg.interpreter);
            s.set_interpreter(RaiseType::Sudo, &cfg.sudo_interpreter);
            s.set_interpreter(RaiseType::Su, &cfg.su_interpreter);
        }

        let backend = Arc::new(RwLock::new(backend));
        let commands: Vec<String> = BUILTIN_COMMANDS.iter().map(|c| c.to_string()).collect();
        let helper = XcHelper::new(Arc::clone(&backend), commands);

        let rl_config = ReadlineConfig::builder()
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<XcHelper, DefaultHistory> = Editor::with_config(rl_config)?;
        editor.set_helper(Some(helper));
        let _ = editor.load_history(&cfg.history_file);

        let executer = {
            let _guard = rt.enter();
            let mut executer = Executer::new(cfg.ssh_threads, &cfg.user, settings.clone());
            executer.set_debug(cfg.debug);
            executer.set_progress_bar(cfg.progress_bar);
            executer.set_prepend_hostnames(cfg.prepend_hostnames);
            executer.set_remote_tmpdir(&cfg.remote_tmpdir);
            executer
        };

        let mut cli = Cli {
            rt,
            editor,
            backend,
            executer,
            settings,
            mode: ExecMode::parse(&cfg.mode).unwrap_or(ExecMode::Parallel),
            user: cfg.user.clone(),
            raise: RaiseType::parse(&cfg.raise).unwrap_or(RaiseType::None),
            raise_passwd: None,
            connect_timeout: cfg.ssh_connect_timeout,
            delay: cfg.delay,
            debug: cfg.debug,
            progress_bar: cfg.progress_bar,
            prepend_hostnames: cfg.prepend_hostnames,
            ssh_threads: cfg.ssh_threads,
            remote_tmpdir: cfg.remote_tmpdir.clone(),
            exit_confirm: cfg.exit_confirm,
            exec_confirm: cfg.exec_confirm,
            interpreter: cfg.interpreter.clone(),
            sudo_interpreter: cfg.sudo_interpreter.clone(),
            su_interpreter: cfg.su_interpreter.clone(),
            aliases: HashMap::new(),
            alias_recursion: MAX_ALIAS_RECURSION,
            output_file_name: String::new(),
            history_file: cfg.history_file.clone(),
            stopped: false,
        };

        cli.run_rc(&cfg.rc_file);
        Ok(cli)
    }

    /// The interactive loop. Ctrl-C clears the current input; EOF exits
    /// (after confirmation when configured).
    pub fn run(&mut self) {
        while !self.stopped {
            let prompt = self.refresh_prompt();
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    self.run_command_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    if !self.exit_confirm || self.confirm("Are you sure to exit?") {
                        self.stopped = true;
                    }
                }
                Err(err) => {
                    term::error(&format!("Readline error: {err}\n"));
                    break;
                }
            }
        }
    }

    /// Run one top-level command line, resetting the alias recursion
    /// budget.
    pub fn run_command_line(&mut self, line: &str) {
        self.alias_recursion = MAX_ALIAS_RECURSION;
        self.one_cmd(line);
    }

    /// Dispatch one command line.
    fn one_cmd(&mut self, line: &str) {
        let line = line.trim();
        let (cmd, args_line) = ws_split(line);
        if cmd.is_empty() {
            return;
        }
        let args: Vec<&str> = if args_line.is_empty() {
            Vec::new()
        } else {
            WHITESPACE.split(args_line).collect()
        };

        if self.aliases.contains_key(cmd) {
            self.run_alias(cmd, args_line, &args);
            return;
        }

        match cmd {
            "exit" => self.do_exit(),
            "mode" => self.do_mode(args.first().copied()),
            "parallel" => self.mode = ExecMode::Parallel,
            "serial" => self.mode = ExecMode::Serial,
            "collapse" => self.mode = ExecMode::Collapse,
            "exec" => self.do_exec(self.mode, args_line),
            "c_exec" => self.do_exec(ExecMode::Collapse, args_line),
            "p_exec" => self.do_exec(ExecMode::Parallel, args_line),
            "s_exec" => self.do_exec(ExecMode::Serial, args_line),
            "runscript" => self.do_runscript(self.mode, args_line),
            "c_runscript" => self.do_runscript(ExecMode::Collapse, args_line),
            "p_runscript" => self.do_runscript(ExecMode::Parallel, args_line),
            "s_runscript" => self.do_runscript(ExecMode::Serial, args_line),
            "distribute" => self.do_distribute(args_line),
            "ssh" => self.do_ssh(args_line),
            "hostlist" => self.do_hostlist(args.first().copied()),
            "user" => self.do_user(args.first().copied()),
            "raise" => self.do_raise(args.first().copied()),
            "passwd" => self.do_passwd(),
            "delay" => self.do_delay(args.first().copied()),
            "debug" => self.do_debug(args.first().copied()),
            "progressbar" => self.do_progressbar(args.first().copied()),
            "prepend_hostnames" => self.do_prepend_hostnames(args.first().copied()),
            "threads" => self.do_threads(args.first().copied()),
            "connect_timeout" => self.do_connect_timeout(args.first().copied()),
            "interpreter" => self.do_interpreter(args_line),
            "output" => self.do_output(args_line),
            "cd" => self.do_cd(args_line),
            "local" => self.do_local(args_line),
            "alias" => self.do_alias(args_line),
            "reload" => self.do_reload(),
            "help" => self.do_help(args.first().copied()),
            _ => term::error(&format!("Unknown command: {cmd}\n")),
        }
    }

    /// Close resources on exit. Must be called explicitly.
    pub fn finalize(&mut self) {
        let _ = self.editor.save_history(&self.history_file);
        self.executer.set_output_file(None);
    }

    fn run_rc(&mut self, rc_file: &Path) {
        let file = match std::fs::File::open(rc_file) {
            Ok(file) => file,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    term::error(&format!("Error loading rcfile: {err}\n"));
                }
                return;
            }
        };
        for line in std::io::BufReader::new(file).lines().map_while(|l| l.ok()) {
            println!("{}", term::green(&line));
            self.run_command_line(&line);
        }
    }

    /// Rebuild the prompt, push the colored variant into the helper and
    /// return the plain one for rustyline's width accounting.
    fn refresh_prompt(&mut self) -> String {
        let mode_text = if self.mode == ExecMode::Serial && self.delay > 0 {
            format!("[Serial:{}]", self.delay)
        } else {
            format!("[{}]", self.mode.title())
        };
        let mode_colored = match self.mode {
            ExecMode::Serial => term::cyan(&mode_text),
            ExecMode::Parallel => term::yellow(&mode_text),
            ExecMode::Collapse => term::green(&mode_text),
        };

        let passwd_unset = self.raise_passwd.as_ref().map_or(true, |p| p.is_empty());
        let (raise_text, raise_colored) = match self.raise {
            RaiseType::None => (String::new(), String::new()),
            raise => {
                let mut text = match raise {
                    RaiseType::Su => "(su".to_string(),
                    _ => "(sudo".to_string(),
                };
                if passwd_unset {
                    text.push('*');
                }
                text.push(')');
                let colored = match raise {
                    RaiseType::Su => term::red(&text),
                    _ => term::green(&text),
                };
                let colored = if passwd_unset {
                    term::bold(&colored)
                } else {
                    colored
                };
                (text, colored)
            }
        };

        let plain = format!("{} {}{}> ", mode_text, self.user, raise_text);
        let colored = format!(
            "{} {}{}> ",
            mode_colored,
            term::bold(&term::blue(&self.user)),
            raise_colored
        );
        if let Some(helper) = self.editor.helper_mut() {
            helper.colored_prompt = colored;
        }
        plain
    }

    fn confirm(&mut self, msg: &str) -> bool {
        let prompt = format!("{msg} [Y/n] ");
        if let Some(helper) = self.editor.helper_mut() {
            helper.colored_prompt.clear();
        }
        loop {
            match self.editor.readline(&prompt) {
                Ok(line) => match line.trim().to_lowercase().as_str() {
                    "" | "y" => return true,
                    "n" => return false,
                    _ => continue,
                },
                Err(_) => return false,
            }
        }
    }

    fn resolve_hosts(&self, expr: &str) -> Option<Vec<String>> {
        let hosts = match self.backend.read().unwrap().host_list(expr) {
            Ok(hosts) => hosts,
            Err(err) => {
                term::error(&format!("Error parsing expression {expr}: {err}\n"));
                return None;
            }
        };
        if hosts.is_empty() {
            term::error("Empty hostlist\n");
            return None;
        }
        Some(hosts)
    }

    fn acquire_passwd(&mut self) {
        if self.raise == RaiseType::None {
            return;
        }
        let unset = self.raise_passwd.as_ref().map_or(true, |p| p.is_empty());
        if unset {
            self.do_passwd();
        }
    }

    /// Push the mutable session knobs into the executer before a run.
    fn push_session(&mut self) {
        self.executer.set_user(&self.user);
        self.executer.set_raise(self.raise);
        self.executer.set_password(self.raise_passwd.clone());
    }

    fn do_exit(&mut self) {
        if self.exit_confirm && !self.confirm("Are you sure to exit?") {
            return;
        }
        self.stopped = true;
    }

    fn do_mode(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            term::error("Usage: mode <serial/parallel/collapse>\n");
            return;
        };
        match ExecMode::parse(arg) {
            Some(mode) => self.mode = mode,
            None => term::error(&format!("Unknown mode: {arg}\n")),
        }
    }

    fn do_exec(&mut self, mode: ExecMode, args_line: &str) {
        let (expr, command) = ws_split(args_line);
        if command.is_empty() {
            term::error("Usage: exec <host_expression> <command>\n");
            return;
        }
        let Some(hosts) = self.resolve_hosts(expr) else {
            return;
        };

        self.acquire_passwd();
        self.push_session();

        if self.exec_confirm {
            println!("{}", term::yellow(&term::hr(command.len() + 5)));
            println!("{}\n{}\n", term::yellow("Hosts:"), hosts.join(", "));
            println!("{}\n{}\n", term::yellow("Command:"), command);
            if !self.confirm("Are you sure?") {
                return;
            }
            println!("{}\n", term::yellow(&term::hr(command.len() + 5)));
        }

        self.executer.write_output(&format!("==== exec {args_line}\n"));

        match mode {
            ExecMode::Parallel => {
                let result = self.rt.block_on(self.executer.parallel(&hosts, command));
                result.print();
            }
            ExecMode::Collapse => {
                let result = self.rt.block_on(self.executer.collapse(&hosts, command));
                result.print_output_map();
                result.print();
            }
            ExecMode::Serial => {
                let result = self
                    .rt
                    .block_on(self.executer.serial(&hosts, command, self.delay));
                result.print();
            }
        }
    }

    fn do_ssh(&mut self, args_line: &str) {
        let (expr, command) = ws_split(args_line);
        if expr.is_empty() {
            term::error("Usage: ssh <host_expression> [<command>]\n");
            return;
        }
        let Some(hosts) = self.resolve_hosts(expr) else {
            return;
        };
        self.acquire_passwd();
        self.push_session();
        let _ = self.rt.block_on(self.executer.serial(&hosts, command, 0));
    }

    /// Shared host+file validation for distribute and runscript.
    fn distribute_check(&self, command: &str, args_line: &str) -> Option<(Vec<String>, String)> {
        let (expr, filename) = ws_split(args_line);
        if filename.is_empty() {
            term::error(&format!("Usage: {command} <host_expression> <filename>\n"));
            return None;
        }
        let hosts = self.resolve_hosts(expr)?;
        let meta = match std::fs::metadata(filename) {
            Ok(meta) => meta,
            Err(err) => {
                term::error(&format!("Error opening file {filename}: {err}\n"));
                return None;
            }
        };
        if meta.is_dir() {
            term::error(&format!("File {filename} is a directory\n"));
            return None;
        }
        Some((hosts, filename.to_string()))
    }

    fn do_distribute(&mut self, args_line: &str) {
        let Some((hosts, filename)) = self.distribute_check("distribute", args_line) else {
            return;
        };
        self.executer.set_user(&self.user);
        let result = self
            .rt
            .block_on(self.executer.distribute(&hosts, &filename, &filename));
        result.print();
    }

    fn do_runscript(&mut self, mode: ExecMode, args_line: &str) {
        let Some((hosts, filename)) = self.distribute_check("runscript", args_line) else {
            return;
        };
        self.acquire_passwd();

        let now = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let basename = Path::new(&filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote = Path::new(&self.remote_tmpdir)
            .join(format!("tmp.xc.{now}_{basename}"))
            .to_string_lossy()
            .into_owned();

        self.push_session();
        let copied = self
            .rt
            .block_on(self.executer.distribute(&hosts, &filename, &remote));

        let hosts = copied.success.clone();
        let copy_errors = copied.error.clone();
        let cmd = format!("{remote}; rm {remote}");

        let mut result = match mode {
            ExecMode::Parallel => self.rt.block_on(self.executer.parallel(&hosts, &cmd)),
            ExecMode::Collapse => self.rt.block_on(self.executer.collapse(&hosts, &cmd)),
            ExecMode::Serial => self
                .rt
                .block_on(self.executer.serial(&hosts, &cmd, self.delay)),
        };
        result.error.extend(copy_errors);

        if mode == ExecMode::Collapse {
            result.print_output_map();
        }
        result.print();
    }

    fn do_hostlist(&mut self, expr: Option<&str>) {
        let Some(expr) = expr else {
            term::error("Usage: hostlist <host_expression>\n");
            return;
        };
        let Some(hosts) = self.resolve_hosts(expr) else {
            return;
        };

        let maxlen = hosts.iter().map(String::len).max().unwrap_or(0);
        let title = format!(" Hostlist {expr}    ");
        let hr_len = title.len().max(maxlen + 2);
        let hr = term::hr(hr_len);

        println!("{}", term::green(&hr));
        println!("{}", term::green(&title));
        println!("{}", term::green(&hr));
        for host in &hosts {
            println!("{host}");
        }
        term::success(&format!("Total: {} hosts\n", hosts.len()));
    }

    fn do_user(&mut self, arg: Option<&str>) {
        match arg {
            Some(user) => self.user = user.to_string(),
            None => term::error("Usage: user <username>\n"),
        }
    }

    fn do_raise(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            term::error("Usage: raise <none/su/sudo>\n");
            return;
        };
        let Some(raise) = RaiseType::parse(arg) else {
            term::error(&format!("Unknown raise type: {arg}\n"));
            return;
        };
        if raise != self.raise {
            // a password set for one raise type must not leak into
            // another
            self.raise_passwd = None;
        }
        self.raise = raise;
    }

    fn do_passwd(&mut self) {
        match rpassword::prompt_password("Set su/sudo password: ") {
            Ok(password) => self.raise_passwd = Some(RaisePassword::new(password)),
            Err(err) => term::error(&format!("{err}\n")),
        }
    }

    fn do_delay(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            term::error("Usage: delay <seconds>\n");
            return;
        };
        match arg.parse::<u64>() {
            Ok(delay) => self.delay = delay,
            Err(err) => term::error(&format!("Invalid delay format: {err}\n")),
        }
    }

    fn do_debug(&mut self, arg: Option<&str>) {
        match arg {
            None => {
                let value = if self.debug { "on" } else { "off" };
                term::warn(&format!("Debug is {value}\n"));
            }
            Some("on") => {
                self.debug = true;
                self.executer.set_debug(true);
            }
            Some("off") => {
                self.debug = false;
                self.executer.set_debug(false);
            }
            Some(_) => term::error("Invalid debug value. Please use \"on\" or \"off\"\n"),
        }
    }

    fn do_progressbar(&mut self, arg: Option<&str>) {
        match arg {
            None => {
                let value = if self.progress_bar { "on" } else { "off" };
                term::warn(&format!("Progressbar is {value}\n"));
            }
            Some("on") => {
                self.progress_bar = true;
                self.executer.set_progress_bar(true);
            }
            Some("off") => {
                self.progress_bar = false;
                self.executer.set_progress_bar(false);
            }
            Some(_) => term::error("Invalid progressbar value. Please use \"on\" or \"off\"\n"),
        }
    }

    fn do_prepend_hostnames(&mut self, arg: Option<&str>) {
        match arg {
            None => {
                let value = if self.prepend_hostnames { "on" } else { "off" };
                term::warn(&format!("Prepend Hostnames is {value}\n"));
            }
            Some("on") => {
                self.prepend_hostnames = true;
                self.executer.set_prepend_hostnames(true);
            }
            Some("off") => {
                self.prepend_hostnames = false;
                self.executer.set_prepend_hostnames(false);
            }
            Some(_) => {
                term::error("Invalid prepend_hostnames value. Please use \"on\" or \"off\"\n")
            }
        }
    }

    fn do_threads(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            term::success(&format!("Max SSH threads: {}\n", self.ssh_threads));
            return;
        };
        let threads = match arg.parse::<usize>() {
            Ok(threads) => threads,
            Err(err) => {
                term::error(&format!("Error setting max SSH threads value: {err}\n"));
                return;
            }
        };
        if threads < 1 {
            term::error("Max SSH threads can't be lower than 1\n");
            return;
        }
        if threads > MAX_SSH_THREADS {
            term::error(&format!(
                "Max SSH threads can't be higher than {MAX_SSH_THREADS}\n"
            ));
            return;
        }
        self.ssh_threads = threads;
        term::success(&format!("Max SSH threads set to {}\n", self.ssh_threads));
        {
            let _guard = self.rt.enter();
            self.executer.set_threads(threads);
        }
        term::success("Execution pool re-created\n");
    }

    fn do_connect_timeout(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            term::warn(&format!("connect_timeout = {}\n", self.connect_timeout));
            return;
        };
        match arg.parse::<u64>() {
            Ok(timeout) => {
                self.connect_timeout = timeout;
                self.settings.write().unwrap().set_connect_timeout(timeout);
            }
            Err(err) => term::error(&format!("Error reading connect timeout value: {err}\n")),
        }
    }

    fn do_interpreter(&mut self, args_line: &str) {
        if args_line.is_empty() {
            term::warn(&format!(
                "Using \"{}\" for commands with none-type raise\n",
                self.interpreter
            ));
            term::warn(&format!(
                "Using \"{}\" for commands with sudo-type raise\n",
                self.sudo_interpreter
            ));
            term::warn(&format!(
                "Using \"{}\" for commands with su-type raise\n",
                self.su_interpreter
            ));
            return;
        }
        let (raise_type, interpreter) = ws_split(args_line);
        let raise = match RaiseType::parse(raise_type) {
            Some(raise) => raise,
            None => {
                term::error(&format!("Invalid raise type: {raise_type}\n"));
                return;
            }
        };
        match raise {
            RaiseType::None => self.interpreter = interpreter.to_string(),
            RaiseType::Sudo => self.sudo_interpreter = interpreter.to_string(),
            RaiseType::Su => self.su_interpreter = interpreter.to_string(),
        }
        self.settings
            .write()
            .unwrap()
            .set_interpreter(raise, interpreter);
        term::warn(&format!(
            "Using \"{interpreter}\" for commands with {raise_type}-type raise\n"
        ));
    }

    fn do_output(&mut self, args_line: &str) {
        if args_line.is_empty() {
            if self.output_file_name.is_empty() {
                term::warn("Output is switched off\n");
            } else {
                term::success(&format!("Output is copied to {}\n", self.output_file_name));
            }
            return;
        }

        // "_" switches the copy off
        if args_line == "_" {
            self.output_file_name.clear();
            self.executer.set_output_file(None);
            term::warn("Output is switched off\n");
            return;
        }

        match std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(args_line)
        {
            Ok(file) => {
                self.executer.set_output_file(Some(file));
                self.output_file_name = args_line.to_string();
                term::success(&format!("Output is copied to {}\n", self.output_file_name));
            }
            Err(err) => term::error(&format!("Error setting output file to {args_line}: {err}\n")),
        }
    }

    fn do_cd(&mut self, args_line: &str) {
        if args_line.is_empty() {
            term::error("Usage: cd <directory>\n");
            return;
        }
        if let Err(err) = std::env::set_current_dir(args_line) {
            term::error(&format!("Error changing directory: {err}\n"));
        }
    }

    fn do_local(&mut self, args_line: &str) {
        if args_line.is_empty() {
            term::error("Usage: local <command> [<args>]\n");
            return;
        }
        let line = args_line.to_string();
        self.rt.block_on(async move {
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(err) => {
                    term::error(&format!("Error trapping SIGINT: {err}\n"));
                    return;
                }
            };
            let mut child = match tokio::process::Command::new("bash")
                .arg("-c")
                .arg(&line)
                .spawn()
            {
                Ok(child) => child,
                Err(err) => {
                    term::error(&format!("Error running command: {err}\n"));
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = child.wait() => break,
                    // the terminal delivers SIGINT to the whole
                    // foreground group, the child handles it itself
                    _ = sigint.recv() => continue,
                }
            }
        });
    }

    fn do_alias(&mut self, args_line: &str) {
        let (name, body) = ws_split(args_line);
        if name.is_empty() {
            term::error("Usage: alias <alias_name> [<command> [<args>]]\n");
            return;
        }

        if body.is_empty() {
            if self.aliases.remove(name).is_none() {
                term::error(&format!("Error removing alias {name}: alias not found\n"));
                return;
            }
            if let Some(helper) = self.editor.helper_mut() {
                helper.remove_command(name);
            }
            return;
        }

        let shadows_command = !self.aliases.contains_key(name)
            && self
                .editor
                .helper()
                .is_some_and(|h| h.commands().iter().any(|c| c == name));
        if shadows_command {
            term::error(&format!(
                "Can not create alias {name}: such command already exists\n"
            ));
            return;
        }

        self.aliases.insert(name.to_string(), body.to_string());
        if let Some(helper) = self.editor.helper_mut() {
            helper.add_command(name);
        }
    }

    fn run_alias(&mut self, name: &str, args_line: &str, args: &[&str]) {
        if self.alias_recursion == 0 {
            term::error("Maximum recursion reached for alias referencing\n");
            return;
        }
        self.alias_recursion -= 1;

        let Some(body) = self.aliases.get(name).cloned() else {
            term::error(&format!(
                "Alias {name} is defined but not found, this must be a bug\n"
            ));
            return;
        };
        match alias::interpolate(&body, args_line, args) {
            Ok(cmd_line) => self.one_cmd(&cmd_line),
            Err(err) => term::error(&format!("Error running alias {name}: {err}\n")),
        }
    }

    fn do_reload(&mut self) {
        let mut backend = self.backend.write().unwrap();
        if let Err(err) = self.rt.block_on(backend.reload()) {
            term::error(&format!("Error reloading inventory: {err}\n"));
        }
    }

    fn do_help(&mut self, topic: Option<&str>) {
        let commands: Vec<String> = self
            .editor
            .helper()
            .map(|h| h.commands().to_vec())
            .unwrap_or_default();
        help::print_help(topic.unwrap_or(""), &commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_split() {
        assert_eq!(ws_split("exec %g uptime"), ("exec", "%g uptime"));
        assert_eq!(ws_split("exec"), ("exec", ""));
        assert_eq!(ws_split("exec   a   b"), ("exec", "a   b"));
        assert_eq!(ws_split(""), ("", ""));
    }

    #[test]
    fn test_exec_mode_parse() {
        assert_eq!(ExecMode::parse("serial"), Some(ExecMode::Serial));
        assert_eq!(ExecMode::parse("parallel"), Some(ExecMode::Parallel));
        assert_eq!(ExecMode::parse("collapse"), Some(ExecMode::Collapse));
        assert_eq!(ExecMode::parse("bogus"), None);
    }

    #[test]
    fn test_builtin_commands_sorted_and_unique() {
        let mut sorted = BUILTIN_COMMANDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, BUILTIN_COMMANDS);
    }
}
