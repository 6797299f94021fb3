//! The help catalogue.

use crate::term;

pub struct HelpItem {
    pub usage: &'static str,
    pub text: &'static str,
    pub is_topic: bool,
}

/// Look up help for a command or topic.
pub fn help_item(name: &str) -> Option<HelpItem> {
    let (usage, text, is_topic) = match name {
        "exec" => (
            "<host_expression> <command>",
            "Runs a command on a list of servers.\n\n\
The list of hosts is built from <host_expression>; see \"help expressions\".\n\n\
exec can proceed in 3 different modes: serial, parallel and collapse.\n\n\
In serial mode the command runs server by server sequentially, holding for\n\
a delay between servers (see \"delay\").\n\n\
In parallel mode the command runs on all servers simultaneously. Output is\n\
prefixed with the host name it belongs to and is (almost) unbuffered, so\n\
parallel mode suits \"infinite\" commands like tail -f.\n\n\
Collapse mode is parallel mode with the output hidden until execution is\n\
over, then printed grouped by identical output. Handy for spotting config\n\
drift across a big group of hosts.\n\n\
The shortcuts c_exec, p_exec and s_exec run exec in collapse, parallel or\n\
serial mode without switching the current mode.",
            false,
        ),
        "c_exec" => ("<host_expression> <command>", "Runs exec in collapse mode, see \"help exec\".", false),
        "p_exec" => ("<host_expression> <command>", "Runs exec in parallel mode, see \"help exec\".", false),
        "s_exec" => ("<host_expression> <command>", "Runs exec in serial mode, see \"help exec\".", false),
        "mode" => (
            "<serial/parallel/collapse>",
            "Switches execution mode. To learn more about modes type \"help exec\".\n\n\
There are shortcuts: typing \"parallel\", \"serial\" or \"collapse\" switches\n\
the mode correspondingly.",
            false,
        ),
        "parallel" => ("", "Switches to parallel execution mode, see \"help exec\".", false),
        "serial" => ("", "Switches to serial execution mode, see \"help exec\".", false),
        "collapse" => ("", "Switches to collapse execution mode, see \"help exec\".", false),
        "runscript" => (
            "<host_expression> <filename>",
            "Copies a local script to the hosts matched by the expression and runs it\n\
in the current mode. The shortcuts c_runscript, p_runscript and s_runscript\n\
force a particular mode.",
            false,
        ),
        "c_runscript" => ("<host_expression> <filename>", "Runs a local script in collapse mode, see \"help runscript\".", false),
        "p_runscript" => ("<host_expression> <filename>", "Runs a local script in parallel mode, see \"help runscript\".", false),
        "s_runscript" => ("<host_expression> <filename>", "Runs a local script in serial mode, see \"help runscript\".", false),
        "distribute" => (
            "<host_expression> <filename>",
            "Copies a local file to all the hosts matched by the expression, keeping\n\
the same path on the remote side.",
            false,
        ),
        "ssh" => (
            "<host_expression> [<command>]",
            "Opens an interactive ssh session to every host matched by the expression,\n\
one after another. With a command given, runs it on every host sequentially\n\
with no inter-host delay.",
            false,
        ),
        "hostlist" => ("<host_expression>", "Resolves a host expression and prints the resulting host list.", false),
        "user" => ("<username>", "Sets the user to run remote commands as.", false),
        "raise" => (
            "<none/su/sudo>",
            "Sets the privilege raise mode for remote commands. Changing the raise\n\
type drops the stored password.",
            false,
        ),
        "passwd" => ("", "Prompts for the su/sudo password used by raised commands.", false),
        "delay" => (
            "<seconds>",
            "Sets the delay between hosts in serial mode. Useful for soft rolling\n\
restarts: hit Ctrl-C during the delay to stop the rest of the list.",
            false,
        ),
        "debug" => ("<on/off>", "Internal debug output. May produce unexpected noise.", false),
        "progressbar" => ("<on/off>", "Toggles the progress bar in parallel and collapse modes.", false),
        "prepend_hostnames" => ("<on/off>", "Toggles host name prefixes on output lines in parallel mode.", false),
        "threads" => (
            "[<n>]",
            "Shows or sets the worker pool size (1..1024). Changing it re-creates\n\
the execution pool.",
            false,
        ),
        "connect_timeout" => ("[<seconds>]", "Shows or sets the ssh ConnectTimeout option.", false),
        "interpreter" => (
            "<none/sudo/su> <argv>",
            "Sets the remote interpreter prefix used for commands under the given\n\
raise mode, e.g. \"interpreter sudo sudo bash\".",
            false,
        ),
        "output" => (
            "[<filename>/_]",
            "Copies everything the hosts print to a file, timestamp-prefixed. Pass\n\
\"_\" to switch the copy off, no argument to see the current state.",
            false,
        ),
        "cd" => ("<dir>", "Changes the local working directory.", false),
        "local" => ("<command> [<args>]", "Runs a command locally via bash -c.", false),
        "alias" => (
            "<aliasname> [<command> [<args>]]",
            "Creates a local alias for a longer command, or removes one when called\n\
with no body.\n\n\
Example:\n\
    alias ls local ls               - \"ls\" now runs \"local ls\"\n\
    alias uptime p_exec #1 uptime   - \"uptime %g\" runs \"p_exec %g uptime\"\n\n\
#1..#9 substitute positional arguments, #* substitutes the raw argument\n\
line. Aliases disappear on exit; put them into the rcfile to keep them\n\
(see \"help rcfiles\").",
            false,
        ),
        "reload" => ("", "Reloads the inventory from its source, bypassing the cache.", false),
        "help" => ("[<topic>]", "Shows help on a command or topic.", false),
        "exit" => ("", "Quits the program.", false),
        "expressions" => (
            "",
            "A host expression is a comma-separated list of tokens:\n\n\
    host1.example.com         a literal host\n\
    web{1,2}.example.com      brace expansion into several hosts\n\
    %mygroup                  all hosts of an inventory group\n\
    *mywg                     all hosts of a work group\n\
    *                         all hosts of every work group\n\
    /regex/ or ~regex/        all inventory hosts matching a regex\n\n\
Filters append to group/workgroup tokens:\n\n\
    %mygroup@dc1              only hosts in datacenter dc1\n\
    %mygroup#prod#canary      only hosts carrying all listed tags\n\
    %mygroup/web\\d+/          only hosts whose fqdn matches the regex\n\n\
A leading \"-\" excludes the token's hosts from the list built so far:\n\n\
    %mygroup,-host3.example.com",
            true,
        ),
        "config" => (
            "",
            "xc reads ~/.xc.conf at startup (created with defaults when missing).\n\n\
Sections and keys:\n\
    [main]      user, mode, raise, history_file, rc_file, log_file,\n\
                cache_dir, cache_ttl, exit_confirm, exec_confirm,\n\
                backend_type (conductor/localini/localjson), local_file\n\
    [executer]  ssh_threads, ssh_connect_timeout, delay, progress_bar,\n\
                prepend_hostnames, remote_tmpdir, interpreter,\n\
                interpreter_sudo, interpreter_su\n\
    [inventoree] url, work_groups",
            true,
        ),
        "rcfiles" => (
            "",
            "Each line of the rc file (~/.xcrc by default) is replayed as a command\n\
at startup. Typically used to define aliases.",
            true,
        ),
        _ => return None,
    };
    Some(HelpItem {
        usage,
        text,
        is_topic,
    })
}

/// Print help for one command/topic, or the overview when `name` is
/// empty.
pub fn print_help(name: &str, commands: &[String]) {
    if name.is_empty() {
        println!("Available commands:");
        let mut sorted: Vec<&String> = commands.iter().collect();
        sorted.sort();
        for cmd in sorted {
            println!("    {cmd}");
        }
        println!(
            "\nOther help topics: expressions, config, rcfiles\n\
Type \"help <command>\" to learn more."
        );
        return;
    }

    match help_item(name) {
        Some(item) => {
            if !item.is_topic {
                let usage = if item.usage.is_empty() {
                    name.to_string()
                } else {
                    format!("{} {}", name, item.usage)
                };
                println!("{}", term::bold_white(&format!("Usage: {usage}\n")));
            }
            println!("{}", item.text);
        }
        None => term::error(&format!("No help for \"{name}\"\n")),
    }
}
