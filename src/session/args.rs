//! Argument vector assembly
//!
//! Global connection options go in front of the sub-command, once. Options
//! the caller already placed there win over the connection context.

use super::context::ConnectionContext;
use crate::models::Command;

/// Global options that take a value (`-p port`, or attached as `-pport`)
pub const GLOBAL_VALUE_FLAGS: &[&str] = &[
    "-p", "-u", "-c", "-P", "-C", "-d", "-H", "-L", "-Q", "-x", "-z", "-r", "-v",
];

/// Global options without a value
pub const GLOBAL_SWITCHES: &[&str] = &["-s", "-G", "-q", "-I", "-b", "-e", "-n"];

const MASK: &str = "***";

fn value_flag(arg: &str) -> Option<&'static str> {
    GLOBAL_VALUE_FLAGS
        .iter()
        .copied()
        .find(|flag| arg == *flag || (arg.len() > flag.len() && arg.starts_with(flag)))
}

/// The global options between the executable and the sub-command
pub fn leading_globals(args: &[String]) -> &[String] {
    let rest = args.get(1..).unwrap_or(&[]);
    let consumed: usize = global_flags(rest).map(|(_, width)| width).sum();
    &rest[..consumed.min(rest.len())]
}

/// Each leading global option with the number of arguments it occupies.
///
/// `-p port` spans two arguments and `-pport` one; values are never
/// reported as options of their own.
fn global_flags(args: &[String]) -> impl Iterator<Item = (&'static str, usize)> + '_ {
    let mut i = 0;
    std::iter::from_fn(move || {
        let arg = args.get(i)?.as_str();
        let found = if let Some(switch) = GLOBAL_SWITCHES.iter().copied().find(|s| *s == arg) {
            (switch, 1)
        } else if let Some(flag) = value_flag(arg) {
            (flag, if arg == flag { 2 } else { 1 })
        } else {
            return None;
        };
        i += found.1;
        Some(found)
    })
}

/// Whether `flag` is one of the caller's leading global options
fn has_global(globals: &[String], flag: &str) -> bool {
    global_flags(globals).any(|(found, _)| found == flag)
}

/// Final argument vector for `command` against `ctx`
pub fn build_argv(command: &Command, ctx: &ConnectionContext) -> Vec<String> {
    let args = command.args();
    let globals = leading_globals(args);
    let mut argv = Vec::with_capacity(args.len() + 9);
    argv.push(ctx.executable.clone());

    if command.script_mode() && !has_global(globals, "-s") {
        argv.push("-s".to_string());
    }

    let connection = [
        ("-p", ctx.server.as_deref()),
        ("-u", ctx.user.as_deref()),
        ("-c", ctx.client.as_deref()),
    ];
    for (flag, value) in connection {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            if !has_global(globals, flag) {
                argv.push(flag.to_string());
                argv.push(value.to_string());
            }
        }
    }

    if command.injects_credentials() && !has_global(globals, "-P") {
        if let Some(credential) = ctx.credential() {
            argv.push("-P".to_string());
            argv.push(credential.expose().to_string());
        }
    }

    argv.extend(args.iter().skip(1).cloned());
    argv
}

/// Copy of `args` with every `-P` value masked
pub fn redact(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push(MASK.to_string());
            mask_next = false;
        } else if arg == "-P" {
            out.push(arg.clone());
            mask_next = true;
        } else if arg.len() > 2 && arg.starts_with("-P") {
            out.push(format!("-P{}", MASK));
        } else {
            out.push(arg.clone());
        }
    }
    out
}

/// Redacted argv joined for log and error messages
pub fn display(args: &[String]) -> String {
    redact(args).join(" ")
}
