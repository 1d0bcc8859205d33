//! p4wire - run Perforce commands through the p4wire transport
//!
//! Executes a single client command, a paginated change listing, or a login,
//! using the same configuration and retry logic as the library.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use tracing::{debug, error, info};

use p4wire::{connect, Command, Config, ConfigLoader, PaginatedQueryResolver, Secret};

/// What the invocation asked for
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Run one client command and print its content lines
    Run(Vec<String>),
    /// List change numbers under a path
    Changes {
        path: String,
        until: u64,
        long: bool,
    },
    /// Log in and print the ticket, like `p4 login -p`
    Login,
    Help,
    Version,
}

/// Command line arguments
#[derive(Debug)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    action: Action,
}

impl AppArgs {
    /// Parse arguments, excluding the program name
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut config_path = None;
        let mut debug = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let Some(path) = args.get(i + 1) else {
                        bail!("Missing config file path");
                    };
                    config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--debug" | "-d" => debug = true,
                "--help" | "-h" => {
                    return Ok(Self {
                        config_path,
                        debug,
                        action: Action::Help,
                    })
                }
                "--version" | "-V" => {
                    return Ok(Self {
                        config_path,
                        debug,
                        action: Action::Version,
                    })
                }
                arg if arg.starts_with('-') => bail!("Unknown option: {}", arg),
                _ => break,
            }
            i += 1;
        }

        let action = match args.get(i).map(String::as_str) {
            None => Action::Help,
            Some("run") => {
                let rest = &args[i + 1..];
                let rest = match rest.first().map(String::as_str) {
                    Some("--") => &rest[1..],
                    _ => rest,
                };
                if rest.is_empty() {
                    bail!("run: missing client command");
                }
                Action::Run(rest.to_vec())
            }
            Some("changes") => Self::parse_changes(&args[i + 1..])?,
            Some("login") => Action::Login,
            Some(other) => bail!("Unknown command: {}", other),
        };

        Ok(Self {
            config_path,
            debug,
            action,
        })
    }

    fn parse_changes(args: &[String]) -> anyhow::Result<Action> {
        let mut path = None;
        let mut until = 0;
        let mut long = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--until" | "-u" => {
                    let value = args.get(i + 1).context("Missing value for --until")?;
                    until = value
                        .parse()
                        .with_context(|| format!("Invalid change number: {}", value))?;
                    i += 1;
                }
                "--long" | "-l" => long = true,
                arg if arg.starts_with('-') => bail!("Unknown changes option: {}", arg),
                arg => {
                    if path.is_some() {
                        bail!("changes: unexpected argument {}", arg);
                    }
                    path = Some(arg.to_string());
                }
            }
            i += 1;
        }

        Ok(Action::Changes {
            path: path.context("changes: missing depot path")?,
            until,
            long,
        })
    }
}

/// Print help information
fn print_help() {
    println!("p4wire - Perforce command-line transport");
    println!();
    println!("USAGE:");
    println!("    p4wire [OPTIONS] run [--] <P4 ARGS>...");
    println!("    p4wire [OPTIONS] changes <PATH> [--until <CHANGE>] [--long]");
    println!("    p4wire [OPTIONS] login             Print a fresh ticket (use as P4TICKET)");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    p4wire looks for configuration files in the following order:");
    println!("    1. Path specified with --config");
    println!("    2. $P4WIRE_CONFIG");
    println!("    3. $XDG_CONFIG_HOME/p4wire/config.toml");
    println!("    4. ~/.p4wire/config.toml");
    println!("    5. ./p4wire.toml");
    println!("    6. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    P4PORT, P4USER, P4CLIENT, P4PASSWD, P4TICKET  Override connection settings");
    println!("    P4WIRE_DEBUG           Enable debug logging (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let debug = debug
        || env::var("P4WIRE_DEBUG").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if debug { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Load configuration from the given file or the default locations
fn load_configuration(args: &AppArgs) -> anyhow::Result<Config> {
    match &args.config_path {
        Some(path) => {
            debug!("Loading config from: {}", path.display());
            ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))
        }
        None => ConfigLoader::load().context("Failed to load configuration"),
    }
}

fn run(args: AppArgs) -> anyhow::Result<()> {
    let config = load_configuration(&args)?;
    let session = connect(&config);

    match args.action {
        Action::Run(p4_args) => {
            let response = session.execute(&Command::p4(p4_args))?;
            for line in response.lines() {
                println!("{}", line);
            }
        }
        Action::Changes { path, until, long } => {
            let resolver = PaginatedQueryResolver::configured(&session, &config.session);
            if long {
                for change in resolver.change_summaries(&path, until)? {
                    println!(
                        "{}\t{}\t{}@{}\t{}",
                        change.number, change.date, change.user, change.client, change.description
                    );
                }
            } else {
                for number in resolver.changes(&path, until)? {
                    println!("{}", number);
                }
            }
        }
        Action::Login => {
            let ticket = session.login()?;
            print_ticket(&ticket, &mut io::stdout().lock())?;
            info!("Logged in; export the ticket as P4TICKET to reuse it");
        }
        Action::Help | Action::Version => {}
    }
    Ok(())
}

/// The ticket alone on one line, so it can be captured by a shell
fn print_ticket(ticket: &Secret, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", ticket.expose())
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match AppArgs::parse(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            print_help();
            process::exit(2);
        }
    };

    match args.action {
        Action::Help => {
            print_help();
            return;
        }
        Action::Version => {
            println!("p4wire v{}", p4wire::VERSION);
            return;
        }
        _ => {}
    }

    init_logging(args.debug);
    if let Err(e) = run(args) {
        error!("{:#}", e);
        process::exit(1);
    }
}
