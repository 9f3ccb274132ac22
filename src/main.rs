//! Purpose: `starnotary` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Successful commands print one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

mod command_dispatch;
mod serve;

use starnotary::api::{
    Error, ErrorKind, NewStar, RangeRequest, RemoteClient, StarRecord, default_data_dir,
    to_exit_code,
};

const DEFAULT_BIND: &str = "127.0.0.1:9800";
const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `starnotary --help` for usage."));
            }
        },
    };

    let data_dir = cli.dir.unwrap_or_else(default_data_dir);
    command_dispatch::dispatch_command(cli.command, data_dir).map_err(add_io_hint)
}

#[derive(Parser)]
#[command(
    name = "starnotary",
    version,
    about = "Register ownership of numbered stars and read them back in ranges",
    long_about = None,
    after_help = r#"EXAMPLES
  $ starnotary register --owner 0xabc --id 1 --coordinates 123045.12+455530.00 --name "polaris prime"
  $ starnotary range --start 1 --end 10              # ten newest, newest first
  $ starnotary range --start 1 --end 10 --oldest-first   # ids 1..=10, ascending
  $ starnotary serve --cors-origin https://app.example.com"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Data directory holding the registry (default: ~/.starnotary)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and record a new star claim.
    Register(RegisterArgs),
    /// Read stars by relative window or by id bounds.
    Range(RangeArgs),
    /// Serve the registry over HTTP/JSON.
    Serve(ServeArgs),
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long, help = "Owner wallet address")]
    owner: String,
    #[arg(long = "id", help = "Token id (positive integer, no leading zero)")]
    token_id: String,
    #[arg(long, help = "Coordinates as HHMMSS.ss[+-]DDMMSS.ss")]
    coordinates: String,
    #[arg(long, help = "Lowercase words separated by single spaces")]
    name: String,
    #[arg(long, help = "Sale price as a canonical decimal")]
    price: Option<String>,
    #[arg(long, help = "Offer the star for sale (requires a valid --price)")]
    for_sale: bool,
    #[arg(long, value_parser = parse_rfc3339, help = "Creation time (RFC 3339, default: now)")]
    date: Option<OffsetDateTime>,
    #[arg(long, value_name = "URL", help = "Send to a running server instead of the local registry")]
    url: Option<String>,
}

impl RegisterArgs {
    fn into_new_star(self) -> NewStar {
        NewStar {
            owner: self.owner,
            token_id: self.token_id,
            coordinates: self.coordinates,
            name: self.name,
            price: self.price,
            is_for_sale: self.for_sale,
            date: self.date,
        }
    }
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, conflicts_with_all = ["first_id", "last_id"], help = "First offset (1 = newest) or, with --oldest-first, first id")]
    start: Option<String>,
    #[arg(long, conflicts_with_all = ["first_id", "last_id"], help = "Last offset or, with --oldest-first, last id")]
    end: Option<String>,
    #[arg(long, conflicts_with_all = ["first_id", "last_id"], help = "Treat start/end as ids and list oldest first")]
    oldest_first: bool,
    #[arg(long, help = "First token id (ascending id bounds)")]
    first_id: Option<String>,
    #[arg(long, help = "Last token id (ascending id bounds)")]
    last_id: Option<String>,
    #[arg(long, value_name = "URL", help = "Read from a running server instead of the local registry")]
    url: Option<String>,
}

impl RangeArgs {
    fn to_request(&self) -> RangeRequest {
        if self.first_id.is_some() || self.last_id.is_some() {
            return RangeRequest::ids(
                self.first_id.clone().unwrap_or_default(),
                self.last_id.clone().unwrap_or_default(),
            );
        }
        RangeRequest::window(
            self.start.clone().unwrap_or_default(),
            self.end.clone().unwrap_or_default(),
        )
        .oldest_first(self.oldest_first)
    }
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND, help = "Bind address")]
    bind: String,
    #[arg(
        long = "cors-origin",
        value_name = "ORIGIN",
        help = "Allow browser requests from this origin (repeatable, or * for any)"
    )]
    cors_origin: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, help = "Max request body size in bytes")]
    max_body_bytes: u64,
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|err| format!("expected RFC 3339 time: {err}"))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    match err.path() {
        Some(_) => err.with_hint("Check that the data directory exists and is writable."),
        None => err,
    }
}

fn stars_json(stars: &[StarRecord]) -> Value {
    json!({ "stars": stars })
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    body.insert("message".to_string(), json!(err.message().unwrap_or("error")));
    if let Some(hint) = err.hint() {
        body.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        body.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(token_id) = err.star_id() {
        body.insert("token_id".to_string(), json!(token_id));
    }
    json!({ "error": Value::Object(body) })
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", err.message().unwrap_or("error"));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn remote_client(url: &str) -> Result<RemoteClient, Error> {
    RemoteClient::new(url).map_err(|err| err.with_hint("Use a base URL like http://127.0.0.1:9800."))
}
