//! Purpose: `mapconv` CLI entry point: convert JSON documents with a mapping document.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: stdout carries only converted JSON (or `check` output); logs go to stderr.
//! Invariants: Errors are emitted as one JSON line on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use mapconv::api::{Error, ErrorKind, Mapping, to_exit_code};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

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
    init_tracing();
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<RunOutcome, Error>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
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
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command)
        .map_err(add_tag_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
}

#[derive(Parser)]
#[command(
    name = "mapconv",
    version,
    about = "Convert JSON documents between tagged and naked shapes",
    long_about = None,
    before_help = r#"A mapping document names, for every tagged field, where it lives in the naked shape.

Mental model:
  - `to` projects tagged documents onto the naked (wire) shape
  - `from` projects naked documents back onto the tagged shape
  - `check` compiles a mapping and prints what each field resolves to
"#,
    after_help = r#"EXAMPLES
  $ mapconv to --mapping server.json server.tagged.json
  $ mapconv from --mapping server.json response.json --pretty
  $ echo '{"Name":"web","Core":2}' | mapconv to -m server.json

MAPPING DOCUMENT
  {"Name": null, "Core": "ServerPlan.CPU", "Tags": "Tags,default=[\"web\"]",
   "Disks": {"tag": "[]Disks,recursive", "fields": {"SizeGB": "SizeMB"}}}"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Convert tagged JSON into the naked shape")]
    To(ConvertArgs),
    #[command(about = "Convert naked JSON back into the tagged shape")]
    From(ConvertArgs),
    #[command(about = "Compile a mapping document and describe its fields")]
    Check {
        #[arg(long, short = 'm', help = "Mapping document", value_hint = ValueHint::FilePath)]
        mapping: PathBuf,
        #[arg(long, help = "Pretty-print the description")]
        pretty: bool,
    },
    #[command(
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ mapconv completion bash > ~/.local/share/bash-completion/completions/mapconv
  $ mapconv completion zsh > ~/.zfunc/_mapconv
  $ mapconv completion fish > ~/.config/fish/completions/mapconv.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(long, short = 'm', help = "Mapping document", value_hint = ValueHint::FilePath)]
    mapping: PathBuf,
    #[arg(
        help = "Input JSON object or array of objects (default: stdin, `-` for stdin)",
        value_hint = ValueHint::FilePath
    )]
    input: Option<PathBuf>,
    #[arg(
        long,
        help = "Starting destination document; unmapped content is kept",
        value_hint = ValueHint::FilePath
    )]
    into: Option<PathBuf>,
    #[arg(long, help = "Pretty-print the output")]
    pretty: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn load_mapping(path: &Path) -> Result<Mapping, Error> {
    let text = read_file(path)?;
    Mapping::from_json_str(&text).map_err(|err| {
        if err.kind() == ErrorKind::Usage && err.path().is_none() {
            err.with_path(path.display().to_string())
        } else {
            err
        }
    })
}

/// Reads a JSON document from `path`, or stdin when `path` is absent or `-`.
fn read_json(path: Option<&Path>) -> Result<Value, Error> {
    let (text, label) = match path {
        Some(path) if path != Path::new("-") => (read_file(path)?, path.display().to_string()),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            (text, "-".to_string())
        }
    };
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("input is not valid JSON")
            .with_path(label)
            .with_source(err)
    })
}

fn read_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read {}", path.display()))
            .with_path(path.display().to_string())
            .with_source(err)
    })
}

fn emit_json(value: &Value, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::InvalidTag => "invalid tag".to_string(),
        ErrorKind::Unaddressable => "destination is not addressable".to_string(),
        ErrorKind::TypeMismatch => "type mismatch".to_string(),
        ErrorKind::Encode => "encode failed".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn add_tag_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::InvalidTag || err.hint().is_some() {
        return err;
    }
    err.with_hint("Fix the mapping document, then run `mapconv check --mapping <FILE>`.")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the path and its permissions.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=mapconv=trace and share the mapping if it persists.",
    )
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let subcommand = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .and_then(|usage| usage.split_whitespace().nth(1))
        .filter(|token| !token.starts_with(['<', '[', '-']));
    match subcommand {
        Some(subcommand) => format!("Try `mapconv {subcommand} --help`."),
        None => "Try `mapconv --help`.".to_string(),
    }
}
