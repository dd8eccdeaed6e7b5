#![forbid(unsafe_code)]

//! Command-line argument parsing for the `evalboard` binary.
//!
//! Parsed by hand over `std::env::args`. Dashboard geometry, colors,
//! logging and the report path come from the environment (see
//! [`EvalConfig`](evalboard_core::EvalConfig)); flags only shape the batch.

use std::env;
use std::fmt;
use std::process;
use std::str::FromStr;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
evalboard: run a simulated evaluation batch with a live dashboard

USAGE:
    evalboard [OPTIONS]

OPTIONS:
    --cases=N            Test cases to run (default: 3)
    --variants=N         Conversation variants per case (default: 2)
    --turns=N            Generated turns per conversation (default: 6)
    --iterations=N       Evaluation iterations per conversation (default: 5)
    --fail-at=CASE:NAME  Make the generator of case CASE (0-based), variant NAME fail
    --seed=N             Seed for simulated latency and verdicts (default: 7)
    --turn-ms=N          Simulated milliseconds per turn (default: 30)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    EVALBOARD_NAME_WIDTH     Test case column width (default: 28)
    EVALBOARD_COLUMN_WIDTH   Variant column width (default: 24)
    EVALBOARD_BAR_WIDTH      Progress bar width (default: 10)
    EVALBOARD_LOG            Log filter (default: info)
    EVALBOARD_LOG_FILE       Log file; logging is off when unset
    EVALBOARD_REPORT         Write the JSON report to this path
    NO_COLOR                 Disable colors";

/// Generator that should fail, for exercising the error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailAt {
    pub case: usize,
    pub variant: String,
}

impl FromStr for FailAt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (case, variant) = s
            .split_once(':')
            .ok_or_else(|| format!("expected CASE:NAME, got `{s}`"))?;
        let case = case
            .trim()
            .parse()
            .map_err(|_| format!("invalid case index `{case}`"))?;
        let variant = variant.trim();
        if variant.is_empty() {
            return Err(format!("missing variant name in `{s}`"));
        }
        Ok(Self {
            case,
            variant: variant.to_string(),
        })
    }
}

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub cases: usize,
    pub variants: usize,
    pub turns: u32,
    pub iterations: u32,
    pub fail_at: Option<FailAt>,
    pub seed: u64,
    /// Simulated latency per generated turn, in milliseconds.
    pub turn_ms: u64,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            cases: 3,
            variants: 2,
            turns: 6,
            iterations: 5,
            fail_at: None,
            seed: 7,
            turn_ms: 30,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

/// Bad command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError(String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CliError {}

fn value<T: FromStr>(flag: &str, raw: &str) -> Result<T, CliError> {
    raw.parse()
        .map_err(|_| CliError(format!("Invalid {flag} value: {raw}")))
}

/// Parse arguments (without the program name).
///
/// Flags accept both `--flag=value` and `--flag value`.
pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = Opts::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-V" => return Ok(Command::Version),
            _ => {}
        }

        let (flag, inline) = match arg.split_once('=') {
            Some((flag, raw)) => (flag.to_string(), Some(raw.to_string())),
            None => (arg.clone(), None),
        };
        if !matches!(
            flag.as_str(),
            "--cases" | "--variants" | "--turns" | "--iterations" | "--fail-at" | "--seed" | "--turn-ms"
        ) {
            return Err(CliError(format!("Unknown argument: {arg}")));
        }
        let raw = match inline {
            Some(raw) => raw,
            None => args
                .next()
                .ok_or_else(|| CliError(format!("Missing value for {flag}")))?,
        };

        match flag.as_str() {
            "--cases" => opts.cases = value(&flag, &raw)?,
            "--variants" => opts.variants = value(&flag, &raw)?,
            "--turns" => opts.turns = value(&flag, &raw)?,
            "--iterations" => opts.iterations = value(&flag, &raw)?,
            "--seed" => opts.seed = value(&flag, &raw)?,
            "--turn-ms" => opts.turn_ms = value(&flag, &raw)?,
            _ => {
                opts.fail_at = Some(
                    raw.parse()
                        .map_err(|err| CliError(format!("Invalid --fail-at value: {err}")))?,
                );
            }
        }
    }

    if opts.variants == 0 {
        return Err(CliError("--variants must be at least 1".to_string()));
    }
    Ok(Command::Run(opts))
}

impl Opts {
    /// Parse the process arguments, exiting on `--help`, `--version` or errors.
    #[must_use]
    pub fn parse() -> Self {
        match parse_args(env::args().skip(1)) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("evalboard {VERSION}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }
}
