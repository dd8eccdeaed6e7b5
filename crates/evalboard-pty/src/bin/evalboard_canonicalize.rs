use evalboard_pty::canonicalize;
use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

struct Config {
    input: PathBuf,
    output: PathBuf,
    cols: u16,
    rows: u16,
}

fn print_usage() {
    eprintln!(
        "Usage: evalboard-canonicalize --input <file> --output <file> [--cols <n>] [--rows <n>]\n\
         \n\
         Replays a captured dashboard stream and writes the text a terminal would show.\n\
         Defaults: --cols 120 --rows 200\n\
         \n\
         Example:\n\
           evalboard-canonicalize --input /tmp/run.ansi --output /tmp/run.txt --cols 100"
    );
}

fn parse_dimension(flag: &str, value: Option<String>) -> Result<u16, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid {flag} value: {value}")),
        Ok(n) => Ok(n),
    }
}

fn parse_args() -> Result<Config, String> {
    let mut args = env::args().skip(1);
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut cols: u16 = 120;
    let mut rows: u16 = 200;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--output" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--output requires a value".to_string())?;
                output = Some(PathBuf::from(value));
            }
            "--cols" => cols = parse_dimension("--cols", args.next())?,
            "--rows" => rows = parse_dimension("--rows", args.next())?,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Config {
        input: input.ok_or_else(|| "missing --input".to_string())?,
        output: output.ok_or_else(|| "missing --output".to_string())?,
        cols,
        rows,
    })
}

fn run() -> Result<(), Box<dyn Error>> {
    let cfg = parse_args().inspect_err(|_| {
        print_usage();
    })?;

    let bytes = fs::read(&cfg.input)?;
    let mut text = canonicalize(&bytes, cfg.cols, cfg.rows);
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(&cfg.output, text)?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("evalboard-canonicalize error: {err}");
        std::process::exit(1);
    }
}
