#![forbid(unsafe_code)]

//! `evalboard` binary: run a simulated batch with the live dashboard.

use std::io::{self, IsTerminal};
use std::process;

use evalboard::cli::Opts;
use evalboard::logging::{error, info, init_logging};
use evalboard::{EvalConfig, Error, RunContext, fit_layout, simulate, write_report};
use evalboard_render::format::format_cost;

fn main() {
    let opts = Opts::parse();
    let mut config = EvalConfig::from_env();

    if let Err(err) = init_logging(&config.log) {
        eprintln!("Failed to open log file: {err}");
        process::exit(1);
    }

    let stdout = io::stdout();
    let interactive = stdout.is_terminal();
    let width = if interactive {
        crossterm::terminal::size().ok().map(|(cols, _)| cols)
    } else {
        None
    };
    config.layout = fit_layout(config.layout, opts.variants, width)
        .with_color(config.layout.color && interactive);
    let report_path = config.report_path.clone();

    let ctx = RunContext::new(config);
    ctx.attach_presenter(stdout);
    let result = ctx.run(simulate::plans(&opts));
    // Move below the table before printing anything else.
    ctx.finish();

    let outcome = result.map_err(Error::from).and_then(|report| {
        println!(
            "{}/{} evaluations passed, total cost {}",
            report.passes(),
            report.total_evals(),
            format_cost(report.cost())
        );
        if let Some(path) = &report_path {
            write_report(&report, path)?;
            println!("report written to {}", path.display());
        }
        Ok(())
    });

    match outcome {
        Ok(()) => info!("evalboard finished"),
        Err(err) => {
            error!(error = %err, "evalboard failed");
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
