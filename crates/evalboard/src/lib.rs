#![forbid(unsafe_code)]

//! evalboard public facade.
//!
//! Runs batches of generated conversations and their evaluation iterations
//! across nested worker groups while a live table of per-cell progress is
//! redrawn in place on the terminal.
//!
//! ```no_run
//! use evalboard::prelude::*;
//!
//! # fn plans() -> Vec<CasePlan<evalboard::simulate::SimTranscript, evalboard::simulate::SimVerdict>> { Vec::new() }
//! let ctx = RunContext::new(EvalConfig::from_env());
//! ctx.attach_presenter(std::io::stdout());
//! let result = ctx.run(plans());
//! ctx.finish();
//! match result {
//!     Ok(report) => println!("{}/{} passed", report.passes(), report.total_evals()),
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

pub mod cli;
pub mod context;
pub mod simulate;
pub mod sink;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

// --- Re-exports ------------------------------------------------------------

pub use context::RunContext;
pub use evalboard_core::{
    CellStatus, ColumnKey, DashboardLayout, EvalConfig, LogConfig, ProgressRegistry, RowKey,
    logging,
};
pub use evalboard_render::{CaptureBuffer, DashboardFrame, Presenter};
pub use evalboard_runtime::{
    CasePlan, ConversationPlan, JobError, JobPath, Progress, Report, Transcript, Verdict,
    WorkerError,
};
pub use sink::DashboardSink;

// --- Errors ---------------------------------------------------------------

/// Top-level error for the runner.
#[derive(Debug)]
pub enum Error {
    /// A job failed and aborted the run.
    Worker(WorkerError),
    /// The report could not be serialized.
    Serialize(serde_json::Error),
    /// The report could not be written.
    Report { path: PathBuf, source: io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker(err) => write!(f, "evaluation failed: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize report: {err}"),
            Self::Report { path, source } => {
                write!(f, "failed to write report to {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Worker(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Report { source, .. } => Some(source),
        }
    }
}

impl From<WorkerError> for Error {
    fn from(err: WorkerError) -> Self {
        Self::Worker(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

/// Standard result type for evalboard APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Helpers --------------------------------------------------------------

/// Write `report` to `path` as pretty JSON.
pub fn write_report<T: Serialize, V: Serialize>(report: &Report<T, V>, path: &Path) -> Result<()> {
    let json = report.to_json_pretty()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Report {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json + "\n").map_err(|source| Error::Report {
        path: path.to_path_buf(),
        source,
    })
}

/// Shrink the name column so a table with `columns` variants fits in
/// `terminal_width`. Variant columns are never shrunk.
#[must_use]
pub fn fit_layout(
    layout: DashboardLayout,
    columns: usize,
    terminal_width: Option<u16>,
) -> DashboardLayout {
    let Some(width) = terminal_width else {
        return layout;
    };
    // Keep one spare column: writing the last cell would trigger a wrap.
    let available = usize::from(width).saturating_sub(1);
    if layout.line_width(columns) <= available {
        return layout;
    }
    let variants = columns * (layout.column_width + 1);
    layout.with_name_width(available.saturating_sub(variants))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        CasePlan, CellStatus, ColumnKey, ConversationPlan, DashboardLayout, Error, EvalConfig,
        JobError, Progress, Report, Result, RowKey, RunContext, Transcript, Verdict,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalboard_runtime::{CaseReport, ConversationReport, ConversationSummary};

    #[test]
    fn fit_layout_shrinks_only_the_name_column() {
        let layout = DashboardLayout::default()
            .with_name_width(40)
            .with_column_width(20);
        assert_eq!(fit_layout(layout, 2, None), layout);
        assert_eq!(fit_layout(layout, 2, Some(200)), layout);

        let fitted = fit_layout(layout, 2, Some(73));
        assert_eq!(fitted.column_width, 20);
        assert_eq!(fitted.name_width, 30);
        assert!(fitted.line_width(2) < 73);

        let tiny = fit_layout(layout, 3, Some(40));
        assert_eq!(tiny.name_width, evalboard_core::config::MIN_NAME_WIDTH);
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let report: Report<u32, bool> = Report {
            cases: vec![CaseReport {
                case: "greet".into(),
                conversations: vec![ConversationReport {
                    conversation: "tuned".into(),
                    transcript: 3,
                    iterations: Vec::new(),
                    summary: ConversationSummary::default(),
                }],
            }],
        };
        write_report(&report, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["cases"][0]["conversations"][0]["conversation"], "tuned");
    }

    #[test]
    fn worker_error_is_the_source() {
        use std::error::Error as _;
        let path = JobPath::case(RowKey::new("greet"));
        let err = Error::from(WorkerError::job(path, "boom".into()));
        assert!(err.to_string().starts_with("evaluation failed: case `greet`"));
        assert!(err.source().is_some());
    }
}
