#![forbid(unsafe_code)]

//! Errors raised while running a batch.

use std::fmt;
use std::io;

use evalboard_core::{ColumnKey, RowKey};

/// Error type returned by jobs and progress sinks.
pub type JobError = Box<dyn std::error::Error + Send + Sync>;

/// Location of a job in the case → conversation → iteration hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobPath {
    pub case: RowKey,
    pub conversation: Option<ColumnKey>,
    pub iteration: Option<usize>,
}

impl JobPath {
    /// Path of a case-level job.
    #[must_use]
    pub fn case(case: RowKey) -> Self {
        Self {
            case,
            conversation: None,
            iteration: None,
        }
    }

    /// Child path for one conversation of this case.
    #[must_use]
    pub fn conversation(&self, conversation: ColumnKey) -> Self {
        Self {
            case: self.case.clone(),
            conversation: Some(conversation),
            iteration: None,
        }
    }

    /// Child path for one evaluation iteration of this conversation.
    #[must_use]
    pub fn iteration(&self, iteration: usize) -> Self {
        Self {
            case: self.case.clone(),
            conversation: self.conversation.clone(),
            iteration: Some(iteration),
        }
    }
}

impl fmt::Display for JobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case `{}`", self.case)?;
        if let Some(conversation) = &self.conversation {
            write!(f, ", conversation `{conversation}`")?;
        }
        if let Some(iteration) = self.iteration {
            write!(f, ", iteration {iteration}")?;
        }
        Ok(())
    }
}

/// What went wrong inside a worker.
#[derive(Debug)]
pub enum WorkerErrorKind {
    /// The job itself returned an error.
    Job(JobError),
    /// Reporting progress or a summary failed (for example, registry misuse).
    Progress(JobError),
    /// The job panicked.
    Panicked(String),
    /// The worker thread could not be started.
    Spawn(io::Error),
}

/// A job failure, wrapped with the case/conversation/iteration it came from.
#[derive(Debug)]
pub struct WorkerError {
    pub path: JobPath,
    pub kind: WorkerErrorKind,
}

impl WorkerError {
    #[must_use]
    pub fn job(path: JobPath, err: JobError) -> Self {
        Self {
            path,
            kind: WorkerErrorKind::Job(err),
        }
    }

    #[must_use]
    pub fn progress(path: JobPath, err: JobError) -> Self {
        Self {
            path,
            kind: WorkerErrorKind::Progress(err),
        }
    }

    #[must_use]
    pub fn panicked(path: JobPath, message: String) -> Self {
        Self {
            path,
            kind: WorkerErrorKind::Panicked(message),
        }
    }

    #[must_use]
    pub fn spawn(path: JobPath, err: io::Error) -> Self {
        Self {
            path,
            kind: WorkerErrorKind::Spawn(err),
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WorkerErrorKind::Job(err) => write!(f, "{} failed: {err}", self.path),
            WorkerErrorKind::Progress(err) => {
                write!(f, "{}: progress report rejected: {err}", self.path)
            }
            WorkerErrorKind::Panicked(message) => write!(f, "{} panicked: {message}", self.path),
            WorkerErrorKind::Spawn(err) => write!(f, "{}: could not start worker: {err}", self.path),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            WorkerErrorKind::Job(err) | WorkerErrorKind::Progress(err) => Some(err.as_ref()),
            WorkerErrorKind::Panicked(_) => None,
            WorkerErrorKind::Spawn(err) => Some(err),
        }
    }
}
