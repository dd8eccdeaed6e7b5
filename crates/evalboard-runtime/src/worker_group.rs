#![forbid(unsafe_code)]

//! Structured-concurrency worker groups over scoped OS threads.
//!
//! A [`WorkerGroup`] spawns one named thread per job inside a
//! [`std::thread::scope`] and [`WorkerGroup::wait`] joins them in submission
//! order. Results come back in submission order regardless of which thread
//! finished first.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Job returns `Err` | First error in submission order is returned; siblings still run to completion and their results are discarded |
//! | Job panics | Reported as [`GroupError::Panicked`] with the panic message |
//! | Thread spawn fails | Reported as [`GroupError::Spawn`] at that job's index |
//!
//! Nothing is cancelled. A failing job only changes what `wait` returns.

use std::any::Any;
use std::fmt;
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};

use tracing::debug;

/// Why a worker group did not produce a full set of results.
#[derive(Debug)]
pub enum GroupError<E> {
    /// The job at `index` returned an error.
    Failed { index: usize, error: E },
    /// The job at `index` panicked.
    Panicked { index: usize, message: String },
    /// The thread for the job at `index` could not be started.
    Spawn { index: usize, source: io::Error },
}

impl<E> GroupError<E> {
    /// Submission index of the job that failed.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Failed { index, .. } | Self::Panicked { index, .. } | Self::Spawn { index, .. } => {
                *index
            }
        }
    }
}

impl<E: fmt::Display> fmt::Display for GroupError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { index, error } => write!(f, "worker {index} failed: {error}"),
            Self::Panicked { index, message } => write!(f, "worker {index} panicked: {message}"),
            Self::Spawn { index, source } => write!(f, "worker {index} could not start: {source}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GroupError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Panicked { .. } => None,
            Self::Spawn { source, .. } => Some(source),
        }
    }
}

enum Slot<'scope, T, E> {
    Running(ScopedJoinHandle<'scope, Result<T, E>>),
    NotStarted(io::Error),
}

/// One level of fan-out: a thread per job, joined in submission order.
///
/// ```
/// use evalboard_runtime::WorkerGroup;
///
/// let squares = std::thread::scope(|scope| {
///     let mut group = WorkerGroup::new(scope, "square");
///     for n in 1..=4u32 {
///         group.spawn(move || Ok::<_, String>(n * n));
///     }
///     group.wait()
/// })
/// .unwrap();
/// assert_eq!(squares, vec![1, 4, 9, 16]);
/// ```
pub struct WorkerGroup<'scope, 'env, T, E> {
    scope: &'scope Scope<'scope, 'env>,
    label: &'static str,
    slots: Vec<Slot<'scope, T, E>>,
}

impl<'scope, 'env, T, E> WorkerGroup<'scope, 'env, T, E>
where
    T: Send + 'scope,
    E: Send + 'scope,
{
    /// Create an empty group. `label` names the threads (`label-0`, `label-1`, ...).
    pub fn new(scope: &'scope Scope<'scope, 'env>, label: &'static str) -> Self {
        Self {
            scope,
            label,
            slots: Vec::new(),
        }
    }

    /// Start `job` on its own thread.
    pub fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce() -> Result<T, E> + Send + 'scope,
    {
        let index = self.slots.len();
        let spawned = thread::Builder::new()
            .name(format!("{}-{index}", self.label))
            .spawn_scoped(self.scope, job);
        self.slots.push(match spawned {
            Ok(handle) => Slot::Running(handle),
            Err(err) => Slot::NotStarted(err),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Join every job in submission order.
    ///
    /// Always joins all threads before returning, so no job outlives the
    /// call. Returns the results in submission order, or the first failure
    /// in submission order.
    pub fn wait(self) -> Result<Vec<T>, GroupError<E>> {
        let label = self.label;
        let mut results = Vec::with_capacity(self.slots.len());
        let mut first_error: Option<GroupError<E>> = None;

        for (index, slot) in self.slots.into_iter().enumerate() {
            let outcome = match slot {
                Slot::Running(handle) => match handle.join() {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(GroupError::Failed { index, error }),
                    Err(payload) => Err(GroupError::Panicked {
                        index,
                        message: panic_message(payload.as_ref()),
                    }),
                },
                Slot::NotStarted(source) => Err(GroupError::Spawn { index, source }),
            };

            match (outcome, first_error.is_some()) {
                (Ok(value), false) => results.push(value),
                (Ok(_), true) => debug!(group = label, index, "result discarded after earlier failure"),
                (Err(err), false) => first_error = Some(err),
                (Err(_), true) => debug!(group = label, index, "later failure discarded"),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
