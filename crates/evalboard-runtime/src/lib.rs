#![forbid(unsafe_code)]

//! Nested parallel evaluation runtime.
//!
//! - [`WorkerGroup`]: one scoped thread per job, joined in submission order.
//! - [`Scheduler`]: case → conversation → iteration fan-out built from worker groups.
//! - [`Report`]: the run's results, folded in submission order.

pub mod error;
pub mod report;
pub mod scheduler;
pub mod worker_group;

pub use error::{JobError, JobPath, WorkerError, WorkerErrorKind};
pub use report::{
    CaseReport, ConversationReport, ConversationSummary, IterationReport, Report, Transcript,
    Verdict,
};
pub use scheduler::{
    CasePlan, ConversationPlan, EvaluateFn, GenerateFn, NullSink, Progress, ProgressSink,
    Scheduler,
};
pub use worker_group::{GroupError, WorkerGroup};
