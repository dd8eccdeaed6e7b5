#![forbid(unsafe_code)]

//! Nested scheduler: case → conversation → evaluation iteration.
//!
//! # Fan-out
//!
//! | Level | Workers | Barrier |
//! |-------|---------|---------|
//! | 1 | one per case | run returns after every case |
//! | 2 | one per conversation of a case | all conversations finish generating before any iteration starts |
//! | 3 | one per evaluation iteration of a conversation | conversation summary after every iteration |
//!
//! # Progress
//!
//! Jobs receive a [`Progress`] handle and report `(completed, total, status)`
//! as they go. The scheduler adds one conversation-level `Evaluating` report
//! per finished iteration and a [`ProgressSink::conversation_finished`] call
//! once all iterations of a conversation resolve. The scheduler never sees
//! the registry; everything goes through the sink.
//!
//! # Failure Modes
//!
//! The first failure observed while draining a level (in submission order)
//! is wrapped with its [`JobPath`] and returned. Nothing is cancelled: jobs
//! already running finish and their results are discarded.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use evalboard_core::{CellStatus, ColumnKey, RowKey};
use tracing::{debug, info, info_span, warn};

use crate::error::{JobError, JobPath, WorkerError};
use crate::report::{
    CaseReport, ConversationReport, ConversationSummary, IterationReport, Report, Transcript,
    Verdict,
};
use crate::worker_group::{GroupError, WorkerGroup};

// ============================================================================
// Plans
// ============================================================================

/// Conversation generation job.
pub type GenerateFn<T> = Box<dyn FnOnce(&Progress<'_>) -> Result<T, JobError> + Send>;

/// Evaluation iteration job; reads the finished transcript.
pub type EvaluateFn<T, V> = Box<dyn FnOnce(&T, &Progress<'_>) -> Result<V, JobError> + Send>;

/// One conversation of a case, plus its evaluation iterations.
pub struct ConversationPlan<T, V> {
    pub key: ColumnKey,
    /// Turns the generator will report, one progress unit each.
    pub turns: u32,
    pub generate: GenerateFn<T>,
    pub evaluations: Vec<EvaluateFn<T, V>>,
}

impl<T, V> ConversationPlan<T, V> {
    pub fn new(
        key: ColumnKey,
        turns: u32,
        generate: impl FnOnce(&Progress<'_>) -> Result<T, JobError> + Send + 'static,
    ) -> Self {
        Self {
            key,
            turns,
            generate: Box::new(generate),
            evaluations: Vec::new(),
        }
    }

    /// Append one evaluation iteration.
    #[must_use]
    pub fn with_evaluation(
        mut self,
        evaluate: impl FnOnce(&T, &Progress<'_>) -> Result<V, JobError> + Send + 'static,
    ) -> Self {
        self.evaluations.push(Box::new(evaluate));
        self
    }

    /// Number of evaluation iterations.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        u32::try_from(self.evaluations.len()).unwrap_or(u32::MAX)
    }

    /// Progress units for the conversation's cell: the longer of its two phases.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.turns.max(self.iterations())
    }
}

/// One test case: the conversations to generate and evaluate.
pub struct CasePlan<T, V> {
    pub key: RowKey,
    pub conversations: Vec<ConversationPlan<T, V>>,
}

impl<T, V> CasePlan<T, V> {
    #[must_use]
    pub fn new(key: RowKey) -> Self {
        Self {
            key,
            conversations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_conversation(mut self, conversation: ConversationPlan<T, V>) -> Self {
        self.conversations.push(conversation);
        self
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Receives progress from every job of a run. Called from worker threads.
pub trait ProgressSink: Sync {
    /// A job at `path` completed `completed` of `total` units in `status`.
    fn progress(
        &self,
        path: &JobPath,
        completed: u32,
        total: u32,
        status: CellStatus,
    ) -> Result<(), JobError>;

    /// Every iteration of the conversation at `path` resolved.
    fn conversation_finished(
        &self,
        path: &JobPath,
        summary: &ConversationSummary,
    ) -> Result<(), JobError>;
}

/// Sink that accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _: &JobPath, _: u32, _: u32, _: CellStatus) -> Result<(), JobError> {
        Ok(())
    }

    fn conversation_finished(&self, _: &JobPath, _: &ConversationSummary) -> Result<(), JobError> {
        Ok(())
    }
}

/// Progress callback handed to a single job.
pub struct Progress<'a> {
    sink: &'a dyn ProgressSink,
    path: JobPath,
}

impl<'a> Progress<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn ProgressSink, path: JobPath) -> Self {
        Self { sink, path }
    }

    /// Where this job sits in the run.
    #[must_use]
    pub fn path(&self) -> &JobPath {
        &self.path
    }

    /// Report `completed` of `total` units in `status`.
    ///
    /// An error here means the sink rejected the report. Jobs should
    /// propagate it with `?`; it aborts the run.
    pub fn report(&self, completed: u32, total: u32, status: CellStatus) -> Result<(), JobError> {
        self.sink.progress(&self.path, completed, total, status)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs a batch of case plans across nested worker groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every case and assemble the report in submission order.
    pub fn run<T, V>(
        &self,
        cases: Vec<CasePlan<T, V>>,
        sink: &dyn ProgressSink,
    ) -> Result<Report<T, V>, WorkerError>
    where
        T: Transcript + Sync,
        V: Verdict,
    {
        let span = info_span!("run", cases = cases.len());
        let _guard = span.enter();

        let keys: Vec<RowKey> = cases.iter().map(|case| case.key.clone()).collect();
        let outcome = thread::scope(|scope| {
            let mut group = WorkerGroup::new(scope, "case");
            for plan in cases {
                group.spawn(move || run_case(plan, sink));
            }
            group.wait()
        });

        match outcome {
            Ok(cases) => {
                let report = Report { cases };
                info!(
                    passes = report.passes(),
                    total_evals = report.total_evals(),
                    "run finished"
                );
                Ok(report)
            }
            Err(err) => {
                let err = lift(err, |index| JobPath::case(keys[index].clone()));
                warn!(error = %err, "run failed");
                Err(err)
            }
        }
    }
}

/// Turn a group failure into a `WorkerError` located by `at(index)`.
///
/// Errors returned by jobs already carry their path; panics and spawn
/// failures get the path of the worker that produced them.
fn lift(err: GroupError<WorkerError>, at: impl Fn(usize) -> JobPath) -> WorkerError {
    match err {
        GroupError::Failed { error, .. } => error,
        GroupError::Panicked { index, message } => WorkerError::panicked(at(index), message),
        GroupError::Spawn { index, source } => WorkerError::spawn(at(index), source),
    }
}

fn run_case<T, V>(plan: CasePlan<T, V>, sink: &dyn ProgressSink) -> Result<CaseReport<T, V>, WorkerError>
where
    T: Transcript + Sync,
    V: Verdict,
{
    let case_path = JobPath::case(plan.key.clone());
    debug!(case = %plan.key, conversations = plan.conversations.len(), "case started");

    let mut keys = Vec::with_capacity(plan.conversations.len());
    let mut generators = Vec::with_capacity(plan.conversations.len());
    let mut evaluations = Vec::with_capacity(plan.conversations.len());
    for conversation in plan.conversations {
        keys.push(conversation.key);
        generators.push(conversation.generate);
        evaluations.push(conversation.evaluations);
    }
    let conversation_path = |index: usize| case_path.conversation(keys[index].clone());

    // Phase 1: every conversation generates its transcript.
    let transcripts = thread::scope(|scope| {
        let mut group = WorkerGroup::new(scope, "conversation");
        for (index, generate) in generators.into_iter().enumerate() {
            let path = conversation_path(index);
            group.spawn(move || {
                let progress = Progress::new(sink, path);
                generate(&progress).map_err(|err| WorkerError::job(progress.path, err))
            });
        }
        group.wait()
    })
    .map_err(|err| lift(err, conversation_path))?;
    debug!(case = %plan.key, "all conversations generated");

    // Phase 2: evaluations, which read the complete transcripts.
    let conversations = thread::scope(|scope| {
        let mut group = WorkerGroup::new(scope, "conversation");
        for (index, (transcript, iterations)) in transcripts.into_iter().zip(evaluations).enumerate() {
            let path = conversation_path(index);
            group.spawn(move || evaluate_conversation(path, transcript, iterations, sink));
        }
        group.wait()
    })
    .map_err(|err| lift(err, conversation_path))?;

    debug!(case = %plan.key, "case finished");
    Ok(CaseReport {
        case: plan.key.to_string(),
        conversations,
    })
}

fn evaluate_conversation<T, V>(
    path: JobPath,
    transcript: T,
    iterations: Vec<EvaluateFn<T, V>>,
    sink: &dyn ProgressSink,
) -> Result<ConversationReport<T, V>, WorkerError>
where
    T: Transcript + Sync,
    V: Verdict,
{
    let total = u32::try_from(iterations.len()).unwrap_or(u32::MAX);
    let finished = AtomicU32::new(0);
    let progress = Progress::new(sink, path.clone());
    progress
        .report(0, total, CellStatus::Evaluating)
        .map_err(|err| WorkerError::progress(path.clone(), err))?;

    let verdicts = thread::scope(|scope| {
        let mut group = WorkerGroup::new(scope, "iteration");
        for (index, evaluate) in iterations.into_iter().enumerate() {
            let iteration_path = path.iteration(index);
            let transcript = &transcript;
            let finished = &finished;
            let progress = &progress;
            group.spawn(move || {
                let verdict = evaluate(transcript, &Progress::new(sink, iteration_path.clone()))
                    .map_err(|err| WorkerError::job(iteration_path.clone(), err))?;
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                progress
                    .report(done, total, CellStatus::Evaluating)
                    .map_err(|err| WorkerError::progress(iteration_path, err))?;
                Ok(verdict)
            });
        }
        group.wait()
    })
    .map_err(|err| lift(err, |index| path.iteration(index)))?;

    let passes = u32::try_from(verdicts.iter().filter(|v| v.passed()).count()).unwrap_or(u32::MAX);
    let cost = transcript.cost() + verdicts.iter().map(Verdict::cost).sum::<f64>();
    let summary = ConversationSummary {
        passes,
        total_evals: total,
        cost,
    };
    sink.conversation_finished(&path, &summary)
        .map_err(|err| WorkerError::progress(path.clone(), err))?;
    debug!(path = %path, passes, total_evals = total, "conversation finished");

    Ok(ConversationReport {
        conversation: path
            .conversation
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        transcript,
        iterations: verdicts
            .into_iter()
            .enumerate()
            .map(|(index, verdict)| IterationReport { index, verdict })
            .collect(),
        summary,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerErrorKind;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Text(String);

    impl Transcript for Text {
        fn cost(&self) -> f64 {
            0.5
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pass(bool);

    impl Verdict for Pass {
        fn passed(&self) -> bool {
            self.0
        }
        fn cost(&self) -> f64 {
            0.25
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Progress(JobPath, u32, u32, CellStatus),
        Finished(JobPath, u32, u32),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn progress(
            &self,
            path: &JobPath,
            completed: u32,
            total: u32,
            status: CellStatus,
        ) -> Result<(), JobError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::Progress(path.clone(), completed, total, status));
            Ok(())
        }

        fn conversation_finished(
            &self,
            path: &JobPath,
            summary: &ConversationSummary,
        ) -> Result<(), JobError> {
            self.events.lock().unwrap().push(Event::Finished(
                path.clone(),
                summary.passes,
                summary.total_evals,
            ));
            Ok(())
        }
    }

    fn conversation(key: &str, turns: u32, verdicts: &[bool]) -> ConversationPlan<Text, Pass> {
        let text = key.to_string();
        let mut plan = ConversationPlan::new(ColumnKey::new(key), turns, move |progress| {
            for turn in 1..=turns {
                progress.report(turn, turns, CellStatus::Generating)?;
            }
            Ok(Text(text))
        });
        for &passed in verdicts {
            plan = plan.with_evaluation(move |_, _| Ok(Pass(passed)));
        }
        plan
    }

    #[test]
    fn report_is_assembled_in_submission_order() {
        let cases = vec![
            CasePlan::new(RowKey::new("slow")).with_conversation(
                ConversationPlan::new(ColumnKey::new("a"), 1, |_| {
                    thread::sleep(Duration::from_millis(30));
                    Ok(Text("slow".into()))
                })
                .with_evaluation(|_, _| Ok(Pass(true))),
            ),
            CasePlan::new(RowKey::new("fast"))
                .with_conversation(conversation("b", 1, &[true, false]))
                .with_conversation(conversation("c", 1, &[false])),
        ];
        let report = Scheduler::new().run(cases, &NullSink).unwrap();
        assert_eq!(report.cases[0].case, "slow");
        assert_eq!(report.cases[1].case, "fast");
        let names: Vec<_> = report.cases[1]
            .conversations
            .iter()
            .map(|c| c.conversation.as_str())
            .collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(report.passes(), 2);
        assert_eq!(report.total_evals(), 4);
        // three transcripts at 0.5, four verdicts at 0.25
        assert!((report.cost() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn evaluation_waits_for_every_conversation_in_the_case() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut case = CasePlan::new(RowKey::new("case"));
        for (key, delay) in [("quick", 0u64), ("slow", 40)] {
            let generated = Arc::clone(&log);
            let evaluated = Arc::clone(&log);
            case = case.with_conversation(
                ConversationPlan::new(ColumnKey::new(key), 1, move |_| {
                    thread::sleep(Duration::from_millis(delay));
                    generated.lock().unwrap().push(format!("generated {key}"));
                    Ok(Text(key.into()))
                })
                .with_evaluation(move |_, _| {
                    evaluated.lock().unwrap().push(format!("evaluated {key}"));
                    Ok(Pass(true))
                }),
            );
        }
        Scheduler::new().run(vec![case], &NullSink).unwrap();
        let log = log.lock().unwrap();
        let last_generated = log.iter().rposition(|e| e.starts_with("generated")).unwrap();
        let first_evaluated = log.iter().position(|e| e.starts_with("evaluated")).unwrap();
        assert!(last_generated < first_evaluated, "{log:?}");
    }

    #[test]
    fn sink_sees_generation_evaluation_and_summary() {
        let sink = RecordingSink::default();
        let cases = vec![CasePlan::new(RowKey::new("greet")).with_conversation(conversation(
            "base",
            2,
            &[true, true, false],
        ))];
        Scheduler::new().run(cases, &sink).unwrap();

        let convo = JobPath::case(RowKey::new("greet")).conversation(ColumnKey::new("base"));
        let events = sink.events();
        assert_eq!(events[0], Event::Progress(convo.clone(), 1, 2, CellStatus::Generating));
        assert_eq!(events[1], Event::Progress(convo.clone(), 2, 2, CellStatus::Generating));
        assert_eq!(events[2], Event::Progress(convo.clone(), 0, 3, CellStatus::Evaluating));
        let mut evaluating: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p, done, 3, CellStatus::Evaluating) if *p == convo && *done > 0 => {
                    Some(*done)
                }
                _ => None,
            })
            .collect();
        evaluating.sort_unstable();
        assert_eq!(evaluating, vec![1, 2, 3]);
        assert_eq!(events.last(), Some(&Event::Finished(convo, 2, 3)));
    }

    #[test]
    fn job_error_carries_context_and_siblings_finish() {
        let sink = RecordingSink::default();
        let cases = vec![
            CasePlan::new(RowKey::with_case("haggle", 1))
                .with_conversation(conversation("a", 1, &[true]))
                .with_conversation(
                    ConversationPlan::new(ColumnKey::new("b"), 1, |_| Ok(Text("b".into())))
                        .with_evaluation(|_, _| Ok(Pass(true)))
                        .with_evaluation(|_, _| Err("judge unavailable".into())),
                ),
            CasePlan::new(RowKey::new("other")).with_conversation(conversation("a", 1, &[true])),
        ];
        let err = Scheduler::new().run(cases, &sink).unwrap_err();
        assert_eq!(err.path.case, RowKey::with_case("haggle", 1));
        assert_eq!(err.path.conversation, Some(ColumnKey::new("b")));
        assert_eq!(err.path.iteration, Some(1));
        assert!(matches!(err.kind, WorkerErrorKind::Job(_)));
        assert_eq!(
            err.to_string(),
            "case `haggle case 1`, conversation `b`, iteration 1 failed: judge unavailable"
        );
        // the sibling case was not cancelled
        let other = JobPath::case(RowKey::new("other")).conversation(ColumnKey::new("a"));
        assert!(sink.events().contains(&Event::Finished(other, 1, 1)));
    }

    #[test]
    fn generation_failure_skips_evaluation_of_that_case() {
        let sink = RecordingSink::default();
        let cases = vec![CasePlan::new(RowKey::new("greet"))
            .with_conversation(
                ConversationPlan::new(ColumnKey::new("a"), 1, |_| Err("model offline".into()))
                    .with_evaluation(|_, _| Ok(Pass(true))),
            )
            .with_conversation(conversation("b", 1, &[true]))];
        let err = Scheduler::new().run(cases, &sink).unwrap_err();
        assert_eq!(err.path.conversation, Some(ColumnKey::new("a")));
        assert_eq!(err.path.iteration, None);
        assert!(
            !sink
                .events()
                .iter()
                .any(|e| matches!(e, Event::Progress(_, _, _, CellStatus::Evaluating)))
        );
    }

    #[test]
    fn panicking_job_is_reported_with_its_path() {
        let cases = vec![CasePlan::new(RowKey::new("greet")).with_conversation(
            ConversationPlan::<Text, Pass>::new(ColumnKey::new("a"), 1, |_| {
                panic!("generator bug")
            }),
        )];
        let err = Scheduler::new().run(cases, &NullSink).unwrap_err();
        assert_eq!(err.path.conversation, Some(ColumnKey::new("a")));
        assert!(matches!(err.kind, WorkerErrorKind::Panicked(ref m) if m == "generator bug"));
    }

    struct RejectingSink;

    impl ProgressSink for RejectingSink {
        fn progress(&self, path: &JobPath, _: u32, _: u32, _: CellStatus) -> Result<(), JobError> {
            Err(format!("{path} was never registered").into())
        }

        fn conversation_finished(&self, _: &JobPath, _: &ConversationSummary) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn rejected_progress_aborts_the_run() {
        let cases = vec![CasePlan::new(RowKey::new("greet")).with_conversation(conversation("a", 3, &[true]))];
        let err = Scheduler::new().run(cases, &RejectingSink).unwrap_err();
        assert!(err.to_string().contains("never registered"));
    }

    #[test]
    fn conversation_without_iterations_reports_empty_summary() {
        let sink = RecordingSink::default();
        let cases = vec![CasePlan::new(RowKey::new("greet")).with_conversation(conversation("a", 1, &[]))];
        let report = Scheduler::new().run(cases, &sink).unwrap();
        assert_eq!(report.total_evals(), 0);
        let path = JobPath::case(RowKey::new("greet")).conversation(ColumnKey::new("a"));
        assert_eq!(sink.events().last(), Some(&Event::Finished(path, 0, 0)));
    }

    #[test]
    fn total_units_is_longer_phase() {
        assert_eq!(conversation("a", 4, &[true; 10]).total_units(), 10);
        assert_eq!(conversation("a", 12, &[true; 3]).total_units(), 12);
    }
}
