#![forbid(unsafe_code)]

//! Progress sink that writes scheduler progress into the registry.
//!
//! A conversation owns one cell: its case is the row and its key is the
//! column. The cell's unit count is the longer of the two phases, so each
//! report is rescaled from the job's own `total` to the cell's units.
//! Per-iteration reports are skipped; the scheduler's conversation-level
//! `Evaluating` counts already drive the cell during evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use evalboard_core::{CellStatus, ColumnKey, ProgressRegistry, RowKey};
use evalboard_runtime::{CasePlan, ConversationSummary, JobError, JobPath, ProgressSink};
use tracing::trace;

/// [`ProgressSink`] backed by a [`ProgressRegistry`].
#[derive(Debug)]
pub struct DashboardSink {
    registry: Arc<ProgressRegistry>,
    units: HashMap<(RowKey, ColumnKey), u32>,
}

impl DashboardSink {
    #[must_use]
    pub fn new(registry: Arc<ProgressRegistry>) -> Self {
        Self {
            registry,
            units: HashMap::new(),
        }
    }

    /// Register a pending cell for every conversation in `plans`.
    ///
    /// Must run before the plans are scheduled: reports for cells that were
    /// never registered are rejected and abort the run.
    pub fn register_plans<T, V>(&mut self, plans: &[CasePlan<T, V>]) {
        for case in plans {
            for conversation in &case.conversations {
                let units = conversation.total_units();
                self.registry
                    .register(case.key.clone(), conversation.key.clone(), units);
                self.units
                    .insert((case.key.clone(), conversation.key.clone()), units);
            }
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    fn cell_units(&self, row: &RowKey, column: &ColumnKey) -> Option<u32> {
        self.units.get(&(row.clone(), column.clone())).copied()
    }
}

/// Rescale `completed` of `total` onto `units`.
fn scale(completed: u32, total: u32, units: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = u64::from(completed.min(total)) * u64::from(units) / u64::from(total);
    u32::try_from(scaled).unwrap_or(units)
}

impl ProgressSink for DashboardSink {
    fn progress(
        &self,
        path: &JobPath,
        completed: u32,
        total: u32,
        status: CellStatus,
    ) -> Result<(), JobError> {
        let Some(column) = path.conversation.as_ref() else {
            return Ok(());
        };
        if path.iteration.is_some() {
            trace!(path = %path, completed, total, "iteration progress");
            return Ok(());
        }
        let completed = match self.cell_units(&path.case, column) {
            Some(units) => scale(completed, total, units),
            None => completed,
        };
        self.registry.update(&path.case, column, completed, status)?;
        Ok(())
    }

    fn conversation_finished(
        &self,
        path: &JobPath,
        summary: &ConversationSummary,
    ) -> Result<(), JobError> {
        let Some(column) = path.conversation.as_ref() else {
            return Ok(());
        };
        self.registry.set_result(
            &path.case,
            column,
            summary.passes,
            summary.total_evals,
            summary.cost,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalboard_core::RegistryError;
    use evalboard_runtime::{ConversationPlan, Transcript, Verdict};

    struct Text;
    impl Transcript for Text {
        fn cost(&self) -> f64 {
            0.0
        }
    }

    struct Pass;
    impl Verdict for Pass {
        fn passed(&self) -> bool {
            true
        }
        fn cost(&self) -> f64 {
            0.0
        }
    }

    fn plans() -> Vec<CasePlan<Text, Pass>> {
        let mut conversation = ConversationPlan::new(ColumnKey::new("tuned"), 4, |_| Ok(Text));
        for _ in 0..10 {
            conversation = conversation.with_evaluation(|_, _| Ok(Pass));
        }
        vec![CasePlan::new(RowKey::new("greet")).with_conversation(conversation)]
    }

    fn sink() -> DashboardSink {
        let mut sink = DashboardSink::new(Arc::new(ProgressRegistry::new()));
        sink.register_plans(&plans());
        sink
    }

    fn path() -> JobPath {
        JobPath::case(RowKey::new("greet")).conversation(ColumnKey::new("tuned"))
    }

    #[test]
    fn register_uses_longer_phase() {
        let sink = sink();
        let cell = sink
            .registry()
            .cell(&RowKey::new("greet"), &ColumnKey::new("tuned"))
            .unwrap();
        assert_eq!(cell.total_units, 10);
        assert_eq!(cell.status, CellStatus::Pending);
    }

    #[test]
    fn generation_is_rescaled_to_cell_units() {
        let sink = sink();
        sink.progress(&path(), 2, 4, CellStatus::Generating).unwrap();
        let cell = sink
            .registry()
            .cell(&RowKey::new("greet"), &ColumnKey::new("tuned"))
            .unwrap();
        assert_eq!(cell.completed_units, 5);
        assert_eq!(cell.status, CellStatus::Generating);
    }

    #[test]
    fn iteration_reports_do_not_touch_the_cell() {
        let sink = sink();
        sink.progress(&path().iteration(3), 1, 1, CellStatus::Scoring)
            .unwrap();
        let cell = sink
            .registry()
            .cell(&RowKey::new("greet"), &ColumnKey::new("tuned"))
            .unwrap();
        assert_eq!(cell.status, CellStatus::Pending);
    }

    #[test]
    fn summary_completes_the_cell() {
        let sink = sink();
        let summary = ConversationSummary {
            passes: 7,
            total_evals: 10,
            cost: 0.3,
        };
        sink.conversation_finished(&path(), &summary).unwrap();
        let cell = sink
            .registry()
            .cell(&RowKey::new("greet"), &ColumnKey::new("tuned"))
            .unwrap();
        assert_eq!(cell.status, CellStatus::Done);
        assert_eq!((cell.passes, cell.total_evals), (7, 10));
    }

    #[test]
    fn unregistered_cell_is_rejected() {
        let sink = sink();
        let stray = JobPath::case(RowKey::new("other")).conversation(ColumnKey::new("tuned"));
        let err = sink
            .progress(&stray, 1, 2, CellStatus::Generating)
            .unwrap_err();
        assert!(err.downcast_ref::<RegistryError>().is_some());
    }

    #[test]
    fn scale_handles_edges() {
        assert_eq!(scale(0, 0, 10), 0);
        assert_eq!(scale(4, 4, 10), 10);
        assert_eq!(scale(9, 4, 10), 10);
        assert_eq!(scale(1, 3, 10), 3);
    }
}
