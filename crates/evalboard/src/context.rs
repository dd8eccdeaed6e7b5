#![forbid(unsafe_code)]

//! Run context: everything one evaluation run shares.
//!
//! A [`RunContext`] owns the configuration and the progress registry and
//! optionally drives a live dashboard. It is created once per run and
//! passed explicitly; there is no process-wide state.
//!
//! # Teardown
//!
//! [`RunContext::finish`] draws the final frame and moves the cursor below
//! the table. Call it before printing anything after a run (in particular
//! an error) so that output is never overwritten by a redraw. Dropping the
//! context finishes it as well.

use std::io::Write;
use std::sync::Arc;

use evalboard_core::{EvalConfig, ProgressRegistry};
use evalboard_render::Presenter;
use evalboard_runtime::{CasePlan, Report, Scheduler, Transcript, Verdict, WorkerError};
use tracing::{debug, info};

use crate::sink::DashboardSink;

/// Configuration, registry, and dashboard for one run.
#[derive(Debug)]
pub struct RunContext {
    config: EvalConfig,
    registry: Arc<ProgressRegistry>,
    scheduler: Scheduler,
}

impl RunContext {
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ProgressRegistry::new()),
            scheduler: Scheduler::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    /// Draw the dashboard on `writer` from now on.
    ///
    /// Replaces (and finishes) any dashboard attached earlier.
    pub fn attach_presenter<W: Write + Send + 'static>(&self, writer: W) {
        self.registry.close_observer();
        let presenter = Presenter::new(writer, self.config.layout);
        self.registry.attach_observer(Box::new(presenter));
        debug!(layout = ?self.config.layout, "dashboard attached");
    }

    /// Register every cell in `plans`, then run them.
    pub fn run<T, V>(&self, plans: Vec<CasePlan<T, V>>) -> Result<Report<T, V>, WorkerError>
    where
        T: Transcript + Sync,
        V: Verdict,
    {
        let mut sink = DashboardSink::new(Arc::clone(&self.registry));
        sink.register_plans(&plans);
        info!(cells = self.registry.with_table(|table| table.len()), "run starting");
        self.scheduler.run(plans, &sink)
    }

    /// Finalize the dashboard, if one is attached. Returns whether one was.
    pub fn finish(&self) -> bool {
        self.registry.close_observer()
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.finish();
    }
}
