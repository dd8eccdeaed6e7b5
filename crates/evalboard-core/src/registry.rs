#![forbid(unsafe_code)]

//! Thread-safe progress registry backing the live dashboard.
//!
//! The registry owns a single [`Table`] of cells keyed by `(row, column)`,
//! where a row is a test case (optionally one of several numbered cases with
//! the same base name) and a column is the variant under test.
//!
//! # Invariants
//!
//! 1. **One lock for the whole table**: every read and write goes through a
//!    single mutex. An observer attached with
//!    [`ProgressRegistry::attach_observer`] runs under that same lock, so each
//!    frame it draws reflects one committed table state.
//!
//! 2. **Bounded progress**: `completed_units <= total_units` for every cell.
//!
//! 3. **Monotonic status**: a cell only moves forward through
//!    `Pending → Generating → Evaluating → [Scoring] → Done`. Once `Done`,
//!    both mutators are no-ops.
//!
//! 4. **Done is final and consistent**: `status == Done` implies
//!    `completed_units == total_units` and `passes <= total_evals`.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unregistered cell | Mutator called before `register` | `RegistryError::UnregisteredCell` |
//! | Impossible result | `passes > total_evals` | `RegistryError::ResultExceedsEvals` |
//! | Poisoned lock | Observer panicked mid-frame | Lock recovered; table is consistent between mutators |

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Keys
// ============================================================================

/// Row key: one entity (test case) shown as a dashboard row.
///
/// Entities that expand into several numbered cases carry `case`, rendered
/// as a `" case N"` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub name: String,
    pub case: Option<u32>,
}

impl RowKey {
    /// A single-case row.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            case: None,
        }
    }

    /// One numbered case of a multi-case entity.
    #[must_use]
    pub fn with_case(name: impl Into<String>, case: u32) -> Self {
        Self {
            name: name.into(),
            case: Some(case),
        }
    }

    /// The `" case N"` suffix, or an empty string for single-case rows.
    #[must_use]
    pub fn case_suffix(&self) -> String {
        match self.case {
            Some(n) => format!(" case {n}"),
            None => String::new(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.case_suffix())
    }
}

/// Column key: the variant (implementation or configuration) under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey(pub String);

impl ColumnKey {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Cell
// ============================================================================

/// Execution status of one cell. Declaration order is state-machine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CellStatus {
    /// Registered, no work started.
    #[default]
    Pending,
    /// Phase 1: the conversation is being generated, one unit per turn.
    Generating,
    /// Phase 2: evaluation iterations are running, one unit per iteration.
    Evaluating,
    /// Optional phase 3: final scoring or aggregation.
    Scoring,
    /// Result recorded.
    Done,
}

impl CellStatus {
    /// Short label shown next to the progress bar.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "convo",
            Self::Evaluating => "eval",
            Self::Scoring => "score",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One `(row, column)` progress entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub completed_units: u32,
    pub total_units: u32,
    pub status: CellStatus,
    pub passes: u32,
    pub total_evals: u32,
    pub cost: f64,
}

impl Cell {
    fn pending(total_units: u32) -> Self {
        Self {
            completed_units: 0,
            total_units,
            status: CellStatus::Pending,
            passes: 0,
            total_evals: 0,
            cost: 0.0,
        }
    }

    /// Progress within the current phase, in `0.0..=1.0`.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total_units == 0 {
            return if self.status.is_done() { 1.0 } else { 0.0 };
        }
        f64::from(self.completed_units) / f64::from(self.total_units)
    }
}

// ============================================================================
// Table
// ============================================================================

/// Aggregate of passes, evaluations and cost over a set of cells.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub passes: u32,
    pub total_evals: u32,
    pub cost: f64,
    /// Number of cells aggregated.
    pub cells: usize,
    /// Number of those cells that are `Done`.
    pub done: usize,
}

impl Totals {
    fn add(&mut self, cell: &Cell) {
        self.passes += cell.passes;
        self.total_evals += cell.total_evals;
        self.cost += cell.cost;
        self.cells += 1;
        if cell.status.is_done() {
            self.done += 1;
        }
    }

    /// True when at least one cell was aggregated and all of them are done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells > 0 && self.done == self.cells
    }
}

/// Dashboard state: ordered rows, sorted columns, and the cells between them.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<RowKey>,
    columns: BTreeSet<ColumnKey>,
    cells: HashMap<(RowKey, ColumnKey), Cell>,
}

impl Table {
    /// Row keys in insertion (display) order.
    #[must_use]
    pub fn rows(&self) -> &[RowKey] {
        &self.rows
    }

    /// Column keys in sorted (display) order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnKey> {
        self.columns.iter()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn cell(&self, row: &RowKey, column: &ColumnKey) -> Option<&Cell> {
        self.cells.get(&(row.clone(), column.clone()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Totals for a single column.
    #[must_use]
    pub fn column_totals(&self, column: &ColumnKey) -> Totals {
        let mut totals = Totals::default();
        for ((_, col), cell) in &self.cells {
            if col == column {
                totals.add(cell);
            }
        }
        totals
    }

    /// Totals across every cell in the table.
    #[must_use]
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for cell in self.cells.values() {
            totals.add(cell);
        }
        totals
    }

    /// True when the table is non-empty and every cell is `Done`.
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.totals().is_complete()
    }

    fn cell_mut(&mut self, row: &RowKey, column: &ColumnKey) -> Result<&mut Cell, RegistryError> {
        self.cells
            .get_mut(&(row.clone(), column.clone()))
            .ok_or_else(|| RegistryError::UnregisteredCell {
                row: row.clone(),
                column: column.clone(),
            })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Registry misuse. Always a wiring bug in the caller, never transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A mutator was called for a cell that was never registered.
    UnregisteredCell { row: RowKey, column: ColumnKey },
    /// `set_result` was called with more passes than evaluations.
    ResultExceedsEvals {
        row: RowKey,
        column: ColumnKey,
        passes: u32,
        total_evals: u32,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredCell { row, column } => {
                write!(f, "cell ({row}, {column}) was never registered")
            }
            Self::ResultExceedsEvals {
                row,
                column,
                passes,
                total_evals,
            } => write!(
                f,
                "cell ({row}, {column}): {passes} passes exceed {total_evals} evaluations"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

// ============================================================================
// Registry
// ============================================================================

/// Receives every committed table state while the table lock is held.
///
/// Implementations must not call back into the registry.
pub trait TableObserver: Send {
    /// Called after each successful mutation (and once on attach).
    fn on_change(&mut self, table: &Table);

    /// Called once when the observer is closed, still under the lock.
    fn finish(&mut self, _table: &Table) {}
}

struct Inner {
    table: Table,
    observer: Option<Box<dyn TableObserver>>,
}

impl Inner {
    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_change(&self.table);
        }
    }
}

/// Thread-safe store of per-cell execution state.
///
/// # Example
///
/// ```
/// use evalboard_core::registry::{CellStatus, ColumnKey, ProgressRegistry, RowKey};
///
/// let registry = ProgressRegistry::new();
/// let row = RowKey::new("greeting");
/// let col = ColumnKey::new("baseline");
/// registry.register(row.clone(), col.clone(), 4);
/// registry.update(&row, &col, 2, CellStatus::Generating).unwrap();
/// registry.set_result(&row, &col, 3, 4, 0.01).unwrap();
/// assert!(registry.cell(&row, &col).unwrap().status.is_done());
/// ```
pub struct ProgressRegistry {
    inner: Mutex<Inner>,
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ProgressRegistry")
            .field("table", &inner.table)
            .field("observed", &inner.observer.is_some())
            .finish()
    }
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                table: Table::default(),
                observer: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a cell in `Pending` state.
    ///
    /// Registering an existing cell leaves it untouched, so repeated calls
    /// with the same arguments are idempotent.
    pub fn register(&self, row: RowKey, column: ColumnKey, total_units: u32) {
        let mut inner = self.lock();
        let key = (row, column);
        if let Some(existing) = inner.table.cells.get(&key) {
            if existing.total_units != total_units {
                tracing::warn!(
                    row = %key.0,
                    column = %key.1,
                    registered = existing.total_units,
                    requested = total_units,
                    "cell already registered with a different unit count"
                );
            }
            return;
        }

        let (row, column) = key;
        if !inner.table.rows.contains(&row) {
            inner.table.rows.push(row.clone());
        }
        inner.table.columns.insert(column.clone());
        tracing::trace!(row = %row, column = %column, total_units, "cell registered");
        inner.table.cells.insert((row, column), Cell::pending(total_units));
        inner.notify();
    }

    /// Record progress within a phase.
    ///
    /// The status never moves backwards. Within one phase the completed count
    /// never decreases, so out-of-order reports from parallel workers are
    /// harmless; entering a new phase restarts the count. Counts are clamped
    /// to the cell's `total_units`.
    pub fn update(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        completed: u32,
        status: CellStatus,
    ) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        let cell = inner.table.cell_mut(row, column)?;
        if cell.status.is_done() {
            return Ok(());
        }

        let completed = completed.min(cell.total_units);
        if status > cell.status {
            cell.status = status;
            cell.completed_units = completed;
        } else {
            cell.completed_units = cell.completed_units.max(completed);
        }
        if cell.status.is_done() {
            cell.completed_units = cell.total_units;
        }
        tracing::trace!(
            row = %row,
            column = %column,
            completed = cell.completed_units,
            status = %cell.status,
            "cell progress"
        );
        inner.notify();
        Ok(())
    }

    /// Record the final result and move the cell to `Done`.
    ///
    /// Negative or non-finite costs are recorded as zero.
    pub fn set_result(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        passes: u32,
        total_evals: u32,
        cost: f64,
    ) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        let cell = inner.table.cell_mut(row, column)?;
        if cell.status.is_done() {
            return Ok(());
        }
        if passes > total_evals {
            return Err(RegistryError::ResultExceedsEvals {
                row: row.clone(),
                column: column.clone(),
                passes,
                total_evals,
            });
        }

        cell.passes = passes;
        cell.total_evals = total_evals;
        cell.cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        cell.completed_units = cell.total_units;
        cell.status = CellStatus::Done;
        tracing::debug!(row = %row, column = %column, passes, total_evals, "cell done");
        inner.notify();
        Ok(())
    }

    /// Copy of a single cell.
    #[must_use]
    pub fn cell(&self, row: &RowKey, column: &ColumnKey) -> Option<Cell> {
        self.lock().table.cell(row, column).cloned()
    }

    /// Point-in-time copy of the whole table.
    #[must_use]
    pub fn snapshot(&self) -> Table {
        self.lock().table.clone()
    }

    /// Run `f` against the table while holding the lock.
    pub fn with_table<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        f(&self.lock().table)
    }

    /// Attach an observer and immediately show it the current table.
    ///
    /// Returns the previously attached observer, if any, without finishing it.
    pub fn attach_observer(
        &self,
        observer: Box<dyn TableObserver>,
    ) -> Option<Box<dyn TableObserver>> {
        let mut inner = self.lock();
        let previous = inner.observer.replace(observer);
        inner.notify();
        previous
    }

    /// Finish and detach the current observer. Returns false if none was attached.
    pub fn close_observer(&self) -> bool {
        let mut inner = self.lock();
        match inner.observer.take() {
            Some(mut observer) => {
                observer.finish(&inner.table);
                true
            }
            None => false,
        }
    }

    /// Detach the current observer without finishing it.
    pub fn detach_observer(&self) -> Option<Box<dyn TableObserver>> {
        self.lock().observer.take()
    }

    #[must_use]
    pub fn has_observer(&self) -> bool {
        self.lock().observer.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
