#![forbid(unsafe_code)]

//! Core: the shared progress registry, environment configuration, and logging.
//!
//! Everything else in the workspace depends on this crate. The
//! [`registry::ProgressRegistry`] is the only cross-thread mutable state in a
//! run; the scheduler writes into it through progress callbacks and the
//! renderer observes it under the same lock.

pub mod config;
pub mod logging;
pub mod registry;

pub use config::{DashboardLayout, EvalConfig, LogConfig};
pub use registry::{
    Cell, CellStatus, ColumnKey, ProgressRegistry, RegistryError, RowKey, Table, TableObserver,
    Totals,
};
