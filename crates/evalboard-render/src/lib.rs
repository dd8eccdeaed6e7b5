#![forbid(unsafe_code)]

//! Dashboard rendering: a pure frame builder and an ANSI presenter.
//!
//! [`frame::DashboardFrame::compute`] turns a [`evalboard_core::Table`] into
//! lines of text without touching any terminal. [`presenter::Presenter`]
//! owns the output stream and redraws the whole frame in place each time the
//! registry reports a change.

pub mod ansi;
pub mod bar;
pub mod capture;
pub mod format;
pub mod frame;
pub mod presenter;

pub use capture::CaptureBuffer;
pub use frame::{DashboardFrame, FrameLine, Segment, Tone};
pub use presenter::{Presenter, RenderError};
