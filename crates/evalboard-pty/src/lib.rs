#![forbid(unsafe_code)]

//! Terminal emulation for verifying dashboard output.
//!
//! The dashboard's only output channel is a raw ANSI byte stream. Tests
//! capture that stream and replay it through [`TerminalEmulator`] to get
//! the text a user would actually see, independent of which escape
//! sequences the renderer used to get there.
//!
//! # Modules
//!
//! - [`emulator`] - In-memory terminal state machine and snapshot text.

/// In-memory terminal state machine for testing.
pub mod emulator;

pub use emulator::TerminalEmulator;

/// Replay `bytes` on a fresh `cols` × `rows` emulator and return its snapshot.
///
/// # Panics
///
/// Panics if `cols` or `rows` is 0.
#[must_use]
pub fn canonicalize(bytes: &[u8], cols: u16, rows: u16) -> String {
    let mut term = TerminalEmulator::new(cols, rows);
    term.write(bytes);
    term.snapshot()
}
