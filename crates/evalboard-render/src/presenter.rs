#![forbid(unsafe_code)]

//! Presenter: whole-frame in-place redraw.
//!
//! The presenter is the effectful half of the renderer. It is attached to a
//! [`ProgressRegistry`](evalboard_core::ProgressRegistry) as a
//! [`TableObserver`], so every frame is drawn while the table lock is held
//! and the lines-printed counter is only ever touched under that lock.
//!
//! # Design Principles
//!
//! - **Whole-frame redraw**: move up over the previous frame, erase to the
//!   end of the screen, print every line again. No partial updates.
//! - **Single write**: the frame is assembled in memory and written once.
//! - **Synchronized output**: DEC 2026 brackets each frame to prevent flicker.
//! - **Self-healing**: a failed write forgets the previous frame, so the
//!   next successful frame is drawn fresh below whatever reached the screen.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Write error | Closed stdout, full pipe | Logged at `warn`, counter reset, run continues |
//! | Frame wider than terminal | Layout wider than the window | Lines wrap; the next erase under-counts |

use std::fmt;
use std::io::{self, Write};

use evalboard_core::{DashboardLayout, Table, TableObserver};
use tracing::{trace, warn};

use crate::ansi::{self, EraseDisplayMode};
use crate::frame::{DashboardFrame, FrameLine, Tone};

// ============================================================================
// Errors
// ============================================================================

/// Failure while printing a frame.
#[derive(Debug)]
pub enum RenderError {
    /// The output stream rejected the write or flush.
    Io(io::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to draw dashboard frame: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

// ============================================================================
// Presenter
// ============================================================================

/// Redraws the dashboard in place on an ANSI output stream.
pub struct Presenter<W: Write + Send> {
    writer: W,
    layout: DashboardLayout,
    sync_output: bool,
    /// Lines printed by the last successful frame; the next frame moves up by this much.
    lines_printed: usize,
    last_frame: Option<DashboardFrame>,
    cursor_hidden: bool,
    frames_drawn: u64,
}

impl<W: Write + Send> fmt::Debug for Presenter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presenter")
            .field("layout", &self.layout)
            .field("lines_printed", &self.lines_printed)
            .field("frames_drawn", &self.frames_drawn)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> Presenter<W> {
    pub fn new(writer: W, layout: DashboardLayout) -> Self {
        Self {
            writer,
            layout,
            sync_output: true,
            lines_printed: 0,
            last_frame: None,
            cursor_hidden: false,
            frames_drawn: 0,
        }
    }

    /// Toggle DEC 2026 synchronized output brackets (on by default).
    #[must_use]
    pub fn with_sync_output(mut self, enabled: bool) -> Self {
        self.sync_output = enabled;
        self
    }

    #[must_use]
    pub fn layout(&self) -> &DashboardLayout {
        &self.layout
    }

    /// Lines the next frame will erase before drawing.
    #[must_use]
    pub fn lines_printed(&self) -> usize {
        self.lines_printed
    }

    /// Frames actually written (identical frames are skipped).
    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Compute and draw the frame for `table`.
    pub fn present(&mut self, table: &Table) -> Result<(), RenderError> {
        let frame = DashboardFrame::compute(table, &self.layout);
        self.present_frame(frame)
    }

    /// Draw a precomputed frame over the previous one.
    ///
    /// On error the previous frame is forgotten, so the next call starts a
    /// fresh frame at the current cursor position instead of erasing lines
    /// that may never have been printed.
    pub fn present_frame(&mut self, frame: DashboardFrame) -> Result<(), RenderError> {
        if self.last_frame.as_ref() == Some(&frame) {
            return Ok(());
        }

        let mut out = Vec::with_capacity(frame.len() * (self.layout.line_width(4) + 16));
        self.encode_frame(&mut out, &frame)?;

        let result = self
            .writer
            .write_all(&out)
            .and_then(|()| self.writer.flush());
        if let Err(err) = result {
            self.lines_printed = 0;
            self.last_frame = None;
            return Err(err.into());
        }

        self.cursor_hidden = true;
        self.lines_printed = frame.len();
        self.frames_drawn += 1;
        trace!(lines = self.lines_printed, frame = self.frames_drawn, "frame presented");
        self.last_frame = Some(frame);
        Ok(())
    }

    fn encode_frame(&self, out: &mut Vec<u8>, frame: &DashboardFrame) -> io::Result<()> {
        if self.sync_output {
            out.extend_from_slice(ansi::SYNC_BEGIN);
        }
        if !self.cursor_hidden {
            out.extend_from_slice(ansi::CURSOR_HIDE);
        }
        ansi::cuu(out, self.lines_printed)?;
        ansi::cr(out)?;
        ansi::erase_display(out, EraseDisplayMode::ToEnd)?;
        for line in frame.lines() {
            self.encode_line(out, line)?;
            out.push(b'\n');
        }
        if self.sync_output {
            out.extend_from_slice(ansi::SYNC_END);
        }
        Ok(())
    }

    fn encode_line(&self, out: &mut Vec<u8>, line: &FrameLine) -> io::Result<()> {
        for segment in &line.segments {
            let styled = self.layout.color && segment.tone != Tone::Plain;
            if styled {
                apply_tone(out, segment.tone)?;
            }
            out.extend_from_slice(segment.text.as_bytes());
            if styled {
                ansi::sgr_reset(out)?;
            }
        }
        Ok(())
    }

    /// Draw the final frame and leave the cursor below the table.
    ///
    /// The counter is reset afterwards, so anything printed next (an error
    /// message, another dashboard) starts on a fresh line and is never erased.
    pub fn finalize(&mut self, table: &Table) -> Result<(), RenderError> {
        let drawn = self.present(table);
        self.lines_printed = 0;
        self.last_frame = None;
        if self.cursor_hidden {
            self.writer.write_all(ansi::CURSOR_SHOW)?;
            self.writer.flush()?;
            self.cursor_hidden = false;
        }
        drawn
    }

    /// Consume the presenter, returning the output stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn apply_tone(out: &mut Vec<u8>, tone: Tone) -> io::Result<()> {
    match tone {
        Tone::Plain => Ok(()),
        Tone::Header => ansi::sgr(out, ansi::SGR_BOLD),
        Tone::Muted => ansi::sgr(out, ansi::SGR_DIM),
        Tone::Active => ansi::sgr_fg_16(out, 6),
        Tone::Good => ansi::sgr_fg_16(out, 2),
        Tone::Warn => ansi::sgr_fg_16(out, 3),
        Tone::Bad => ansi::sgr_fg_16(out, 1),
    }
}

impl<W: Write + Send> TableObserver for Presenter<W> {
    fn on_change(&mut self, table: &Table) {
        if let Err(err) = self.present(table) {
            warn!(error = %err, "dashboard frame dropped");
        }
    }

    fn finish(&mut self, table: &Table) {
        if let Err(err) = self.finalize(table) {
            warn!(error = %err, "final dashboard frame dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
