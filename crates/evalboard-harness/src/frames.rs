#![forbid(unsafe_code)]

//! Frame-by-frame replay of a captured dashboard stream.
//!
//! The presenter brackets every frame with DEC 2026 synchronized output
//! (`?2026h` … `?2026l`). Splitting a capture on those markers and replaying
//! it incrementally gives the screen a user saw after each frame, which is
//! what assertions like "the totals row never showed a partial sum" need.

use evalboard_pty::TerminalEmulator;
use evalboard_render::ansi::{SYNC_BEGIN, SYNC_END};

/// Byte ranges of the synchronized frames in `bytes`, including markers.
///
/// Bytes outside any bracket (for example the final cursor-show) are not
/// part of a frame. An unterminated frame at the end is returned as is.
#[must_use]
pub fn split_frames(bytes: &[u8]) -> Vec<&[u8]> {
    let mut frames = Vec::new();
    let mut rest = 0;
    while let Some(begin) = find(&bytes[rest..], SYNC_BEGIN).map(|i| rest + i) {
        let body = begin + SYNC_BEGIN.len();
        match find(&bytes[body..], SYNC_END) {
            Some(end) => {
                let stop = body + end + SYNC_END.len();
                frames.push(&bytes[begin..stop]);
                rest = stop;
            }
            None => {
                frames.push(&bytes[begin..]);
                break;
            }
        }
    }
    frames
}

/// Number of complete synchronized frames in `bytes`.
#[must_use]
pub fn count_frames(bytes: &[u8]) -> usize {
    split_frames(bytes)
        .iter()
        .filter(|frame| frame.ends_with(SYNC_END))
        .count()
}

/// Screen text after each complete frame, replaying the whole stream
/// (including bytes between frames) on one `cols` × `rows` emulator.
///
/// # Panics
///
/// Panics if `cols` or `rows` is 0.
#[must_use]
pub fn replay_frames(bytes: &[u8], cols: u16, rows: u16) -> Vec<String> {
    let mut term = TerminalEmulator::new(cols, rows);
    let mut screens = Vec::new();
    let mut fed = 0;
    while let Some(end) = find(&bytes[fed..], SYNC_END).map(|i| fed + i + SYNC_END.len()) {
        term.write(&bytes[fed..end]);
        fed = end;
        screens.push(term.snapshot());
    }
    screens
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
